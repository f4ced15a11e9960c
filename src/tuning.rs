//! Force and behavior constants for a colony.
//!
//! Every distance-like constant grows linearly with the colony scale, so a
//! colony simulated at `scale = 10` behaves like one at `scale = 1` viewed
//! ten times larger.

use std::ops::RangeInclusive;

/// Tunable constants used by [`ParticleSystem::step`](crate::ParticleSystem::step).
///
/// Construct with [`Tuning::for_scale`] and override fields as needed:
///
/// ```ignore
/// let mut tuning = Tuning::for_scale(1.0);
/// tuning.turbulence_strength = 0.0; // guidance only
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Tuning {
    /// Colony scale the constants were derived from.
    pub scale: f64,
    /// Magnitude of the pull toward the current guide point.
    pub guide_strength: f64,
    /// Per-octave amplitude of the turbulence field.
    pub turbulence_strength: f64,
    /// Per-octave frequency multiplier of the turbulence field.
    pub turbulence_frequency: f64,
    /// Number of turbulence octaves.
    pub turbulence_octaves: u32,
    /// Neighbors closer than this push a particle away.
    pub avoid_threshold: f64,
    /// Scale applied to the summed push.
    pub avoid_strength: f64,
    /// Neighbors with a squared offset below this are skipped.
    pub avoid_epsilon_sq: f64,
    /// Allowed range of the guidance/turbulence blend.
    pub behavior_range: RangeInclusive<f64>,
    /// Half-width of the per-step uniform behavior jitter.
    pub behavior_jitter: f64,
    /// Upper cap of the rotation damping factor.
    pub rotation_cap: f64,
    /// Amount added to each particle's noise phase z every step.
    pub noise_drift: f64,
    /// Mean of the per-particle top speed.
    pub target_speed: f64,
}

impl Tuning {
    /// Default constants for a colony of the given scale.
    pub fn for_scale(scale: f64) -> Self {
        Self {
            scale,
            guide_strength: 1.0 * scale,
            turbulence_strength: 1.0 * scale,
            turbulence_frequency: 10.0 * scale,
            turbulence_octaves: 2,
            avoid_threshold: 0.01 * scale,
            avoid_strength: 0.2 * scale,
            avoid_epsilon_sq: 0.0001,
            behavior_range: 0.8..=0.9,
            behavior_jitter: 0.05,
            rotation_cap: 0.1,
            noise_drift: 0.01,
            target_speed: 0.005 * scale,
        }
    }

    /// Behavior a freshly spawned particle starts with.
    pub const INITIAL_BEHAVIOR: f64 = 0.6;

    /// Smallest top speed a particle may be given, as a fraction of the target.
    pub const MIN_SPEED_FRACTION: f64 = 0.05;

    /// Clamp a behavior value into the allowed range.
    #[inline]
    pub fn clamp_behavior(&self, behavior: f64) -> f64 {
        behavior.clamp(*self.behavior_range.start(), *self.behavior_range.end())
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self::for_scale(1.0)
    }
}
