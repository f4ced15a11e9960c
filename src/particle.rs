//! Per-agent particle state.

use crate::tuning::Tuning;
use glam::DVec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Which way a particle walks its guide index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward higher guide indices.
    Forward,
    /// Toward lower guide indices.
    Backward,
}

impl Direction {
    #[inline]
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    /// Move `index` one step in this direction, saturating at zero.
    #[inline]
    pub fn advance(self, index: usize) -> usize {
        match self {
            Direction::Forward => index + 1,
            Direction::Backward => index.saturating_sub(1),
        }
    }
}

/// A single ant.
///
/// Particles are identified by their position in the owning
/// [`ParticleSystem`](crate::ParticleSystem); that identity is what the
/// per-frame spatial index maps back to.
#[derive(Clone, Debug)]
pub struct Particle {
    /// World-space location.
    pub position: DVec3,
    /// Displacement applied per frame. Never longer than `max_speed`.
    pub velocity: DVec3,
    /// Top speed, sampled once at spawn. Always positive.
    pub max_speed: f64,
    /// Guide point this particle is currently drawn toward.
    pub guide_index: usize,
    /// Which way `guide_index` advances.
    pub direction: Direction,
    /// Blend between guidance (1.0) and turbulence (0.0).
    pub behavior: f64,
    /// Offset into the turbulence field; drifts every step.
    pub noise_phase: DVec3,
    /// Inactive particles are skipped by stepping and frame output.
    pub active: bool,
    rng: SmallRng,
}

impl Particle {
    /// A particle at rest on `position`, targeting `guide_index`.
    ///
    /// Defaults: forward direction, top speed of a unit-scale colony, zero
    /// noise phase and a behavior stream seeded with zero. Use the `with_*`
    /// methods to change them, or [`Particle::scaled`] to match another
    /// colony scale.
    pub fn at(position: DVec3, guide_index: usize) -> Self {
        Self {
            position,
            velocity: DVec3::ZERO,
            max_speed: Tuning::for_scale(1.0).target_speed,
            guide_index,
            direction: Direction::Forward,
            behavior: Tuning::INITIAL_BEHAVIOR,
            noise_phase: DVec3::ZERO,
            active: true,
            rng: SmallRng::seed_from_u64(0),
        }
    }

    /// A particle at rest whose top speed is the target speed of `tuning`.
    ///
    /// Use this instead of [`Particle::at`] when placing particles by hand
    /// into a colony whose scale is not 1.
    pub fn scaled(position: DVec3, guide_index: usize, tuning: &Tuning) -> Self {
        Self::at(position, guide_index).with_max_speed(tuning.target_speed)
    }

    pub fn with_velocity(mut self, velocity: DVec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the top speed. Non-positive values are raised to the smallest
    /// positive float.
    pub fn with_max_speed(mut self, max_speed: f64) -> Self {
        self.max_speed = max_speed.max(f64::MIN_POSITIVE);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_noise_phase(mut self, noise_phase: DVec3) -> Self {
        self.noise_phase = noise_phase;
        self
    }

    /// Reseed the stream that drives behavior drift.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Random-walk the behavior blend and clamp it into range.
    pub(crate) fn drift_behavior(&mut self, tuning: &Tuning) {
        let jitter = tuning.behavior_jitter;
        let step = if jitter > 0.0 {
            self.rng.gen_range(-jitter..jitter)
        } else {
            0.0
        };
        self.behavior = tuning.clamp_behavior(self.behavior + step);
    }
}
