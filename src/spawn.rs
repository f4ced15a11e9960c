//! Spawn context for particle initialization.
//!
//! Provides the random draws a new particle needs, from a stream that is a
//! pure function of the run seed and the spawn index.

use crate::guide::GuidePath;
use crate::particle::{Direction, Particle};
use crate::tuning::Tuning;
use glam::DVec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::TAU;
use std::ops::RangeInclusive;

/// Context handed to the spawner for each new particle.
///
/// ```ignore
/// let mut ctx = SpawnContext::new(0, 100, seed);
/// let particle = ctx.spawn_on(&guide, &Tuning::for_scale(1.0));
/// ```
pub struct SpawnContext {
    /// Index of the particle being spawned (0 to count-1).
    pub index: u32,
    /// Total number of particles being spawned.
    pub count: u32,
    rng: SmallRng,
}

impl SpawnContext {
    /// Create a spawn context for one particle of a seeded run.
    pub fn new(index: u32, count: u32, seed: u64) -> Self {
        // Same seed and index always give the same stream
        let mixed = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ u64::from(index);
        Self {
            index,
            count,
            rng: SmallRng::seed_from_u64(mixed),
        }
    }

    // ========== Random primitives ==========

    /// Random index in the given inclusive range.
    #[inline]
    pub fn random_index(&mut self, range: RangeInclusive<usize>) -> usize {
        self.rng.gen_range(range)
    }

    /// Random unit vector, uniform on the sphere.
    pub fn random_unit_vector(&mut self) -> DVec3 {
        let z: f64 = self.rng.gen_range(-1.0..=1.0);
        let theta = self.rng.gen_range(0.0..TAU);
        let r = (1.0 - z * z).max(0.0).sqrt();
        DVec3::new(r * theta.cos(), r * theta.sin(), z)
    }

    /// Forward or backward with equal probability.
    pub fn random_direction(&mut self) -> Direction {
        if self.rng.gen_bool(0.5) {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }

    /// Top speed drawn from `N(target, target / 10)`, floored at a small
    /// positive fraction of `target`.
    pub fn random_max_speed(&mut self, target: f64) -> f64 {
        let floor = (target * Tuning::MIN_SPEED_FRACTION).max(f64::MIN_POSITIVE);
        let speed = Normal::new(target, target / 10.0)
            .map(|normal| normal.sample(&mut self.rng))
            .unwrap_or(target);
        if speed.is_finite() {
            speed.max(floor)
        } else {
            floor
        }
    }

    // ========== Particle construction ==========

    /// A particle sitting on a random interior point of `guide`.
    ///
    /// Velocity starts as a random unit vector at top speed, and the noise
    /// phase as another random unit vector.
    pub fn spawn_on(&mut self, guide: &GuidePath, tuning: &Tuning) -> Particle {
        let guide_index = self.random_index(guide.target_range());
        let max_speed = self.random_max_speed(tuning.target_speed);
        let velocity = self.random_unit_vector() * max_speed;
        let noise_phase = self.random_unit_vector();
        let direction = self.random_direction();
        let seed = self.rng.gen();

        Particle::at(guide.point_at(guide_index), guide_index)
            .with_max_speed(max_speed)
            .with_velocity(velocity)
            .with_noise_phase(noise_phase)
            .with_direction(direction)
            .with_seed(seed)
    }
}
