//! The per-frame particle stepping engine.
//!
//! One [`ParticleSystem::step`] advances every active particle by one frame:
//!
//! 1. Rebuild the neighbor index from the current positions
//! 2. Compose guidance, turbulence and avoidance into a new velocity
//! 3. Clamp speed and damp rotation against the previous velocity
//! 4. Snap to the ground and make the velocity tangent to it
//! 5. Integrate, drift behavior, and walk the guide target
//!
//! Every read of another particle goes through the index built in step 1,
//! so particles can be updated in any order (or in parallel with the
//! `parallel` feature) without seeing each other's new state.

use crate::guide::GuidePath;
use crate::noise::NoiseField;
use crate::output::Frame;
use crate::particle::{Direction, Particle};
use crate::spatial::KdTree;
use crate::spawn::SpawnContext;
use crate::surface::SurfaceProjector;
use crate::tuning::Tuning;
use glam::DVec3;

/// Owns the colony and steps it frame by frame.
pub struct ParticleSystem {
    particles: Vec<Particle>,
    guide: GuidePath,
    ground: Box<dyn SurfaceProjector>,
    tuning: Tuning,
    noise: NoiseField,
    neighbors: KdTree,
    frame: u32,
}

impl ParticleSystem {
    /// Create an empty system. The first frame produced is numbered 1.
    pub fn new<S>(guide: GuidePath, ground: S, tuning: Tuning) -> Self
    where
        S: SurfaceProjector + 'static,
    {
        Self::with_boxed_ground(guide, Box::new(ground), tuning)
    }

    /// Create an empty system from an already boxed ground.
    pub fn with_boxed_ground(guide: GuidePath, ground: Box<dyn SurfaceProjector>, tuning: Tuning) -> Self {
        Self {
            particles: Vec::new(),
            guide,
            ground,
            tuning,
            noise: NoiseField::default(),
            neighbors: KdTree::default(),
            frame: 1,
        }
    }

    /// Number the next produced frame `frame`.
    pub fn starting_at(mut self, frame: u32) -> Self {
        self.frame = frame;
        self
    }

    /// Spawn `count` particles on random interior guide points.
    ///
    /// Each particle's random draws depend only on `seed` and its index in
    /// the collection.
    pub fn add_particles(&mut self, count: u32, seed: u64) {
        let offset = self.particles.len() as u32;
        self.particles.reserve(count as usize);
        for i in 0..count {
            let mut ctx = SpawnContext::new(offset + i, offset + count, seed);
            let particle = ctx.spawn_on(&self.guide, &self.tuning);
            self.particles.push(particle);
        }
        log::debug!("spawned {} particles ({} total)", count, self.particles.len());
    }

    /// Add an explicitly constructed particle and return its index.
    pub fn spawn(&mut self, particle: Particle) -> usize {
        self.particles.push(particle);
        self.particles.len() - 1
    }

    /// Deactivate a particle. Indices of the other particles are unchanged.
    ///
    /// Returns `false` if the index is out of range or already inactive.
    pub fn kill(&mut self, index: usize) -> bool {
        match self.particles.get_mut(index) {
            Some(p) if p.active => {
                p.active = false;
                true
            }
            _ => false,
        }
    }

    /// Drop inactive particles, renumbering the survivors.
    ///
    /// Only call between frames. Returns how many particles were removed.
    pub fn compact(&mut self) -> usize {
        let before = self.particles.len();
        self.particles.retain(|p| p.active);
        before - self.particles.len()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    pub fn active_count(&self) -> usize {
        self.particles.iter().filter(|p| p.active).count()
    }

    pub fn guide(&self) -> &GuidePath {
        &self.guide
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// Number of the next frame [`step`](Self::step) will produce.
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Advance every active particle by one frame and emit the result.
    pub fn step(&mut self) -> Frame {
        self.rebuild_neighbors();

        let stepper = Stepper {
            neighbors: &self.neighbors,
            guide: &self.guide,
            ground: self.ground.as_ref(),
            tuning: &self.tuning,
            noise: &self.noise,
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.particles
                .par_iter_mut()
                .enumerate()
                .filter(|(_, p)| p.active)
                .for_each(|(id, p)| stepper.advance(id, p));
        }

        #[cfg(not(feature = "parallel"))]
        {
            for (id, particle) in self.particles.iter_mut().enumerate().filter(|(_, p)| p.active) {
                stepper.advance(id, particle);
            }
        }

        self.emit()
    }

    fn rebuild_neighbors(&mut self) {
        self.neighbors = KdTree::from_entries(
            self.particles
                .iter()
                .enumerate()
                .filter(|(_, p)| p.active)
                .map(|(id, p)| (p.position, id)),
        );
    }

    /// Capture the current frame. The counter wraps after `u32::MAX`.
    fn emit(&mut self) -> Frame {
        let frame = Frame::capture(self.frame, &self.particles);
        self.frame = self.frame.wrapping_add(1);
        frame
    }
}

/// Read-only view of everything a particle update may consult.
struct Stepper<'a> {
    neighbors: &'a KdTree,
    guide: &'a GuidePath,
    ground: &'a dyn SurfaceProjector,
    tuning: &'a Tuning,
    noise: &'a NoiseField,
}

impl Stepper<'_> {
    fn advance(&self, id: usize, p: &mut Particle) {
        let t = self.tuning;
        let previous_velocity = p.velocity;

        let guidance = self.guidance(p);
        let turbulence = self.turbulence(p);
        let avoidance = self.avoidance(id, p.position);

        let mut velocity = previous_velocity
            + avoidance
            + turbulence * (1.0 - p.behavior)
            + guidance * p.behavior;
        velocity = velocity.clamp_length_max(p.max_speed);
        velocity = damp_rotation(previous_velocity, velocity, t.rotation_cap);

        let surface = self.ground.project(p.position);
        p.position = surface.point;
        velocity = conform_to_surface(velocity, surface.normal);

        p.position += velocity;
        p.velocity = velocity;

        p.drift_behavior(t);
        self.advance_guide(p);
    }

    fn guidance(&self, p: &Particle) -> DVec3 {
        let target = self.guide.point_at(p.guide_index);
        (target - p.position).normalize_or_zero() * self.tuning.guide_strength
    }

    /// Sample the turbulence field, then drift the particle's noise phase.
    fn turbulence(&self, p: &mut Particle) -> DVec3 {
        let t = self.tuning;
        let sample = self.noise.turbulence_vector(
            p.noise_phase + p.position,
            t.turbulence_octaves,
            false,
            t.turbulence_strength,
            t.turbulence_frequency,
        );
        p.noise_phase.z += t.noise_drift;
        sample
    }

    /// Sum of unit pushes away from every other particle within range.
    ///
    /// The sum is left unnormalized: crowded particles get pushed harder.
    fn avoidance(&self, id: usize, position: DVec3) -> DVec3 {
        let t = self.tuning;
        let mut push = DVec3::ZERO;
        self.neighbors.for_each_within(position, t.avoid_threshold, |n| {
            if n.index == id {
                return;
            }
            let away = position - n.position;
            if away.length_squared() < t.avoid_epsilon_sq {
                return;
            }
            push += away.normalize_or_zero();
        });
        push * t.avoid_strength
    }

    /// Move the target along the guide once the particle has caught up,
    /// turning around one point before either end.
    fn advance_guide(&self, p: &mut Particle) {
        let last = self.guide.last_index();

        let nearest = self.guide.nearest(p.position).index;
        if nearest.abs_diff(p.guide_index) < 2 {
            p.guide_index = p.direction.advance(p.guide_index);
        }

        let at_end = match p.direction {
            Direction::Forward => p.guide_index >= last,
            Direction::Backward => p.guide_index <= 1,
        };
        if at_end {
            p.direction = p.direction.reversed();
            p.guide_index = p.direction.advance(p.guide_index);
        }

        p.guide_index = p.guide_index.min(last);
    }
}

/// Blend `velocity` back toward `previous` so direction changes slowly.
///
/// The blend factor is the directional agreement of the two vectors mapped
/// to `[0, 1]`, capped from above at `cap`.
pub(crate) fn damp_rotation(previous: DVec3, velocity: DVec3, cap: f64) -> DVec3 {
    let agreement = previous.normalize_or_zero().dot(velocity.normalize_or_zero()) * 0.5 + 0.5;
    let factor = agreement.min(cap);
    velocity * factor + previous * (1.0 - factor)
}

/// Rotate `velocity` into the tangent plane of `normal`, keeping its speed.
///
/// A zero normal leaves the velocity untouched; a velocity along the normal
/// becomes zero.
pub(crate) fn conform_to_surface(velocity: DVec3, normal: DVec3) -> DVec3 {
    let normal = normal.normalize_or_zero();
    if normal == DVec3::ZERO {
        return velocity;
    }
    let speed = velocity.length();
    normal.cross(velocity.cross(normal)).normalize_or_zero() * speed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Plane;

    fn line_guide(n: usize) -> GuidePath {
        GuidePath::new((0..n).map(|i| DVec3::new(i as f64, 0.0, 0.0)).collect()).unwrap()
    }

    fn calm_tuning(scale: f64) -> Tuning {
        let mut tuning = Tuning::for_scale(scale);
        tuning.turbulence_strength = 0.0;
        tuning
    }

    #[test]
    fn test_damp_rotation_from_rest() {
        let v = damp_rotation(DVec3::ZERO, DVec3::new(0.005, 0.0, 0.0), 0.1);
        assert!((v - DVec3::new(0.0005, 0.0, 0.0)).length() < 1e-15);
    }

    #[test]
    fn test_damp_rotation_reversal_keeps_previous() {
        let prev = DVec3::new(0.004, 0.0, 0.0);
        let v = damp_rotation(prev, -prev, 0.1);
        assert_eq!(v, prev);
    }

    #[test]
    fn test_damp_rotation_aligned_is_capped() {
        let prev = DVec3::new(0.002, 0.0, 0.0);
        let new = DVec3::new(0.004, 0.0, 0.0);
        let v = damp_rotation(prev, new, 0.1);
        assert!((v.x - (0.0004 + 0.0018)).abs() < 1e-15);
    }

    #[test]
    fn test_conform_to_surface() {
        let v = conform_to_surface(DVec3::new(1.0, 0.0, 1.0), DVec3::Z);
        assert!((v - DVec3::new(2f64.sqrt(), 0.0, 0.0)).length() < 1e-12);

        assert_eq!(conform_to_surface(DVec3::new(0.0, 0.0, 3.0), DVec3::Z), DVec3::ZERO);
        let v = DVec3::new(0.1, 0.2, 0.3);
        assert_eq!(conform_to_surface(v, DVec3::ZERO), v);
    }

    #[test]
    fn test_avoidance_is_symmetric() {
        let tuning = calm_tuning(10.0);
        let guide = line_guide(5);
        let ground = Plane::ground(0.0);
        let noise = NoiseField::default();
        let a = DVec3::new(1.0, 1.0, 0.0);
        let b = DVec3::new(1.03, 1.04, 0.0);
        let far = DVec3::new(5.0, 5.0, 0.0);
        let neighbors = KdTree::build(&[a, b, far]);
        let stepper = Stepper {
            neighbors: &neighbors,
            guide: &guide,
            ground: &ground,
            tuning: &tuning,
            noise: &noise,
        };

        let push_a = stepper.avoidance(0, a);
        let push_b = stepper.avoidance(1, b);
        assert!(push_a.length() > 0.0);
        assert!((push_a + push_b).length() < 1e-12);
        assert!((push_a.length() - tuning.avoid_strength).abs() < 1e-12);
        assert!(push_a.dot(a - b) > 0.0);
        assert_eq!(stepper.avoidance(2, far), DVec3::ZERO);
    }

    #[test]
    fn test_avoidance_skips_coincident() {
        let tuning = calm_tuning(10.0);
        let guide = line_guide(5);
        let ground = Plane::ground(0.0);
        let noise = NoiseField::default();
        let p = DVec3::new(2.0, 0.0, 0.0);
        let neighbors = KdTree::build(&[p, p + DVec3::new(0.001, 0.0, 0.0)]);
        let stepper = Stepper {
            neighbors: &neighbors,
            guide: &guide,
            ground: &ground,
            tuning: &tuning,
            noise: &noise,
        };
        assert_eq!(stepper.avoidance(0, p), DVec3::ZERO);
    }

    #[test]
    fn test_avoidance_accumulates_without_normalizing() {
        let tuning = calm_tuning(10.0);
        let guide = line_guide(5);
        let ground = Plane::ground(0.0);
        let noise = NoiseField::default();
        let p = DVec3::ZERO;
        // Two neighbors on the same side push twice as hard as one
        let neighbors = KdTree::build(&[
            p,
            DVec3::new(0.05, 0.0, 0.0),
            DVec3::new(0.06, 0.0, 0.0),
        ]);
        let stepper = Stepper {
            neighbors: &neighbors,
            guide: &guide,
            ground: &ground,
            tuning: &tuning,
            noise: &noise,
        };
        let push = stepper.avoidance(0, p);
        assert!((push - DVec3::new(-2.0 * tuning.avoid_strength, 0.0, 0.0)).length() < 1e-12);
    }

    #[test]
    fn test_degenerate_guidance_stays_at_rest() {
        let guide = line_guide(6);
        let mut system = ParticleSystem::new(guide, Plane::ground(0.0), calm_tuning(1.0));
        system.spawn(Particle::at(DVec3::new(2.0, 0.0, 0.0), 2));

        let frame = system.step();
        let state = frame.states[0];
        assert_eq!(state.velocity, DVec3::ZERO);
        assert_eq!(state.position, DVec3::new(2.0, 0.0, 0.0));
        assert!(state.position.is_finite());
    }

    #[test]
    fn test_turns_around_at_far_end() {
        let guide = line_guide(6);
        let mut system = ParticleSystem::new(guide, Plane::ground(0.0), calm_tuning(1.0));
        system.spawn(Particle::at(DVec3::new(4.0, 0.0, 0.0), 4).with_direction(Direction::Forward));

        system.step();
        let p = system.particle(0).unwrap();
        assert_eq!(p.direction, Direction::Backward);
        assert_eq!(p.guide_index, 4);
    }

    #[test]
    fn test_turns_around_at_near_end() {
        let guide = line_guide(6);
        let mut system = ParticleSystem::new(guide, Plane::ground(0.0), calm_tuning(1.0));
        system.spawn(Particle::at(DVec3::new(2.0, 0.0, 0.0), 2).with_direction(Direction::Backward));

        system.step();
        let p = system.particle(0).unwrap();
        assert_eq!(p.direction, Direction::Forward);
        assert_eq!(p.guide_index, 2);
    }

    #[test]
    fn test_three_point_guide_stays_in_bounds() {
        let guide = line_guide(3);
        let mut system = ParticleSystem::new(guide, Plane::ground(0.0), Tuning::default());
        system.add_particles(20, 8);
        for _ in 0..100 {
            system.step();
            for p in system.particles() {
                assert_eq!(p.guide_index, 1);
            }
        }
    }

    #[test]
    fn test_kill_and_compact() {
        let guide = line_guide(6);
        let mut system = ParticleSystem::new(guide, Plane::ground(0.0), Tuning::default());
        system.add_particles(4, 1);

        assert!(system.kill(1));
        assert!(!system.kill(1));
        assert!(!system.kill(99));
        assert_eq!(system.active_count(), 3);

        let frozen = system.particle(1).unwrap().position;
        let frame = system.step();
        assert_eq!(frame.len(), 3);
        assert_eq!(system.particle(1).unwrap().position, frozen);

        assert_eq!(system.compact(), 1);
        assert_eq!(system.particles().len(), 3);
    }

    #[test]
    fn test_frame_numbering() {
        let guide = line_guide(6);
        let mut system = ParticleSystem::new(guide, Plane::ground(0.0), Tuning::default()).starting_at(10);
        system.add_particles(2, 0);
        assert_eq!(system.step().number, 10);
        assert_eq!(system.step().number, 11);
        assert_eq!(system.frame(), 12);
    }

    #[test]
    fn test_frame_counter_wraps_after_last_number() {
        let guide = line_guide(6);
        let mut system = ParticleSystem::new(guide, Plane::ground(0.0), Tuning::default()).starting_at(u32::MAX);
        system.add_particles(2, 0);
        assert_eq!(system.step().number, u32::MAX);
        assert_eq!(system.frame(), 0);
    }

    /// Reference update: same stages, one particle after another.
    #[cfg(feature = "parallel")]
    fn step_serially(system: &mut ParticleSystem) -> Frame {
        system.rebuild_neighbors();
        let stepper = Stepper {
            neighbors: &system.neighbors,
            guide: &system.guide,
            ground: system.ground.as_ref(),
            tuning: &system.tuning,
            noise: &system.noise,
        };
        for (id, particle) in system.particles.iter_mut().enumerate().filter(|(_, p)| p.active) {
            stepper.advance(id, particle);
        }
        system.emit()
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_step_matches_serial() {
        let colony = || {
            let guide = GuidePath::new(
                (0..40)
                    .map(|i| DVec3::new(i as f64 * 0.05, (i as f64 * 0.2).sin() * 0.1, 0.0))
                    .collect(),
            )
            .unwrap();
            let mut system = ParticleSystem::new(guide, Plane::ground(0.0), Tuning::for_scale(10.0));
            system.add_particles(300, 21);
            system
        };
        let mut parallel = colony();
        let mut serial = colony();

        for _ in 0..30 {
            let expected = step_serially(&mut serial);
            assert_eq!(parallel.step(), expected);
        }
        for (a, b) in parallel.particles().iter().zip(serial.particles()) {
            assert_eq!(a.guide_index, b.guide_index);
            assert_eq!(a.behavior.to_bits(), b.behavior.to_bits());
        }
    }
}
