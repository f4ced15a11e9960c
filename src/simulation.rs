//! Simulation builder and runner

use crate::error::{ConfigError, SimulationError};
use crate::guide::{GuidePath, GuidePathSource};
use crate::output::InstanceRenderer;
use crate::surface::SurfaceProjector;
use crate::system::ParticleSystem;
use crate::tuning::Tuning;
use std::time::{Duration, Instant};

/// Frames between progress log lines.
const PROGRESS_INTERVAL: u32 = 10;

/// A colony simulation builder.
///
/// Use method chaining to configure, then call `.run()` to simulate every
/// frame and hand it to a renderer.
///
/// ```ignore
/// let mut frames = FrameRecorder::new();
/// Simulation::new()
///     .with_particle_count(100)
///     .with_frames(1, 250)
///     .with_guide(path_points)
///     .with_ground(Plane::ground(0.0))
///     .run(&mut frames)?;
/// ```
pub struct Simulation {
    particle_count: u32,
    start_frame: u32,
    end_frame: u32,
    scale: f64,
    seed: u64,
    guide: Option<Result<GuidePath, ConfigError>>,
    ground: Option<Box<dyn SurfaceProjector>>,
    tuning: Option<Tuning>,
}

/// What a completed run did.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// Number of frames emitted.
    pub frames: u64,
    /// Active particles after the last frame.
    pub particles: usize,
    /// Wall-clock time spent stepping and rendering.
    pub elapsed: Duration,
}

impl Simulation {
    /// Create a new simulation with default settings.
    ///
    /// Defaults: 100 particles, frames 1 to 100, scale 1.0, seed 0.
    pub fn new() -> Self {
        Self {
            particle_count: 100,
            start_frame: 1,
            end_frame: 100,
            scale: 1.0,
            seed: 0,
            guide: None,
            ground: None,
            tuning: None,
        }
    }

    /// Set the number of particles.
    pub fn with_particle_count(mut self, count: u32) -> Self {
        self.particle_count = count;
        self
    }

    /// Set the inclusive range of scene frames to simulate.
    pub fn with_frames(mut self, start: u32, end: u32) -> Self {
        self.start_frame = start;
        self.end_frame = end;
        self
    }

    /// Set the colony scale. Forces, distances and speeds grow with it.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the seed for every random draw of the run.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the guide path source.
    ///
    /// The path is resolved here; an invalid source is reported by
    /// [`build`](Self::build).
    pub fn with_guide<S>(mut self, source: S) -> Self
    where
        S: GuidePathSource,
    {
        self.guide = Some(GuidePath::from_source(&source));
        self
    }

    /// Set an already validated guide path.
    pub fn with_guide_path(mut self, guide: GuidePath) -> Self {
        self.guide = Some(Ok(guide));
        self
    }

    /// Set the ground surface.
    pub fn with_ground<S>(mut self, ground: S) -> Self
    where
        S: SurfaceProjector + 'static,
    {
        self.ground = Some(Box::new(ground));
        self
    }

    pub(crate) fn with_boxed_ground(mut self, ground: Box<dyn SurfaceProjector>) -> Self {
        self.ground = Some(ground);
        self
    }

    /// Replace the constants derived from the scale.
    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = Some(tuning);
        self
    }

    /// Number of frames a run will emit.
    pub fn frame_count(&self) -> u64 {
        u64::from(self.end_frame.saturating_sub(self.start_frame)) + 1
    }

    /// Check the scalar settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.particle_count == 0 {
            return Err(ConfigError::NoParticles);
        }
        if self.end_frame < self.start_frame {
            return Err(ConfigError::FrameRange {
                start: self.start_frame,
                end: self.end_frame,
            });
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ConfigError::InvalidScale(self.scale));
        }
        Ok(())
    }

    /// Validate everything and return a populated system ready to step.
    pub fn build(self) -> Result<ParticleSystem, ConfigError> {
        self.validate()?;
        let guide = self.guide.ok_or(ConfigError::MissingGuide)??;
        let ground = self.ground.ok_or(ConfigError::MissingGround)?;
        let tuning = self.tuning.unwrap_or_else(|| Tuning::for_scale(self.scale));

        let mut system = ParticleSystem::with_boxed_ground(guide, ground, tuning).starting_at(self.start_frame);
        system.add_particles(self.particle_count, self.seed);
        Ok(system)
    }

    /// Simulate every frame, handing each to `renderer` once all particles
    /// in it are updated.
    ///
    /// Configuration errors abort before the first frame. A renderer error
    /// aborts the run and reports the frame it failed on.
    pub fn run<R: InstanceRenderer>(self, mut renderer: R) -> Result<RunSummary, SimulationError> {
        let (start, end) = (self.start_frame, self.end_frame);
        let frames = self.frame_count();
        let count = self.particle_count;
        let seed = self.seed;
        let mut system = self.build()?;

        log::info!(
            "simulating {} particles over frames {}..={} (seed {})",
            count,
            start,
            end,
            seed
        );
        let started = Instant::now();

        for number in start..=end {
            if number % PROGRESS_INTERVAL == 0 {
                log::info!("frame: {:04}", number);
            }
            let frame = system.step();
            renderer
                .render(&frame)
                .map_err(|source| SimulationError::Render { frame: number, source })?;
        }
        renderer
            .finish()
            .map_err(|source| SimulationError::Render { frame: end, source })?;

        let elapsed = started.elapsed();
        log::info!("Simulated in {:05.5} seconds", elapsed.as_secs_f64());

        Ok(RunSummary {
            frames,
            particles: system.active_count(),
            elapsed,
        })
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}
