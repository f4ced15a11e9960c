//! # Ant Colony - guided particle simulation on surfaces
//!
//! Simulates a colony of ants that walk along a guide path across a ground
//! surface, jostled by turbulence and pushing away from close neighbors.
//! Each frame yields the position and velocity of every ant, ready to be
//! instanced by a renderer or written to a cache.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ant_colony::prelude::*;
//!
//! fn main() -> Result<(), SimulationError> {
//!     let path: Vec<DVec3> = (0..50)
//!         .map(|i| DVec3::new(i as f64 * 0.1, (i as f64 * 0.3).sin(), 0.0))
//!         .collect();
//!
//!     let mut frames = FrameRecorder::new();
//!     Simulation::new()
//!         .with_particle_count(200)
//!         .with_frames(1, 250)
//!         .with_scale(1.0)
//!         .with_seed(0)
//!         .with_guide(path)
//!         .with_ground(Plane::ground(0.0))
//!         .run(&mut frames)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Particles
//!
//! A [`Particle`] carries its position, velocity, top speed, the guide
//! point it is heading for, a traversal [`Direction`], a behavior blend
//! between guidance and turbulence, and a drifting noise phase.
//!
//! ### Stepping
//!
//! [`ParticleSystem::step`] advances every active particle by one frame:
//!
//! | Stage | Effect |
//! |-------|--------|
//! | Guidance | Pull toward the current guide point |
//! | Turbulence | Two-octave coherent noise, sampled at phase + position |
//! | Avoidance | Unit pushes away from each neighbor within range |
//! | Speed clamp | Velocity never exceeds the particle's top speed |
//! | Rotation damping | New direction blends slowly into the old one |
//! | Ground | Snap to the surface, velocity tangent to it |
//! | Guide walk | Advance the target once caught up, bounce at the ends |
//!
//! ### Spatial Queries
//!
//! Neighbor lookups use a [`KdTree`] rebuilt from the particle positions
//! every frame; the guide path keeps its own tree built once.
//!
//! ### Surfaces
//!
//! Anything implementing [`SurfaceProjector`] can serve as ground:
//! [`Plane`], [`TriangleMesh`], or a closure returning a [`SurfacePoint`].
//!
//! ### Output
//!
//! Frames go to an [`InstanceRenderer`]. Built-ins record in memory
//! ([`FrameRecorder`]), write JSON lines ([`JsonLinesWriter`]) or a binary
//! cache ([`FrameCacheWriter`]).
//!
//! ## Determinism
//!
//! A run is a pure function of its configuration and seed. Every particle
//! owns a random stream derived from the seed and its spawn index, so the
//! optional `parallel` feature produces the same frames as serial stepping.

pub mod config;
pub mod error;
pub mod guide;
pub mod noise;
pub mod output;
mod particle;
mod simulation;
mod spawn;
pub mod spatial;
pub mod surface;
mod system;
pub mod tuning;

pub use config::{ColonyConfig, GroundConfig, GuideConfig};
pub use error::{ConfigError, RenderError, SimulationError};
pub use glam::DVec3;
pub use guide::{EdgeChain, GuidePath, GuidePathSource};
pub use crate::noise::NoiseField;
pub use output::{
    read_frame_cache, Frame, FrameCacheWriter, FrameRecorder, InstanceRenderer, JsonLinesWriter,
    ParticleState,
};
pub use particle::{Direction, Particle};
pub use simulation::{RunSummary, Simulation};
pub use spatial::{KdTree, Neighbor};
pub use spawn::SpawnContext;
pub use surface::{Plane, SurfacePoint, SurfaceProjector, TriangleMesh};
pub use system::ParticleSystem;
pub use tuning::Tuning;

/// Convenient re-exports for common usage.
///
/// # Usage
///
/// ```ignore
/// use ant_colony::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ConfigError, RenderError, SimulationError};
    pub use crate::guide::{EdgeChain, GuidePath, GuidePathSource};
    pub use crate::output::{Frame, FrameCacheWriter, FrameRecorder, InstanceRenderer, JsonLinesWriter, ParticleState};
    pub use crate::particle::{Direction, Particle};
    pub use crate::simulation::{RunSummary, Simulation};
    pub use crate::surface::{Plane, SurfacePoint, SurfaceProjector, TriangleMesh};
    pub use crate::system::ParticleSystem;
    pub use crate::tuning::Tuning;
    pub use crate::DVec3;
}
