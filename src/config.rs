//! Serializable run configuration.
//!
//! A [`ColonyConfig`] describes a complete run as JSON: colony size, frame
//! range, scale, seed, the guide path and the ground surface. It resolves
//! into a [`Simulation`] ready to run.
//!
//! ```json
//! {
//!   "particle_count": 200,
//!   "end_frame": 250,
//!   "guide": { "type": "points", "points": [[0, 0, 0], [1, 0, 0], [2, 1, 0]] },
//!   "ground": { "type": "plane", "origin": [0, 0, 0], "normal": [0, 0, 1] }
//! }
//! ```

use crate::error::ConfigError;
use crate::guide::{EdgeChain, GuidePath, GuidePathSource};
use crate::simulation::Simulation;
use crate::surface::{Plane, SurfaceProjector, TriangleMesh};
use glam::DVec3;
use serde::{Deserialize, Serialize};

fn default_particle_count() -> u32 {
    100
}

fn default_start_frame() -> u32 {
    1
}

fn default_end_frame() -> u32 {
    100
}

fn default_scale() -> f64 {
    1.0
}

/// Where the guide path comes from.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuideConfig {
    /// Points already in path order.
    Points { points: Vec<DVec3> },
    /// Unordered polyline mesh walked from `start`.
    Edges {
        vertices: Vec<DVec3>,
        edges: Vec<[usize; 2]>,
        #[serde(default)]
        start: usize,
    },
}

impl GuidePathSource for GuideConfig {
    fn guide_points(&self) -> Result<Vec<DVec3>, ConfigError> {
        match self {
            GuideConfig::Points { points } => Ok(points.clone()),
            GuideConfig::Edges { vertices, edges, start } => {
                EdgeChain::new(vertices.clone(), edges.clone(), *start).guide_points()
            }
        }
    }
}

/// Which surface particles are glued to.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroundConfig {
    /// Infinite plane.
    Plane { origin: DVec3, normal: DVec3 },
    /// Triangle mesh.
    Mesh {
        vertices: Vec<DVec3>,
        triangles: Vec<[usize; 3]>,
    },
}

impl Default for GroundConfig {
    fn default() -> Self {
        GroundConfig::Plane {
            origin: DVec3::ZERO,
            normal: DVec3::Z,
        }
    }
}

impl GroundConfig {
    /// Build the projector this entry describes.
    pub fn projector(&self) -> Result<Box<dyn SurfaceProjector>, ConfigError> {
        Ok(match self {
            GroundConfig::Plane { origin, normal } => Box::new(Plane::new(*origin, *normal)?),
            GroundConfig::Mesh { vertices, triangles } => {
                Box::new(TriangleMesh::new(vertices.clone(), triangles.clone())?)
            }
        })
    }
}

/// Complete colony run configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ColonyConfig {
    #[serde(default = "default_particle_count")]
    pub particle_count: u32,
    #[serde(default = "default_start_frame")]
    pub start_frame: u32,
    #[serde(default = "default_end_frame")]
    pub end_frame: u32,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub seed: u64,
    pub guide: GuideConfig,
    #[serde(default)]
    pub ground: GroundConfig,
}

impl ColonyConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration as pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every setting and binding without spawning a colony.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolve().map(drop)
    }

    /// Resolve bindings into a simulation. Fails on any invalid setting.
    pub fn into_simulation(self) -> Result<Simulation, ConfigError> {
        self.resolve()
    }

    /// Build the ground and guide once and hand them to the simulation.
    fn resolve(&self) -> Result<Simulation, ConfigError> {
        let simulation = Simulation::new()
            .with_particle_count(self.particle_count)
            .with_frames(self.start_frame, self.end_frame)
            .with_scale(self.scale)
            .with_seed(self.seed);
        simulation.validate()?;

        let ground = self.ground.projector()?;
        let guide = GuidePath::from_source(&self.guide)?;
        Ok(simulation.with_boxed_ground(ground).with_guide_path(guide))
    }
}
