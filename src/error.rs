//! Error types for the colony simulation.
//!
//! Configuration problems are fatal and surface before the first frame is
//! stepped. Numerical degeneracies never produce errors: every normalize in
//! the stepping code falls back to a zero vector instead.

use thiserror::Error;

/// Errors raised while validating a run before any frame is simulated.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The colony must contain at least one particle.
    #[error("particle count must be greater than zero")]
    NoParticles,
    /// The frame range is inverted.
    #[error("end frame {end} precedes start frame {start}")]
    FrameRange { start: u32, end: u32 },
    /// Scale must be finite and strictly positive.
    #[error("scale must be a positive finite number, got {0}")]
    InvalidScale(f64),
    /// No guide path source was bound to the simulation.
    #[error("no guide path was provided. Use .with_guide() to set one.")]
    MissingGuide,
    /// No ground surface was bound to the simulation.
    #[error("no ground surface was provided. Use .with_ground() to set one.")]
    MissingGround,
    /// The guide path needs at least three points.
    #[error("guide path needs at least 3 points, got {0}")]
    GuideTooShort(usize),
    /// A guide point contains NaN or infinite coordinates.
    #[error("guide point {0} is not finite")]
    NonFiniteGuidePoint(usize),
    /// The edge chain start vertex does not exist.
    #[error("guide chain starts at vertex {start} but only {count} vertices exist")]
    ChainStart { start: usize, count: usize },
    /// An edge references a vertex that does not exist.
    #[error("guide edge {edge} references vertex {vertex} but only {count} vertices exist")]
    ChainEdge { edge: usize, vertex: usize, count: usize },
    /// Walking the edge chain did not reach every vertex.
    #[error("guide chain is broken: reached {visited} of {count} vertices")]
    BrokenChain { visited: usize, count: usize },
    /// The ground mesh has no triangles to project onto.
    #[error("ground mesh has no triangles")]
    EmptySurface,
    /// A ground triangle references a vertex that does not exist.
    #[error("ground triangle {triangle} references vertex {vertex} but only {count} vertices exist")]
    SurfaceIndex { triangle: usize, vertex: usize, count: usize },
    /// The ground plane normal has zero length.
    #[error("ground plane normal must be non-zero")]
    DegeneratePlane,
    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised by an [`InstanceRenderer`](crate::output::InstanceRenderer).
#[derive(Debug, Error)]
pub enum RenderError {
    /// Writing frame data failed.
    #[error("failed to write frame data: {0}")]
    Io(#[from] std::io::Error),
    /// Serializing a frame failed.
    #[error("failed to serialize frame: {0}")]
    Json(#[from] serde_json::Error),
    /// A frame cache being read back is malformed.
    #[error("invalid frame cache: {0}")]
    InvalidCache(String),
}

/// Errors that can occur when running a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The run was rejected before stepping started.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The renderer rejected a fully simulated frame.
    #[error("renderer failed at frame {frame}: {source}")]
    Render {
        frame: u32,
        #[source]
        source: RenderError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_carries_frame() {
        let err = SimulationError::Render {
            frame: 42,
            source: RenderError::InvalidCache("truncated".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("frame 42"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_error_converts() {
        let err: SimulationError = ConfigError::GuideTooShort(2).into();
        assert!(matches!(err, SimulationError::Config(ConfigError::GuideTooShort(2))));
        assert!(err.to_string().contains("at least 3 points"));
    }
}
