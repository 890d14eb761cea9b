use facet_geom::Vec2;
use thiserror::Error;

/// Broken invariant in the edge graph; fatal for the shape being built.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TopologyError {
    #[error("no sweep edge above vertex at ({}, {})", .0.x, .0.y)]
    NoEdgeAbove(Vec2),

    #[error("sweep status has no entry for the edge ending at ({}, {})", .0.x, .0.y)]
    MissingStatusEdge(Vec2),

    #[error("no wedge at ({}, {}) contains the diagonal", .0.x, .0.y)]
    NoWedge(Vec2),

    #[error("edge loop starting at edge {0} does not close")]
    OpenLoop(u32),

    #[error("edge loop starting at edge {0} has fewer than three edges")]
    DegenerateLoop(u32),
}

#[derive(Debug, Error)]
pub enum BevelError {
    #[error("bevel width must be a non-negative number, got {0}")]
    InvalidWidth(f32),

    #[error("bevel height must be finite (and zero for an infinite width), got {0}")]
    InvalidHeight(f32),

    #[error("shape is already closed")]
    Closed,

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
