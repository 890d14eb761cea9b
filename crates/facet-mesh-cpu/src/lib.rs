//! CPU meshing of sampled 2D signed-distance chunks: contouring, loop assembly, wavefront
//! bevel, monotone triangulation and stream clipping.
#![forbid(unsafe_code)]

pub mod arena;
pub mod bevel;
pub mod build;
pub mod clip;
pub mod config;
mod constants;
pub mod contour;
pub mod error;
pub mod loops;
pub mod mesh_build;
pub mod monotone;
mod outline;

pub use arena::{Edge, EdgeArena, EdgeId, Op};
pub use bevel::BevelEngine;
pub use build::{BuildCtx, BuildStats, ChunkMesh, build_chunk};
pub use clip::{ClipStream, Clipper, clip_to_rect};
pub use config::{MeshConfig, Profile, ProfileConfig, ProfileStep, QualityParams};
pub use constants::DEFAULT_MAX_SMOOTH_ANGLE;
pub use contour::{SourceEdge, VertexKey, VertexKind, extract};
pub use error::{BevelError, ConfigError, TopologyError};
pub use loops::{EdgeLoop, LoopAssembler, LoopSet};
pub use mesh_build::{CollisionBuild, MeshBuild, StreamMark};
pub use monotone::{CloseVertex, TriangleSink, Triangulator};
