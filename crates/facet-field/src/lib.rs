//! Sampled 2D signed-distance fields: the chunk sample window, chunk coordinates and the
//! analytic shapes that get rasterized into it.
#![forbid(unsafe_code)]

mod chunk_coord;
mod error;
mod grid;
pub mod sdf;

pub use chunk_coord::ChunkCoord;
pub use error::FieldError;
pub use grid::{MARGIN, SAMPLE_ZERO, SampleGrid, SampleSource, encode};
pub use sdf::{Sdf, SdfConfig};
