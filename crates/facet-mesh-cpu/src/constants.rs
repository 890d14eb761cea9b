//! Shared tolerances for facet-mesh-cpu. Lengths are in sample (grid) units unless noted.

// Loop assembly
pub(crate) const MIN_EDGE_LENGTH: f32 = 1e-3;
pub(crate) const COLLINEAR_DOT: f32 = 0.9998;
pub(crate) const AREA_EPSILON: f32 = 1e-4;

// Wavefront
/// Below this `|n_prev + n|²` the corner is treated as a 180° fold and gets zero velocity.
pub(crate) const FOLD_EPSILON: f32 = 1e-6;
/// Relative tolerance for event distances and tangent extents.
pub(crate) const EVENT_EPSILON: f32 = 1e-5;
/// Cross product of unit tangents below `-REFLEX_EPSILON` marks a reflex corner.
pub(crate) const REFLEX_EPSILON: f32 = 1e-4;
/// Points of one loop closer than this, relative to the shape's extent, count as the same point.
pub(crate) const MERGE_EPSILON: f32 = 1e-4;
/// Angular slack, radians, when comparing the solid wedges of coincident vertices.
pub(crate) const WEDGE_EPSILON: f32 = 1e-4;

// Triangulation
pub(crate) const TURN_EPSILON: f32 = 1e-7;

/// Default hard-edge threshold between adjacent wall faces, degrees.
pub const DEFAULT_MAX_SMOOTH_ANGLE: f32 = 40.0;
