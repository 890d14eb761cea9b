use thiserror::Error;

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("sample window for resolution {resolution} needs {expected} samples, got {actual}")]
    SampleCount {
        resolution: usize,
        expected: usize,
        actual: usize,
    },

    #[error("chunk resolution must be at least 1")]
    InvalidResolution,

    #[error("max distance must be finite and positive, got {0}")]
    InvalidMaxDistance(f32),

    #[error("invalid shape: {0}")]
    InvalidShape(String),
}
