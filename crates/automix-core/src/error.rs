//! Engine error types

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Internal numerical safeguards (floors such as `max(x, 1e-10)` before a
/// `log10`) are defined behavior and never reported. NaN/Inf *inputs* are
/// never masked either; they propagate through the processing chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Out-of-range frequency or Q, non-power-of-two FFT size,
    /// compressor ratio below 1:1, or a malformed plan
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Channel index outside `[0, channels)`
    #[error("Channel index {index} out of range (buffer has {channels} channels)")]
    OutOfRange { index: usize, channels: usize },

    /// Buffer allocation could not be satisfied
    #[error("Failed to allocate {channels}x{samples} sample buffer")]
    AllocFailure { channels: usize, samples: usize },
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
