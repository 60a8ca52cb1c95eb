//! Approximate integrated loudness measurement
//!
//! Mean-square estimate anchored to the BS.1770 constant so values land in
//! the familiar LUFS range. This deliberately omits K-weighting (the
//! high-shelf + high-pass pre-filter) and gating, so readings deviate from
//! certified meters; within this engine only *relative* loudness between
//! tracks matters.

use crate::types::SampleBuffer;

/// Floor applied to the mean square before the log
const MEAN_SQUARE_FLOOR: f32 = 1e-10;

/// Integrated loudness of a buffer in (approximate) LUFS.
///
/// `-0.691 + 10*log10(mean(x^2))` over all channels and samples. Silence
/// and empty buffers bottom out around -100.7 due to the floor.
pub fn integrated_lufs(buffer: &SampleBuffer) -> f32 {
    let total_samples = buffer.channels() * buffer.samples();

    let mean_square = if total_samples == 0 {
        0.0
    } else {
        let sum: f64 = buffer
            .as_planar()
            .iter()
            .map(|&s| s as f64 * s as f64)
            .sum();
        (sum / total_samples as f64) as f32
    };

    -0.691 + 10.0 * mean_square.max(MEAN_SQUARE_FLOOR).log10()
}
