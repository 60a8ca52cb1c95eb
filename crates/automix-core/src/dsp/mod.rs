//! Signal processing building blocks
//!
//! Everything the mixer chains together per track and on the bus:
//! - Biquad sections and the parametric equalizer cascade
//! - The soft-knee feedforward compressor
//! - Spectrum and loudness analysis (analysis phase only)

pub mod biquad;
pub mod compressor;
pub mod equalizer;
pub mod loudness;
pub mod spectrum;

pub use biquad::{BiquadCoeffs, BiquadState, EQBand, FilterType};
pub use compressor::{Compressor, CompressorSettings};
pub use equalizer::Equalizer;
pub use loudness::integrated_lufs;
pub use spectrum::SpectrumAnalyzer;
