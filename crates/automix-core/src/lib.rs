//! Automix Core - offline multi-track audio auto-mixing engine
//!
//! Given a set of mono or multi-channel tracks (linear PCM float, one
//! engine-wide sample rate), the engine analyzes each track, derives
//! per-track gain/EQ/pan parameters plus a mix-bus compressor setting, and
//! renders a single stereo mix-down:
//!
//! ```text
//! Vec<SampleBuffer> -> AutoMixer::analyze -> MixPlan
//!                      AutoMixer::render  -> SampleBuffer (stereo)
//! ```
//!
//! The core is single-threaded at the API surface; `render` internally
//! fans per-track processing out across worker threads and joins at the
//! bus. File I/O, resampling and host bindings live outside this crate.

pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod types;

pub use config::AutoMixerSettings;
pub use engine::{AutoMixer, MixPlan};
pub use error::{EngineError, EngineResult};
pub use types::*;
