//! Common types for the auto-mixing engine
//!
//! This module contains the fundamental audio types used throughout the
//! engine, most importantly the planar multi-channel [`SampleBuffer`].

use crate::error::{EngineError, EngineResult};

/// Engine-wide sample rate (48kHz - standard professional audio rate).
/// All filter and envelope coefficient derivations use this value; callers
/// must resample mismatched material upstream.
pub const SAMPLE_RATE: u32 = 48000;

/// Audio sample type (32-bit float throughout the processing chain)
pub type Sample = f32;

/// Width of the vectorized inner loops in [`SampleBuffer`] arithmetic.
///
/// Buffer operations process each channel in blocks of this many samples
/// (with a scalar tail), in increasing sample order. The blocked form keeps
/// the loops autovectorizer-friendly while producing bit-identical results
/// to a plain scalar loop: same operations, same order, same association.
pub const SIMD_LANES: usize = 8;

/// A planar multi-channel buffer of float samples
///
/// Channels are stored as separate contiguous planes inside one allocation
/// (channel-major, each plane `samples` long). This is the interchange
/// layout external adapters expect: row `c` of the `channels x samples`
/// matrix is channel `c`'s samples in time order.
///
/// Buffers are exclusively owned; all mutation goes through the buffer's
/// own operations or a `channel_mut` plane borrow.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: usize,
    samples: usize,
    /// `channels * samples` floats, plane `c` at `c*samples..(c+1)*samples`
    data: Vec<Sample>,
}

impl SampleBuffer {
    /// Create a buffer of `channels` planes, each `samples` long, zeroed.
    ///
    /// Fails with [`EngineError::AllocFailure`] when the allocation cannot
    /// be satisfied (including `channels * samples` overflowing `usize`).
    pub fn new(channels: usize, samples: usize) -> EngineResult<Self> {
        let total = channels
            .checked_mul(samples)
            .ok_or(EngineError::AllocFailure { channels, samples })?;

        let mut data = Vec::new();
        data.try_reserve_exact(total)
            .map_err(|_| EngineError::AllocFailure { channels, samples })?;
        data.resize(total, 0.0);

        Ok(Self {
            channels,
            samples,
            data,
        })
    }

    /// Number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of samples per channel
    #[inline]
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// True when the buffer holds no audio (zero channels or zero samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels == 0 || self.samples == 0
    }

    /// Contiguous read access to one channel plane
    pub fn channel(&self, channel: usize) -> EngineResult<&[Sample]> {
        if channel >= self.channels {
            return Err(EngineError::OutOfRange {
                index: channel,
                channels: self.channels,
            });
        }
        let start = channel * self.samples;
        Ok(&self.data[start..start + self.samples])
    }

    /// Contiguous read-write access to one channel plane
    pub fn channel_mut(&mut self, channel: usize) -> EngineResult<&mut [Sample]> {
        if channel >= self.channels {
            return Err(EngineError::OutOfRange {
                index: channel,
                channels: self.channels,
            });
        }
        let start = channel * self.samples;
        Ok(&mut self.data[start..start + self.samples])
    }

    /// Channel-major view of the whole buffer (`channels * samples` floats,
    /// each plane contiguous). This is the external interchange layout.
    #[inline]
    pub fn as_planar(&self) -> &[Sample] {
        &self.data
    }

    /// Mutable channel-major view of the whole buffer
    #[inline]
    pub fn as_planar_mut(&mut self) -> &mut [Sample] {
        &mut self.data
    }

    /// Multiply every sample in every channel by `gain`.
    ///
    /// Channels are processed independently, samples in increasing index
    /// order, in [`SIMD_LANES`]-wide blocks with a scalar tail.
    pub fn apply_gain(&mut self, gain: Sample) {
        if self.is_empty() {
            return;
        }
        for plane in self.data.chunks_exact_mut(self.samples) {
            let mut blocks = plane.chunks_exact_mut(SIMD_LANES);
            for block in &mut blocks {
                for sample in block {
                    *sample *= gain;
                }
            }
            for sample in blocks.into_remainder() {
                *sample *= gain;
            }
        }
    }

    /// Set every sample to +0.0
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Mix `other` into this buffer: for every shared channel and sample
    /// index, `self[ch][i] += other[ch][i] * gain`.
    ///
    /// Shorter operands simply bound the loop; nothing is resized. Same
    /// blocked traversal (and therefore identical results) as a scalar loop.
    pub fn add_from(&mut self, other: &SampleBuffer, gain: Sample) {
        let shared_channels = self.channels.min(other.channels);
        let shared_samples = self.samples.min(other.samples);
        if shared_channels == 0 || shared_samples == 0 {
            return;
        }

        for ch in 0..shared_channels {
            let dst_start = ch * self.samples;
            let src_start = ch * other.samples;
            let dst = &mut self.data[dst_start..dst_start + shared_samples];
            let src = &other.data[src_start..src_start + shared_samples];

            let mut dst_blocks = dst.chunks_exact_mut(SIMD_LANES);
            let mut src_blocks = src.chunks_exact(SIMD_LANES);
            for (d, s) in (&mut dst_blocks).zip(&mut src_blocks) {
                for i in 0..SIMD_LANES {
                    d[i] += s[i] * gain;
                }
            }
            for (d, s) in dst_blocks
                .into_remainder()
                .iter_mut()
                .zip(src_blocks.remainder())
            {
                *d += *s * gain;
            }
        }
    }

    /// Peak amplitude across all channels (max of `abs(sample)`)
    pub fn peak(&self) -> Sample {
        self.data.iter().map(|s| s.abs()).fold(0.0, Sample::max)
    }
}
