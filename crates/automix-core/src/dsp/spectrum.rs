//! Windowed magnitude spectrum estimation
//!
//! Analysis-only: spectra inform mix decisions and never touch the render
//! path. One FFT plan and its scratch buffers are reused across calls.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::error::{EngineError, EngineResult};
use crate::types::Sample;

/// Hann-windowed magnitude spectrum estimator
pub struct SpectrumAnalyzer {
    fft_size: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    frame: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer for the given FFT size.
    ///
    /// Fails with `InvalidParameter` unless `fft_size` is a power of two
    /// (and at least 2).
    pub fn new(fft_size: usize) -> EngineResult<Self> {
        if !fft_size.is_power_of_two() || fft_size < 2 {
            return Err(EngineError::InvalidParameter(format!(
                "FFT size must be a power of two >= 2, got {}",
                fft_size
            )));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Hann window over the frame length
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / (fft_size - 1) as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();

        let frame = vec![0.0; fft_size];
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        Ok(Self {
            fft_size,
            fft,
            window,
            frame,
            spectrum,
            scratch,
        })
    }

    /// Configured FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins produced per analysis (`fft_size / 2 + 1`)
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Magnitude spectrum of the first `fft_size` samples.
    ///
    /// Shorter inputs are zero-padded; excess samples are ignored. The
    /// result holds `fft_size / 2 + 1` non-negative magnitudes.
    pub fn analyze(&mut self, samples: &[Sample]) -> EngineResult<Vec<f32>> {
        let copy_len = samples.len().min(self.fft_size);
        for i in 0..copy_len {
            self.frame[i] = samples[i] * self.window[i];
        }
        self.frame[copy_len..].fill(0.0);

        self.fft
            .process_with_scratch(&mut self.frame, &mut self.spectrum, &mut self.scratch)
            .map_err(|e| EngineError::InvalidParameter(format!("FFT failed: {:?}", e)))?;

        Ok(self.spectrum.iter().map(|c| c.norm()).collect())
    }

    /// Magnitude-weighted mean frequency of the input, in Hz.
    ///
    /// Returns 0.0 for (near-)silent input.
    pub fn spectral_centroid(&mut self, samples: &[Sample], sample_rate: f32) -> EngineResult<f32> {
        let magnitudes = self.analyze(samples)?;

        let mut weighted = 0.0f64;
        let mut total = 0.0f64;
        for (bin, &mag) in magnitudes.iter().enumerate() {
            weighted += self.hz_for(bin, sample_rate) as f64 * mag as f64;
            total += mag as f64;
        }

        if total < 1e-12 {
            Ok(0.0)
        } else {
            Ok((weighted / total) as f32)
        }
    }

    /// Nearest bin index for a frequency in Hz
    pub fn bin_for(&self, hz: f32, sample_rate: f32) -> usize {
        (hz * self.fft_size as f32 / sample_rate).round() as usize
    }

    /// Center frequency in Hz of a bin index
    pub fn hz_for(&self, bin: usize, sample_rate: f32) -> f32 {
        bin as f32 * sample_rate / self.fft_size as f32
    }
}
