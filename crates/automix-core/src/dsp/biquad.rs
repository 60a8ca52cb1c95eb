//! Biquad filter building block
//!
//! A single second-order IIR section: coefficient derivation (RBJ audio
//! cookbook), Direct Form I difference equation, and the two samples of
//! input/output history that persist between processed blocks.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::Sample;

/// Q values below this are clamped before coefficient derivation
pub const MIN_Q: f32 = 1e-3;

/// Filter response shape of an EQ band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    #[default]
    Peak,
    HighShelf,
    LowShelf,
    HighPass,
    LowPass,
}

/// One parametric EQ band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EQBand {
    /// Center (or corner) frequency in Hz; must lie in (0, sample_rate/2)
    pub frequency: f32,
    /// Boost/cut in dB (ignored by the pass filters)
    pub gain_db: f32,
    /// Q factor; must be positive
    pub q: f32,
    /// Response shape
    pub filter_type: FilterType,
}

impl Default for EQBand {
    fn default() -> Self {
        Self {
            frequency: 1000.0,
            gain_db: 0.0,
            q: 0.7,
            filter_type: FilterType::Peak,
        }
    }
}

impl EQBand {
    /// Check the band parameters against the given sample rate
    pub fn validate(&self, sample_rate: f32) -> EngineResult<()> {
        let nyquist = sample_rate / 2.0;
        if !self.frequency.is_finite() || self.frequency <= 0.0 || self.frequency >= nyquist {
            return Err(EngineError::InvalidParameter(format!(
                "band frequency {} Hz outside (0, {}) Hz",
                self.frequency, nyquist
            )));
        }
        if !self.q.is_finite() || self.q <= 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "band Q must be positive, got {}",
                self.q
            )));
        }
        if !self.gain_db.is_finite() {
            return Err(EngineError::InvalidParameter(format!(
                "band gain must be finite, got {}",
                self.gain_db
            )));
        }
        Ok(())
    }
}

/// Normalized biquad coefficients (`a0 == 1`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    /// Unity passthrough section
    pub fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Derive coefficients for a band (RBJ audio cookbook formulas).
    ///
    /// Fails with `InvalidParameter` if the band is out of range; Q is
    /// clamped to [`MIN_Q`] before derivation.
    pub fn from_band(band: &EQBand, sample_rate: f32) -> EngineResult<Self> {
        band.validate(sample_rate)?;

        let omega = 2.0 * std::f32::consts::PI * band.frequency / sample_rate;
        let (sin_w, cos_w) = omega.sin_cos();
        let q = band.q.max(MIN_Q);
        let alpha = sin_w / (2.0 * q);
        let a = 10.0_f32.powf(band.gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match band.filter_type {
            FilterType::Peak => (
                1.0 + alpha * a,
                -2.0 * cos_w,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w,
                1.0 - alpha / a,
            ),
            FilterType::LowShelf => {
                let shelf = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w + shelf),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w),
                    a * ((a + 1.0) - (a - 1.0) * cos_w - shelf),
                    (a + 1.0) + (a - 1.0) * cos_w + shelf,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w),
                    (a + 1.0) + (a - 1.0) * cos_w - shelf,
                )
            }
            FilterType::HighShelf => {
                let shelf = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w + shelf),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w),
                    a * ((a + 1.0) + (a - 1.0) * cos_w - shelf),
                    (a + 1.0) - (a - 1.0) * cos_w + shelf,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w),
                    (a + 1.0) - (a - 1.0) * cos_w - shelf,
                )
            }
            FilterType::HighPass => (
                (1.0 + cos_w) / 2.0,
                -(1.0 + cos_w),
                (1.0 + cos_w) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w,
                1.0 - alpha,
            ),
            FilterType::LowPass => (
                (1.0 - cos_w) / 2.0,
                1.0 - cos_w,
                (1.0 - cos_w) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w,
                1.0 - alpha,
            ),
        };

        Ok(Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        })
    }

    /// True when every coefficient is a normal number
    pub fn is_finite(&self) -> bool {
        self.b0.is_finite()
            && self.b1.is_finite()
            && self.b2.is_finite()
            && self.a1.is_finite()
            && self.a2.is_finite()
    }
}

/// Two samples of input and output history, persistent between blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    x1: Sample,
    x2: Sample,
    y1: Sample,
    y2: Sample,
}

impl BiquadState {
    /// Run one sample through the Direct Form I difference equation
    #[inline]
    pub fn process_sample(&mut self, input: Sample, coeffs: &BiquadCoeffs) -> Sample {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Zero the filter history
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
