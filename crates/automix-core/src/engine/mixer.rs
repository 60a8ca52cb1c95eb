//! Auto mixer - analyzes tracks and renders a stereo mix-down
//!
//! Two-phase contract:
//! - `analyze` measures loudness and spectral content and produces a
//!   [`MixPlan`] without touching the inputs.
//! - `render` copies each track, applies the planned gain, EQ and pan,
//!   sums everything onto a stereo bus and runs the bus compressor.
//!
//! Per-track processing fans out across worker threads; the bus sum is
//! sequential in input-list order, which is the only ordering guarantee.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::AutoMixerSettings;
use crate::dsp::biquad::{EQBand, FilterType};
use crate::dsp::compressor::{Compressor, CompressorSettings};
use crate::dsp::equalizer::Equalizer;
use crate::dsp::loudness;
use crate::dsp::spectrum::SpectrumAnalyzer;
use crate::error::{EngineError, EngineResult};
use crate::types::{Sample, SampleBuffer, SAMPLE_RATE};

/// FFT size used for analysis spectra
const ANALYSIS_FFT_SIZE: usize = 2048;

/// Widest automatic pan position (tracks spread over +-0.8)
const PAN_SPREAD: f32 = 0.8;

/// Spacing of the planner's per-track EQ boost slots
const SLOT_SPACING_HZ: f32 = 1000.0;

/// Highest slot center the planner will assign
const MAX_SLOT_HZ: f32 = 20000.0;

/// Boost applied at each track's slot
const SLOT_BOOST_DB: f32 = 2.0;

/// Q of the slot boost bands
const SLOT_Q: f32 = 0.7;

/// Mix-bus compressor timing (level balancing already happened upstream,
/// so the bus stage is dynamics control only - hence zero makeup)
const MIX_BUS_ATTACK_MS: f32 = 10.0;
const MIX_BUS_RELEASE_MS: f32 = 100.0;
const MIX_BUS_KNEE_DB: f32 = 2.0;

/// Result of the analysis phase: one entry per input track, plus the
/// mix-bus compressor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixPlan {
    /// Level-balancing gain per track, linear
    pub gains_linear: Vec<f32>,
    /// Planned EQ bands per track (empty when dynamic EQ is disabled)
    pub eq_bands: Vec<Vec<EQBand>>,
    /// Stereo position per track in [-1, +1] (-1 = hard left)
    pub pan_positions: Vec<f32>,
    /// Mix-bus compressor configuration
    pub mix_bus_comp: CompressorSettings,
}

/// Orchestrator: analyze -> plan -> render
///
/// Owns the analysis FFT and the mix-bus compressor pair. Per-track
/// equalizers are created fresh inside each render so no filter state
/// leaks between invocations. One instance per concurrent mix; `analyze`
/// and `render` are blocking and synchronous.
pub struct AutoMixer {
    settings: AutoMixerSettings,
    analyzer: Option<SpectrumAnalyzer>,
    /// One compressor per bus channel; channels are independent
    mix_bus: Option<[Compressor; 2]>,
}

impl AutoMixer {
    /// Create a mixer with the given settings
    pub fn new(settings: AutoMixerSettings) -> Self {
        Self {
            settings,
            analyzer: None,
            mix_bus: None,
        }
    }

    /// Current settings
    pub fn settings(&self) -> &AutoMixerSettings {
        &self.settings
    }

    /// Analyze tracks and derive a mix plan. Inputs are never mutated.
    pub fn analyze(&mut self, tracks: &[SampleBuffer]) -> EngineResult<MixPlan> {
        self.settings.validate()?;

        let mut gains_linear = Vec::with_capacity(tracks.len());
        for (i, track) in tracks.iter().enumerate() {
            let lufs = loudness::integrated_lufs(track);
            let gain_db = self.settings.track_gain_db(lufs);
            log::debug!(
                "track {}: {:.1} LUFS, balancing gain {:+.1} dB",
                i,
                lufs,
                gain_db
            );
            gains_linear.push(10.0_f32.powf(gain_db / 20.0));
        }

        let eq_bands = if self.settings.enable_dynamic_eq {
            self.plan_eq_bands(tracks)?
        } else {
            vec![Vec::new(); tracks.len()]
        };

        let pan_positions = if self.settings.enable_spatial_processing {
            plan_pan_positions(tracks.len())
        } else {
            vec![0.0; tracks.len()]
        };

        let mix_bus_comp = CompressorSettings {
            threshold_db: self.settings.mix_bus_comp_threshold_db,
            ratio: self.settings.mix_bus_comp_ratio,
            attack_ms: MIX_BUS_ATTACK_MS,
            release_ms: MIX_BUS_RELEASE_MS,
            knee_db: MIX_BUS_KNEE_DB,
            makeup_db: 0.0,
        };

        Ok(MixPlan {
            gains_linear,
            eq_bands,
            pan_positions,
            mix_bus_comp,
        })
    }

    /// Analyze and render in one call
    pub fn render(&mut self, tracks: &[SampleBuffer]) -> EngineResult<SampleBuffer> {
        let plan = self.analyze(tracks)?;
        self.render_with_plan(tracks, &plan)
    }

    /// Render tracks through an existing (possibly caller-edited) plan.
    ///
    /// Returns a stereo buffer as long as the longest input; shorter
    /// tracks contribute silence past their end. An empty track list
    /// yields a `(2, 0)` buffer.
    pub fn render_with_plan(
        &mut self,
        tracks: &[SampleBuffer],
        plan: &MixPlan,
    ) -> EngineResult<SampleBuffer> {
        if tracks.is_empty() {
            return SampleBuffer::new(2, 0);
        }
        if plan.gains_linear.len() != tracks.len()
            || plan.eq_bands.len() != tracks.len()
            || plan.pan_positions.len() != tracks.len()
        {
            return Err(EngineError::InvalidParameter(format!(
                "plan covers {} tracks, input has {}",
                plan.gains_linear.len(),
                tracks.len()
            )));
        }

        let out_samples = tracks.iter().map(|t| t.samples()).max().unwrap_or(0);
        let mut bus = SampleBuffer::new(2, out_samples)?;
        log::debug!(
            "rendering {} tracks into {} samples",
            tracks.len(),
            out_samples
        );

        // Per-track gain/EQ is embarrassingly parallel; pan and the bus
        // sum below stay sequential so track order fixes the summation
        // order.
        let eq_enabled = self.settings.enable_dynamic_eq;
        let processed: Vec<EngineResult<Option<SampleBuffer>>> = tracks
            .par_iter()
            .enumerate()
            .map(|(i, track)| {
                process_track(track, plan.gains_linear[i], &plan.eq_bands[i], eq_enabled)
            })
            .collect();

        for (i, result) in processed.into_iter().enumerate() {
            if let Some(work) = result? {
                mix_track_into_bus(&mut bus, &work, plan.pan_positions[i])?;
            }
        }

        self.compress_bus(&mut bus, &plan.mix_bus_comp)?;
        Ok(bus)
    }

    /// Rank tracks dark-to-bright by spectral centroid and hand out the
    /// boost slots in that order, so the dullest track gets the lowest
    /// slot. Ties (including all-silent material, centroid 0) keep input
    /// order, which keeps the plan deterministic.
    fn plan_eq_bands(&mut self, tracks: &[SampleBuffer]) -> EngineResult<Vec<Vec<EQBand>>> {
        if self.analyzer.is_none() {
            self.analyzer = Some(SpectrumAnalyzer::new(ANALYSIS_FFT_SIZE)?);
        }
        let Some(analyzer) = self.analyzer.as_mut() else {
            return Err(EngineError::InvalidParameter(
                "spectrum analyzer unavailable".to_string(),
            ));
        };

        let mut order: Vec<(usize, f32)> = Vec::with_capacity(tracks.len());
        for (i, track) in tracks.iter().enumerate() {
            let centroid = if track.is_empty() {
                0.0
            } else {
                analyzer.spectral_centroid(track.channel(0)?, SAMPLE_RATE as f32)?
            };
            order.push((i, centroid));
        }
        order.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let mut bands = vec![Vec::new(); tracks.len()];
        for (slot, (track_idx, _)) in order.iter().enumerate() {
            let unclamped = SLOT_SPACING_HZ * (slot as f32 + 1.0);
            let frequency = unclamped.min(MAX_SLOT_HZ);
            if unclamped > MAX_SLOT_HZ {
                log::warn!(
                    "track {}: EQ slot clamped to {} Hz, separation degrades past {} tracks",
                    track_idx,
                    MAX_SLOT_HZ,
                    (MAX_SLOT_HZ / SLOT_SPACING_HZ) as usize
                );
            }
            bands[*track_idx].push(EQBand {
                frequency,
                gain_db: SLOT_BOOST_DB,
                q: SLOT_Q,
                filter_type: FilterType::Peak,
            });
        }
        Ok(bands)
    }

    /// Run the bus compressor pair over the stereo bus, one instance per
    /// channel. Each render is an independent mix-down, so the envelopes
    /// start from silence.
    fn compress_bus(
        &mut self,
        bus: &mut SampleBuffer,
        settings: &CompressorSettings,
    ) -> EngineResult<()> {
        if self.mix_bus.is_none() {
            self.mix_bus = Some([Compressor::new(*settings)?, Compressor::new(*settings)?]);
        }
        let Some(pair) = self.mix_bus.as_mut() else {
            return Err(EngineError::InvalidParameter(
                "mix-bus compressor unavailable".to_string(),
            ));
        };

        for (ch, comp) in pair.iter_mut().enumerate() {
            comp.set_settings(*settings)?;
            comp.reset();
            comp.process(bus.channel_mut(ch)?);
        }
        Ok(())
    }
}

/// Equal-power stereo gains for a pan position in [-1, +1]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let theta = (pan.clamp(-1.0, 1.0) + 1.0) * std::f32::consts::FRAC_PI_4;
    (theta.cos(), theta.sin())
}

/// Evenly spread `track_count` positions over [-PAN_SPREAD, +PAN_SPREAD];
/// a single track sits center
fn plan_pan_positions(track_count: usize) -> Vec<f32> {
    match track_count {
        0 => Vec::new(),
        1 => vec![0.0],
        n => {
            let step = 2.0 * PAN_SPREAD / (n as f32 - 1.0);
            (0..n).map(|i| -PAN_SPREAD + i as f32 * step).collect()
        }
    }
}

/// Copy one track and apply its planned gain and EQ.
///
/// Returns `None` for degenerate tracks (zero channels or samples), which
/// contribute silence to the mix.
fn process_track(
    track: &SampleBuffer,
    gain: f32,
    bands: &[EQBand],
    eq_enabled: bool,
) -> EngineResult<Option<SampleBuffer>> {
    if track.is_empty() {
        return Ok(None);
    }

    let mut work = track.clone();
    work.apply_gain(gain);

    if eq_enabled && !bands.is_empty() {
        // Fresh cascade per channel: biquad state must never alias across
        // channels or leak between renders
        for ch in 0..work.channels() {
            let mut eq = Equalizer::new();
            for (slot, band) in bands.iter().enumerate() {
                eq.set_band(slot, *band)?;
            }
            eq.process(work.channel_mut(ch)?);
        }
    }

    Ok(Some(work))
}

/// Pan-route a processed track onto the stereo bus.
///
/// Mono sources feed both sides through the equal-power law. Stereo
/// sources route each input channel to the matching side with that side's
/// pan gain. Channels beyond the first two spill into both sides at `1/C`.
fn mix_track_into_bus(
    bus: &mut SampleBuffer,
    track: &SampleBuffer,
    pan: f32,
) -> EngineResult<()> {
    let (left_gain, right_gain) = pan_gains(pan);
    let shared = track.samples().min(bus.samples());

    match track.channels() {
        0 => {}
        1 => {
            let src = track.channel(0)?;
            add_scaled(bus.channel_mut(0)?, &src[..shared], left_gain);
            add_scaled(bus.channel_mut(1)?, &src[..shared], right_gain);
        }
        channels => {
            add_scaled(bus.channel_mut(0)?, &track.channel(0)?[..shared], left_gain);
            add_scaled(bus.channel_mut(1)?, &track.channel(1)?[..shared], right_gain);

            let spill = 1.0 / channels as f32;
            for ch in 2..channels {
                let src = track.channel(ch)?;
                add_scaled(bus.channel_mut(0)?, &src[..shared], spill);
                add_scaled(bus.channel_mut(1)?, &src[..shared], spill);
            }
        }
    }
    Ok(())
}

/// `dst[i] += src[i] * gain` in increasing sample order
fn add_scaled(dst: &mut [Sample], src: &[Sample], gain: f32) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += *s * gain;
    }
}
