//! Auto-mixer configuration
//!
//! Settings that steer the analysis phase: target loudness, gain safety
//! limits, and which processing stages (EQ, spatial placement, bus
//! compression) participate in the mix.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Auto-mixer configuration
///
/// # Loudness background
///
/// LUFS (Loudness Units Full Scale) is the standard for measuring perceived
/// loudness. The engine's meter is a mean-square approximation of integrated
/// LUFS (no K-weighting, no gating), so targets here land in the familiar
/// range but are not broadcast-certified values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoMixerSettings {
    /// Desired per-track integrated loudness in LUFS.
    /// Each track is gain-compensated toward this level.
    /// Default: -16.0 LUFS
    pub target_lufs: f32,

    /// Maximum downward gain adjustment in dB (safety limit for very loud
    /// tracks). Upward adjustment is unbounded.
    /// Default: 12.0 dB
    pub max_gain_reduction_db: f32,

    /// Minimum inter-track spectral separation goal in dB. The slot-based
    /// EQ planner spaces track boosts 1 kHz apart, which comfortably
    /// exceeds this goal; the field is kept so refined planners can honor
    /// an explicit separation request.
    /// Default: 3.0 dB
    pub frequency_separation_db: f32,

    /// Enable per-track EQ planning and the render EQ stage.
    /// When false, no EQ bands are planned and the stage is bypassed.
    /// Default: true
    pub enable_dynamic_eq: bool,

    /// Enable automatic stereo placement. When false, every track stays
    /// centered.
    /// Default: true
    pub enable_spatial_processing: bool,

    /// Mix-bus compressor threshold in dB.
    /// Default: -6.0 dB
    pub mix_bus_comp_threshold_db: f32,

    /// Mix-bus compression ratio (must be >= 1).
    /// Default: 2.0
    pub mix_bus_comp_ratio: f32,
}

impl Default for AutoMixerSettings {
    fn default() -> Self {
        Self {
            target_lufs: -16.0,
            max_gain_reduction_db: 12.0,
            frequency_separation_db: 3.0,
            enable_dynamic_eq: true,
            enable_spatial_processing: true,
            mix_bus_comp_threshold_db: -6.0,
            mix_bus_comp_ratio: 2.0,
        }
    }
}

impl AutoMixerSettings {
    /// Calculate the level-balancing gain in dB for a track.
    ///
    /// The adjustment toward `target_lufs` is clamped downward at
    /// `-max_gain_reduction_db`; boosts are not limited.
    pub fn track_gain_db(&self, track_lufs: f32) -> f32 {
        (self.target_lufs - track_lufs).max(-self.max_gain_reduction_db)
    }

    /// Calculate the level-balancing gain as a linear multiplier
    pub fn track_gain_linear(&self, track_lufs: f32) -> f32 {
        10.0_f32.powf(self.track_gain_db(track_lufs) / 20.0)
    }

    /// Check the settings for values the engine cannot work with
    pub fn validate(&self) -> EngineResult<()> {
        if !self.target_lufs.is_finite() {
            return Err(EngineError::InvalidParameter(
                "target_lufs must be finite".to_string(),
            ));
        }
        if !self.max_gain_reduction_db.is_finite() || self.max_gain_reduction_db < 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "max_gain_reduction_db must be finite and non-negative, got {}",
                self.max_gain_reduction_db
            )));
        }
        if !self.mix_bus_comp_threshold_db.is_finite() {
            return Err(EngineError::InvalidParameter(
                "mix_bus_comp_threshold_db must be finite".to_string(),
            ));
        }
        if !self.mix_bus_comp_ratio.is_finite() || self.mix_bus_comp_ratio < 1.0 {
            return Err(EngineError::InvalidParameter(format!(
                "mix_bus_comp_ratio must be >= 1, got {}",
                self.mix_bus_comp_ratio
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = AutoMixerSettings::default();
        assert_eq!(settings.target_lufs, -16.0);
        assert_eq!(settings.max_gain_reduction_db, 12.0);
        assert!(settings.enable_dynamic_eq);
        assert!(settings.enable_spatial_processing);
        assert_eq!(settings.mix_bus_comp_threshold_db, -6.0);
        assert_eq!(settings.mix_bus_comp_ratio, 2.0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_gain_boost() {
        let settings = AutoMixerSettings::default();
        // Track at -22 LUFS, target -16 LUFS = +6 dB boost
        let db = settings.track_gain_db(-22.0);
        assert!((db - 6.0).abs() < 0.001);
        assert!((settings.track_gain_linear(-22.0) - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_gain_reduction_clamped() {
        let settings = AutoMixerSettings::default();
        // Track at +4 LUFS would need -20 dB; clamped at -12 dB
        assert_eq!(settings.track_gain_db(4.0), -12.0);
    }

    #[test]
    fn test_boost_is_unbounded() {
        let settings = AutoMixerSettings::default();
        // Very quiet track: full boost allowed
        assert!((settings.track_gain_db(-60.0) - 44.0).abs() < 0.001);
    }

    #[test]
    fn test_validate_rejects_expansion_ratio() {
        let settings = AutoMixerSettings {
            mix_bus_comp_ratio: 0.5,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
