//! Configuration types for the effects engine
//!
//! This module provides:
//! - `PipelineTuning`: every numeric constant of the pipeline in one table
//! - `EngineConfig`: sample rate, chunk size and tuning, TOML serializable
//! - `PersistedSettings`: the user's preset + overlay record kept by front ends
//!
//! Nothing here touches the filesystem; callers own the I/O.

use crate::domain::audio::{AudioError, Result, SampleRate};
use crate::domain::presets::{tone_preset, Environment, DEFAULT_PRESET};
use crate::domain::settings::EffectSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Numeric constants of the pipeline
///
/// Two named variants exist: `STUDIO` for offline rendering and `LIVE` for the
/// streaming path, which differ only in spatializer width and echo mix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineTuning {
    /// Linear gain applied before the limiter
    pub makeup_gain: f32,

    pub bass_shelf_hz: f32,
    pub treble_shelf_hz: f32,
    pub shelf_q: f32,
    /// Shelf gain in dB per setting step away from 50
    pub shelf_db_per_step: f32,
    /// Shelves with a smaller absolute gain are bypassed
    pub shelf_bypass_db: f32,

    /// Side boost at full surround intensity
    pub spatial_width: f32,
    /// Level of the delayed side echo
    pub spatial_depth_mix: f32,
    /// Delay at full surround depth; also sizes the delay line
    pub spatial_max_delay_secs: f32,

    pub bass_enhance_threshold: f32,
    pub bass_enhance_cutoff_hz: f32,
    pub treble_enhance_threshold: f32,
    pub treble_enhance_cutoff_hz: f32,
    pub exciter_drive: f32,

    pub limiter_ceiling_db: f32,
    pub limiter_lookahead_secs: f32,
    pub limiter_release_secs: f32,

    /// How much the dry path ducks per unit of wet level
    pub reverb_mix_dry: f32,
    pub reverb_mix_wet: f32,
    /// Extra loop attenuation keeping the combs stable
    pub reverb_safety: f32,
    pub reverb_allpass_gain: f32,
    /// Right channel delay offset
    pub reverb_stereo_spread_secs: f32,
}

impl PipelineTuning {
    pub const STUDIO: Self = Self {
        makeup_gain: 1.4,
        bass_shelf_hz: 85.0,
        treble_shelf_hz: 10_000.0,
        shelf_q: 0.707,
        shelf_db_per_step: 0.25,
        shelf_bypass_db: 0.1,
        spatial_width: 2.2,
        spatial_depth_mix: 0.45,
        spatial_max_delay_secs: 0.025,
        bass_enhance_threshold: 50.0,
        bass_enhance_cutoff_hz: 100.0,
        treble_enhance_threshold: 60.0,
        treble_enhance_cutoff_hz: 4000.0,
        exciter_drive: 0.5,
        limiter_ceiling_db: -0.1,
        limiter_lookahead_secs: 0.010,
        limiter_release_secs: 0.100,
        reverb_mix_dry: 0.5,
        reverb_mix_wet: 0.3,
        reverb_safety: 0.998,
        reverb_allpass_gain: 0.62,
        reverb_stereo_spread_secs: 0.000_52,
    };

    pub const LIVE: Self = Self {
        spatial_width: 2.0,
        spatial_depth_mix: 0.3,
        ..Self::STUDIO
    };

    /// Look up a named variant (`studio` or `live`)
    pub fn by_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "studio" => Ok(Self::STUDIO),
            "live" => Ok(Self::LIVE),
            other => Err(AudioError::InvalidConfiguration(format!(
                "unknown tuning variant '{other}'"
            ))),
        }
    }

    /// Reject values that would make a stage misbehave
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("makeup_gain", self.makeup_gain),
            ("bass_shelf_hz", self.bass_shelf_hz),
            ("treble_shelf_hz", self.treble_shelf_hz),
            ("shelf_q", self.shelf_q),
            ("bass_enhance_cutoff_hz", self.bass_enhance_cutoff_hz),
            ("treble_enhance_cutoff_hz", self.treble_enhance_cutoff_hz),
            ("limiter_release_secs", self.limiter_release_secs),
        ];
        for (field, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(AudioError::InvalidConfiguration(format!(
                    "{field} must be positive, got {value}"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.reverb_safety) {
            return Err(AudioError::InvalidConfiguration(format!(
                "reverb_safety must be within 0..=1, got {}",
                self.reverb_safety
            )));
        }
        if self.limiter_ceiling_db > 0.0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "limiter_ceiling_db must not exceed 0 dBFS, got {}",
                self.limiter_ceiling_db
            )));
        }
        if self.bass_enhance_threshold >= 100.0 || self.treble_enhance_threshold >= 100.0 {
            return Err(AudioError::InvalidConfiguration(
                "enhancer thresholds must be below 100".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self::STUDIO
    }
}

/// Engine construction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sample rate in Hz; every buffer is sized from it
    pub sample_rate: u32,

    /// Frames per streaming chunk
    #[serde(default = "default_chunk_frames")]
    pub chunk_frames: usize,

    #[serde(default)]
    pub tuning: PipelineTuning,
}

fn default_chunk_frames() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            chunk_frames: default_chunk_frames(),
            tuning: PipelineTuning::STUDIO,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<SampleRate> {
        let sample_rate = SampleRate::from_hz(self.sample_rate)?;
        if self.chunk_frames == 0 {
            return Err(AudioError::Construction(
                "chunk_frames must be greater than zero".to_string(),
            ));
        }
        self.tuning
            .validate()
            .map_err(|e| AudioError::Construction(e.to_string()))?;
        Ok(sample_rate)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| AudioError::InvalidConfiguration(e.to_string()))?;
        debug!("Engine configuration parsed: {} Hz", config.sample_rate);
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AudioError::InvalidConfiguration(e.to_string()))
    }
}

/// Per-field adjustment applied on top of a preset; 50 means no change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overlay {
    #[serde(alias = "低音")]
    pub bass: f32,
    #[serde(alias = "高音")]
    pub treble: f32,
    #[serde(alias = "环绕强度")]
    pub surround_intensity: f32,
    #[serde(alias = "环绕深度")]
    pub surround_depth: f32,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            bass: 50.0,
            treble: 50.0,
            surround_intensity: 50.0,
            surround_depth: 50.0,
        }
    }
}

/// User settings as stored by front ends
///
/// Resolution: each final value is `preset value + (overlay - 50)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSettings {
    #[serde(default = "default_preset")]
    pub preset: String,

    #[serde(default)]
    pub overlay: Overlay,

    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}

fn default_environment() -> String {
    Environment::None.name().to_string()
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            overlay: Overlay::default(),
            environment: default_environment(),
        }
    }
}

impl PersistedSettings {
    /// Resolve preset, overlay and environment into concrete settings
    pub fn resolve(&self) -> Result<EffectSettings> {
        let preset = tone_preset(&self.preset)?;
        let environment = Environment::from_name(&self.environment)?;
        let overlay = &self.overlay;

        Ok(EffectSettings {
            bass: preset.bass + (overlay.bass - 50.0),
            treble: preset.treble + (overlay.treble - 50.0),
            surround_intensity: preset.surround_intensity + (overlay.surround_intensity - 50.0),
            surround_depth: preset.surround_depth + (overlay.surround_depth - 50.0),
            environment,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| AudioError::InvalidConfiguration(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AudioError::InvalidConfiguration(e.to_string()))
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| AudioError::InvalidConfiguration(e.to_string()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| AudioError::InvalidConfiguration(e.to_string()))
    }
}
