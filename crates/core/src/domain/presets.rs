//! Read-only tone and environment preset tables
//!
//! Every preset has a canonical Chinese name (the one stored in settings files)
//! and an English alias. Lookups accept either; aliases are case-insensitive.

use crate::domain::audio::{AudioError, Result};
use serde::{Deserialize, Serialize};

/// Tone shaping values for a named preset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TonePreset {
    pub name: &'static str,
    pub alias: &'static str,
    pub bass: f32,
    pub treble: f32,
    pub surround_intensity: f32,
    pub surround_depth: f32,
}

const fn tone(
    name: &'static str,
    alias: &'static str,
    bass: f32,
    treble: f32,
    surround_intensity: f32,
    surround_depth: f32,
) -> TonePreset {
    TonePreset {
        name,
        alias,
        bass,
        treble,
        surround_intensity,
        surround_depth,
    }
}

/// All tone presets in display order
pub const TONE_PRESETS: &[TonePreset] = &[
    tone("无", "none", 50.0, 50.0, 0.0, 0.0),
    tone("ACG", "acg", 60.0, 75.0, 40.0, 20.0),
    tone("民谣", "folk", 45.0, 60.0, 20.0, 10.0),
    tone("低音", "bass", 85.0, 40.0, 30.0, 20.0),
    tone("低音&高音", "bass-treble", 80.0, 80.0, 40.0, 30.0),
    tone("蓝调", "blues", 65.0, 55.0, 30.0, 25.0),
    tone("古风", "guofeng", 40.0, 70.0, 50.0, 40.0),
    tone("古典", "classical", 55.0, 65.0, 45.0, 30.0),
    tone("电音", "electronic", 90.0, 70.0, 60.0, 50.0),
    tone("流行", "pop", 60.0, 60.0, 30.0, 20.0),
    tone("超重低音", "super-bass", 100.0, 30.0, 45.0, 30.0),
    tone("原声", "acoustic", 50.0, 50.0, 0.0, 0.0),
    tone("鲸云空间", "cloud-space", 65.0, 60.0, 80.0, 40.0),
    tone("沉浸环绕", "immersive", 55.0, 70.0, 90.0, 30.0),
    tone("清澈人声", "clear-vocal", 40.0, 85.0, 20.0, 10.0),
];

/// Name of the neutral tone preset
pub const DEFAULT_PRESET: &str = "无";

fn matches_name(name: &str, canonical: &str, alias: &str) -> bool {
    let name = name.trim();
    name == canonical || name.eq_ignore_ascii_case(alias) || name.eq_ignore_ascii_case(canonical)
}

/// Tone preset names in display order
pub fn preset_names() -> Vec<&'static str> {
    TONE_PRESETS.iter().map(|p| p.name).collect()
}

/// Look up a tone preset by canonical name or alias
pub fn tone_preset(name: &str) -> Result<&'static TonePreset> {
    TONE_PRESETS
        .iter()
        .find(|p| matches_name(name, p.name, p.alias))
        .ok_or_else(|| AudioError::UnknownPreset(name.to_string()))
}

/// Reverb parameters of an environment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentParams {
    /// Wet level, 0..1
    pub wet: f32,
    /// Time for the tail to fall by 60 dB
    pub decay_secs: f32,
    /// High-frequency damping in the comb loops, 0..1
    pub damping: f32,
}

/// Acoustic space simulated by the reverb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    None,
    Studio,
    Room,
    Hall,
    Church,
}

impl Environment {
    /// All environments in display order
    pub const ALL: [Environment; 5] = [
        Environment::None,
        Environment::Studio,
        Environment::Room,
        Environment::Hall,
        Environment::Church,
    ];

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            Environment::None => "无",
            Environment::Studio => "录音棚",
            Environment::Room => "房间",
            Environment::Hall => "大厅",
            Environment::Church => "教堂",
        }
    }

    pub fn alias(&self) -> &'static str {
        match self {
            Environment::None => "none",
            Environment::Studio => "studio",
            Environment::Room => "room",
            Environment::Hall => "hall",
            Environment::Church => "church",
        }
    }

    pub fn params(&self) -> EnvironmentParams {
        let (wet, decay_secs, damping) = match self {
            Environment::None => (0.0, 0.0, 0.0),
            Environment::Studio => (0.12, 0.35, 0.5),
            Environment::Room => (0.2, 0.6, 0.4),
            Environment::Hall => (0.3, 2.0, 0.3),
            Environment::Church => (0.35, 3.5, 0.25),
        };
        EnvironmentParams {
            wet,
            decay_secs,
            damping,
        }
    }

    /// Look up by canonical name or alias
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|env| matches_name(name, env.name(), env.alias()))
            .ok_or_else(|| AudioError::UnknownPreset(name.to_string()))
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Environment names in display order
pub fn environment_names() -> Vec<&'static str> {
    Environment::ALL.iter().map(|env| env.name()).collect()
}

/// Look up environment parameters by name
pub fn environment_preset(name: &str) -> Result<EnvironmentParams> {
    Environment::from_name(name).map(|env| env.params())
}
