//! Effect settings and the store shared between control and audio threads
//!
//! The audio thread takes one [`EffectSettings`] snapshot per block with a
//! bounded-time load that never waits on the writer mutex. Control threads
//! merge partial updates; writers serialize among themselves on a short mutex
//! the audio thread never touches.

use crate::domain::audio::{AudioError, Result};
use crate::domain::presets::{tone_preset, Environment};
use crossbeam::atomic::AtomicCell;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Complete, immutable parameter set for one block
///
/// Values outside the nominal 0..100 range are accepted; every stage
/// extrapolates the same formulas. Only the final audio sample is clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    /// 50 is unity
    pub bass: f32,
    /// 50 is unity
    pub treble: f32,
    /// 0 disables the spatializer
    pub surround_intensity: f32,
    pub surround_depth: f32,
    pub environment: Environment,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            bass: 50.0,
            treble: 50.0,
            surround_intensity: 0.0,
            surround_depth: 0.0,
            environment: Environment::None,
        }
    }
}

impl EffectSettings {
    /// Settings of a named tone preset, with no reverb
    pub fn from_preset(name: &str) -> Result<Self> {
        let preset = tone_preset(name)?;
        Ok(Self {
            bass: preset.bass,
            treble: preset.treble,
            surround_intensity: preset.surround_intensity,
            surround_depth: preset.surround_depth,
            environment: Environment::None,
        })
    }

    pub fn with_environment(self, environment: Environment) -> Self {
        Self { environment, ..self }
    }

    /// True when every stage before the makeup gain is an exact passthrough
    pub fn is_neutral(&self) -> bool {
        self.bass == 50.0
            && self.treble == 50.0
            && self.surround_intensity <= 0.0
            && self.environment == Environment::None
    }
}

/// Keys accepted by [`SettingsPatch`], including the Chinese spellings
pub const SETTINGS_KEYS: &[&str] = &[
    "bass",
    "treble",
    "surround_intensity",
    "surround_depth",
    "environment",
    "低音",
    "高音",
    "环绕强度",
    "环绕深度",
    "环境",
];

/// Partial update; `None` fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, alias = "低音", skip_serializing_if = "Option::is_none")]
    pub bass: Option<f32>,
    #[serde(default, alias = "高音", skip_serializing_if = "Option::is_none")]
    pub treble: Option<f32>,
    #[serde(default, alias = "环绕强度", skip_serializing_if = "Option::is_none")]
    pub surround_intensity: Option<f32>,
    #[serde(default, alias = "环绕深度", skip_serializing_if = "Option::is_none")]
    pub surround_depth: Option<f32>,
    /// Environment name or alias
    #[serde(default, alias = "环境", skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl SettingsPatch {
    /// Parse a JSON object; unknown keys are ignored
    pub fn from_json_map(map: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let ignored: Vec<&str> = map
            .keys()
            .map(String::as_str)
            .filter(|key| !SETTINGS_KEYS.contains(key))
            .collect();
        if !ignored.is_empty() {
            warn!("Ignoring unknown settings keys: {:?}", ignored);
        }

        serde_json::from_value(serde_json::Value::Object(map.clone()))
            .map_err(|e| AudioError::InvalidConfiguration(e.to_string()))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| AudioError::InvalidConfiguration(e.to_string()))?;
        match value {
            serde_json::Value::Object(map) => Self::from_json_map(&map),
            other => Err(AudioError::InvalidConfiguration(format!(
                "settings update must be an object, got {other}"
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge onto `base`
    ///
    /// Fails without a partial result when the environment name is unknown.
    pub fn apply_to(&self, base: EffectSettings) -> Result<EffectSettings> {
        let environment = match &self.environment {
            Some(name) => Environment::from_name(name)?,
            None => base.environment,
        };

        Ok(EffectSettings {
            bass: self.bass.unwrap_or(base.bass),
            treble: self.treble.unwrap_or(base.treble),
            surround_intensity: self.surround_intensity.unwrap_or(base.surround_intensity),
            surround_depth: self.surround_depth.unwrap_or(base.surround_depth),
            environment,
        })
    }
}

/// Shared, concurrently updated settings
///
/// `snapshot` never takes the writer mutex. The value is wider than any
/// native atomic, so `AtomicCell` guards it with a sequence lock: a load may
/// spin for the duration of one concurrent store, never longer.
pub struct SettingsStore {
    current: AtomicCell<EffectSettings>,
    writer: Mutex<()>,
}

impl SettingsStore {
    pub fn new(initial: EffectSettings) -> Self {
        Self {
            current: AtomicCell::new(initial),
            writer: Mutex::new(()),
        }
    }

    /// Current settings, consistent as a whole
    #[inline]
    pub fn snapshot(&self) -> EffectSettings {
        self.current.load()
    }

    /// Replace every field at once
    pub fn replace(&self, settings: EffectSettings) {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        self.current.store(settings);
        debug!("Settings replaced: {:?}", settings);
    }

    /// Merge a partial update and return the resulting settings
    pub fn update(&self, patch: &SettingsPatch) -> Result<EffectSettings> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let merged = patch.apply_to(self.current.load())?;
        self.current.store(merged);
        debug!("Settings updated: {:?}", merged);
        Ok(merged)
    }

    /// Merge a JSON object of field → value
    pub fn update_from_map(
        &self,
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<EffectSettings> {
        let patch = SettingsPatch::from_json_map(map)?;
        self.update(&patch)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(EffectSettings::default())
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("current", &self.snapshot())
            .finish()
    }
}
