//! Domain entities and processing rules

pub mod audio;
pub mod config;
pub mod dsp;
pub mod pipeline;
pub mod presets;
pub mod settings;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{
    check_interleaved, frames_from_i16, frames_from_interleaved, frames_to_i16,
    frames_to_interleaved, AudioError, Frame, SampleRate,
};
pub use config::{EngineConfig, Overlay, PersistedSettings, PipelineTuning};
pub use dsp::{
    db_to_gain, BiquadCoeffs, BiquadFilter, CausalLimiter, Effect, HarmonicEnhancer, Limiter,
    LookaheadLimiter, ReverbEngine, ShelfStage, StatefulBiquad, StereoSpatializer,
};
pub use pipeline::{EffectsPipeline, Engine};
pub use presets::{
    environment_names, environment_preset, preset_names, tone_preset, Environment,
    EnvironmentParams, TonePreset, TONE_PRESETS,
};
pub use settings::{EffectSettings, SettingsPatch, SettingsStore};
