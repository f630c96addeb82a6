//! Effects pipeline and the engine facade
//!
//! Stage order is fixed:
//! bass shelf → treble shelf → spatializer → harmonic enhancer →
//! makeup gain → limiter → reverb → final clip.

use crate::domain::audio::{
    frames_from_i16, frames_to_i16, AudioError, Frame, Result, SampleRate,
};
use crate::domain::config::{EngineConfig, PipelineTuning};
use crate::domain::dsp::{
    CausalLimiter, Effect, HarmonicEnhancer, Limiter, LookaheadLimiter, ReverbEngine, ShelfStage,
    StereoSpatializer,
};
use crate::domain::settings::{EffectSettings, SettingsPatch, SettingsStore};
use std::sync::Arc;
use tracing::{debug, info};

/// One configured chain of stages with its own filter and delay state
pub struct EffectsPipeline<L: Limiter> {
    makeup_gain: f32,
    bass: ShelfStage,
    treble: ShelfStage,
    spatializer: StereoSpatializer,
    enhancer: HarmonicEnhancer,
    limiter: L,
    reverb: ReverbEngine,
}

impl<L: Limiter> EffectsPipeline<L> {
    pub fn new(sample_rate: SampleRate, tuning: &PipelineTuning, limiter: L) -> Self {
        Self {
            makeup_gain: tuning.makeup_gain,
            bass: ShelfStage::bass(sample_rate, tuning),
            treble: ShelfStage::treble(sample_rate, tuning),
            spatializer: StereoSpatializer::new(sample_rate, tuning),
            enhancer: HarmonicEnhancer::new(sample_rate, tuning),
            limiter,
            reverb: ReverbEngine::new(sample_rate, tuning),
        }
    }

    fn stages_mut(&mut self) -> [&mut dyn Effect; 4] {
        [
            &mut self.bass,
            &mut self.treble,
            &mut self.spatializer,
            &mut self.enhancer,
        ]
    }

    /// Run every stage over `block` with one settings snapshot
    pub fn process(&mut self, block: &mut [Frame], settings: &EffectSettings) {
        // Bypassed stages return early, except shelves which keep their history in step
        for stage in self.stages_mut() {
            stage.configure(settings);
            stage.process(block);
        }

        for frame in block.iter_mut() {
            frame.scale(self.makeup_gain);
        }
        self.limiter.limit(block);

        self.reverb.configure(settings);
        self.reverb.process(block);

        for frame in block.iter_mut() {
            frame.clip();
        }
    }

    /// Clear every filter history, delay line and the limiter envelope
    pub fn reset(&mut self) {
        for stage in self.stages_mut() {
            stage.reset();
        }
        self.limiter.reset();
        self.reverb.reset();
    }

    pub fn limiter(&self) -> &L {
        &self.limiter
    }

    /// Names of the stages that are currently doing work
    pub fn active_stages(&self) -> Vec<&str> {
        let stages: [&dyn Effect; 5] = [
            &self.bass,
            &self.treble,
            &self.spatializer,
            &self.enhancer,
            &self.reverb,
        ];
        stages
            .into_iter()
            .filter(|stage| !stage.is_bypassed())
            .map(|stage| stage.name())
            .collect()
    }
}

impl EffectsPipeline<LookaheadLimiter> {
    /// Pipeline for whole buffers
    pub fn offline(sample_rate: SampleRate, tuning: &PipelineTuning) -> Self {
        Self::new(sample_rate, tuning, LookaheadLimiter::new(sample_rate, tuning))
    }
}

impl EffectsPipeline<CausalLimiter> {
    /// Pipeline for chunked real-time processing
    pub fn streaming(sample_rate: SampleRate, tuning: &PipelineTuning) -> Self {
        Self::new(sample_rate, tuning, CausalLimiter::new(sample_rate, tuning))
    }
}

/// Stereo effects engine
///
/// Owns the streaming pipeline state and the shared settings store. Offline
/// rendering builds a fresh pipeline per call and is independent of the
/// streaming state.
pub struct Engine {
    config: EngineConfig,
    sample_rate: SampleRate,
    settings: Arc<SettingsStore>,
    stream: EffectsPipeline<CausalLimiter>,
    scratch: Vec<Frame>,
}

impl Engine {
    pub fn new(sample_rate: u32) -> Result<Self> {
        Self::with_config(EngineConfig::with_sample_rate(sample_rate))
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let sample_rate = config.validate()?;
        let stream = EffectsPipeline::streaming(sample_rate, &config.tuning);

        info!(
            "Effects engine created: {} Hz, {} frame chunks",
            sample_rate.hz(),
            config.chunk_frames
        );

        Ok(Self {
            scratch: Vec::with_capacity(config.chunk_frames),
            config,
            sample_rate,
            settings: Arc::new(SettingsStore::default()),
            stream,
        })
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current settings snapshot
    pub fn settings(&self) -> EffectSettings {
        self.settings.snapshot()
    }

    /// Handle for control threads
    pub fn settings_store(&self) -> Arc<SettingsStore> {
        Arc::clone(&self.settings)
    }

    /// Merge a partial update; applies from the next chunk
    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<EffectSettings> {
        self.settings.update(patch)
    }

    /// Merge a JSON object of field → value; unknown fields are ignored
    pub fn update_settings_map(
        &self,
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<EffectSettings> {
        self.settings.update_from_map(map)
    }

    pub fn replace_settings(&self, settings: EffectSettings) {
        self.settings.replace(settings);
    }

    /// Render a whole buffer with the lookahead limiter
    ///
    /// Deterministic: the same input and settings always give the same output.
    pub fn process_buffer(&self, frames: &[Frame], settings: &EffectSettings) -> Result<Vec<Frame>> {
        if frames.is_empty() {
            return Err(AudioError::InvalidBuffer("buffer is empty".to_string()));
        }

        let mut pipeline = EffectsPipeline::offline(self.sample_rate, &self.config.tuning);
        let mut output = frames.to_vec();
        pipeline.process(&mut output, settings);

        debug!(
            "Rendered {} frames offline, active stages: {:?}",
            output.len(),
            pipeline.active_stages()
        );
        Ok(output)
    }

    /// Offline rendering of interleaved 16-bit PCM
    pub fn process_i16_buffer(&self, samples: &[i16], settings: &EffectSettings) -> Result<Vec<i16>> {
        let frames = frames_from_i16(samples)?;
        let output = self.process_buffer(&frames, settings)?;
        Ok(frames_to_i16(&output))
    }

    /// Process one streaming chunk in place with the stored settings
    pub fn process_chunk(&mut self, block: &mut [Frame]) -> Result<()> {
        if block.is_empty() {
            return Err(AudioError::InvalidBuffer("chunk is empty".to_string()));
        }
        let settings = self.settings.snapshot();
        self.stream.process(block, &settings);
        Ok(())
    }

    /// Streaming entry point for interleaved `f32` callback buffers
    pub fn process_interleaved(&mut self, samples: &mut [f32]) -> Result<()> {
        crate::domain::audio::check_interleaved(samples.len())?;

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.extend(samples.chunks_exact(2).map(|pair| Frame::new(pair[0], pair[1])));

        let result = self.process_chunk(&mut scratch);
        if result.is_ok() {
            for (pair, frame) in samples.chunks_exact_mut(2).zip(&scratch) {
                pair[0] = frame.left;
                pair[1] = frame.right;
            }
        }

        self.scratch = scratch;
        result
    }

    /// Streaming entry point for planar (non-interleaved) channel buffers
    pub fn process_planar(&mut self, left: &mut [f32], right: &mut [f32]) -> Result<()> {
        if left.len() != right.len() {
            return Err(AudioError::InvalidBuffer(format!(
                "channel lengths differ: left {} right {}",
                left.len(),
                right.len()
            )));
        }

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.extend(left.iter().zip(right.iter()).map(|(&l, &r)| Frame::new(l, r)));

        let result = self.process_chunk(&mut scratch);
        if result.is_ok() {
            for ((l, r), frame) in left.iter_mut().zip(right.iter_mut()).zip(&scratch) {
                *l = frame.left;
                *r = frame.right;
            }
        }

        self.scratch = scratch;
        result
    }

    /// Drop all streaming state (filter history, delay lines, reverb tail)
    pub fn reset(&mut self) {
        self.stream.reset();
        debug!("Streaming state reset");
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("sample_rate", &self.sample_rate)
            .field("chunk_frames", &self.config.chunk_frames)
            .field("settings", &self.settings.snapshot())
            .finish()
    }
}
