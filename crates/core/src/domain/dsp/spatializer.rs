//! Mid/side stereo widening with a delayed side-channel echo

use super::Effect;
use crate::domain::audio::{Frame, SampleRate};
use crate::domain::config::PipelineTuning;
use crate::domain::settings::EffectSettings;
use tracing::warn;

/// Fixed-capacity ring buffer of side samples
///
/// Allocated once; reads always happen before the write of the same sample.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Sample written `delay` writes ago (1 ..= capacity)
    #[inline]
    pub fn read(&self, delay: usize) -> f32 {
        let len = self.buffer.len();
        let delay = delay.clamp(1, len);
        self.buffer[(self.write_pos + len - delay) % len]
    }

    #[inline]
    pub fn write(&mut self, value: f32) {
        self.buffer[self.write_pos] = value;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// Stereo widener: boosts the side signal and mixes in a delayed copy
pub struct StereoSpatializer {
    sample_rate: SampleRate,
    width: f32,
    depth_mix: f32,
    max_delay_secs: f32,
    side_gain: f32,
    depth: f32,
    delay_samples: usize,
    enabled: bool,
    // Whether the previous block ran the echo path
    echo_active: bool,
    delay_line: DelayLine,
}

impl StereoSpatializer {
    pub fn new(sample_rate: SampleRate, tuning: &PipelineTuning) -> Self {
        let capacity = sample_rate.samples_for(tuning.spatial_max_delay_secs);
        Self {
            sample_rate,
            width: tuning.spatial_width,
            depth_mix: tuning.spatial_depth_mix,
            max_delay_secs: tuning.spatial_max_delay_secs,
            side_gain: 1.0,
            depth: 0.0,
            delay_samples: 0,
            enabled: false,
            echo_active: false,
            delay_line: DelayLine::with_capacity(capacity),
        }
    }

    /// Delay currently applied to the side signal, in samples
    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    pub fn delay_capacity(&self) -> usize {
        self.delay_line.capacity()
    }

    fn set_depth(&mut self, depth: f32) {
        if depth.to_bits() == self.depth.to_bits() {
            return;
        }
        self.depth = depth;

        if depth <= 0.0 {
            self.delay_samples = 0;
            return;
        }

        let requested = self
            .sample_rate
            .samples_for(depth / 100.0 * self.max_delay_secs);
        let capacity = self.delay_line.capacity();
        if requested > capacity {
            warn!(
                "Surround depth {:.1} needs {} samples of delay, clamped to {}",
                depth, requested, capacity
            );
        }
        self.delay_samples = requested.min(capacity);
    }
}

impl Effect for StereoSpatializer {
    fn configure(&mut self, settings: &EffectSettings) {
        let intensity = settings.surround_intensity / 100.0;
        self.enabled = intensity > 0.0;
        self.side_gain = 1.0 + intensity * self.width;
        self.set_depth(settings.surround_depth);
    }

    fn process(&mut self, block: &mut [Frame]) {
        let delay = if self.enabled { self.delay_samples } else { 0 };
        let echo = delay > 0;
        if echo && !self.echo_active {
            // Side content from an earlier active period must not be replayed
            self.delay_line.clear();
        }
        self.echo_active = echo;

        if !self.enabled {
            return;
        }

        for frame in block.iter_mut() {
            let mid = (frame.left + frame.right) * 0.5;
            let mut side = (frame.left - frame.right) * 0.5 * self.side_gain;

            if delay > 0 {
                let delayed = self.delay_line.read(delay);
                self.delay_line.write(side);
                side += delayed * self.depth_mix;
            }

            frame.left = mid + side;
            frame.right = mid - side;
        }
    }

    fn reset(&mut self) {
        self.delay_line.clear();
        self.echo_active = false;
    }

    fn is_bypassed(&self) -> bool {
        !self.enabled
    }

    fn name(&self) -> &str {
        "Stereo Spatializer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spatializer() -> StereoSpatializer {
        StereoSpatializer::new(SampleRate::Hz44100, &PipelineTuning::STUDIO)
    }

    fn settings(intensity: f32, depth: f32) -> EffectSettings {
        EffectSettings {
            surround_intensity: intensity,
            surround_depth: depth,
            ..EffectSettings::default()
        }
    }

    // ---- Delay Line Tests ----

    #[test]
    fn test_delay_line_reads_before_write() {
        let mut line = DelayLine::with_capacity(4);
        for value in [1.0, 2.0, 3.0] {
            line.write(value);
        }
        assert_eq!(line.read(1), 3.0);
        assert_eq!(line.read(3), 1.0);
        assert_eq!(line.read(4), 0.0);
    }

    #[test]
    fn test_delay_line_wraps() {
        let mut line = DelayLine::with_capacity(3);
        for value in 1..=7 {
            line.write(value as f32);
        }
        assert_eq!(line.read(1), 7.0);
        assert_eq!(line.read(3), 5.0);
    }

    // ---- Spatializer Tests ----

    #[test]
    fn test_zero_intensity_is_identity() {
        let mut stage = spatializer();
        stage.configure(&settings(0.0, 80.0));
        assert!(stage.is_bypassed());

        let original: Vec<Frame> = (0..64).map(|i| Frame::new(i as f32 * 0.01, -0.2)).collect();
        let mut block = original.clone();
        stage.process(&mut block);
        assert_eq!(block, original);
    }

    #[test]
    fn test_mono_input_stays_mono() {
        let mut stage = spatializer();
        stage.configure(&settings(100.0, 50.0));

        let original: Vec<Frame> = (0..256).map(|i| Frame::mono((i as f32 * 0.1).sin() * 0.5)).collect();
        let mut block = original.clone();
        stage.process(&mut block);
        assert_eq!(block, original);
    }

    #[test]
    fn test_side_is_widened() {
        let mut stage = spatializer();
        stage.configure(&settings(50.0, 0.0));

        let mut block = vec![Frame::new(0.1, -0.1)];
        stage.process(&mut block);

        // side 0.1 scaled by 1 + 0.5 * 2.2
        assert!((block[0].left - 0.21).abs() < 1e-6);
        assert!((block[0].right + 0.21).abs() < 1e-6);
    }

    #[test]
    fn test_delay_length_from_depth() {
        let mut stage = spatializer();
        stage.configure(&settings(10.0, 100.0));
        assert_eq!(stage.delay_samples(), 1102);

        stage.configure(&settings(10.0, 40.0));
        assert_eq!(stage.delay_samples(), 441);

        stage.configure(&settings(10.0, 0.0));
        assert_eq!(stage.delay_samples(), 0);
    }

    #[test]
    fn test_excessive_depth_is_clamped() {
        let mut stage = spatializer();
        stage.configure(&settings(10.0, 400.0));
        assert_eq!(stage.delay_samples(), stage.delay_capacity());
    }

    #[test]
    fn test_delayed_side_echo() {
        let mut stage = spatializer();
        stage.configure(&settings(100.0, 1.0));
        let delay = stage.delay_samples();
        assert_eq!(delay, 11);

        let mut block = vec![Frame::SILENCE; 32];
        block[0] = Frame::new(0.1, -0.1);
        stage.process(&mut block);

        let side = 0.1 * (1.0 + 2.2);
        assert!((block[0].left - side).abs() < 1e-6);
        assert!((block[delay].left - side * 0.45).abs() < 1e-6);
        assert_eq!(block[delay - 1], Frame::SILENCE);
    }

    #[test]
    fn test_delay_state_spans_blocks() {
        let input: Vec<Frame> = (0..600).map(|i| Frame::new((i as f32 * 0.05).sin() * 0.3, 0.0)).collect();

        let mut whole = input.clone();
        let mut stage = spatializer();
        stage.configure(&settings(60.0, 20.0));
        stage.process(&mut whole);

        let mut split = input;
        let mut stage = spatializer();
        stage.configure(&settings(60.0, 20.0));
        for chunk in split.chunks_mut(128) {
            stage.process(chunk);
        }

        assert_eq!(whole, split);
    }

    #[test]
    fn test_reenabled_echo_starts_from_silence() {
        let mut stage = spatializer();
        stage.configure(&settings(100.0, 1.0));
        let delay = stage.delay_samples();

        // Leave side content in the delay line, then disable the echo
        let mut loud = vec![Frame::new(0.5, -0.5); delay * 2];
        stage.process(&mut loud);
        stage.configure(&settings(0.0, 1.0));
        stage.process(&mut vec![Frame::SILENCE; 64]);

        stage.configure(&settings(100.0, 1.0));
        let mut block = vec![Frame::SILENCE; delay * 2];
        stage.process(&mut block);
        assert!(block.iter().all(|f| *f == Frame::SILENCE));

        // Same after the depth alone went to zero and back
        stage.process(&mut loud.clone());
        stage.configure(&settings(100.0, 0.0));
        stage.process(&mut vec![Frame::SILENCE; 64]);
        stage.configure(&settings(100.0, 1.0));
        let mut block = vec![Frame::SILENCE; delay * 2];
        stage.process(&mut block);
        assert!(block.iter().all(|f| *f == Frame::SILENCE));
    }
}
