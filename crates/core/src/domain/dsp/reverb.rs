//! Schroeder reverberator: parallel damped combs into series allpasses

use super::{flush_denormal, Effect};
use crate::domain::audio::{Frame, SampleRate};
use crate::domain::config::PipelineTuning;
use crate::domain::presets::{Environment, EnvironmentParams};
use crate::domain::settings::EffectSettings;
use tracing::debug;

/// Comb delays in milliseconds
const COMB_DELAYS_MS: [f32; 8] = [29.7, 37.1, 41.1, 43.7, 53.3, 59.9, 67.7, 73.1];

/// Allpass delays in milliseconds, applied in this order
const ALLPASS_DELAYS_MS: [f32; 4] = [5.0, 3.7, 2.9, 2.1];

/// Smallest decay time used in the feedback formula
const MIN_DECAY_SECS: f32 = 1.0e-3;

fn delay_len(ms: f32, spread_samples: usize, sample_rate: f32) -> usize {
    ((ms * sample_rate / 1000.0).round() as usize + spread_samples).max(1)
}

/// Feedback comb with a one-pole low-pass in the loop
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    pos: usize,
    store: f32,
    feedback: f32,
}

impl CombFilter {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            pos: 0,
            store: 0.0,
            feedback: 0.0,
        }
    }

    /// Feedback for a -60 dB decay after `decay_secs`
    fn set_decay(&mut self, decay_secs: f32, sample_rate: f32) {
        let trips = self.buffer.len() as f32 / (decay_secs.max(MIN_DECAY_SECS) * sample_rate);
        self.feedback = 10.0_f32.powf(-3.0 * trips);
    }

    #[inline]
    fn process(&mut self, input: f32, damping: f32, safety: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        self.store = flush_denormal(delayed * (1.0 - damping) + self.store * damping);
        self.buffer[self.pos] = input + self.store * self.feedback * safety;
        self.pos = (self.pos + 1) % self.buffer.len();
        self.store
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
        self.store = 0.0;
    }
}

#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllpassFilter {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, gain: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        let output = -gain * input + delayed;
        self.buffer[self.pos] = flush_denormal(input + output * gain);
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

/// One channel of the network
#[derive(Debug, Clone)]
struct ReverbChannel {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
}

impl ReverbChannel {
    fn new(sample_rate: f32, spread_samples: usize) -> Self {
        Self {
            combs: COMB_DELAYS_MS
                .iter()
                .map(|&ms| CombFilter::new(delay_len(ms, spread_samples, sample_rate)))
                .collect(),
            allpasses: ALLPASS_DELAYS_MS
                .iter()
                .map(|&ms| AllpassFilter::new(delay_len(ms, spread_samples, sample_rate)))
                .collect(),
        }
    }

    fn set_decay(&mut self, decay_secs: f32, sample_rate: f32) {
        for comb in &mut self.combs {
            comb.set_decay(decay_secs, sample_rate);
        }
    }

    #[inline]
    fn process(&mut self, input: f32, damping: f32, safety: f32, allpass_gain: f32) -> f32 {
        let mut sum = 0.0;
        for comb in &mut self.combs {
            sum += comb.process(input, damping, safety);
        }

        let mut wet = sum / self.combs.len() as f32;
        for allpass in &mut self.allpasses {
            wet = allpass.process(wet, allpass_gain);
        }
        wet
    }

    fn clear(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::clear);
        self.allpasses.iter_mut().for_each(AllpassFilter::clear);
    }
}

/// Environment reverb
///
/// `Environment::None` leaves the signal and the network state untouched.
/// Switching from `None` to an environment clears the buffers before the
/// first processed block so no tail from an earlier period comes back.
pub struct ReverbEngine {
    sample_rate: f32,
    mix_dry: f32,
    mix_wet: f32,
    safety: f32,
    allpass_gain: f32,
    environment: Environment,
    params: EnvironmentParams,
    needs_clear: bool,
    left: ReverbChannel,
    right: ReverbChannel,
}

impl ReverbEngine {
    pub fn new(sample_rate: SampleRate, tuning: &PipelineTuning) -> Self {
        let sr = sample_rate.as_f32();
        let spread = sample_rate.samples_for(tuning.reverb_stereo_spread_secs);
        Self {
            sample_rate: sr,
            mix_dry: tuning.reverb_mix_dry,
            mix_wet: tuning.reverb_mix_wet,
            safety: tuning.reverb_safety,
            allpass_gain: tuning.reverb_allpass_gain,
            environment: Environment::None,
            params: Environment::None.params(),
            needs_clear: false,
            left: ReverbChannel::new(sr, 0),
            right: ReverbChannel::new(sr, spread),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn set_environment(&mut self, environment: Environment) {
        if environment == self.environment {
            return;
        }
        debug!(
            "Reverb environment: {} -> {}",
            self.environment.name(),
            environment.name()
        );

        if self.environment == Environment::None {
            self.needs_clear = true;
        }
        self.environment = environment;
        self.params = environment.params();
        self.left.set_decay(self.params.decay_secs, self.sample_rate);
        self.right.set_decay(self.params.decay_secs, self.sample_rate);
    }

    /// Per-comb feedback gains of the left channel
    pub fn comb_feedbacks(&self) -> Vec<f32> {
        self.left.combs.iter().map(|c| c.feedback).collect()
    }
}

impl Effect for ReverbEngine {
    fn configure(&mut self, settings: &EffectSettings) {
        self.set_environment(settings.environment);
    }

    fn process(&mut self, block: &mut [Frame]) {
        if self.is_bypassed() {
            return;
        }
        if self.needs_clear {
            self.reset();
            self.needs_clear = false;
        }

        let EnvironmentParams { wet, damping, .. } = self.params;
        let dry_gain = 1.0 - wet * self.mix_dry;
        let wet_gain = wet * self.mix_wet;

        for frame in block.iter_mut() {
            let wet_left = self.left.process(frame.left, damping, self.safety, self.allpass_gain);
            let wet_right = self.right.process(frame.right, damping, self.safety, self.allpass_gain);

            frame.left = frame.left * dry_gain + wet_left * wet_gain;
            frame.right = frame.right * dry_gain + wet_right * wet_gain;
            frame.clip();
        }
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }

    fn is_bypassed(&self) -> bool {
        self.environment == Environment::None
    }

    fn name(&self) -> &str {
        "Reverb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dsp::biquad::{BiquadCoeffs, BiquadFilter};

    const SR: SampleRate = SampleRate::Hz44100;

    fn reverb(environment: Environment) -> ReverbEngine {
        let mut engine = ReverbEngine::new(SR, &PipelineTuning::default());
        engine.configure(&EffectSettings {
            environment,
            ..EffectSettings::default()
        });
        engine
    }

    /// Left-channel impulse response with the dry impulse removed
    fn wet_impulse_response(environment: Environment, seconds: f32) -> Vec<f32> {
        let mut engine = reverb(environment);
        let mut block = vec![Frame::SILENCE; SR.samples_for(seconds)];
        block[0] = Frame::mono(1.0);
        engine.process(&mut block);

        let mut response: Vec<f32> = block.iter().map(|f| f.left).collect();
        response[0] = 0.0;
        response
    }

    /// -60 dB point of the Schroeder backward-integrated energy curve,
    /// measured in the 500 Hz region where the damping filter is transparent
    fn measured_rt60(response: &[f32]) -> f32 {
        let mut band = BiquadFilter::new(BiquadCoeffs::low_pass(SR.as_f32(), 500.0, 0.707));
        let energy: Vec<f64> = response
            .iter()
            .map(|&x| {
                let y = band.process_sample(x) as f64;
                y * y
            })
            .collect();

        let mut edc = vec![0.0f64; energy.len()];
        let mut acc = 0.0;
        for i in (0..energy.len()).rev() {
            acc += energy[i];
            edc[i] = acc;
        }

        let threshold = edc[0] * 1.0e-6;
        let idx = edc.iter().position(|&e| e <= threshold).unwrap_or(edc.len());
        idx as f32 / SR.as_f32()
    }

    #[test]
    fn test_none_is_identity_and_untouched() {
        let mut engine = reverb(Environment::None);
        assert!(engine.is_bypassed());

        let original: Vec<Frame> = (0..512).map(|i| Frame::new((i as f32 * 0.02).sin() * 0.7, 0.1)).collect();
        let mut block = original.clone();
        engine.process(&mut block);
        assert_eq!(block, original);
        assert!(engine.left.combs.iter().all(|c| c.buffer.iter().all(|&s| s == 0.0)));
    }

    #[test]
    fn test_feedback_from_decay() {
        let engine = reverb(Environment::Hall);
        let decay = Environment::Hall.params().decay_secs;

        for (feedback, comb) in engine.comb_feedbacks().iter().zip(&engine.left.combs) {
            let expected = 10.0_f32.powf(-3.0 * comb.buffer.len() as f32 / (decay * 44100.0));
            assert!((feedback - expected).abs() < 1e-6);
            assert!(*feedback < 1.0);
        }
    }

    #[test]
    fn test_stereo_spread_offsets_right_channel() {
        let engine = reverb(Environment::Room);
        assert_eq!(engine.left.combs[0].buffer.len(), 1310);
        assert!(engine.right.combs[0].buffer.len() > engine.left.combs[0].buffer.len());
    }

    #[test]
    fn test_tail_outlasts_input() {
        let response = wet_impulse_response(Environment::Room, 0.5);
        let tail_energy: f32 = response[SR.samples_for(0.1)..].iter().map(|x| x * x).sum();
        assert!(tail_energy > 0.0);
    }

    #[test]
    fn test_hall_decay_time() {
        let decay = Environment::Hall.params().decay_secs;
        let rt60 = measured_rt60(&wet_impulse_response(Environment::Hall, decay * 1.6));
        assert!(
            (rt60 - decay).abs() <= decay * 0.15,
            "measured {rt60:.3}s for configured {decay:.3}s"
        );
    }

    #[test]
    fn test_church_decay_time() {
        let decay = Environment::Church.params().decay_secs;
        let rt60 = measured_rt60(&wet_impulse_response(Environment::Church, decay * 1.6));
        assert!(
            (rt60 - decay).abs() <= decay * 0.15,
            "measured {rt60:.3}s for configured {decay:.3}s"
        );
    }

    #[test]
    fn test_reentry_clears_old_tail() {
        let mut engine = reverb(Environment::Hall);
        let mut block = vec![Frame::SILENCE; 2048];
        block[0] = Frame::mono(1.0);
        engine.process(&mut block);

        engine.configure(&EffectSettings::default());
        engine.process(&mut vec![Frame::SILENCE; 256]);

        engine.configure(&EffectSettings {
            environment: Environment::Hall,
            ..EffectSettings::default()
        });
        let mut silence = vec![Frame::SILENCE; 4096];
        engine.process(&mut silence);
        assert!(silence.iter().all(|f| *f == Frame::SILENCE));
    }

    #[test]
    fn test_output_is_clipped() {
        let mut engine = reverb(Environment::Church);
        let mut block = vec![Frame::mono(1.0); 44100];
        engine.process(&mut block);
        assert!(block.iter().all(|f| f.peak() <= 1.0));
    }
}
