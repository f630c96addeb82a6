//! Bass harmonic generator and treble exciter
//!
//! Both paths isolate a band of the mid signal, shape it nonlinearly, and add
//! the result back to both channels. Nothing is subtracted from the dry path.

use super::biquad::{corner_below_nyquist, BiquadCoeffs, BiquadFilter};
use super::Effect;
use crate::domain::audio::{Frame, SampleRate};
use crate::domain::config::PipelineTuning;
use crate::domain::settings::EffectSettings;

const BAND_SPLIT_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

pub struct HarmonicEnhancer {
    bass_threshold: f32,
    treble_threshold: f32,
    exciter_drive: f32,
    bass_amount: f32,
    treble_amount: f32,
    bass_band: BiquadFilter,
    treble_band: BiquadFilter,
}

impl HarmonicEnhancer {
    pub fn new(sample_rate: SampleRate, tuning: &PipelineTuning) -> Self {
        let sr = sample_rate.as_f32();
        Self {
            bass_threshold: tuning.bass_enhance_threshold,
            treble_threshold: tuning.treble_enhance_threshold,
            exciter_drive: tuning.exciter_drive,
            bass_amount: 0.0,
            treble_amount: 0.0,
            bass_band: BiquadFilter::new(BiquadCoeffs::low_pass(
                sr,
                corner_below_nyquist(sr, tuning.bass_enhance_cutoff_hz),
                BAND_SPLIT_Q,
            )),
            treble_band: BiquadFilter::new(BiquadCoeffs::high_pass(
                sr,
                corner_below_nyquist(sr, tuning.treble_enhance_cutoff_hz),
                BAND_SPLIT_Q,
            )),
        }
    }

    pub fn bass_amount(&self) -> f32 {
        self.bass_amount
    }

    pub fn treble_amount(&self) -> f32 {
        self.treble_amount
    }

    /// Odd harmonics from soft saturation, minus the linear part
    #[inline]
    fn bass_harmonics(&mut self, mid: f32) -> f32 {
        let g = self.bass_amount;
        let x = self.bass_band.process_sample(mid);
        let driven = x * (1.0 + 2.0 * g);
        0.5 * g * (driven.tanh() - driven)
    }

    /// Even-order sparkle from the signed square of the high band
    #[inline]
    fn treble_harmonics(&mut self, mid: f32) -> f32 {
        let x = self.treble_band.process_sample(mid);
        x.abs() * x * self.exciter_drive * self.treble_amount
    }
}

impl Effect for HarmonicEnhancer {
    fn configure(&mut self, settings: &EffectSettings) {
        self.bass_amount = if settings.bass > self.bass_threshold {
            (settings.bass - self.bass_threshold) / (100.0 - self.bass_threshold)
        } else {
            0.0
        };
        self.treble_amount = if settings.treble > self.treble_threshold {
            (settings.treble - self.treble_threshold) / (100.0 - self.treble_threshold)
        } else {
            0.0
        };
    }

    fn process(&mut self, block: &mut [Frame]) {
        let bass = self.bass_amount > 0.0;
        let treble = self.treble_amount > 0.0;

        // Inactive bands still filter the mid so a later re-enable starts from current history
        for frame in block.iter_mut() {
            let mid = (frame.left + frame.right) * 0.5;
            let mut added = 0.0;
            if bass {
                added += self.bass_harmonics(mid);
            } else {
                self.bass_band.process_sample(mid);
            }
            if treble {
                added += self.treble_harmonics(mid);
            } else {
                self.treble_band.process_sample(mid);
            }
            if bass || treble {
                frame.left += added;
                frame.right += added;
            }
        }
    }

    fn reset(&mut self) {
        self.bass_band.reset();
        self.treble_band.reset();
    }

    fn is_bypassed(&self) -> bool {
        self.bass_amount <= 0.0 && self.treble_amount <= 0.0
    }

    fn name(&self) -> &str {
        "Harmonic Enhancer"
    }
}
