//! Second-order sections: coefficient design, per-channel state, shelf stages

use super::{flush_denormal, Effect};
use crate::domain::audio::{Frame, SampleRate};
use crate::domain::config::PipelineTuning;
use crate::domain::settings::EffectSettings;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use tracing::{debug, trace};

// ============================================================================
// COEFFICIENT DESIGN
// ============================================================================

/// Normalized biquad coefficients (a0 = 1)
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    /// Unity gain passthrough
    fn default() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

/// Highest corner frequency, as a fraction of the sample rate, the stages design for
const MAX_CORNER_RATIO: f32 = 0.45;

/// Pull a fixed corner frequency under Nyquist for low sample rates
///
/// Cookbook designs at or above sr/2 have poles outside the unit circle.
pub fn corner_below_nyquist(sample_rate: f32, freq: f32) -> f32 {
    freq.min(sample_rate * MAX_CORNER_RATIO)
}

/// Intermediate cookbook terms shared by every design
struct Prewarp {
    cos_w: f32,
    alpha: f32,
}

impl Prewarp {
    fn new(sample_rate: f32, freq: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate;
        Self {
            cos_w: w0.cos(),
            alpha: w0.sin() / (2.0 * q),
        }
    }
}

impl BiquadCoeffs {
    /// Low-shelf filter (RBJ cookbook)
    ///
    /// `gain_db` is used as given; large boosts or cuts are not clamped.
    pub fn low_shelf(sample_rate: f32, freq: f32, gain_db: f32, q: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let Prewarp { cos_w, alpha } = Prewarp::new(sample_rate, freq, q);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let b0 = a * ((a + 1.0) - (a - 1.0) * cos_w + two_sqrt_a_alpha);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w);
        let b2 = a * ((a + 1.0) - (a - 1.0) * cos_w - two_sqrt_a_alpha);
        let a0 = (a + 1.0) + (a - 1.0) * cos_w + two_sqrt_a_alpha;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos_w);
        let a2 = (a + 1.0) + (a - 1.0) * cos_w - two_sqrt_a_alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// High-shelf filter (RBJ cookbook)
    pub fn high_shelf(sample_rate: f32, freq: f32, gain_db: f32, q: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let Prewarp { cos_w, alpha } = Prewarp::new(sample_rate, freq, q);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let b0 = a * ((a + 1.0) + (a - 1.0) * cos_w + two_sqrt_a_alpha);
        let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w);
        let b2 = a * ((a + 1.0) + (a - 1.0) * cos_w - two_sqrt_a_alpha);
        let a0 = (a + 1.0) - (a - 1.0) * cos_w + two_sqrt_a_alpha;
        let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos_w);
        let a2 = (a + 1.0) - (a - 1.0) * cos_w - two_sqrt_a_alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Second-order low-pass (RBJ cookbook)
    pub fn low_pass(sample_rate: f32, freq: f32, q: f32) -> Self {
        let Prewarp { cos_w, alpha } = Prewarp::new(sample_rate, freq, q);
        let b1 = 1.0 - cos_w;
        Self::normalized(
            b1 / 2.0,
            b1,
            b1 / 2.0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        )
    }

    /// Second-order high-pass (RBJ cookbook)
    pub fn high_pass(sample_rate: f32, freq: f32, q: f32) -> Self {
        let Prewarp { cos_w, alpha } = Prewarp::new(sample_rate, freq, q);
        let b0 = (1.0 + cos_w) / 2.0;
        Self::normalized(
            b0,
            -(1.0 + cos_w),
            b0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        )
    }

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Second-order-section layout `[b0, b1, b2, 1, a1, a2]`
    pub fn as_sos(&self) -> [f32; 6] {
        [self.b0, self.b1, self.b2, 1.0, self.a1, self.a2]
    }

    /// Magnitude response at `freq`, for analysis and tests
    pub fn magnitude_at(&self, sample_rate: f32, freq: f32) -> f32 {
        let w = 2.0 * PI * freq / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }
}

// ============================================================================
// FILTER STATE
// ============================================================================

/// Single-channel biquad in Direct Form I
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    // Previous input samples (x[n-1], x[n-2])
    x1: f32,
    x2: f32,
    // Previous output samples (y[n-1], y[n-2])
    y1: f32,
    y2: f32,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Unity gain passthrough
    pub fn bypass() -> Self {
        Self::new(BiquadCoeffs::default())
    }

    /// Swap coefficients; history is kept so the output stays continuous
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
        let y = self.coeffs.b0 * x + self.coeffs.b1 * self.x1 + self.coeffs.b2 * self.x2
            - self.coeffs.a1 * self.y1
            - self.coeffs.a2 * self.y2;
        let y = flush_denormal(y);

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    /// Shift a sample through the history as if the filter were unity gain
    #[inline]
    pub fn track_sample(&mut self, x: f32) {
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = x;
    }

    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// One second-order section applied to both channels, each with its own history
#[derive(Debug, Clone)]
pub struct StatefulBiquad {
    left: BiquadFilter,
    right: BiquadFilter,
}

impl StatefulBiquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            left: BiquadFilter::new(coeffs),
            right: BiquadFilter::new(coeffs),
        }
    }

    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.left.set_coeffs(coeffs);
        self.right.set_coeffs(coeffs);
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        self.left.coeffs()
    }

    pub fn process(&mut self, block: &mut [Frame]) {
        for frame in block.iter_mut() {
            frame.left = self.left.process_sample(frame.left);
            frame.right = self.right.process_sample(frame.right);
        }
    }

    /// Feed the block into the history without altering it
    pub fn track(&mut self, block: &[Frame]) {
        for frame in block {
            self.left.track_sample(frame.left);
            self.right.track_sample(frame.right);
        }
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

// ============================================================================
// SHELF STAGE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelfKind {
    Low,
    High,
}

/// Tone control shelf with cached coefficients
///
/// The requested gain is stored and a dirty flag raised when it changes;
/// coefficients are recomputed once at the start of the next block.
pub struct ShelfStage {
    kind: ShelfKind,
    sample_rate: f32,
    corner_hz: f32,
    q: f32,
    db_per_step: f32,
    bypass_db: f32,
    gain_db: f32,
    dirty: bool,
    filter: StatefulBiquad,
}

impl ShelfStage {
    pub fn new(kind: ShelfKind, sample_rate: SampleRate, corner_hz: f32, tuning: &PipelineTuning) -> Self {
        let sr = sample_rate.as_f32();
        let corner = corner_below_nyquist(sr, corner_hz);
        if corner < corner_hz {
            debug!(
                "{:?} shelf corner {:.0}Hz lowered to {:.0}Hz at {}Hz",
                kind, corner_hz, corner, sample_rate.hz()
            );
        }
        Self {
            kind,
            sample_rate: sr,
            corner_hz: corner,
            q: tuning.shelf_q,
            db_per_step: tuning.shelf_db_per_step,
            bypass_db: tuning.shelf_bypass_db,
            gain_db: 0.0,
            dirty: false,
            filter: StatefulBiquad::new(BiquadCoeffs::default()),
        }
    }

    /// Low shelf driven by the `bass` setting
    pub fn bass(sample_rate: SampleRate, tuning: &PipelineTuning) -> Self {
        Self::new(ShelfKind::Low, sample_rate, tuning.bass_shelf_hz, tuning)
    }

    /// High shelf driven by the `treble` setting
    pub fn treble(sample_rate: SampleRate, tuning: &PipelineTuning) -> Self {
        Self::new(ShelfKind::High, sample_rate, tuning.treble_shelf_hz, tuning)
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Request a new gain; takes effect at the next `process`
    pub fn set_gain_db(&mut self, gain_db: f32) {
        if gain_db.to_bits() != self.gain_db.to_bits() {
            self.gain_db = gain_db;
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        if self.is_bypassed() {
            return;
        }

        let coeffs = match self.kind {
            ShelfKind::Low => {
                BiquadCoeffs::low_shelf(self.sample_rate, self.corner_hz, self.gain_db, self.q)
            }
            ShelfKind::High => {
                BiquadCoeffs::high_shelf(self.sample_rate, self.corner_hz, self.gain_db, self.q)
            }
        };
        self.filter.set_coeffs(coeffs);

        trace!(
            "Shelf {:?} coefficients updated: corner={:.0}Hz gain={:.2}dB",
            self.kind,
            self.corner_hz,
            self.gain_db
        );
    }
}

impl Effect for ShelfStage {
    fn configure(&mut self, settings: &EffectSettings) {
        let position = match self.kind {
            ShelfKind::Low => settings.bass,
            ShelfKind::High => settings.treble,
        };
        self.set_gain_db((position - 50.0) * self.db_per_step);
    }

    fn process(&mut self, block: &mut [Frame]) {
        self.refresh();
        if self.is_bypassed() {
            self.filter.track(block);
        } else {
            self.filter.process(block);
        }
    }

    fn reset(&mut self) {
        self.filter.reset();
    }

    fn is_bypassed(&self) -> bool {
        self.gain_db.abs() < self.bypass_db
    }

    fn name(&self) -> &str {
        match self.kind {
            ShelfKind::Low => "Bass Shelf",
            ShelfKind::High => "Treble Shelf",
        }
    }
}
