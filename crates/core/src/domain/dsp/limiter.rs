//! Peak limiting: lookahead for whole buffers, causal for streaming
//!
//! Both strategies share the same gain law. The target gain for a peak is
//! `min(1, ceiling / peak)`. Attack is instant and release is an exponential
//! recovery towards the target.

use super::db_to_gain;
use crate::domain::audio::{Frame, SampleRate};
use crate::domain::config::PipelineTuning;
use std::collections::VecDeque;

/// A gain-riding peak limiter
pub trait Limiter: Send {
    /// Scale the block in place so no sample exceeds the ceiling
    fn limit(&mut self, block: &mut [Frame]);

    /// Linear ceiling
    fn ceiling(&self) -> f32;

    /// Return the gain envelope to unity
    fn reset(&mut self);

    fn name(&self) -> &str;
}

#[inline]
fn target_gain(peak: f32, ceiling: f32) -> f32 {
    if !peak.is_finite() {
        0.0
    } else if peak > ceiling {
        ceiling / peak
    } else {
        1.0
    }
}

/// Instant attack, exponential release
///
/// Written as `target + a * (current - target)` so a settled unity gain stays
/// exactly 1.0.
#[inline]
fn smooth_gain(current: f32, target: f32, release_coeff: f32) -> f32 {
    if target < current {
        target
    } else {
        target + release_coeff * (current - target)
    }
}

fn release_coeff(sample_rate: SampleRate, release_secs: f32) -> f32 {
    let samples = (release_secs * sample_rate.as_f32()).max(f32::EPSILON);
    (-1.0 / samples).exp()
}

#[inline]
fn apply_gain(frame: &mut Frame, gain: f32) {
    frame.scale(gain);
    // Overflowed input turns into inf * 0
    if !frame.left.is_finite() {
        frame.left = 0.0;
    }
    if !frame.right.is_finite() {
        frame.right = 0.0;
    }
    frame.clip();
}

// ============================================================================
// LOOKAHEAD
// ============================================================================

/// Offline limiter that sees the next `lookahead` frames
///
/// The gain for each frame is driven by the loudest peak in the window made
/// of that frame and the frames after it, so reduction is already in place
/// when a transient arrives.
pub struct LookaheadLimiter {
    ceiling: f32,
    lookahead: usize,
    release_coeff: f32,
    gain: f32,
    peaks: Vec<f32>,
    window_max: Vec<f32>,
    window: VecDeque<usize>,
}

impl LookaheadLimiter {
    pub fn new(sample_rate: SampleRate, tuning: &PipelineTuning) -> Self {
        let lookahead = sample_rate.samples_for(tuning.limiter_lookahead_secs).max(1);
        Self {
            ceiling: db_to_gain(tuning.limiter_ceiling_db),
            lookahead,
            release_coeff: release_coeff(sample_rate, tuning.limiter_release_secs),
            gain: 1.0,
            peaks: Vec::new(),
            window_max: Vec::new(),
            window: VecDeque::with_capacity(lookahead + 1),
        }
    }

    pub fn lookahead(&self) -> usize {
        self.lookahead
    }

    /// Forward sliding maximum of the frame peaks
    ///
    /// Walks the block backwards keeping a deque of indices whose peaks are
    /// strictly decreasing, so each index enters and leaves once.
    fn compute_window_max(&mut self, block: &[Frame]) {
        self.peaks.clear();
        self.peaks.extend(block.iter().map(Frame::peak));
        self.window_max.clear();
        self.window_max.resize(block.len(), 0.0);
        self.window.clear();

        for i in (0..block.len()).rev() {
            while let Some(&back) = self.window.back() {
                if self.peaks[back] <= self.peaks[i] {
                    self.window.pop_back();
                } else {
                    break;
                }
            }
            self.window.push_back(i);

            while let Some(&front) = self.window.front() {
                if front >= i + self.lookahead {
                    self.window.pop_front();
                } else {
                    break;
                }
            }

            if let Some(&front) = self.window.front() {
                self.window_max[i] = self.peaks[front];
            }
        }
    }
}

impl Limiter for LookaheadLimiter {
    fn limit(&mut self, block: &mut [Frame]) {
        self.compute_window_max(block);

        for (frame, &peak) in block.iter_mut().zip(&self.window_max) {
            self.gain = smooth_gain(self.gain, target_gain(peak, self.ceiling), self.release_coeff);
            apply_gain(frame, self.gain);
        }
    }

    fn ceiling(&self) -> f32 {
        self.ceiling
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }

    fn name(&self) -> &str {
        "Lookahead Limiter"
    }
}

// ============================================================================
// CAUSAL
// ============================================================================

/// Streaming limiter that only looks at current and past peaks
///
/// The smoothed gain carries across blocks, so splitting a stream into chunks
/// yields the same output as processing it whole.
pub struct CausalLimiter {
    ceiling: f32,
    release_coeff: f32,
    gain: f32,
}

impl CausalLimiter {
    pub fn new(sample_rate: SampleRate, tuning: &PipelineTuning) -> Self {
        Self {
            ceiling: db_to_gain(tuning.limiter_ceiling_db),
            release_coeff: release_coeff(sample_rate, tuning.limiter_release_secs),
            gain: 1.0,
        }
    }

    /// Gain applied to the most recent frame
    pub fn current_gain(&self) -> f32 {
        self.gain
    }
}

impl Limiter for CausalLimiter {
    fn limit(&mut self, block: &mut [Frame]) {
        for frame in block.iter_mut() {
            let target = target_gain(frame.peak(), self.ceiling);
            self.gain = smooth_gain(self.gain, target, self.release_coeff);
            apply_gain(frame, self.gain);
        }
    }

    fn ceiling(&self) -> f32 {
        self.ceiling
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }

    fn name(&self) -> &str {
        "Causal Limiter"
    }
}
