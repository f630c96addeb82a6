//! Digital Signal Processing stages for the effects pipeline
//!
//! This module provides the building blocks the pipeline composes:
//! - Shelving / band-split biquads with per-channel state
//! - Mid/side stereo spatializer with a side-channel delay line
//! - Bass and treble harmonic enhancers
//! - Peak limiter (lookahead and causal strategies)
//! - Schroeder comb/allpass reverberator
//!
//! All stages are designed for:
//! - Zero allocations in the streaming hot path
//! - Deterministic per-sample recurrences (block size never changes output)
//! - State that survives parameter changes between blocks

pub mod biquad;
pub mod enhancer;
pub mod limiter;
pub mod reverb;
pub mod spatializer;

pub use biquad::{BiquadCoeffs, BiquadFilter, ShelfKind, ShelfStage, StatefulBiquad};
pub use enhancer::HarmonicEnhancer;
pub use limiter::{CausalLimiter, Limiter, LookaheadLimiter};
pub use reverb::ReverbEngine;
pub use spatializer::{DelayLine, StereoSpatializer};

use crate::domain::audio::Frame;
use crate::domain::settings::EffectSettings;

/// Core trait for the settings-driven pipeline stages
///
/// Stages process stereo frames in place. `configure` is called once at the
/// start of every block with the current settings snapshot; the stage caches
/// whatever it derives from it until the next call.
pub trait Effect: Send {
    /// Pick up a new settings snapshot (block boundary only)
    fn configure(&mut self, settings: &EffectSettings);

    /// Process a block of frames in place
    ///
    /// # Requirements
    /// - No allocations
    /// - Exact identity when the stage is bypassed
    /// - Handle blocks of any size
    fn process(&mut self, block: &mut [Frame]);

    /// Clear filter history and delay buffers
    fn reset(&mut self);

    /// Whether the current configuration leaves the signal untouched
    fn is_bypassed(&self) -> bool;

    /// Stage name for logging
    fn name(&self) -> &str;
}

/// Convert a decibel value to linear amplitude
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Flush values small enough to become denormal to zero
#[inline]
pub(crate) fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1.0e-20 {
        0.0
    } else {
        x
    }
}
