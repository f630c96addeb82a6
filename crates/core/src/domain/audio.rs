//! Audio sample types, PCM conversions and the engine error type
//!
//! Samples travel through the engine as stereo [`Frame`]s of `f32` normalized
//! to [-1.0, 1.0]. 16-bit integers only appear at I/O boundaries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the effects engine
#[derive(Debug, Error)]
pub enum AudioError {
    /// Engine could not be constructed (e.g. zero sample rate)
    #[error("Construction error: {0}")]
    Construction(String),

    /// Preset or environment name is not in the lookup table
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// Block is empty or its channels have mismatched lengths
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    /// Serialized settings or configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Full-scale value used for 16-bit conversions
pub const I16_SCALE: f32 = 32768.0;

/// One stereo sample pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    pub const SILENCE: Frame = Frame { left: 0.0, right: 0.0 };

    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Same value on both channels
    pub const fn mono(value: f32) -> Self {
        Self { left: value, right: value }
    }

    /// Larger of the two absolute channel values
    #[inline]
    pub fn peak(&self) -> f32 {
        self.left.abs().max(self.right.abs())
    }

    #[inline]
    pub fn scale(&mut self, gain: f32) {
        self.left *= gain;
        self.right *= gain;
    }

    /// Hard clip both channels to the representable range
    #[inline]
    pub fn clip(&mut self) {
        self.left = self.left.clamp(-1.0, 1.0);
        self.right = self.right.clamp(-1.0, 1.0);
    }

    /// Convert from a 16-bit sample pair
    #[inline]
    pub fn from_i16(left: i16, right: i16) -> Self {
        Self {
            left: left as f32 / I16_SCALE,
            right: right as f32 / I16_SCALE,
        }
    }

    /// Quantize to a 16-bit sample pair (rounded, saturating)
    #[inline]
    pub fn to_i16(&self) -> (i16, i16) {
        (quantize_i16(self.left), quantize_i16(self.right))
    }
}

#[inline]
fn quantize_i16(sample: f32) -> i16 {
    (sample * I16_SCALE).round().clamp(-32768.0, 32767.0) as i16
}

/// Audio sample rate in Hz
///
/// Fixed at engine construction; every delay buffer is sized from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRate {
    Hz44100,
    Hz48000,
    Hz96000,
    Custom(u32),
}

impl SampleRate {
    pub fn hz(&self) -> u32 {
        match self {
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
            SampleRate::Hz96000 => 96000,
            SampleRate::Custom(hz) => *hz,
        }
    }

    /// Validate a raw rate; zero is rejected
    pub fn from_hz(hz: u32) -> Result<Self> {
        match hz {
            0 => Err(AudioError::Construction(
                "sample rate must be greater than zero".to_string(),
            )),
            44100 => Ok(SampleRate::Hz44100),
            48000 => Ok(SampleRate::Hz48000),
            96000 => Ok(SampleRate::Hz96000),
            hz => Ok(SampleRate::Custom(hz)),
        }
    }

    pub fn as_f32(&self) -> f32 {
        self.hz() as f32
    }

    /// Number of whole samples in `seconds` (truncated)
    pub fn samples_for(&self, seconds: f32) -> usize {
        (seconds.max(0.0) * self.as_f32()) as usize
    }
}

/// Convert interleaved stereo `f32` samples into frames
pub fn frames_from_interleaved(samples: &[f32]) -> Result<Vec<Frame>> {
    check_interleaved(samples.len())?;
    Ok(samples
        .chunks_exact(2)
        .map(|pair| Frame::new(pair[0], pair[1]))
        .collect())
}

/// Convert interleaved stereo 16-bit samples into frames
pub fn frames_from_i16(samples: &[i16]) -> Result<Vec<Frame>> {
    check_interleaved(samples.len())?;
    Ok(samples
        .chunks_exact(2)
        .map(|pair| Frame::from_i16(pair[0], pair[1]))
        .collect())
}

/// Flatten frames into interleaved 16-bit samples
pub fn frames_to_i16(frames: &[Frame]) -> Vec<i16> {
    let mut out = Vec::with_capacity(frames.len() * 2);
    for frame in frames {
        let (left, right) = frame.to_i16();
        out.push(left);
        out.push(right);
    }
    out
}

/// Flatten frames into interleaved `f32` samples
pub fn frames_to_interleaved(frames: &[Frame]) -> Vec<f32> {
    frames.iter().flat_map(|f| [f.left, f.right]).collect()
}

/// Reject empty or odd-length interleaved stereo buffers
pub fn check_interleaved(len: usize) -> Result<()> {
    if len == 0 {
        return Err(AudioError::InvalidBuffer("buffer is empty".to_string()));
    }
    if len % 2 != 0 {
        return Err(AudioError::InvalidBuffer(format!(
            "interleaved stereo buffer has odd length {len}"
        )));
    }
    Ok(())
}
