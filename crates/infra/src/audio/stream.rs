//! Fixed-size chunking and the audio callback renderer
//!
//! The engine's streaming path expects fixed-size chunks. `Chunker` cuts an
//! arbitrary-length signal into such chunks, and `RenderCallback` feeds a
//! device-style interleaved buffer from a `FrameFifo`.

use super::lockfree_buffer::FrameFifo;
use soundstage_core::{check_interleaved, AudioError, Engine, Frame};
use thiserror::Error;
use tracing::debug;

/// Errors from the real-time plumbing
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Engine error: {0}")]
    Engine(#[from] AudioError),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    #[error("Stream disconnected: {0}")]
    Disconnected(String),

    #[error("Audio thread error: {0}")]
    Thread(String),

    #[error("Device error: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// Splits signals into fixed-size chunks
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_frames: usize,
}

impl Chunker {
    pub fn new(chunk_frames: usize) -> Result<Self> {
        if chunk_frames == 0 {
            return Err(StreamError::InvalidChunkSize(chunk_frames));
        }
        Ok(Self { chunk_frames })
    }

    pub fn chunk_frames(&self) -> usize {
        self.chunk_frames
    }

    /// Number of chunks needed for `len` frames
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_frames)
    }

    /// Chunks of exactly `chunk_frames`; the last one is zero-padded
    pub fn chunks<'a>(&self, frames: &'a [Frame]) -> impl Iterator<Item = Vec<Frame>> + 'a {
        let size = self.chunk_frames;
        frames.chunks(size).map(move |chunk| {
            let mut block = Vec::with_capacity(size);
            block.extend_from_slice(chunk);
            block.resize(size, Frame::SILENCE);
            block
        })
    }

    /// Run a whole signal through the engine's streaming path
    ///
    /// The output has the same length as the input; padding is trimmed.
    pub fn process(&self, engine: &mut Engine, frames: &[Frame]) -> Result<Vec<Frame>> {
        if frames.is_empty() {
            return Err(AudioError::InvalidBuffer("buffer is empty".to_string()).into());
        }

        let mut output = Vec::with_capacity(self.chunk_count(frames.len()) * self.chunk_frames);
        for mut block in self.chunks(frames) {
            engine.process_chunk(&mut block)?;
            output.extend_from_slice(&block);
        }
        output.truncate(frames.len());

        debug!(
            "Streamed {} frames in {} chunks",
            frames.len(),
            self.chunk_count(frames.len())
        );
        Ok(output)
    }
}

/// Pulls frames from a FIFO, processes them and writes interleaved output
///
/// Suitable as the body of a device output callback: no allocation after
/// construction, silence on underrun.
pub struct RenderCallback {
    engine: Engine,
    fifo: FrameFifo,
    block: Vec<Frame>,
}

impl RenderCallback {
    pub fn new(engine: Engine, fifo: FrameFifo) -> Self {
        let chunk_frames = engine.config().chunk_frames;
        Self {
            engine,
            fifo,
            block: vec![Frame::SILENCE; chunk_frames],
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Fill an interleaved stereo buffer
    pub fn render(&mut self, out: &mut [f32]) -> Result<()> {
        check_interleaved(out.len())?;

        let chunk_samples = self.block.len() * 2;
        for piece in out.chunks_mut(chunk_samples) {
            let frames = piece.len() / 2;
            let block = &mut self.block[..frames];

            self.fifo.pop_into(block);
            self.engine.process_chunk(block)?;

            for (pair, frame) in piece.chunks_exact_mut(2).zip(block.iter()) {
                pair[0] = frame.left;
                pair[1] = frame.right;
            }
        }
        Ok(())
    }

    pub fn into_engine(self) -> Engine {
        self.engine
    }
}
