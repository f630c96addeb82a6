//! Dedicated audio thread running the engine's streaming path
//!
//! Chunks travel to and from the thread over bounded crossbeam channels. The
//! control side keeps a handle to the settings store and may update it at
//! any time; changes apply from the next chunk the thread processes.

use super::stream::{Chunker, Result, StreamError};
use crossbeam::channel::{bounded, Receiver, Sender};
use soundstage_core::{AudioError, Engine, Frame, SettingsStore};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Chunks that may be queued in each direction
pub const CHANNEL_DEPTH: usize = 8;

pub struct AudioSession {
    settings: Arc<SettingsStore>,
    chunk_frames: usize,
    input: Option<Sender<Vec<Frame>>>,
    output: Receiver<Vec<Frame>>,
    worker: Option<JoinHandle<Engine>>,
}

impl AudioSession {
    /// Move the engine onto a new audio thread
    pub fn start(engine: Engine) -> Result<Self> {
        let settings = engine.settings_store();
        let chunk_frames = engine.config().chunk_frames;
        let (input_tx, input_rx) = bounded::<Vec<Frame>>(CHANNEL_DEPTH);
        let (output_tx, output_rx) = bounded::<Vec<Frame>>(CHANNEL_DEPTH);

        let worker = thread::Builder::new()
            .name("soundstage-audio".to_string())
            .spawn(move || run_audio_thread(engine, input_rx, output_tx))
            .map_err(|e| StreamError::Thread(e.to_string()))?;

        info!("Audio session started ({} frame chunks)", chunk_frames);

        Ok(Self {
            settings,
            chunk_frames,
            input: Some(input_tx),
            output: output_rx,
            worker: Some(worker),
        })
    }

    /// Settings handle for control threads
    pub fn settings(&self) -> Arc<SettingsStore> {
        Arc::clone(&self.settings)
    }

    pub fn chunk_frames(&self) -> usize {
        self.chunk_frames
    }

    /// Queue a chunk for processing, blocking while the queue is full
    pub fn submit(&self, chunk: Vec<Frame>) -> Result<()> {
        if chunk.is_empty() {
            return Err(AudioError::InvalidBuffer("chunk is empty".to_string()).into());
        }
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| StreamError::Disconnected("session is stopping".to_string()))?;
        input
            .send(chunk)
            .map_err(|_| StreamError::Disconnected("audio thread has exited".to_string()))
    }

    /// Next processed chunk, blocking until one is ready
    pub fn receive(&self) -> Result<Vec<Frame>> {
        self.output
            .recv()
            .map_err(|_| StreamError::Disconnected("audio thread has exited".to_string()))
    }

    pub fn try_receive(&self) -> Option<Vec<Frame>> {
        self.output.try_recv().ok()
    }

    /// Stream a whole signal through the thread in fixed-size chunks
    ///
    /// Keeps at most `CHANNEL_DEPTH` chunks in flight so neither side blocks
    /// forever. The output is trimmed to the input length.
    pub fn process_all(&self, frames: &[Frame]) -> Result<Vec<Frame>> {
        if frames.is_empty() {
            return Err(AudioError::InvalidBuffer("buffer is empty".to_string()).into());
        }

        let chunker = Chunker::new(self.chunk_frames)?;
        let mut output = Vec::with_capacity(chunker.chunk_count(frames.len()) * self.chunk_frames);
        let mut in_flight = 0;

        for chunk in chunker.chunks(frames) {
            self.submit(chunk)?;
            in_flight += 1;
            if in_flight == CHANNEL_DEPTH {
                output.extend(self.receive()?);
                in_flight -= 1;
            }
        }
        while in_flight > 0 {
            output.extend(self.receive()?);
            in_flight -= 1;
        }

        output.truncate(frames.len());
        Ok(output)
    }

    /// Stop the thread and take the engine back
    pub fn stop(mut self) -> Result<Engine> {
        self.shutdown()
            .ok_or_else(|| StreamError::Thread("audio thread already stopped".to_string()))?
    }

    fn shutdown(&mut self) -> Option<Result<Engine>> {
        self.input.take();
        let worker = self.worker.take()?;

        // Drain so the worker never blocks on a full output queue
        let mut dropped = 0;
        while self.output.recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Discarded {} unread chunks on shutdown", dropped);
        }

        let result = worker
            .join()
            .map_err(|_| StreamError::Thread("audio thread panicked".to_string()));
        info!("Audio session stopped");
        Some(result)
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        if let Some(Err(e)) = self.shutdown() {
            warn!("Audio session shutdown failed: {}", e);
        }
    }
}

fn run_audio_thread(
    mut engine: Engine,
    input: Receiver<Vec<Frame>>,
    output: Sender<Vec<Frame>>,
) -> Engine {
    debug!("Audio thread running");
    for mut chunk in input.iter() {
        if let Err(e) = engine.process_chunk(&mut chunk) {
            warn!("Skipping chunk: {}", e);
            continue;
        }
        if output.send(chunk).is_err() {
            break;
        }
    }
    debug!("Audio thread exiting");
    engine
}
