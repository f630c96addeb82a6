//! CPAL output device playback
//!
//! Opens the default output device at the engine's sample rate and drives a
//! [`RenderCallback`] from the device callback. Only built with the `device`
//! feature.

use super::lockfree_buffer::FrameFifo;
use super::stream::{RenderCallback, Result, StreamError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig as CpalStreamConfig};
use soundstage_core::Engine;
use std::sync::Arc;
use tracing::{error, info};

/// A running output stream; playback stops when dropped
pub struct OutputStream {
    _stream: Stream,
    fifo: FrameFifo,
    settings: Arc<soundstage_core::SettingsStore>,
    device_name: String,
}

impl OutputStream {
    /// Start playing on the default output device
    ///
    /// Frames pushed into the returned stream's FIFO are processed by the
    /// engine inside the device callback.
    pub fn open_default(engine: Engine, fifo_frames: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| StreamError::Device("No default output device".to_string()))?;

        #[allow(deprecated)]
        let device_name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());

        let sample_rate = engine.sample_rate().hz();
        info!(
            "Opening output stream: device={}, rate={}Hz",
            device_name, sample_rate
        );

        let cpal_config = CpalStreamConfig {
            channels: 2,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let fifo = FrameFifo::with_capacity(fifo_frames);
        let settings = engine.settings_store();
        let mut callback = RenderCallback::new(engine, fifo.clone());

        let stream = device
            .build_output_stream(
                &cpal_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if let Err(e) = callback.render(data) {
                        error!("Render error: {}", e);
                        data.fill(0.0);
                    }
                },
                |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| StreamError::Device(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| StreamError::Device(format!("Failed to start stream: {}", e)))?;

        Ok(Self {
            _stream: stream,
            fifo,
            settings,
            device_name,
        })
    }

    /// Producer side of the playback queue
    pub fn fifo(&self) -> &FrameFifo {
        &self.fifo
    }

    pub fn settings(&self) -> Arc<soundstage_core::SettingsStore> {
        Arc::clone(&self.settings)
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}
