//! Microphone capture via cpal

use super::{AudioHost, CaptureStream};
use crate::error::{SayResult, SayboardError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

const CHUNK_SIZE: u32 = 1024;

#[derive(Debug, Clone, Default)]
pub struct CpalHost {
    device_index: Option<usize>,
}

impl CpalHost {
    pub fn new(device_index: Option<usize>) -> Self {
        Self { device_index }
    }

    fn select_device(&self) -> SayResult<cpal::Device> {
        let host = cpal::default_host();

        debug!("Available audio input devices:");
        for (i, device) in host.input_devices().map_err(busy)?.enumerate() {
            let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
            let marker = if self.device_index == Some(i) { "*" } else { " " };
            debug!("  {} [{}] {}", marker, i, name);
        }

        match self.device_index {
            Some(idx) => host
                .input_devices()
                .map_err(busy)?
                .nth(idx)
                .ok_or_else(|| busy(format!("Device index {} out of range", idx))),
            None => host
                .default_input_device()
                .ok_or_else(|| busy("No default input device")),
        }
    }
}

fn busy(reason: impl std::fmt::Display) -> SayboardError {
    SayboardError::MicrophoneBusy(reason.to_string())
}

struct CpalStream {
    stream: Option<cpal::Stream>,
}

impl CaptureStream for CpalStream {
    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Pausing stream before drop failed: {}", e);
            }
            // Dropping the stream drops the callback and with it the sender
            drop(stream);
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl AudioHost for CpalHost {
    fn open_input(
        &self,
        sample_rate: u32,
        sink: Sender<Vec<i16>>,
    ) -> SayResult<Box<dyn CaptureStream>> {
        let device = self.select_device()?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("🎙️ Using audio device: {}", device_name);

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Fixed(CHUNK_SIZE),
        };

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    // Receiver gone means the session is shutting down
                    let _ = sink.send(data.to_vec());
                },
                |err| {
                    warn!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(busy)?;

        stream.play().map_err(busy)?;

        Ok(Box::new(CpalStream {
            stream: Some(stream),
        }))
    }
}
