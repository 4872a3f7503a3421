//! cpal-backed duplex audio driver.
//!
//! cpal streams are not `Send`, so a dedicated worker thread owns both
//! streams and the rest of the system talks to it through a command
//! channel. The output stream pulls from a shared sample queue that
//! `emit` refills once per chirp period; the queue drains to silence
//! between emissions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Sender, bounded};

use crate::config::ChirpConfig;
use crate::error::{Result, SonarError};

use super::driver::{AudioDriver, FrameCallback};

pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| SonarError::AudioDevice(format!("Failed to enumerate devices: {}", e)))?;
    let mut names = Vec::new();
    for device in devices {
        if let Ok(desc) = device.description() {
            names.push(desc.name().to_string());
        }
    }
    Ok(names)
}

enum Command {
    StartCapture(FrameCallback, Sender<Result<()>>),
    StopCapture,
    Emit(Vec<i16>, Sender<Result<()>>),
    Release,
}

pub struct CpalDriver {
    commands: Sender<Command>,
    _worker: JoinHandle<()>,
}

impl CpalDriver {
    pub fn new(config: &ChirpConfig, device_name: Option<&str>) -> Self {
        let (tx, rx) = bounded::<Command>(4);
        let config = config.clone();
        let device_name = device_name.map(str::to_string);

        let worker = std::thread::spawn(move || {
            let mut worker = Worker {
                config,
                device_name,
                input_stream: None,
                output_stream: None,
                playback: Arc::new(Mutex::new(VecDeque::new())),
            };
            while let Ok(command) = rx.recv() {
                match command {
                    Command::StartCapture(callback, reply) => {
                        let _ = reply.send(worker.start_capture(callback));
                    }
                    Command::StopCapture => {
                        worker.input_stream = None;
                    }
                    Command::Emit(samples, reply) => {
                        let _ = reply.send(worker.emit(samples));
                    }
                    Command::Release => break,
                }
            }
        });

        Self {
            commands: tx,
            _worker: worker,
        }
    }

    fn roundtrip(
        &self,
        make: impl FnOnce(Sender<Result<()>>) -> Command,
    ) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands
            .send(make(reply_tx))
            .map_err(|_| SonarError::AudioDevice("Audio worker is gone".into()))?;
        reply_rx
            .recv()
            .map_err(|_| SonarError::AudioDevice("Audio worker is gone".into()))?
    }
}

impl AudioDriver for CpalDriver {
    fn start_capture(&self, on_frame: FrameCallback) -> Result<()> {
        self.roundtrip(|reply| Command::StartCapture(on_frame, reply))
    }

    fn stop_capture(&self) {
        let _ = self.commands.send(Command::StopCapture);
    }

    fn emit(&self, samples: &[i16]) -> Result<()> {
        let samples = samples.to_vec();
        self.roundtrip(|reply| Command::Emit(samples, reply))
    }

    fn release(&self) {
        let _ = self.commands.send(Command::Release);
    }
}

impl Drop for CpalDriver {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Release);
    }
}

struct Worker {
    config: ChirpConfig,
    device_name: Option<String>,
    input_stream: Option<cpal::Stream>,
    output_stream: Option<cpal::Stream>,
    playback: Arc<Mutex<VecDeque<i16>>>,
}

impl Worker {
    fn stream_config(&self, buffer_size: usize) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: 1,
            sample_rate: self.config.sample_rate_hz,
            buffer_size: cpal::BufferSize::Fixed(buffer_size as u32),
        }
    }

    fn find_input_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();
        if let Some(name) = &self.device_name {
            let devices = host.input_devices().map_err(|e| {
                SonarError::AudioDevice(format!("Failed to enumerate devices: {}", e))
            })?;
            for device in devices {
                if let Ok(desc) = device.description()
                    && desc.name().to_lowercase().contains(&name.to_lowercase())
                {
                    return Ok(device);
                }
            }
            Err(SonarError::AudioDevice(format!(
                "No input device matching '{}'",
                name
            )))
        } else {
            host.default_input_device()
                .ok_or_else(|| SonarError::AudioDevice("No input device found".into()))
        }
    }

    fn start_capture(&mut self, mut on_frame: FrameCallback) -> Result<()> {
        let device = self.find_input_device()?;
        match device.description() {
            Ok(desc) => log::info!("Input device: {:?}", desc),
            Err(_) => log::info!("Input device: Unknown"),
        }

        let buffer_size = self.config.capture_buffer_samples();
        let stream = device
            .build_input_stream(
                &self.stream_config(buffer_size),
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    on_frame(data);
                },
                |err| log::error!("Audio input stream error: {}", err),
                None,
            )
            .map_err(|e| SonarError::AudioStream(format!("{}", e)))?;

        // Attempt to promote to real-time priority
        match audio_thread_priority::promote_current_thread_to_real_time(
            buffer_size as u32,
            self.config.sample_rate_hz,
        ) {
            Ok(_handle) => {}
            Err(e) => log::warn!("Could not set real-time priority: {}", e),
        }

        stream
            .play()
            .map_err(|e| SonarError::AudioStream(format!("{}", e)))?;
        self.input_stream = Some(stream);
        Ok(())
    }

    fn ensure_output_stream(&mut self) -> Result<()> {
        if self.output_stream.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SonarError::AudioDevice("No output device found".into()))?;

        let queue = Arc::clone(&self.playback);
        let stream = device
            .build_output_stream(
                &self.stream_config(self.config.capture_buffer_samples()),
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let mut queue = match queue.lock() {
                        Ok(queue) => queue,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    for slot in data.iter_mut() {
                        *slot = queue.pop_front().unwrap_or(0);
                    }
                },
                |err| log::error!("Audio output stream error: {}", err),
                None,
            )
            .map_err(|e| SonarError::AudioStream(format!("{}", e)))?;

        stream
            .play()
            .map_err(|e| SonarError::AudioStream(format!("{}", e)))?;
        self.output_stream = Some(stream);
        Ok(())
    }

    fn emit(&mut self, samples: Vec<i16>) -> Result<()> {
        self.ensure_output_stream()?;
        let mut queue = match self.playback.lock() {
            Ok(queue) => queue,
            Err(poisoned) => poisoned.into_inner(),
        };
        // A stale tail means the output fell behind; start the new
        // chirp cleanly rather than stacking emissions.
        queue.clear();
        queue.extend(samples);
        Ok(())
    }
}
