//! In-process audio driver for headless sessions.
//!
//! Feeds a scripted sequence of capture buffers to the session on a
//! background thread and records every emitted chirp, standing in for
//! the platform audio stack in tests and benchmarks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::audio::{AudioDriver, FrameCallback};
use crate::error::Result;

pub struct SimulatedDriver {
    buffers: Mutex<Vec<Vec<i16>>>,
    /// Pause between delivered buffers; zero delivers as fast as the
    /// receiver accepts.
    delivery_interval: Duration,
    capturing: Arc<AtomicBool>,
    emissions: AtomicU64,
    last_emission: Mutex<Vec<i16>>,
}

impl SimulatedDriver {
    pub fn new(buffers: Vec<Vec<i16>>, delivery_interval: Duration) -> Self {
        Self {
            buffers: Mutex::new(buffers),
            delivery_interval,
            capturing: Arc::new(AtomicBool::new(false)),
            emissions: AtomicU64::new(0),
            last_emission: Mutex::new(Vec::new()),
        }
    }

    pub fn emissions(&self) -> u64 {
        self.emissions.load(Ordering::Relaxed)
    }

    pub fn last_emission(&self) -> Vec<i16> {
        self.last_emission
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// True while the delivery thread is still handing out buffers.
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }
}

impl AudioDriver for SimulatedDriver {
    fn start_capture(&self, mut on_frame: FrameCallback) -> Result<()> {
        let buffers: Vec<Vec<i16>> = match self.buffers.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        let capturing = Arc::clone(&self.capturing);
        capturing.store(true, Ordering::Release);
        let interval = self.delivery_interval;

        std::thread::spawn(move || {
            for buffer in buffers {
                if !capturing.load(Ordering::Acquire) {
                    break;
                }
                on_frame(&buffer);
                if !interval.is_zero() {
                    std::thread::sleep(interval);
                }
            }
            capturing.store(false, Ordering::Release);
        });
        Ok(())
    }

    fn stop_capture(&self) {
        self.capturing.store(false, Ordering::Release);
    }

    fn emit(&self, samples: &[i16]) -> Result<()> {
        self.emissions.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_emission.lock() {
            last.clear();
            last.extend_from_slice(samples);
        }
        Ok(())
    }

    fn release(&self) {
        self.stop_capture();
    }
}
