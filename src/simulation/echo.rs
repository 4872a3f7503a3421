//! Synthetic echo frames for headless testing.
//!
//! Frames are built exactly as the live capture path sees them: the
//! emitted chirp, time-dilated by the reflector velocity, arriving at
//! the device-latency offset within the emission window.

use num_complex::Complex64;
use rand_chacha::ChaCha8Rng;

use crate::config::SonarConfig;
use crate::signal_processing::ChirpSynthesizer;
use crate::signal_processing::doppler::warp_as_echo;

use super::noise::apply_awgn;

pub struct EchoSimulator {
    reference: Vec<Complex64>,
    frame_samples: usize,
    echo_offset: usize,
}

impl EchoSimulator {
    pub fn new(config: &SonarConfig) -> Self {
        let synthesizer = ChirpSynthesizer::new(&config.chirp);
        let frame_samples = config.chirp.frame_samples();
        Self {
            reference: synthesizer.analytic_reference(),
            frame_samples,
            echo_offset: config.chirp.latency_samples() % frame_samples,
        }
    }

    /// One noise-free capture frame containing the echo of a reflector
    /// moving at `velocity_m_s`, scaled by `amplitude` (1.0 = full
    /// emission level).
    pub fn frame(&self, velocity_m_s: f64, amplitude: f64) -> Vec<i16> {
        let echo = warp_as_echo(&self.reference, velocity_m_s);
        let mut frame = vec![0i16; self.frame_samples];
        for (i, value) in echo.iter().enumerate() {
            let position = self.echo_offset + i;
            if position >= frame.len() {
                break;
            }
            frame[position] = (value.re * amplitude)
                .round()
                .clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        }
        frame
    }

    /// Like [`frame`](Self::frame), with white noise at the given SNR.
    pub fn noisy_frame(
        &self,
        velocity_m_s: f64,
        amplitude: f64,
        snr_db: f64,
        rng: &mut ChaCha8Rng,
    ) -> Vec<i16> {
        let mut frame = self.frame(velocity_m_s, amplitude);
        apply_awgn(&mut frame, snr_db, rng);
        frame
    }

    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    pub fn echo_offset(&self) -> usize {
        self.echo_offset
    }
}
