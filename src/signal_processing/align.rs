//! Echo alignment: latency removal and Doppler compensation.
//!
//! Each analysis frame carries the echo of a chirp emitted one period
//! earlier, offset by the fixed speaker-to-microphone latency. The
//! aligner first strips that offset so the echo sits at the frame
//! origin, then estimates the reflector velocity and resamples the
//! frame to undo the echo's time dilation.

use num_complex::Complex64;

use crate::config::{ChirpConfig, DopplerConfig, ProcessingConfig};
use crate::constants::{SPEED_OF_SOUND_M_S, ZERO_FRAME_EPSILON};
use crate::signal_processing::doppler::{DopplerSearch, VelocityEstimate};
use crate::signal_processing::sample_fractional;

/// A latency-stripped, Doppler-compensated frame together with the
/// velocity estimate that produced it.
pub struct AlignedFrame {
    pub samples: Vec<Complex64>,
    /// Velocity after reliability gating and clamping, m/s
    pub velocity_m_s: f64,
    pub estimate: VelocityEstimate,
}

pub struct EchoAligner {
    latency_samples: usize,
    weakness_threshold: f64,
    reliability_threshold: f64,
    max_velocity_m_s: f64,
}

impl EchoAligner {
    pub fn new(chirp: &ChirpConfig, processing: &ProcessingConfig, doppler: &DopplerConfig) -> Self {
        Self {
            latency_samples: chirp.latency_samples(),
            weakness_threshold: processing.weakness_threshold,
            reliability_threshold: doppler.reliability_threshold,
            max_velocity_m_s: doppler.max_velocity_m_s,
        }
    }

    /// Align one preprocessed frame. The velocity search runs against
    /// the supplied analytic reference; `search` carries the EMA state
    /// across frames.
    pub fn align(
        &self,
        frame: &[Complex64],
        search: &mut DopplerSearch,
        reference: &[Complex64],
    ) -> AlignedFrame {
        let stripped = self.strip_latency(frame);

        let estimate = search.search(&stripped, reference);
        let velocity = self.gate_velocity(&estimate);

        let samples = self.compensate(&stripped, velocity);

        AlignedFrame {
            samples,
            velocity_m_s: velocity,
            estimate,
        }
    }

    /// Left-shift the frame by the configured latency, reduced into the
    /// current emission window; trailing positions are zero-filled.
    pub fn strip_latency(&self, frame: &[Complex64]) -> Vec<Complex64> {
        if frame.is_empty() {
            return Vec::new();
        }
        let shift = self.latency_samples % frame.len();
        let mut out = Vec::with_capacity(frame.len());
        out.extend_from_slice(&frame[shift..]);
        out.resize(frame.len(), Complex64::new(0.0, 0.0));
        out
    }

    /// Reliability gate and clamp: low correlation forces zero, the
    /// magnitude is capped before use downstream.
    fn gate_velocity(&self, estimate: &VelocityEstimate) -> f64 {
        if estimate.correlation < self.reliability_threshold {
            return 0.0;
        }
        estimate
            .smoothed_m_s
            .clamp(-self.max_velocity_m_s, self.max_velocity_m_s)
    }

    /// Resample the frame at `i * s` with `s = 1 + v/c`, undoing the
    /// echo's time dilation. A weak input, or a warp that produces
    /// nothing but zeros, falls back to the unwarped frame.
    fn compensate(&self, frame: &[Complex64], velocity_m_s: f64) -> Vec<Complex64> {
        let peak = frame.iter().map(|c| c.norm()).fold(0.0, f64::max);
        if peak < self.weakness_threshold {
            return frame.to_vec();
        }

        let scale = 1.0 + velocity_m_s / SPEED_OF_SOUND_M_S;
        let warped: Vec<Complex64> = (0..frame.len())
            .map(|i| sample_fractional(frame, i as f64 * scale))
            .collect();

        let warped_peak = warped.iter().map(|c| c.norm()).fold(0.0, f64::max);
        if warped_peak < ZERO_FRAME_EPSILON {
            return frame.to_vec();
        }
        warped
    }
}
