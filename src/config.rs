//! Configuration for the SONDAR acoustic imaging system.
//!
//! All numeric parameters of the pipeline live here and are injected into
//! the components at construction; nothing below is hard-coded twice.
//! `SonarConfig::default()` reproduces the reference device setup
//! (48 kHz, 15–17 kHz chirp band, 10 Hz emission). A partial TOML file
//! can override any subset of fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SonarError};

/// System-wide configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SonarConfig {
    pub chirp: ChirpConfig,
    pub doppler: DopplerConfig,
    pub processing: ProcessingConfig,
    pub physical: PhysicalConfig,
}

/// Chirp emission and capture timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChirpConfig {
    pub sample_rate_hz: u32,
    /// Lower edge of the FM sweep in Hz
    pub f_lo_hz: f64,
    /// Upper edge of the FM sweep in Hz
    pub f_hi_hz: f64,
    /// Chirp duration in milliseconds
    pub chirp_ms: f64,
    /// Silence between consecutive chirps in milliseconds
    pub inter_chirp_gap_ms: f64,
    /// Fixed speaker-to-microphone loopback latency in milliseconds
    pub device_latency_ms: f64,
    /// Emission period in milliseconds (one analysis frame per period)
    pub emit_period_ms: f64,
    /// Emission amplitude as a fraction of i16::MAX
    pub amplitude: f64,
}

/// Doppler velocity search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DopplerConfig {
    /// Coarse sweep covers [-span, +span] m/s
    pub search_span_m_s: f64,
    /// Number of coarse velocity hypotheses
    pub coarse_steps: usize,
    /// Number of refinement hypotheses around the coarse argmax
    pub refine_steps: usize,
    /// Refinement sweep covers argmax +/- this span in m/s
    pub refine_span_m_s: f64,
    /// EMA weight of the newest measurement
    pub ema_alpha: f64,
    /// Correlation scores below this force the velocity to zero
    pub reliability_threshold: f64,
    /// Velocity magnitude is clamped to this before use downstream
    pub max_velocity_m_s: f64,
}

/// Per-frame signal-processing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Bandpass FIR kernel length (must be odd)
    pub fir_taps: usize,
    /// STFT window length (must be a power of two)
    pub stft_window: usize,
    /// STFT hop in samples
    pub stft_hop: usize,
    /// Leaky-mean background update weight
    pub background_alpha: f64,
    /// Frames whose peak magnitude falls below this bypass alignment
    pub weakness_threshold: f64,
    /// Apply the bandpass filter twice in preprocess, for parity with
    /// device firmware that filters on both the capture and the
    /// processing path
    pub double_bandpass: bool,
}

/// Physical-space mapping and size extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalConfig {
    /// Angular aperture assumed when fewer than three distance
    /// estimates are available, in degrees
    pub default_aperture_deg: f64,
    /// Lower clamp on the estimated aperture, in degrees
    pub min_aperture_deg: f64,
    /// Object boundary threshold as a fraction of the peak intensity
    pub boundary_threshold_ratio: f32,
    /// Peaks below this intensity yield no size estimate
    pub min_peak_intensity: f32,
    /// Reported dimensions are capped at this many millimetres
    pub max_dimension_mm: f64,
}

impl Default for ChirpConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 48_000,
            f_lo_hz: 15_000.0,
            f_hi_hz: 17_000.0,
            chirp_ms: 20.0,
            inter_chirp_gap_ms: 20.0,
            device_latency_ms: 132.78,
            emit_period_ms: 100.0,
            amplitude: 0.8,
        }
    }
}

impl Default for DopplerConfig {
    fn default() -> Self {
        Self {
            search_span_m_s: 5.0,
            coarse_steps: 41,
            refine_steps: 10,
            refine_span_m_s: 0.5,
            ema_alpha: 0.3,
            reliability_threshold: 1e6,
            max_velocity_m_s: 10.0,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            fir_taps: 101,
            stft_window: 512,
            stft_hop: 16,
            background_alpha: 0.05,
            weakness_threshold: 100.0,
            double_bandpass: false,
        }
    }
}

impl Default for PhysicalConfig {
    fn default() -> Self {
        Self {
            default_aperture_deg: 15.0,
            min_aperture_deg: 1.0,
            boundary_threshold_ratio: 0.3,
            min_peak_intensity: 0.001,
            max_dimension_mm: 1000.0,
        }
    }
}

impl ChirpConfig {
    /// Number of samples in one chirp
    pub fn chirp_samples(&self) -> usize {
        (self.sample_rate_hz as f64 * self.chirp_ms / 1000.0).round() as usize
    }

    /// Number of samples in one capture buffer delivered by the driver
    pub fn capture_buffer_samples(&self) -> usize {
        self.sample_rate_hz as usize / 50
    }

    /// Number of samples in one analysis frame (one emission period)
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate_hz as f64 * self.emit_period_ms / 1000.0).round() as usize
    }

    /// Configured loopback latency expressed in samples
    pub fn latency_samples(&self) -> usize {
        (self.device_latency_ms * self.sample_rate_hz as f64 / 1000.0).round() as usize
    }

    /// Sweep bandwidth in Hz
    pub fn bandwidth_hz(&self) -> f64 {
        self.f_hi_hz - self.f_lo_hz
    }
}

impl SonarConfig {
    /// Load configuration from a TOML file; missing fields fall back to
    /// the defaults.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: SonarConfig = toml::from_str(&text)
            .map_err(|e| SonarError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the cross-parameter invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        let nyquist = self.chirp.sample_rate_hz as f64 / 2.0;
        if self.chirp.f_lo_hz <= 0.0
            || self.chirp.f_lo_hz >= self.chirp.f_hi_hz
            || self.chirp.f_hi_hz >= nyquist
        {
            return Err(SonarError::Config(format!(
                "chirp band {}-{} Hz must satisfy 0 < f_lo < f_hi < {} Hz",
                self.chirp.f_lo_hz, self.chirp.f_hi_hz, nyquist
            )));
        }
        if self.chirp.chirp_ms <= 0.0 || self.chirp.emit_period_ms <= 0.0 {
            return Err(SonarError::Config(
                "chirp_ms and emit_period_ms must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.chirp.amplitude) {
            return Err(SonarError::Config(format!(
                "amplitude {} must lie in [0, 1]",
                self.chirp.amplitude
            )));
        }
        if !self.processing.stft_window.is_power_of_two() {
            return Err(SonarError::Config(format!(
                "stft_window {} must be a power of two",
                self.processing.stft_window
            )));
        }
        if self.processing.stft_hop == 0 {
            return Err(SonarError::Config("stft_hop must be positive".into()));
        }
        if self.processing.fir_taps.is_multiple_of(2) || self.processing.fir_taps < 3 {
            return Err(SonarError::Config(format!(
                "fir_taps {} must be odd and at least 3",
                self.processing.fir_taps
            )));
        }
        if !(0.0..1.0).contains(&self.processing.background_alpha) {
            return Err(SonarError::Config(format!(
                "background_alpha {} must lie in [0, 1)",
                self.processing.background_alpha
            )));
        }
        if self.doppler.coarse_steps < 2 || self.doppler.refine_steps < 2 {
            return Err(SonarError::Config(
                "doppler sweep needs at least two hypotheses".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.doppler.ema_alpha) {
            return Err(SonarError::Config(format!(
                "ema_alpha {} must lie in [0, 1]",
                self.doppler.ema_alpha
            )));
        }
        if self.physical.min_aperture_deg <= 0.0 {
            return Err(SonarError::Config(
                "min_aperture_deg must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SonarConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_derived_sizes() {
        let chirp = ChirpConfig::default();
        assert_eq!(chirp.chirp_samples(), 960);
        assert_eq!(chirp.capture_buffer_samples(), 960);
        assert_eq!(chirp.frame_samples(), 4800);
        assert_eq!(chirp.latency_samples(), 6373);
    }

    #[test]
    fn test_band_above_nyquist_rejected() {
        let mut config = SonarConfig::default();
        config.chirp.f_hi_hz = 30_000.0;
        match config.validate() {
            Err(SonarError::Config(msg)) => assert!(msg.contains("chirp band")),
            other => panic!("Expected config error, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_even_fir_taps_rejected() {
        let mut config = SonarConfig::default();
        config.processing.fir_taps = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_pow2_stft_window_rejected() {
        let mut config = SonarConfig::default();
        config.processing.stft_window = 500;
        assert!(config.validate().is_err());
    }
}
