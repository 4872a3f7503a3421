//! Linear FM chirp synthesis.
//!
//! One synthesizer instance owns all three waveforms derived from the
//! configured sweep: the Hamming-shaped emission chirp for the speaker,
//! the analytic reference used by the velocity search, and the complex
//! down-chirp used as the baseband mixing signal.
//!
//! The analytic reference keeps a zero imaginary part rather than a
//! full Hilbert transform; the correlation search only consumes the
//! real channel.

use num_complex::Complex64;

use crate::config::ChirpConfig;
use crate::signal_processing::window::hamming;

pub struct ChirpSynthesizer {
    sample_rate: f64,
    f_lo: f64,
    /// Sweep rate in Hz per second
    sweep_rate: f64,
    num_samples: usize,
    peak: f64,
}

impl ChirpSynthesizer {
    pub fn new(config: &ChirpConfig) -> Self {
        let duration_s = config.chirp_ms / 1000.0;
        Self {
            sample_rate: config.sample_rate_hz as f64,
            f_lo: config.f_lo_hz,
            sweep_rate: config.bandwidth_hz() / duration_s,
            num_samples: config.chirp_samples(),
            peak: config.amplitude * i16::MAX as f64,
        }
    }

    /// Instantaneous phase at sample index `i`:
    /// `2*pi*(f_lo*t + k*t^2/2)` with `t = i/Fs`.
    fn phase(&self, i: usize) -> f64 {
        let t = i as f64 / self.sample_rate;
        2.0 * std::f64::consts::PI * (self.f_lo * t + 0.5 * self.sweep_rate * t * t)
    }

    /// Hamming-windowed up-chirp scaled for emission through the speaker.
    pub fn emission(&self) -> Vec<i16> {
        let window = hamming(self.num_samples);
        (0..self.num_samples)
            .map(|i| (self.phase(i).sin() * window[i] * self.peak).round() as i16)
            .collect()
    }

    /// Analytic reference template: the emission waveform on the real
    /// channel, zero imaginary part.
    pub fn analytic_reference(&self) -> Vec<Complex64> {
        let window = hamming(self.num_samples);
        (0..self.num_samples)
            .map(|i| Complex64::new(self.phase(i).sin() * window[i] * self.peak, 0.0))
            .collect()
    }

    /// Complex down-chirp `(cos(-phi), sin(-phi))` for baseband mixing.
    pub fn downchirp(&self) -> Vec<Complex64> {
        (0..self.num_samples)
            .map(|i| {
                let phi = self.phase(i);
                Complex64::new((-phi).cos(), (-phi).sin())
            })
            .collect()
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth() -> ChirpSynthesizer {
        ChirpSynthesizer::new(&ChirpConfig::default())
    }

    #[test]
    fn test_emission_length_matches_config() {
        let config = ChirpConfig::default();
        let chirp = ChirpSynthesizer::new(&config).emission();
        assert_eq!(chirp.len(), 960);
        assert_eq!(chirp.len(), config.chirp_samples());
    }

    #[test]
    fn test_emission_peak_within_amplitude_cap() {
        let chirp = synth().emission();
        let cap = (0.8 * i16::MAX as f64).round() as i16;
        let peak = chirp.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(
            peak <= cap.unsigned_abs(),
            "Peak {} exceeds 80% of i16::MAX",
            peak
        );
        // the window centre should still come close to the cap
        assert!(peak as f64 > 0.5 * i16::MAX as f64);
    }

    #[test]
    fn test_reference_matches_emission_real_channel() {
        let s = synth();
        let emission = s.emission();
        let reference = s.analytic_reference();
        assert_eq!(reference.len(), emission.len());
        for (e, r) in emission.iter().zip(reference.iter()) {
            assert!((*e as f64 - r.re).abs() <= 0.5, "Reference diverges");
            assert_eq!(r.im, 0.0);
        }
    }

    #[test]
    fn test_downchirp_has_unit_magnitude() {
        for v in synth().downchirp() {
            assert!((v.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_downchirp_conjugates_chirp_phase() {
        let s = synth();
        let down = s.downchirp();
        // mixing e^{j phi} with the downchirp must collapse to DC
        for i in (0..s.num_samples()).step_by(97) {
            let phi = s.phase(i);
            let up = Complex64::new(phi.cos(), phi.sin());
            let mixed = up * down[i];
            assert!((mixed.re - 1.0).abs() < 1e-9);
            assert!(mixed.im.abs() < 1e-9);
        }
    }
}
