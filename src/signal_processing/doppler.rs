//! Doppler velocity estimation by template-scaling search.
//!
//! A moving reflector time-dilates the echo by `s = 1 + v/c`. The search
//! resamples the analytic reference at a sweep of candidate scales,
//! scores each warped template by a real-valued dot product against the
//! received frame, and picks the argmax. A coarse sweep across the full
//! span is refined by a second uniform sweep around the winner, and the
//! result is smoothed with an exponential moving average.

use num_complex::Complex64;

use crate::config::DopplerConfig;
use crate::constants::SPEED_OF_SOUND_M_S;
use crate::signal_processing::sample_fractional;

/// Outcome of one velocity search.
#[derive(Debug, Clone, Copy)]
pub struct VelocityEstimate {
    /// Best-scoring candidate before smoothing, m/s
    pub raw_m_s: f64,
    /// EMA-smoothed velocity, m/s
    pub smoothed_m_s: f64,
    /// Correlation score of the winning template
    pub correlation: f64,
}

pub struct DopplerSearch {
    config: DopplerConfig,
    ema: Option<f64>,
    last_correlation: f64,
}

impl DopplerSearch {
    pub fn new(config: &DopplerConfig) -> Self {
        Self {
            config: config.clone(),
            ema: None,
            last_correlation: 0.0,
        }
    }

    /// Search for the reflector velocity that best explains `signal`
    /// given the analytic chirp `reference`.
    pub fn search(&mut self, signal: &[Complex64], reference: &[Complex64]) -> VelocityEstimate {
        let span = self.config.search_span_m_s;
        let (coarse_v, coarse_score) =
            self.sweep(signal, reference, -span, span, self.config.coarse_steps);

        let refine_span = self.config.refine_span_m_s;
        let (best_v, best_score) = self.sweep(
            signal,
            reference,
            coarse_v - refine_span,
            coarse_v + refine_span,
            self.config.refine_steps,
        );

        let (raw, correlation) = if best_score >= coarse_score {
            (best_v, best_score)
        } else {
            (coarse_v, coarse_score)
        };

        let alpha = self.config.ema_alpha;
        let smoothed = match self.ema {
            // the first measurement seeds the average
            None => raw,
            Some(prev) => (1.0 - alpha) * prev + alpha * raw,
        };
        self.ema = Some(smoothed);
        self.last_correlation = correlation;

        VelocityEstimate {
            raw_m_s: raw,
            smoothed_m_s: smoothed,
            correlation,
        }
    }

    /// Uniform sweep of `steps` candidates over `[lo, hi]`; returns the
    /// argmax velocity and its score.
    fn sweep(
        &self,
        signal: &[Complex64],
        reference: &[Complex64],
        lo: f64,
        hi: f64,
        steps: usize,
    ) -> (f64, f64) {
        let mut best_v = 0.0;
        let mut best_score = f64::NEG_INFINITY;
        for step in 0..steps {
            let v = lo + (hi - lo) * step as f64 / (steps - 1) as f64;
            let score = correlation_at(signal, reference, v);
            if score > best_score {
                best_score = score;
                best_v = v;
            }
        }
        (best_v, best_score)
    }

    pub fn last_correlation(&self) -> f64 {
        self.last_correlation
    }

    pub fn smoothed_velocity(&self) -> Option<f64> {
        self.ema
    }

    pub fn reset(&mut self) {
        self.ema = None;
        self.last_correlation = 0.0;
    }
}

/// Score one velocity hypothesis: warp the reference by `s = 1 + v/c`
/// (template sample `i` reads the reference at `i/s`) and take the
/// real dot product against the signal over the template's central
/// half, `[N/4, 3N/4)`.
fn correlation_at(signal: &[Complex64], reference: &[Complex64], velocity_m_s: f64) -> f64 {
    let scale = 1.0 + velocity_m_s / SPEED_OF_SOUND_M_S;
    if scale <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let n = reference.len();
    let mut score = 0.0;
    for i in n / 4..(3 * n) / 4 {
        if i >= signal.len() {
            break;
        }
        let template = sample_fractional(reference, i as f64 / scale);
        score += signal[i].re * template.re;
    }
    score
}

/// Resample a signal as an echo from a reflector at `velocity_m_s`
/// would appear: output sample `i` reads the input at `i/s` with
/// `s = 1 + v/c`. Shared by the search templates and the echo
/// simulator so both sides agree on the warp convention.
pub(crate) fn warp_as_echo(signal: &[Complex64], velocity_m_s: f64) -> Vec<Complex64> {
    let scale = 1.0 + velocity_m_s / SPEED_OF_SOUND_M_S;
    (0..signal.len())
        .map(|i| sample_fractional(signal, i as f64 / scale))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChirpConfig;
    use crate::signal_processing::chirp::ChirpSynthesizer;

    fn reference() -> Vec<Complex64> {
        ChirpSynthesizer::new(&ChirpConfig::default()).analytic_reference()
    }

    fn search_once(velocity: f64) -> VelocityEstimate {
        let reference = reference();
        let echo = warp_as_echo(&reference, velocity);
        let mut search = DopplerSearch::new(&DopplerConfig::default());
        search.search(&echo, &reference)
    }

    #[test]
    fn test_stationary_echo_scores_zero_velocity() {
        let estimate = search_once(0.0);
        assert!(
            estimate.raw_m_s.abs() < 0.1,
            "Stationary echo estimated at {} m/s",
            estimate.raw_m_s
        );
        assert!(estimate.correlation > 0.0);
    }

    #[test]
    fn test_approaching_and_receding_targets() {
        for expected in [1.0, -1.0, 2.5, -3.0] {
            let estimate = search_once(expected);
            assert!(
                (estimate.raw_m_s - expected).abs() < 0.15,
                "Expected {} m/s, estimated {}",
                expected,
                estimate.raw_m_s
            );
        }
    }

    #[test]
    fn test_ema_seeds_then_converges() {
        let reference = reference();
        let echo = warp_as_echo(&reference, 1.0);
        let mut search = DopplerSearch::new(&DopplerConfig::default());

        let first = search.search(&echo, &reference);
        assert!(
            (first.smoothed_m_s - first.raw_m_s).abs() < 1e-12,
            "First estimate should seed the EMA"
        );

        let mut last = first;
        for _ in 0..19 {
            last = search.search(&echo, &reference);
        }
        assert!(
            (last.smoothed_m_s - 1.0).abs() < 0.05,
            "EMA at {} after 20 frames",
            last.smoothed_m_s
        );
    }

    #[test]
    fn test_ema_tracks_step_change_gradually() {
        let reference = reference();
        let still = warp_as_echo(&reference, 0.0);
        let moving = warp_as_echo(&reference, 2.0);
        let mut search = DopplerSearch::new(&DopplerConfig::default());

        search.search(&still, &reference);
        let after_step = search.search(&moving, &reference);
        assert!(
            after_step.smoothed_m_s > 0.1 && after_step.smoothed_m_s < 1.5,
            "EMA jumped to {} immediately after a step",
            after_step.smoothed_m_s
        );
    }

    #[test]
    fn test_silence_has_no_correlation() {
        let reference = reference();
        let silence = vec![Complex64::new(0.0, 0.0); reference.len()];
        let mut search = DopplerSearch::new(&DopplerConfig::default());
        let estimate = search.search(&silence, &reference);
        assert!(estimate.correlation.abs() < 1e-9);
    }
}
