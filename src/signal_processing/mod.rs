pub mod align;
pub mod background;
pub mod chirp;
pub mod doppler;
pub mod downconvert;
pub mod fft;
pub mod fir_bandpass;
pub mod phase_comp;
pub mod window;

pub use align::{AlignedFrame, EchoAligner};
pub use background::BackgroundSubtractor;
pub use chirp::ChirpSynthesizer;
pub use doppler::{DopplerSearch, VelocityEstimate};
pub use downconvert::Downconverter;
pub use fft::{fft, fft_2d, fft_in_place, ifft};
pub use fir_bandpass::FirBandpass;
pub use phase_comp::PhaseCompensator;
pub use window::{hamming, hann};

use num_complex::Complex64;

/// Time-frequency image produced by the STFT, indexed
/// `[window_idx][freq_bin]` with only positive-frequency bins kept.
pub type TfImage = Vec<Vec<Complex64>>;

/// Range-Doppler magnitude image, indexed `[freq_bin][slow_time_bin]`.
/// The slow-time width is padded to the next power of two.
pub type RangeDopplerImage = Vec<Vec<f32>>;

/// Sample a complex signal at a fractional position by linear
/// interpolation. Positions with both neighbours outside the signal
/// produce zero; if only one neighbour is in range its value is used
/// verbatim.
pub(crate) fn sample_fractional(signal: &[Complex64], pos: f64) -> Complex64 {
    if !pos.is_finite() {
        return Complex64::new(0.0, 0.0);
    }
    let lo = pos.floor();
    let hi = pos.ceil();
    let lo_idx = lo as isize;
    let hi_idx = hi as isize;
    let len = signal.len() as isize;

    let lo_val = (lo_idx >= 0 && lo_idx < len).then(|| signal[lo_idx as usize]);
    let hi_val = (hi_idx >= 0 && hi_idx < len).then(|| signal[hi_idx as usize]);

    match (lo_val, hi_val) {
        (Some(a), Some(b)) => {
            let frac = pos - lo;
            a * (1.0 - frac) + b * frac
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => Complex64::new(0.0, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_fractional_interpolates() {
        let signal = vec![Complex64::new(0.0, 0.0), Complex64::new(2.0, 4.0)];
        let mid = sample_fractional(&signal, 0.5);
        assert!((mid.re - 1.0).abs() < 1e-12);
        assert!((mid.im - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_fractional_out_of_range_is_zero() {
        let signal = vec![Complex64::new(1.0, 1.0)];
        assert_eq!(sample_fractional(&signal, -2.0), Complex64::new(0.0, 0.0));
        assert_eq!(sample_fractional(&signal, 5.0), Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_sample_fractional_single_neighbour() {
        let signal = vec![Complex64::new(3.0, 0.0), Complex64::new(5.0, 0.0)];
        // floor lands on the last sample, ceil falls off the end
        let v = sample_fractional(&signal, 1.5);
        assert!((v.re - 5.0).abs() < 1e-12);
    }
}
