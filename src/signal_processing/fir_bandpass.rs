//! Windowed-sinc FIR bandpass filter over complex frames.
//!
//! The kernel is the difference of two Hamming-windowed sinc lowpass
//! responses at the band edges, giving a symmetric (linear-phase)
//! bandpass. The filter is applied as a real-kernel convolution over
//! both channels of the complex input; samples outside the input are
//! treated as zero, so the output has the same length as the input.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::error::{Result, SonarError};
use crate::signal_processing::window::hamming;

pub struct FirBandpass {
    kernel: Vec<f64>,
}

impl FirBandpass {
    /// Design a bandpass kernel with `num_taps` coefficients (must be
    /// odd) passing `low_hz..high_hz` at the given sample rate.
    pub fn new(low_hz: f64, high_hz: f64, sample_rate: f64, num_taps: usize) -> Result<Self> {
        if num_taps < 3 || num_taps.is_multiple_of(2) {
            return Err(SonarError::Config(format!(
                "FIR tap count {} must be odd and at least 3",
                num_taps
            )));
        }
        if low_hz <= 0.0 || low_hz >= high_hz || high_hz >= sample_rate / 2.0 {
            return Err(SonarError::Config(format!(
                "FIR band {}-{} Hz invalid for sample rate {}",
                low_hz, high_hz, sample_rate
            )));
        }

        let w_lo = 2.0 * PI * low_hz / sample_rate;
        let w_hi = 2.0 * PI * high_hz / sample_rate;
        let mid = (num_taps / 2) as isize;
        let window = hamming(num_taps);

        let kernel = (0..num_taps)
            .map(|i| {
                let n = i as isize - mid;
                let ideal = if n == 0 {
                    (w_hi - w_lo) / PI
                } else {
                    let n = n as f64;
                    ((w_hi * n).sin() - (w_lo * n).sin()) / (PI * n)
                };
                ideal * window[i]
            })
            .collect();

        Ok(Self { kernel })
    }

    /// Convolve the kernel over a complex frame. Output length equals
    /// input length; out-of-range taps read zero.
    pub fn apply(&self, input: &[Complex64]) -> Vec<Complex64> {
        let half = self.kernel.len() / 2;
        let len = input.len() as isize;

        (0..input.len())
            .map(|i| {
                let mut acc = Complex64::new(0.0, 0.0);
                for (j, &tap) in self.kernel.iter().enumerate() {
                    let idx = i as isize - j as isize + half as isize;
                    if idx >= 0 && idx < len {
                        acc += input[idx as usize] * tap;
                    }
                }
                acc
            })
            .collect()
    }

    pub fn num_taps(&self) -> usize {
        self.kernel.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, sample_rate: f64, len: usize) -> Vec<Complex64> {
        (0..len)
            .map(|i| Complex64::new((2.0 * PI * freq * i as f64 / sample_rate).sin(), 0.0))
            .collect()
    }

    fn steady_state_rms(signal: &[Complex64], skip: usize) -> f64 {
        let tail = &signal[skip..signal.len() - skip];
        (tail.iter().map(|c| c.norm_sqr()).sum::<f64>() / tail.len() as f64).sqrt()
    }

    fn attenuation_db(filter: &FirBandpass, freq: f64) -> f64 {
        let sample_rate = 48_000.0;
        let input = tone(freq, sample_rate, 4800);
        let output = filter.apply(&input);
        let in_rms = steady_state_rms(&input, 200);
        let out_rms = steady_state_rms(&output, 200);
        20.0 * (out_rms / in_rms).log10()
    }

    #[test]
    fn test_kernel_is_symmetric() {
        let filter = FirBandpass::new(15_000.0, 17_000.0, 48_000.0, 101).unwrap();
        assert_eq!(filter.num_taps(), 101);
        let k = &filter.kernel;
        for i in 0..50 {
            assert!((k[i] - k[100 - i]).abs() < 1e-12, "Asymmetry at tap {}", i);
        }
    }

    #[test]
    fn test_even_tap_count_rejected() {
        assert!(FirBandpass::new(15_000.0, 17_000.0, 48_000.0, 100).is_err());
    }

    #[test]
    fn test_band_centre_passes() {
        let filter = FirBandpass::new(15_000.0, 17_000.0, 48_000.0, 101).unwrap();
        let db = attenuation_db(&filter, 16_000.0);
        assert!(db > -1.0, "Band centre attenuated by {} dB", db);
    }

    #[test]
    fn test_out_of_band_tones_attenuate() {
        let filter = FirBandpass::new(15_000.0, 17_000.0, 48_000.0, 101).unwrap();
        let below = attenuation_db(&filter, 7_500.0);
        assert!(below < -30.0, "Tone at f_lo/2 only {} dB down", below);
        let above = attenuation_db(&filter, 22_000.0);
        assert!(above < -30.0, "Tone above band only {} dB down", above);
    }

    #[test]
    fn test_output_length_matches_input() {
        let filter = FirBandpass::new(15_000.0, 17_000.0, 48_000.0, 101).unwrap();
        let input = tone(16_000.0, 48_000.0, 960);
        assert_eq!(filter.apply(&input).len(), 960);
        assert!(filter.apply(&[]).is_empty());
    }

    #[test]
    fn test_imaginary_channel_filtered_identically() {
        let filter = FirBandpass::new(15_000.0, 17_000.0, 48_000.0, 101).unwrap();
        let real: Vec<Complex64> = tone(16_000.0, 48_000.0, 2000);
        let imag: Vec<Complex64> = real.iter().map(|c| Complex64::new(0.0, c.re)).collect();
        let out_re = filter.apply(&real);
        let out_im = filter.apply(&imag);
        for (a, b) in out_re.iter().zip(out_im.iter()) {
            assert!((a.re - b.im).abs() < 1e-9);
        }
    }
}
