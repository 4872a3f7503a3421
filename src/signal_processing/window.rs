//! Window functions used for chirp shaping and the STFT.

use std::f64::consts::PI;

/// Hamming window: `0.54 - 0.46*cos(2*pi*i/(N-1))`
pub fn hamming(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Hann window: `0.5*(1 - cos(2*pi*i/(N-1)))`
pub fn hann(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (n - 1) as f64).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming_endpoints_and_symmetry() {
        let w = hamming(101);
        assert!((w[0] - 0.08).abs() < 1e-12);
        assert!((w[100] - 0.08).abs() < 1e-9);
        assert!((w[50] - 1.0).abs() < 1e-9);
        for i in 0..50 {
            assert!((w[i] - w[100 - i]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_hann_endpoints() {
        let w = hann(512);
        assert!(w[0].abs() < 1e-12);
        assert!(w[511].abs() < 1e-9);
        let peak = w.iter().cloned().fold(0.0, f64::max);
        assert!((peak - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_lengths() {
        assert!(hamming(0).is_empty());
        assert_eq!(hann(1), vec![1.0]);
    }
}
