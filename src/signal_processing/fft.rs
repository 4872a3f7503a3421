//! Radix-2 Cooley-Tukey FFT on power-of-two complex buffers.
//!
//! The transform is the iterative in-place form: bit-reversal permutation
//! followed by log2(N) butterfly passes. The inverse is computed by
//! conjugating, running the forward transform, scaling by 1/N and
//! conjugating again.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::error::{Result, SonarError};

/// In-place forward FFT. Rejects lengths that are not a power of two;
/// zero-length input is a no-op.
pub fn fft_in_place(data: &mut [Complex64]) -> Result<()> {
    let n = data.len();
    if n == 0 {
        return Ok(());
    }
    if !n.is_power_of_two() {
        return Err(SonarError::FftSize(n));
    }

    let levels = n.trailing_zeros();
    if levels > 0 {
        for i in 0..n {
            let j = i.reverse_bits() >> (usize::BITS - levels);
            if j > i {
                data.swap(i, j);
            }
        }
    }

    let mut len = 2;
    while len <= n {
        let step = Complex64::from_polar(1.0, -2.0 * PI / len as f64);
        for start in (0..n).step_by(len) {
            let mut w = Complex64::new(1.0, 0.0);
            for k in 0..len / 2 {
                let a = data[start + k];
                let b = data[start + k + len / 2] * w;
                data[start + k] = a + b;
                data[start + k + len / 2] = a - b;
                w *= step;
            }
        }
        len <<= 1;
    }

    Ok(())
}

/// Forward FFT into a new buffer.
pub fn fft(input: &[Complex64]) -> Result<Vec<Complex64>> {
    let mut data = input.to_vec();
    fft_in_place(&mut data)?;
    Ok(data)
}

/// Inverse FFT into a new buffer.
pub fn ifft(input: &[Complex64]) -> Result<Vec<Complex64>> {
    let mut data: Vec<Complex64> = input.iter().map(|c| c.conj()).collect();
    fft_in_place(&mut data)?;
    let scale = 1.0 / data.len().max(1) as f64;
    Ok(data.iter().map(|c| c.conj() * scale).collect())
}

/// 2D FFT: 1D transform of every row, then of every column. All rows
/// must have equal power-of-two length and the row count must be a
/// power of two.
pub fn fft_2d(data: &mut [Vec<Complex64>]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let cols = data[0].len();
    for row in data.iter() {
        if row.len() != cols {
            return Err(SonarError::FftSize(row.len()));
        }
    }

    for row in data.iter_mut() {
        fft_in_place(row)?;
    }

    let mut column = vec![Complex64::new(0.0, 0.0); data.len()];
    for c in 0..cols {
        for (r, row) in data.iter().enumerate() {
            column[r] = row[c];
        }
        fft_in_place(&mut column)?;
        for (r, row) in data.iter_mut().enumerate() {
            row[c] = column[r];
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_error(a: &[Complex64], b: &[Complex64]) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).norm())
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_fft_rejects_non_power_of_two() {
        let mut data = vec![Complex64::new(0.0, 0.0); 100];
        match fft_in_place(&mut data) {
            Err(SonarError::FftSize(100)) => {}
            other => panic!("Expected FftSize error, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_fft_roundtrip() {
        for n in [1usize, 2, 8, 64, 512, 1024] {
            let input: Vec<Complex64> = (0..n)
                .map(|i| {
                    Complex64::new(
                        (i as f64 * 0.37).sin() + 0.5,
                        (i as f64 * 0.11).cos() - 0.25,
                    )
                })
                .collect();
            let restored = ifft(&fft(&input).unwrap()).unwrap();
            assert!(
                max_error(&input, &restored) < 1e-9,
                "Roundtrip error too large for N={}",
                n
            );
        }
    }

    #[test]
    fn test_fft_of_impulse_is_flat() {
        let mut data = vec![Complex64::new(0.0, 0.0); 16];
        data[0] = Complex64::new(1.0, 0.0);
        fft_in_place(&mut data).unwrap();
        for bin in &data {
            assert!((bin.re - 1.0).abs() < 1e-12);
            assert!(bin.im.abs() < 1e-12);
        }
    }

    #[test]
    fn test_fft_pure_tone_lands_in_single_bin() {
        let n = 256;
        let k = 17;
        let input: Vec<Complex64> = (0..n)
            .map(|i| Complex64::from_polar(1.0, 2.0 * PI * k as f64 * i as f64 / n as f64))
            .collect();
        let spectrum = fft(&input).unwrap();
        for (bin, value) in spectrum.iter().enumerate() {
            if bin == k {
                assert!((value.norm() - n as f64).abs() < 1e-6);
            } else {
                assert!(value.norm() < 1e-6, "Leakage into bin {}", bin);
            }
        }
    }

    #[test]
    fn test_fft_2d_roundtrip_via_magnitude() {
        let rows = 4;
        let cols = 8;
        let mut data: Vec<Vec<Complex64>> = (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| Complex64::new((r * cols + c) as f64, 0.0))
                    .collect()
            })
            .collect();
        let original = data.clone();
        fft_2d(&mut data).unwrap();
        // invert: conjugate, forward 2D, conjugate, scale by 1/(R*C)
        for row in data.iter_mut() {
            for v in row.iter_mut() {
                *v = v.conj();
            }
        }
        fft_2d(&mut data).unwrap();
        let scale = 1.0 / (rows * cols) as f64;
        for (r, row) in data.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                let restored = v.conj() * scale;
                assert!((restored - original[r][c]).norm() < 1e-9);
            }
        }
    }

    #[test]
    fn test_empty_input_is_noop() {
        let mut data: Vec<Complex64> = Vec::new();
        assert!(fft_in_place(&mut data).is_ok());
        assert!(fft(&[]).unwrap().is_empty());
    }
}
