//! Dechirp mixing and the two Fourier stages.
//!
//! Mixing the aligned echo against the synthetic down-chirp collapses
//! the sweep's linear phase term, leaving tones whose frequencies
//! encode target range. A sliding Hann-windowed FFT turns the baseband
//! into a time-frequency image; a second FFT across the windows (slow
//! time) separates Doppler, yielding the range-Doppler magnitude image.

use num_complex::Complex64;

use crate::config::ProcessingConfig;
use crate::error::Result;
use crate::signal_processing::window::hann;
use crate::signal_processing::{RangeDopplerImage, TfImage, fft_in_place};

pub struct Downconverter {
    downchirp: Vec<Complex64>,
    window_len: usize,
    hop: usize,
    hann: Vec<f64>,
}

impl Downconverter {
    pub fn new(downchirp: Vec<Complex64>, processing: &ProcessingConfig) -> Self {
        Self {
            downchirp,
            window_len: processing.stft_window,
            hop: processing.stft_hop,
            hann: hann(processing.stft_window),
        }
    }

    /// Elementwise mix against the down-chirp template; positions beyond
    /// the template length are zeroed.
    pub fn dechirp(&self, frame: &[Complex64]) -> Vec<Complex64> {
        frame
            .iter()
            .enumerate()
            .map(|(i, &sample)| match self.downchirp.get(i) {
                Some(mix) => sample * mix,
                None => Complex64::new(0.0, 0.0),
            })
            .collect()
    }

    /// Short-time Fourier transform of the baseband. Output shape is
    /// `[num_windows][window/2]` with
    /// `num_windows = (L - window)/hop + 1`; inputs shorter than one
    /// window produce an empty image.
    pub fn stft(&self, baseband: &[Complex64]) -> Result<TfImage> {
        if baseband.len() < self.window_len {
            return Ok(Vec::new());
        }
        let num_windows = (baseband.len() - self.window_len) / self.hop + 1;
        let mut image = Vec::with_capacity(num_windows);

        for w in 0..num_windows {
            let start = w * self.hop;
            let mut buf: Vec<Complex64> = baseband[start..start + self.window_len]
                .iter()
                .zip(self.hann.iter())
                .map(|(&sample, &taper)| sample * taper)
                .collect();
            fft_in_place(&mut buf)?;
            buf.truncate(self.window_len / 2);
            image.push(buf);
        }

        Ok(image)
    }

    /// Second FFT across slow time. Each frequency bin's column is
    /// zero-padded to the next power of two and transformed; the output
    /// holds magnitudes, indexed `[freq_bin][slow_time_bin]`.
    pub fn range_doppler(&self, tf: &TfImage) -> Result<RangeDopplerImage> {
        if tf.is_empty() {
            return Ok(Vec::new());
        }
        let num_windows = tf.len();
        let num_bins = tf[0].len();
        let padded = num_windows.next_power_of_two();

        let mut image = Vec::with_capacity(num_bins);
        let mut column = vec![Complex64::new(0.0, 0.0); padded];
        for bin in 0..num_bins {
            for slot in column.iter_mut() {
                *slot = Complex64::new(0.0, 0.0);
            }
            for (w, row) in tf.iter().enumerate() {
                column[w] = row[bin];
            }
            fft_in_place(&mut column)?;
            image.push(column.iter().map(|c| c.norm() as f32).collect());
        }

        Ok(image)
    }
}
