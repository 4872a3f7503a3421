//! Additive noise for synthetic capture frames.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

pub fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => rand::make_rng(),
    }
}

pub fn signal_power(signal: &[i16]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    signal.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>() / signal.len() as f64
}

/// Add white Gaussian noise scaled to the given SNR relative to the
/// frame's own power. A silent frame is left untouched.
pub fn apply_awgn(signal: &mut [i16], snr_db: f64, rng: &mut ChaCha8Rng) {
    let sig_power = signal_power(signal);
    if sig_power == 0.0 {
        return;
    }

    let snr_linear = 10.0_f64.powf(snr_db / 10.0);
    let noise_std = (sig_power / snr_linear).sqrt();
    let normal = Normal::new(0.0, noise_std).unwrap();

    for sample in signal.iter_mut() {
        let noisy = *sample as f64 + normal.sample(rng);
        *sample = noisy.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
    }
}
