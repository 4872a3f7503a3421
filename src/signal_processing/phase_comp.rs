//! Velocity-driven column compensation of the range-Doppler image.
//!
//! Target motion during the sweep skews the slow-time axis by the same
//! dilation factor the echo itself suffered. Re-indexing each column by
//! `round(j * (1 + v/c))` undoes the skew. Collisions overwrite;
//! columns mapped outside the image are dropped.

use crate::constants::SPEED_OF_SOUND_M_S;
use crate::signal_processing::RangeDopplerImage;

pub struct PhaseCompensator;

impl PhaseCompensator {
    pub fn compensate(image: &RangeDopplerImage, velocity_m_s: f64) -> RangeDopplerImage {
        let factor = 1.0 + velocity_m_s / SPEED_OF_SOUND_M_S;
        let mut output: RangeDopplerImage = image
            .iter()
            .map(|row| vec![0.0; row.len()])
            .collect();

        for (i, row) in image.iter().enumerate() {
            let cols = row.len() as isize;
            for (j, &value) in row.iter().enumerate() {
                let target = (j as f64 * factor).round() as isize;
                if target >= 0 && target < cols {
                    output[i][target as usize] = value;
                }
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_image(rows: usize, cols: usize) -> RangeDopplerImage {
        (0..rows)
            .map(|r| (0..cols).map(|c| (r * cols + c) as f32).collect())
            .collect()
    }

    #[test]
    fn test_zero_velocity_is_identity() {
        let image = ramp_image(8, 16);
        assert_eq!(PhaseCompensator::compensate(&image, 0.0), image);
    }

    #[test]
    fn test_positive_velocity_shifts_high_columns_right() {
        let rows = 2;
        let cols = 512;
        let mut image = ramp_image(rows, cols);
        for row in image.iter_mut() {
            for v in row.iter_mut() {
                *v = 0.0;
            }
        }
        image[0][400] = 1.0;

        // 3 m/s: factor ~1.00875, column 400 lands on 403 or 404
        let out = PhaseCompensator::compensate(&image, 3.0);
        let target = (400.0 * (1.0 + 3.0 / SPEED_OF_SOUND_M_S)).round() as usize;
        assert_eq!(out[0][target], 1.0);
        assert_eq!(out[0][400], 0.0);
    }

    #[test]
    fn test_columns_falling_outside_are_dropped() {
        let cols = 64;
        let mut image = vec![vec![0.0f32; cols]];
        image[0][cols - 1] = 2.0;
        let out = PhaseCompensator::compensate(&image, 9.0);
        // 63 * 1.026 rounds past the last column
        assert!(out[0].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_shape_preserved() {
        let image = ramp_image(5, 7);
        let out = PhaseCompensator::compensate(&image, -4.0);
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|row| row.len() == 7));
    }
}
