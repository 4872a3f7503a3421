//! Recursive background subtraction on time-frequency images.
//!
//! Static clutter (direct speaker-to-microphone path, room echoes)
//! appears identically in every frame. A leaky mean of past frames
//! models it; subtracting the mean leaves only the moving foreground.

use num_complex::Complex64;

use crate::signal_processing::TfImage;

pub struct BackgroundSubtractor {
    alpha: f64,
    background: Option<TfImage>,
}

impl BackgroundSubtractor {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            background: None,
        }
    }

    /// Subtract the background model from `current` and fold the frame
    /// into the model. The first frame (and any frame whose shape
    /// differs from the model) bootstraps the model and passes through
    /// unchanged.
    pub fn subtract(&mut self, current: TfImage) -> TfImage {
        if let Some(bg) = self.background.as_mut()
            && shape_of(bg) == shape_of(&current)
        {
            let mut foreground = current;
            for (fg_row, bg_row) in foreground.iter_mut().zip(bg.iter_mut()) {
                for (fg, model) in fg_row.iter_mut().zip(bg_row.iter_mut()) {
                    let observed = *fg;
                    *fg = observed - *model;
                    *model = *model * (1.0 - self.alpha) + observed * self.alpha;
                }
            }
            return foreground;
        }

        self.background = Some(current.clone());
        current
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.background.is_some()
    }

    pub fn reset(&mut self) {
        self.background = None;
    }
}

fn shape_of(image: &TfImage) -> (usize, usize) {
    (image.len(), image.first().map_or(0, Vec::len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_image(rows: usize, cols: usize, value: f64) -> TfImage {
        vec![vec![Complex64::new(value, -value); cols]; rows]
    }

    #[test]
    fn test_first_frame_passes_through_unchanged() {
        let mut subtractor = BackgroundSubtractor::new(0.05);
        let input = constant_image(4, 8, 3.0);
        let output = subtractor.subtract(input.clone());
        assert_eq!(output, input);
        assert!(subtractor.is_bootstrapped());
    }

    #[test]
    fn test_static_scene_cancels() {
        let mut subtractor = BackgroundSubtractor::new(0.05);
        let frame = constant_image(4, 8, 2.0);
        subtractor.subtract(frame.clone());
        let foreground = subtractor.subtract(frame);
        for row in &foreground {
            for v in row {
                assert!(v.norm() < 1e-12, "Static scene should cancel, got {}", v);
            }
        }
    }

    #[test]
    fn test_leaky_mean_update() {
        let alpha = 0.05;
        let mut subtractor = BackgroundSubtractor::new(alpha);
        subtractor.subtract(constant_image(1, 1, 1.0));
        let foreground = subtractor.subtract(constant_image(1, 1, 2.0));
        // foreground = 2 - 1
        assert!((foreground[0][0].re - 1.0).abs() < 1e-12);
        // background is now 0.95*1 + 0.05*2 = 1.05
        let third = subtractor.subtract(constant_image(1, 1, 2.0));
        assert!((third[0][0].re - (2.0 - 1.05)).abs() < 1e-12);
    }

    #[test]
    fn test_shape_change_rebootstraps() {
        let mut subtractor = BackgroundSubtractor::new(0.05);
        subtractor.subtract(constant_image(4, 8, 1.0));
        let resized = constant_image(2, 8, 5.0);
        let output = subtractor.subtract(resized.clone());
        assert_eq!(output, resized);
    }

    #[test]
    fn test_reset_forgets_background() {
        let mut subtractor = BackgroundSubtractor::new(0.05);
        subtractor.subtract(constant_image(1, 2, 1.0));
        subtractor.reset();
        assert!(!subtractor.is_bootstrapped());
        let input = constant_image(1, 2, 7.0);
        assert_eq!(subtractor.subtract(input.clone()), input);
    }
}
