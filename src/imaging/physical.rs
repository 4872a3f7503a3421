//! Mapping from range-Doppler space to millimetre-scaled physical space.
//!
//! Range resolution follows from the chirp bandwidth and timing; the
//! azimuth resolution comes from the synthetic aperture the target's own
//! rotation sweeps out, estimated from the recorded distance history.
//! The physical image is the range-Doppler image translated so the
//! strongest reflector sits at the centre; object size is read off a
//! signal-relative intensity threshold around that centre.

use serde::{Deserialize, Serialize};

use crate::config::{ChirpConfig, PhysicalConfig};
use crate::constants::{MIN_DISTANCE_MM, SPEED_OF_SOUND_MM_S};
use crate::signal_processing::RangeDopplerImage;

/// Physical-space reflectivity image centred on the strongest
/// reflector. Each cell spans `range_resolution_mm` by
/// `azimuth_resolution_mm`.
#[derive(Debug, Clone)]
pub struct PhysicalImage {
    pub data: Vec<Vec<f32>>,
    pub range_resolution_mm: f64,
    pub azimuth_resolution_mm: f64,
    /// Pixel the peak was translated to (row, col)
    pub center: (usize, usize),
}

/// Extracted object dimensions in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectSize {
    pub length_mm: f64,
    pub width_mm: f64,
}

impl ObjectSize {
    pub const ZERO: ObjectSize = ObjectSize {
        length_mm: 0.0,
        width_mm: 0.0,
    };
}

pub struct PhysicalMapper {
    chirp: ChirpConfig,
    config: PhysicalConfig,
}

impl PhysicalMapper {
    pub fn new(chirp: &ChirpConfig, config: &PhysicalConfig) -> Self {
        Self {
            chirp: chirp.clone(),
            config: config.clone(),
        }
    }

    /// Angular aperture swept by the target, from the recorded distance
    /// history: `acos(d_min/d_first) + acos(d_min/d_last)`. Fewer than
    /// three distances fall back to the configured default; the result
    /// is clamped to the configured minimum either way.
    pub fn rotation_angle(&self, distances_mm: &[f64]) -> f64 {
        let min_angle = self.config.min_aperture_deg.to_radians();
        if distances_mm.len() < 3 {
            return self
                .config
                .default_aperture_deg
                .to_radians()
                .max(min_angle);
        }

        let first = distances_mm[0].max(MIN_DISTANCE_MM);
        let last = distances_mm[distances_mm.len() - 1].max(MIN_DISTANCE_MM);
        let min = distances_mm
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min)
            .max(MIN_DISTANCE_MM);

        let angle = (min / first).clamp(-1.0, 1.0).acos() + (min / last).clamp(-1.0, 1.0).acos();
        angle.max(min_angle)
    }

    /// Range resolution in millimetres:
    /// `(c * T_c) / (2 * B * T_total)`.
    pub fn range_resolution_mm(&self) -> f64 {
        let t_chirp = self.chirp.chirp_ms / 1000.0;
        let t_total = (self.chirp.chirp_ms + self.chirp.inter_chirp_gap_ms) / 1000.0;
        (SPEED_OF_SOUND_MM_S * t_chirp) / (2.0 * self.chirp.bandwidth_hz() * t_total)
    }

    /// Azimuth resolution in millimetres for a given aperture:
    /// `(c / f_lo) / (2 * theta)`.
    pub fn azimuth_resolution_mm(&self, aperture_rad: f64) -> f64 {
        let aperture = aperture_rad.max(self.config.min_aperture_deg.to_radians());
        (SPEED_OF_SOUND_MM_S / self.chirp.f_lo_hz) / (2.0 * aperture)
    }

    /// Translate the range-Doppler image so the global intensity peak
    /// lands at the centre pixel. Returns `None` for an empty image.
    pub fn map(&self, image: &RangeDopplerImage, distances_mm: &[f64]) -> Option<PhysicalImage> {
        let rows = image.len();
        let cols = image.first().map_or(0, Vec::len);
        if rows == 0 || cols == 0 {
            return None;
        }

        let (peak_row, peak_col) = peak_position(image)?;
        let center = (rows / 2, cols / 2);
        let row_shift = center.0 as isize - peak_row as isize;
        let col_shift = center.1 as isize - peak_col as isize;

        let mut data = vec![vec![0.0f32; cols]; rows];
        for (r, row) in data.iter_mut().enumerate() {
            let src_r = r as isize - row_shift;
            if src_r < 0 || src_r >= rows as isize {
                continue;
            }
            for (c, cell) in row.iter_mut().enumerate() {
                let src_c = c as isize - col_shift;
                if src_c >= 0 && src_c < cols as isize {
                    *cell = image[src_r as usize][src_c as usize];
                }
            }
        }

        let aperture = self.rotation_angle(distances_mm);
        Some(PhysicalImage {
            data,
            range_resolution_mm: self.range_resolution_mm(),
            azimuth_resolution_mm: self.azimuth_resolution_mm(aperture),
            center,
        })
    }

    /// Bounding-box size of the reflector at a signal-relative
    /// threshold. Images whose peak falls below the minimum intensity
    /// yield a zero size; dimensions are capped at the configured
    /// maximum.
    pub fn extract_size(&self, physical: &PhysicalImage) -> ObjectSize {
        let peak = physical
            .data
            .iter()
            .flat_map(|row| row.iter())
            .cloned()
            .fold(0.0f32, f32::max);
        if peak < self.config.min_peak_intensity {
            return ObjectSize::ZERO;
        }

        let threshold = self.config.boundary_threshold_ratio * peak;
        let mut row_min = usize::MAX;
        let mut row_max = 0usize;
        let mut col_min = usize::MAX;
        let mut col_max = 0usize;

        for (r, row) in physical.data.iter().enumerate() {
            for (c, &value) in row.iter().enumerate() {
                if value > threshold {
                    row_min = row_min.min(r);
                    row_max = row_max.max(r);
                    col_min = col_min.min(c);
                    col_max = col_max.max(c);
                }
            }
        }

        if row_min == usize::MAX {
            return ObjectSize::ZERO;
        }

        let length = (row_max - row_min) as f64 * physical.range_resolution_mm;
        let width = (col_max - col_min) as f64 * physical.azimuth_resolution_mm;
        ObjectSize {
            length_mm: length.min(self.config.max_dimension_mm),
            width_mm: width.min(self.config.max_dimension_mm),
        }
    }

    /// Distance of a range bin from the sensor, in millimetres.
    pub fn bin_distance_mm(&self, bin: usize) -> f64 {
        bin as f64 * self.range_resolution_mm()
    }
}

fn peak_position(image: &RangeDopplerImage) -> Option<(usize, usize)> {
    let mut best = f32::NEG_INFINITY;
    let mut position = None;
    for (r, row) in image.iter().enumerate() {
        for (c, &value) in row.iter().enumerate() {
            if value > best {
                best = value;
                position = Some((r, c));
            }
        }
    }
    position
}
