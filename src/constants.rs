//! Physical and numeric constants shared across the pipeline.

/// Speed of sound in air at room temperature, metres per second.
/// Converts echo time-dilation into radial velocity.
pub const SPEED_OF_SOUND_M_S: f64 = 343.0;

/// Speed of sound in millimetres per second, for physical-space scaling.
pub const SPEED_OF_SOUND_MM_S: f64 = 343_000.0;

/// Magnitude below which a resampled frame is considered to carry no
/// energy at all.
pub const ZERO_FRAME_EPSILON: f64 = 1e-12;

/// Distances closer than this are degenerate for the rotation-angle
/// estimate.
pub const MIN_DISTANCE_MM: f64 = 1e-6;
