//! Localisation parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for localisation
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Distance between the drive wheels in mm.
    pub wheel_dist_mm: f64,

    /// Wheel travel below which a wheel is considered stationary for one
    /// tick, in mm.
    pub wheel_delta_zero_tol_mm: f64,

    /// Difference between the two wheel deltas below which the motion is
    /// treated as a straight line rather than an arc, in mm.
    pub straight_line_delta_tol_mm: f64,

    /// Maximum deviation allowed between the gyro heading and the
    /// wheel-implied heading in one tick, in radians. The gyro heading is
    /// clamped into this band around the wheel-implied heading.
    pub max_gyro_wheel_dev_rad: f64,

    /// Offset from the robot origin to the drive centre when not carrying,
    /// in mm along the heading.
    pub drive_center_offset_mm: f64,

    /// Offset from the robot origin to the drive centre when carrying, in
    /// mm along the heading.
    pub drive_center_offset_carry_mm: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            wheel_dist_mm: 48.0,
            wheel_delta_zero_tol_mm: 1e-3,
            straight_line_delta_tol_mm: 1e-3,
            max_gyro_wheel_dev_rad: 0.35,
            drive_center_offset_mm: 0.0,
            drive_center_offset_carry_mm: -12.0,
        }
    }
}
