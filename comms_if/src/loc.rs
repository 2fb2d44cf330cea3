//! # Localisation correction messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An absolute pose observation from the external vision system.
///
/// These observations are always stale by the vision pipeline's processing
/// and transport delay, so `timestamp_ms` refers to the instant the
/// observation was made, not the instant the message arrives. The receiver
/// is expected to re-project the pose to the present using its own odometry
/// history.
///
/// A `timestamp_ms` of zero is a direct override: the receiver adopts the
/// pose unconditionally. Used to reset to a known pose.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct PoseCorrection {
    /// Identifier of the keyframe this correction is relative to. Strictly
    /// increasing across corrections; lower ids are stale.
    pub frame_id: u32,

    /// Time at which the observation was made, in milliseconds on the
    /// robot's clock. Zero for a direct pose override.
    pub timestamp_ms: u32,

    /// Observed x position of the robot origin in millimeters.
    pub x_mm: f64,

    /// Observed y position of the robot origin in millimeters.
    pub y_mm: f64,

    /// Observed heading of the robot in radians.
    pub angle_rad: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl PoseCorrection {
    /// Decode a correction from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self, crate::MsgError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode the correction into its JSON wire form.
    pub fn to_json(&self) -> Result<String, crate::MsgError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
