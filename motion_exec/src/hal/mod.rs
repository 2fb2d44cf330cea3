//! # Hardware abstraction seams
//!
//! The motion core never touches hardware directly: everything it consumes
//! arrives through the traits in this module. The real robot provides
//! implementations backed by its sensor and motor drivers; the `sim` feature
//! provides a kinematic simulation used by the demo loop and the
//! integration tests.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

#[cfg(feature = "sim")]
pub mod sim;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use util::angle::NormAngle;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Source of raw odometry readings, sampled once per control tick.
pub trait OdometrySource {
    /// Total travel of the left wheel in mm. Monotonic while driving
    /// forwards, decreasing in reverse.
    fn left_wheel_pos_mm(&self) -> f64;

    /// Total travel of the right wheel in mm.
    fn right_wheel_pos_mm(&self) -> f64;

    /// Gyro-integrated orientation of the robot in radians.
    fn gyro_heading_rad(&self) -> f64;

    /// Wall-clock-equivalent tick counter in microseconds.
    fn micro_counter(&self) -> u64;
}

/// The speed controller collaborator.
///
/// Owns the forward speed of the robot: the follower only pushes targets
/// and limits, the controller performs its own ramping towards them.
pub trait SpeedControl {
    /// Set the desired forward speed in mm/s. Negative speeds drive in
    /// reverse.
    fn set_desired_speed(&mut self, speed_mmps: f64);

    /// Set the acceleration magnitude used to approach the desired speed,
    /// in mm/s^2.
    fn set_acceleration(&mut self, accel_mmps2: f64);

    /// Set the deceleration magnitude used when slowing down, in mm/s^2.
    fn set_deceleration(&mut self, decel_mmps2: f64);

    /// Get the measured forward speed of the robot in mm/s.
    fn measured_speed(&self) -> f64;
}

/// The steering controller collaborator.
///
/// Consumes the follower's tracking errors while line/arc following, and
/// self-manages point turns once commanded.
pub trait SteerControl {
    /// Push the current path-tracking errors: cross-track offset in mm
    /// (positive left of the path) and heading error in radians.
    fn set_path_error(&mut self, offset_error_mm: f64, heading_error_rad: f64);

    /// Begin a point turn to the target heading. One-shot: the turn then
    /// runs to completion under the steering controller's own control.
    fn execute_point_turn(
        &mut self,
        target_angle: NormAngle,
        max_angular_vel_radps: f64,
        angular_accel_radps2: f64,
        angular_decel_radps2: f64,
        angle_tol_rad: f64,
        shortest_dir: bool,
    );

    /// True once the commanded point turn has finished. Remains true until
    /// the next turn is commanded.
    fn point_turn_complete(&self) -> bool;
}
