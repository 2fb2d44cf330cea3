//! # Simulated robot
//!
//! A kinematic differential-drive robot implementing all of the motion
//! core's hardware seams. Commanded speeds are integrated directly (no
//! dynamics, no slip) so the simulation is deterministic and fast; it
//! exists to exercise the core, not to model the vehicle.
//!
//! Point turns are executed the way the real steering controller does
//! them: a [`VelocityProfileGenerator`] profile is started for the turn
//! and stepped every tick until the target angle is reached.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;

// Internal
use super::{OdometrySource, SpeedControl, SteerControl};
use crate::vel_profile::VelocityProfileGenerator;
use util::angle::NormAngle;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Heading tracking gain of the crosstrack steering law.
const STEERING_K1: f64 = 0.1;

/// Crosstrack approach rate gain of the steering law.
const STEERING_K2: f64 = 12.0;

/// Speed softening constant in the steering law, in mm/s.
const STEERING_SPEED_SOFTEN_MMPS: f64 = 200.0;

/// Speed below which the simulated robot does not steer, in mm/s.
const STEERING_MIN_SPEED_MMPS: f64 = 1.0;

/// Angular acceleration used for point turns commanded with zero accel, in
/// rad/s^2.
const POINT_TURN_DEFAULT_ACCEL_RADPS2: f64 = 10.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Kinematic simulation of the robot and its speed/steering controllers.
pub struct SimRobot {
    /// Distance between the drive wheels in mm.
    wheel_dist_mm: f64,

    /// Control period the point-turn profile is stepped at.
    cycle_period_s: f64,

    // True state
    x_mm: f64,
    y_mm: f64,
    heading: NormAngle,

    // Accumulated wheel travel
    left_pos_mm: f64,
    right_pos_mm: f64,

    time_us: u64,

    // Speed controller state
    desired_speed_mmps: f64,
    accel_mmps2: f64,
    decel_mmps2: f64,
    measured_speed_mmps: f64,

    // Steering state
    offset_error_mm: f64,
    heading_error_rad: f64,

    // Point turn state
    point_turn_active: bool,
    point_turn_complete: bool,
    vpg: VelocityProfileGenerator,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimRobot {
    pub fn new(wheel_dist_mm: f64, cycle_period_s: f64) -> Self {
        Self {
            wheel_dist_mm,
            cycle_period_s,
            x_mm: 0.0,
            y_mm: 0.0,
            heading: NormAngle::default(),
            left_pos_mm: 0.0,
            right_pos_mm: 0.0,
            time_us: 0,
            desired_speed_mmps: 0.0,
            accel_mmps2: 0.0,
            decel_mmps2: 0.0,
            measured_speed_mmps: 0.0,
            offset_error_mm: 0.0,
            heading_error_rad: 0.0,
            point_turn_active: false,
            point_turn_complete: true,
            vpg: VelocityProfileGenerator::new(),
        }
    }

    /// Place the robot at the given true pose.
    pub fn set_pose(&mut self, x_mm: f64, y_mm: f64, heading: NormAngle) {
        self.x_mm = x_mm;
        self.y_mm = y_mm;
        self.heading = heading;
    }

    /// The robot's true pose, for test assertions.
    pub fn true_pose(&self) -> (f64, f64, NormAngle) {
        (self.x_mm, self.y_mm, self.heading)
    }

    /// Advance the simulation by one control period.
    pub fn step(&mut self, dt_s: f64) {
        if self.point_turn_active {
            self.step_point_turn();
        } else {
            self.step_drive(dt_s);
        }

        self.time_us += (dt_s * 1e6) as u64;
    }

    /// Integrate normal driving with the crosstrack steering law.
    fn step_drive(&mut self, dt_s: f64) {
        // Speed controller: ramp the measured speed towards the desired
        // speed at the commanded accel/decel
        let rate = if self.desired_speed_mmps.abs() >= self.measured_speed_mmps.abs() {
            self.accel_mmps2
        } else {
            self.decel_mmps2
        };
        self.measured_speed_mmps = step_towards(
            self.measured_speed_mmps,
            self.desired_speed_mmps,
            rate.abs() * dt_s,
        );

        let speed = self.measured_speed_mmps;

        // Crosstrack steering law: turn towards a heading which is the
        // arctan of a gain times the crosstrack error, normalised by speed
        let curvature = if speed.abs() > STEERING_MIN_SPEED_MMPS {
            let mut offset = self.offset_error_mm;
            let mut head_err = self.heading_error_rad;

            // Reversing flips the sense of both errors
            if speed < 0.0 {
                offset = -offset;
                head_err = -NormAngle::new(head_err + std::f64::consts::PI).as_f64();
            }

            -STEERING_K1
                * ((STEERING_K2 * offset / (speed.abs() + STEERING_SPEED_SOFTEN_MMPS)).atan()
                    - head_err)
        } else {
            0.0
        };

        let omega = curvature * speed;

        // Unicycle integration
        self.x_mm += speed * self.heading.cos() * dt_s;
        self.y_mm += speed * self.heading.sin() * dt_s;
        self.heading = self.heading + omega * dt_s;

        self.left_pos_mm += (speed - omega * self.wheel_dist_mm / 2.0) * dt_s;
        self.right_pos_mm += (speed + omega * self.wheel_dist_mm / 2.0) * dt_s;
    }

    /// Track the point-turn velocity profile.
    fn step_point_turn(&mut self) {
        let (_, ang_pos) = self.vpg.step();

        // Follow the profile's angle directly; the wheel travel follows
        // from the heading change
        let new_heading = NormAngle::new(ang_pos);
        let dtheta = new_heading.diff(self.heading);
        self.heading = new_heading;

        self.left_pos_mm -= dtheta * self.wheel_dist_mm / 2.0;
        self.right_pos_mm += dtheta * self.wheel_dist_mm / 2.0;

        if self.vpg.target_reached() {
            debug!(
                "Sim point turn complete at {:.3} rad",
                self.heading.as_f64()
            );
            self.point_turn_active = false;
            self.point_turn_complete = true;
        }
    }
}

impl OdometrySource for SimRobot {
    fn left_wheel_pos_mm(&self) -> f64 {
        self.left_pos_mm
    }

    fn right_wheel_pos_mm(&self) -> f64 {
        self.right_pos_mm
    }

    fn gyro_heading_rad(&self) -> f64 {
        self.heading.as_f64()
    }

    fn micro_counter(&self) -> u64 {
        self.time_us
    }
}

impl SpeedControl for SimRobot {
    fn set_desired_speed(&mut self, speed_mmps: f64) {
        self.desired_speed_mmps = speed_mmps;
    }

    fn set_acceleration(&mut self, accel_mmps2: f64) {
        self.accel_mmps2 = accel_mmps2;
    }

    fn set_deceleration(&mut self, decel_mmps2: f64) {
        self.decel_mmps2 = decel_mmps2;
    }

    fn measured_speed(&self) -> f64 {
        self.measured_speed_mmps
    }
}

impl SteerControl for SimRobot {
    fn set_path_error(&mut self, offset_error_mm: f64, heading_error_rad: f64) {
        self.offset_error_mm = offset_error_mm;
        self.heading_error_rad = heading_error_rad;
    }

    fn execute_point_turn(
        &mut self,
        target_angle: NormAngle,
        max_angular_vel_radps: f64,
        angular_accel_radps2: f64,
        _angular_decel_radps2: f64,
        angle_tol_rad: f64,
        shortest_dir: bool,
    ) {
        // Stop driving
        self.desired_speed_mmps = 0.0;
        self.measured_speed_mmps = 0.0;

        // Resolve the turn into an unwrapped destination angle in the
        // commanded direction
        let dist_rad = if shortest_dir {
            target_angle.diff(self.heading)
        } else {
            self.heading
                .directed_dist(target_angle, max_angular_vel_radps < 0.0)
        };

        debug!(
            "Sim point turn to {:.3} rad ({:+.3} rad) at {:.2} rad/s",
            target_angle.as_f64(),
            dist_rad,
            max_angular_vel_radps
        );

        // Already there and not moving: complete immediately
        if dist_rad.abs() < angle_tol_rad.abs() {
            self.point_turn_active = false;
            self.point_turn_complete = true;
            return;
        }

        let accel = if angular_accel_radps2.abs() > 0.0 {
            angular_accel_radps2
        } else {
            POINT_TURN_DEFAULT_ACCEL_RADPS2
        };

        let curr = self.heading.as_f64();
        self.vpg.start_profile(
            0.0,
            curr,
            max_angular_vel_radps,
            accel,
            0.0,
            curr + dist_rad,
            self.cycle_period_s,
        );

        self.point_turn_active = true;
        self.point_turn_complete = false;
    }

    fn point_turn_complete(&self) -> bool {
        self.point_turn_complete
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Move `value` towards `target` by at most `max_delta`.
fn step_towards(value: f64, target: f64, max_delta: f64) -> f64 {
    if (value - target).abs() <= max_delta {
        target
    } else if value < target {
        value + max_delta
    } else {
        value - max_delta
    }
}
