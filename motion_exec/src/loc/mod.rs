//! # Localisation module
//!
//! Maintains the robot's pose estimate by dead reckoning from incremental
//! wheel travel and the gyro-integrated orientation every control tick, and
//! reconciles that estimate against delayed absolute pose observations
//! ("keyframe corrections") from the external vision system.
//!
//! Every tick's pose is archived in a fixed-capacity ring of timestamped
//! poses. When a correction arrives referring to some past instant, the
//! drift accumulated since that instant is computed from the archive and
//! composed onto the corrected pose, re-projecting the stale observation to
//! the present.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
pub use params::Params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use nalgebra::{Isometry2, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use crate::hal::OdometrySource;
use comms_if::loc::PoseCorrection;
use util::angle::NormAngle;
use util::maths::near_zero;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Capacity of the pose history ring. Once full the oldest entries are
/// silently overwritten.
pub const POSE_HISTORY_LEN: usize = 256;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose (position and heading) of the robot in the world frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position of the robot origin in mm.
    pub position_mm: Vector2<f64>,

    /// Heading of the robot, measured from the world +X axis.
    pub heading: NormAngle,
}

/// A timestamped, frame-tagged pose, as archived in the history ring.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseStamp {
    /// Time the pose was estimated, in ms on the robot's clock.
    pub timestamp_ms: u32,

    /// The archived pose.
    pub pose: Pose,

    /// Keyframe frame id the estimate was reconciled against at the time.
    pub frame_id: u32,
}

/// Localisation state: current pose estimate plus archived history.
pub struct Localization {
    params: Params,

    pose: Pose,

    /// Id of the keyframe the pose was last reconciled against.
    frame_id: u32,

    /// History timestamp of the last applied keyframe correction.
    last_correction_ms: Option<u32>,

    history: heapless::HistoryBuffer<PoseStamp, POSE_HISTORY_LEN>,

    /// Wheel counter values at the previous tick.
    prev_wheel_mm: Option<(f64, f64)>,

    carry_state: CarryState,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Whether the robot is currently carrying a payload, which shifts the
/// drive centre.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarryState {
    NotCarrying,
    Carrying,
}

/// Possible errors raised by history queries.
#[derive(Debug, thiserror::Error)]
pub enum LocError {
    #[error("Pose history is empty")]
    EmptyHistory,

    #[error("Requested time {0} ms predates the oldest archived pose")]
    TimestampTooOld(u32),

    #[error("Requested time {0} ms is newer than the latest archived pose")]
    TimestampTooNew(u32),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(x_mm: f64, y_mm: f64, heading: NormAngle) -> Self {
        Self {
            position_mm: Vector2::new(x_mm, y_mm),
            heading,
        }
    }

    /// Unit vector along the robot's heading.
    pub fn forward(&self) -> Vector2<f64> {
        Vector2::new(self.heading.cos(), self.heading.sin())
    }

    /// The rigid 2D transform taking robot-frame points into the world
    /// frame.
    pub fn to_isometry(&self) -> Isometry2<f64> {
        Isometry2::new(self.position_mm, self.heading.as_f64())
    }

    pub fn from_isometry(iso: &Isometry2<f64>) -> Self {
        Self {
            position_mm: iso.translation.vector,
            heading: NormAngle::new(iso.rotation.angle()),
        }
    }
}

impl Localization {
    /// Create a new localisation instance at the origin pose.
    pub fn new(params: Params) -> Self {
        Self {
            params,
            pose: Pose::default(),
            frame_id: 0,
            last_correction_ms: None,
            history: heapless::HistoryBuffer::new(),
            prev_wheel_mm: None,
            carry_state: CarryState::NotCarrying,
        }
    }

    /// Get the current pose estimate of the robot origin.
    pub fn current_pose(&self) -> Pose {
        self.pose
    }

    /// Get the pose of the drive centre, offset from the origin along the
    /// heading by a carry-state dependent constant.
    pub fn drive_center_pose(&self) -> Pose {
        let offset = match self.carry_state {
            CarryState::NotCarrying => self.params.drive_center_offset_mm,
            CarryState::Carrying => self.params.drive_center_offset_carry_mm,
        };

        Pose {
            position_mm: self.pose.position_mm + offset * self.pose.forward(),
            heading: self.pose.heading,
        }
    }

    /// Get the id of the keyframe the pose was last reconciled against.
    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    pub fn set_carry_state(&mut self, state: CarryState) {
        self.carry_state = state;
    }

    /// Dead-reckon one control tick from the wheel and gyro readings.
    ///
    /// Position advances along the arc implied by the differential wheel
    /// travel (or a straight line when the two deltas are nearly equal);
    /// heading is taken from the gyro-integrated orientation, bounded
    /// against the wheel-implied heading. The resulting pose is always
    /// archived in the history ring.
    pub fn update(&mut self, odo: &impl OdometrySource) {
        let timestamp_ms = (odo.micro_counter() / 1000) as u32;
        let left_mm = odo.left_wheel_pos_mm();
        let right_mm = odo.right_wheel_pos_mm();
        let gyro_heading = NormAngle::new(odo.gyro_heading_rad());

        let (delta_left, delta_right) = match self.prev_wheel_mm {
            Some((prev_left, prev_right)) => (left_mm - prev_left, right_mm - prev_right),
            None => {
                // First tick, nothing to integrate yet
                self.prev_wheel_mm = Some((left_mm, right_mm));
                self.pose.heading = gyro_heading;
                self.archive(timestamp_ms);
                return;
            }
        };
        self.prev_wheel_mm = Some((left_mm, right_mm));

        let zero_tol = self.params.wheel_delta_zero_tol_mm;
        if near_zero(delta_left, zero_tol) && near_zero(delta_right, zero_tol) {
            // Stationary: only resync heading from the gyro
            self.pose.heading = gyro_heading;
            self.archive(timestamp_ms);
            return;
        }

        let dist = 0.5 * (delta_left + delta_right);
        let delta_diff = delta_right - delta_left;
        let dtheta_wheel = delta_diff / self.params.wheel_dist_mm;

        if near_zero(delta_diff, self.params.straight_line_delta_tol_mm) {
            // Effectively infinite turn radius: straight line advance
            self.pose.position_mm += dist * self.pose.forward();
        } else {
            // Advance along the local arc about the instantaneous centre of
            // rotation
            let radius = dist / dtheta_wheel;
            let h = self.pose.heading.as_f64();
            let center = self.pose.position_mm + radius * Vector2::new(-h.sin(), h.cos());
            let h_new = h + dtheta_wheel;
            self.pose.position_mm = center + radius * Vector2::new(h_new.sin(), -h_new.cos());
        }

        // Heading comes from the gyro, with the wheel-implied heading used
        // only to bound it
        let wheel_heading = self.pose.heading + dtheta_wheel;
        let dev = gyro_heading.diff(wheel_heading);
        if dev.abs() > self.params.max_gyro_wheel_dev_rad {
            warn!(
                "Gyro heading deviates {:.3} rad from wheel-implied heading, clamping",
                dev
            );
            self.pose.heading =
                wheel_heading + dev.signum() * self.params.max_gyro_wheel_dev_rad;
        } else {
            self.pose.heading = gyro_heading;
        }

        self.archive(timestamp_ms);
    }

    /// Get the archived pose at the given time.
    ///
    /// An exact timestamp match returns the archived pose directly,
    /// otherwise the pose is linearly interpolated between the two
    /// bracketing entries.
    pub fn historical_pose(&self, timestamp_ms: u32) -> Result<Pose, LocError> {
        let mut iter = self.history.oldest_ordered();

        let mut prev = match iter.next() {
            Some(p) => p,
            None => return Err(LocError::EmptyHistory),
        };

        if timestamp_ms < prev.timestamp_ms {
            return Err(LocError::TimestampTooOld(timestamp_ms));
        }
        if timestamp_ms == prev.timestamp_ms {
            return Ok(prev.pose);
        }

        for entry in iter {
            if timestamp_ms == entry.timestamp_ms {
                return Ok(entry.pose);
            }
            if timestamp_ms < entry.timestamp_ms {
                return Ok(interpolate(prev, entry, timestamp_ms));
            }
            prev = entry;
        }

        Err(LocError::TimestampTooNew(timestamp_ms))
    }

    /// Apply a pose correction from the external vision system.
    ///
    /// A correction with a zero timestamp is a direct override and is
    /// applied unconditionally. Otherwise the correction refers to a past
    /// instant: the drift accumulated between that instant and now is
    /// composed onto the corrected pose, so the (stale) observation is
    /// re-projected to the present. Stale corrections are ignored.
    ///
    /// Returns true if the correction was applied.
    pub fn update_pose_with_keyframe(&mut self, correction: &PoseCorrection) -> bool {
        if correction.timestamp_ms == 0 {
            // Direct override, used to reset to a known pose
            self.pose = Pose::new(
                correction.x_mm,
                correction.y_mm,
                NormAngle::new(correction.angle_rad),
            );
            self.frame_id = correction.frame_id;
            self.last_correction_ms = None;
            info!(
                "Pose override: ({:.1}, {:.1}, {:.3}), frame {}",
                correction.x_mm, correction.y_mm, correction.angle_rad, correction.frame_id
            );
            return true;
        }

        // Corrections referring to keyframes older than the one already
        // reconciled against are stale
        if correction.frame_id < self.frame_id {
            debug!(
                "Ignoring correction for stale frame {} (current {})",
                correction.frame_id, self.frame_id
            );
            return false;
        }

        let historical = match self.historical_pose(correction.timestamp_ms) {
            Ok(p) => p,
            Err(e) => {
                debug!("Ignoring correction at {} ms: {}", correction.timestamp_ms, e);
                return false;
            }
        };

        // Ignore corrections that would re-correct at or before the last
        // applied correction, so out-of-order arrivals cannot rewind the
        // estimate
        if let Some(last_ms) = self.last_correction_ms {
            if last_ms >= correction.timestamp_ms {
                debug!(
                    "Ignoring correction at {} ms, already corrected at {} ms",
                    correction.timestamp_ms, last_ms
                );
                return false;
            }
        }

        // Drift accumulated between the archived instant and now, as a
        // rigid transform
        let drift = self.pose.to_isometry() * historical.to_isometry().inverse();

        let keyframe = Pose::new(
            correction.x_mm,
            correction.y_mm,
            NormAngle::new(correction.angle_rad),
        )
        .to_isometry();

        let corrected = Pose::from_isometry(&(drift * keyframe));

        info!(
            "Keyframe correction (frame {}, {} ms): ({:.1}, {:.1}, {:.3}) -> ({:.1}, {:.1}, \
             {:.3})",
            correction.frame_id,
            correction.timestamp_ms,
            self.pose.position_mm.x,
            self.pose.position_mm.y,
            self.pose.heading.as_f64(),
            corrected.position_mm.x,
            corrected.position_mm.y,
            corrected.heading.as_f64()
        );

        self.pose = corrected;
        self.frame_id = correction.frame_id;
        self.last_correction_ms = Some(correction.timestamp_ms);

        true
    }

    /// Archive the current pose in the history ring.
    fn archive(&mut self, timestamp_ms: u32) {
        self.history.write(PoseStamp {
            timestamp_ms,
            pose: self.pose,
            frame_id: self.frame_id,
        });
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Linearly interpolate between two archived poses by time fraction.
fn interpolate(a: &PoseStamp, b: &PoseStamp, timestamp_ms: u32) -> Pose {
    if b.timestamp_ms == a.timestamp_ms {
        return b.pose;
    }

    let frac = (timestamp_ms - a.timestamp_ms) as f64 / (b.timestamp_ms - a.timestamp_ms) as f64;

    Pose {
        position_mm: a.pose.position_mm + frac * (b.pose.position_mm - a.pose.position_mm),
        // Interpolate heading along the shortest angular difference
        heading: a.pose.heading + frac * b.pose.heading.diff(a.pose.heading),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    /// Odometry stub with directly settable readings.
    struct StubOdo {
        left_mm: f64,
        right_mm: f64,
        gyro_rad: f64,
        time_us: u64,
    }

    impl OdometrySource for StubOdo {
        fn left_wheel_pos_mm(&self) -> f64 {
            self.left_mm
        }
        fn right_wheel_pos_mm(&self) -> f64 {
            self.right_mm
        }
        fn gyro_heading_rad(&self) -> f64 {
            self.gyro_rad
        }
        fn micro_counter(&self) -> u64 {
            self.time_us
        }
    }

    fn loc() -> Localization {
        Localization::new(Params::default())
    }

    #[test]
    fn test_straight_dead_reckoning() {
        let mut loc = loc();
        let mut odo = StubOdo {
            left_mm: 0.0,
            right_mm: 0.0,
            gyro_rad: 0.0,
            time_us: 100_000,
        };

        loc.update(&odo);

        odo.left_mm = 10.0;
        odo.right_mm = 10.0;
        odo.time_us = 150_000;
        loc.update(&odo);

        let pose = loc.current_pose();
        assert_relative_eq!(pose.position_mm.x, 10.0);
        assert_relative_eq!(pose.position_mm.y, 0.0);
        assert_relative_eq!(pose.heading.as_f64(), 0.0);
    }

    #[test]
    fn test_heading_from_gyro_not_wheels() {
        let mut loc = loc();
        let mut odo = StubOdo {
            left_mm: 0.0,
            right_mm: 0.0,
            gyro_rad: 0.0,
            time_us: 100_000,
        };
        loc.update(&odo);

        // Differential travel implies ~0.0417 rad, but the gyro says 0.05:
        // the gyro wins
        odo.left_mm = 9.0;
        odo.right_mm = 11.0;
        odo.gyro_rad = 0.05;
        odo.time_us = 150_000;
        loc.update(&odo);

        assert_relative_eq!(loc.current_pose().heading.as_f64(), 0.05);
    }

    #[test]
    fn test_gyro_bounded_by_wheel_heading() {
        let mut loc = loc();
        let mut odo = StubOdo {
            left_mm: 0.0,
            right_mm: 0.0,
            gyro_rad: 0.0,
            time_us: 100_000,
        };
        loc.update(&odo);

        // Gyro wildly disagrees with the wheels: clamp to the allowed band
        odo.left_mm = 10.0;
        odo.right_mm = 10.0;
        odo.gyro_rad = 1.0;
        odo.time_us = 150_000;
        loc.update(&odo);

        let max_dev = Params::default().max_gyro_wheel_dev_rad;
        assert_relative_eq!(loc.current_pose().heading.as_f64(), max_dev);
    }

    #[test]
    fn test_history_interpolation() {
        let mut loc = loc();
        let mut odo = StubOdo {
            left_mm: 0.0,
            right_mm: 0.0,
            gyro_rad: 0.0,
            time_us: 100_000,
        };
        loc.update(&odo);

        odo.left_mm = 10.0;
        odo.right_mm = 10.0;
        odo.time_us = 150_000;
        loc.update(&odo);

        // Exact hits
        let p = loc.historical_pose(100).unwrap();
        assert_relative_eq!(p.position_mm.x, 0.0);
        let p = loc.historical_pose(150).unwrap();
        assert_relative_eq!(p.position_mm.x, 10.0);

        // Interpolated halfway
        let p = loc.historical_pose(125).unwrap();
        assert_relative_eq!(p.position_mm.x, 5.0);
        assert_relative_eq!(p.position_mm.y, 0.0);
        assert_relative_eq!(p.heading.as_f64(), 0.0);

        // Out of range
        assert!(matches!(
            loc.historical_pose(50),
            Err(LocError::TimestampTooOld(_))
        ));
        assert!(matches!(
            loc.historical_pose(200),
            Err(LocError::TimestampTooNew(_))
        ));
    }

    #[test]
    fn test_keyframe_override() {
        let mut loc = loc();

        let applied = loc.update_pose_with_keyframe(&PoseCorrection {
            frame_id: 3,
            timestamp_ms: 0,
            x_mm: 100.0,
            y_mm: 50.0,
            angle_rad: 1.57,
        });

        assert!(applied);
        let pose = loc.current_pose();
        assert_relative_eq!(pose.position_mm.x, 100.0);
        assert_relative_eq!(pose.position_mm.y, 50.0);
        assert_relative_eq!(pose.heading.as_f64(), 1.57);
        assert_eq!(loc.frame_id(), 3);
    }

    #[test]
    fn test_keyframe_drift_composition() {
        let mut loc = loc();
        let mut odo = StubOdo {
            left_mm: 0.0,
            right_mm: 0.0,
            gyro_rad: 0.0,
            time_us: 100_000,
        };
        loc.update(&odo);

        // Drive straight: 50 mm by t=150ms, 100 mm by t=200ms
        odo.left_mm = 50.0;
        odo.right_mm = 50.0;
        odo.time_us = 150_000;
        loc.update(&odo);

        odo.left_mm = 100.0;
        odo.right_mm = 100.0;
        odo.time_us = 200_000;
        loc.update(&odo);

        // Vision observed us at t=150ms at (50, 20) instead of (50, 0).
        // Drift since then is +50 mm in x, so the corrected current pose is
        // (100, 20)
        let applied = loc.update_pose_with_keyframe(&PoseCorrection {
            frame_id: 1,
            timestamp_ms: 150,
            x_mm: 50.0,
            y_mm: 20.0,
            angle_rad: 0.0,
        });

        assert!(applied);
        let pose = loc.current_pose();
        assert_relative_eq!(pose.position_mm.x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(pose.position_mm.y, 20.0, epsilon = 1e-9);
        assert_relative_eq!(pose.heading.as_f64(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_drive_center_pose() {
        let mut loc = loc();

        loc.update_pose_with_keyframe(&PoseCorrection {
            frame_id: 1,
            timestamp_ms: 0,
            x_mm: 100.0,
            y_mm: 0.0,
            angle_rad: std::f64::consts::FRAC_PI_2,
        });

        // Not carrying: drive centre coincides with the origin by default
        let dc = loc.drive_center_pose();
        assert_relative_eq!(dc.position_mm.x, 100.0);
        assert_relative_eq!(dc.position_mm.y, 0.0);

        // Carrying shifts the drive centre along the heading (+Y here)
        loc.set_carry_state(CarryState::Carrying);
        let dc = loc.drive_center_pose();
        let offset = Params::default().drive_center_offset_carry_mm;
        assert_relative_eq!(dc.position_mm.x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(dc.position_mm.y, offset, epsilon = 1e-9);
    }

    #[test]
    fn test_keyframe_staleness_rules() {
        let mut loc = loc();
        let mut odo = StubOdo {
            left_mm: 0.0,
            right_mm: 0.0,
            gyro_rad: 0.0,
            time_us: 100_000,
        };
        loc.update(&odo);

        odo.left_mm = 100.0;
        odo.right_mm = 100.0;
        odo.time_us = 200_000;
        loc.update(&odo);

        assert!(loc.update_pose_with_keyframe(&PoseCorrection {
            frame_id: 2,
            timestamp_ms: 150,
            x_mm: 50.0,
            y_mm: 0.0,
            angle_rad: 0.0,
        }));

        let pose_after_first = loc.current_pose();

        // Same historical instant again: ignored even with a newer frame id
        assert!(!loc.update_pose_with_keyframe(&PoseCorrection {
            frame_id: 3,
            timestamp_ms: 150,
            x_mm: 60.0,
            y_mm: 0.0,
            angle_rad: 0.0,
        }));

        // Older frame id: ignored
        assert!(!loc.update_pose_with_keyframe(&PoseCorrection {
            frame_id: 1,
            timestamp_ms: 180,
            x_mm: 60.0,
            y_mm: 0.0,
            angle_rad: 0.0,
        }));

        assert_eq!(loc.current_pose(), pose_after_first);
        assert_eq!(loc.frame_id(), 2);
    }
}
