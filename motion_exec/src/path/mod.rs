//! # Path module
//!
//! A [`Path`] is a bounded, ordered sequence of typed segments (straight
//! lines, circular arcs and point turns) which together describe the desired
//! trajectory of the robot on the 2D plane. Paths are built incrementally by
//! a planner (or by the Dubins synthesiser in [`dubins`]) and consumed by the
//! path follower.
//!
//! All positions are in millimeters in the world frame, all angles in
//! radians.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod dubins;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

// Internal
use crate::loc::Pose;
use util::angle::NormAngle;
use util::maths::near_zero;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of segments a path can hold.
///
/// Appends beyond this capacity fail with [`PathError::CapacityExceeded`]
/// rather than growing the path.
pub const MAX_PATH_SEGMENTS: usize = 32;

/// Slope magnitude above which a line segment is treated as vertical.
const VERTICAL_SLOPE_LIMIT: f64 = 10000.0;

/// Tolerance used when deciding if a line segment is horizontal.
const HORIZONTAL_SLOPE_TOL: f64 = 0.001;

/// Tolerance on residual sweep when splitting arcs, in radians.
const SWEEP_SPLIT_TOL_RAD: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Speed targets carried by every path segment.
///
/// For line and arc segments these are linear quantities (mm/s and mm/s^2),
/// with the sign of `target_speed` encoding the direction of travel. For
/// point turns they are the angular equivalents (rad/s and rad/s^2).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedProfile {
    /// Target speed over the segment. Negative linear speeds drive the
    /// segment in reverse; negative rotation speeds turn clockwise.
    pub target_speed: f64,

    /// Acceleration magnitude used to reach the target speed.
    pub accel: f64,

    /// Deceleration magnitude used at the end of the segment.
    pub decel: f64,
}

/// Geometric definition of a single path segment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum SegmentDef {
    /// A straight line between two points.
    Line {
        /// Start point in mm.
        start_mm: Vector2<f64>,

        /// End point in mm.
        end_mm: Vector2<f64>,
    },

    /// A circular arc.
    ///
    /// Stored arcs never sweep across the angles 0 or pi, so that each arc
    /// is a single-valued function of x. [`Path::append_arc`] splits wider
    /// arcs automatically.
    Arc {
        /// Centre of the arc's circle in mm.
        center_mm: Vector2<f64>,

        /// Radius of the arc in mm. The sign mirrors the turn direction of
        /// the sweep; all geometry uses the magnitude.
        radius_mm: f64,

        /// Angle on the circle at which the arc starts.
        start_rad: f64,

        /// Signed sweep of the arc. Positive sweeps are counter-clockwise.
        sweep_rad: f64,
    },

    /// A turn on the spot about a pivot point.
    PointTurn {
        /// Pivot point in mm.
        point_mm: Vector2<f64>,

        /// Heading at the start of the turn.
        start_angle: NormAngle,

        /// Heading to finish the turn at.
        target_angle: NormAngle,

        /// Tolerance on the final heading, in radians.
        angle_tol_rad: f64,

        /// If true the turn may go in whichever direction is shorter,
        /// ignoring the sign of the target rotation speed.
        shortest_dir: bool,
    },
}

/// One segment of a [`Path`]: geometry plus speed targets.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    /// The segment's geometry.
    pub def: SegmentDef,

    /// The segment's speed targets.
    pub profile: SpeedProfile,
}

/// Result of querying the robot's position against a segment.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SegmentQuery {
    /// Where the queried pose sits along the segment.
    pub range: SegmentRange,

    /// Perpendicular (cross-track) distance from the pose to the segment in
    /// mm. Positive when the pose is to the left of the direction of
    /// travel.
    pub offset_error_mm: f64,

    /// Difference between the segment's local heading and the pose's
    /// heading, in radians.
    pub heading_error_rad: f64,

    /// Distance along the segment from the closest point to the segment's
    /// end, in mm. Negative once the pose has passed the end.
    pub dist_to_end_mm: f64,
}

/// The desired trajectory of the robot: a bounded sequence of segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    segments: heapless::Vec<PathSegment, MAX_PATH_SEGMENTS>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Where a queried pose sits relative to a segment's extent.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SegmentRange {
    /// The closest point on the segment's supporting geometry lies within
    /// the segment.
    InRange,

    /// The pose projects beyond the segment's start.
    NearStart,

    /// The pose projects beyond the segment's end.
    NearEnd,
}

/// Possible errors raised by path construction and manipulation.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// The path already holds [`MAX_PATH_SEGMENTS`] segments.
    #[error("Path is full, cannot append another segment")]
    CapacityExceeded,

    /// An arc with zero sweep cannot be appended.
    #[error("Arc sweep angle is zero")]
    ZeroSweepArc,

    /// Attempted to pop more segments than the path holds.
    #[error("Cannot pop {requested} segments from a {available} segment path")]
    PopTooLarge { requested: usize, available: usize },

    /// No Dubins path family produced a drivable path between the requested
    /// poses.
    #[error("No Dubins path family produced a drivable path")]
    NoPathFound,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SpeedProfile {
    pub fn new(target_speed: f64, accel: f64, decel: f64) -> Self {
        Self {
            target_speed,
            accel,
            decel,
        }
    }

    /// True if the segment is traversed in reverse.
    pub fn is_reverse(&self) -> bool {
        self.target_speed < 0.0
    }
}

impl PathSegment {
    /// Get the length of the segment in mm. Point turns have zero length.
    pub fn length_mm(&self) -> f64 {
        match self.def {
            SegmentDef::Line { start_mm, end_mm } => (end_mm - start_mm).norm(),
            SegmentDef::Arc {
                radius_mm,
                sweep_rad,
                ..
            } => sweep_rad.abs() * radius_mm.abs(),
            SegmentDef::PointTurn { .. } => 0.0,
        }
    }

    /// Get the start point of the segment in mm.
    pub fn start_point_mm(&self) -> Vector2<f64> {
        match self.def {
            SegmentDef::Line { start_mm, .. } => start_mm,
            SegmentDef::Arc {
                center_mm,
                radius_mm,
                start_rad,
                ..
            } => center_mm + radius_mm.abs() * Vector2::new(start_rad.cos(), start_rad.sin()),
            SegmentDef::PointTurn { point_mm, .. } => point_mm,
        }
    }

    /// Get the heading of the robot at the start of the segment.
    pub fn start_angle(&self) -> NormAngle {
        match self.def {
            // For straight lines the start and end headings are the same
            SegmentDef::Line { .. } => self.end_pose().heading,
            SegmentDef::Arc { sweep_rad, .. } => self.end_pose().heading - sweep_rad,
            SegmentDef::PointTurn { start_angle, .. } => start_angle,
        }
    }

    /// Get the pose of the robot at the end of the segment.
    pub fn end_pose(&self) -> Pose {
        match self.def {
            SegmentDef::Line { start_mm, end_mm } => {
                let mut heading =
                    NormAngle::new((end_mm.y - start_mm.y).atan2(end_mm.x - start_mm.x));
                // If traversed backwards the robot faces away from the
                // direction of travel
                if self.profile.is_reverse() {
                    heading = heading + PI;
                }
                Pose::new(end_mm.x, end_mm.y, heading)
            }
            SegmentDef::Arc {
                center_mm,
                radius_mm,
                start_rad,
                sweep_rad,
            } => {
                let end_rad = start_rad + sweep_rad;
                let pos = center_mm + radius_mm.abs() * Vector2::new(end_rad.cos(), end_rad.sin());
                // The tangent at the end of the arc, offset by 90 deg in the
                // direction of the sweep
                let mut heading = NormAngle::new(if sweep_rad > 0.0 {
                    end_rad + FRAC_PI_2
                } else {
                    end_rad - FRAC_PI_2
                });
                if self.profile.is_reverse() {
                    heading = heading + PI;
                }
                Pose::new(pos.x, pos.y, heading)
            }
            SegmentDef::PointTurn {
                point_mm,
                target_angle,
                ..
            } => Pose::new(point_mm.x, point_mm.y, target_angle),
        }
    }

    /// Translate the segment by the given offset.
    pub fn offset_start(&mut self, offset_mm: Vector2<f64>) {
        match &mut self.def {
            SegmentDef::Line { start_mm, end_mm } => {
                *start_mm += offset_mm;
                *end_mm += offset_mm;
            }
            SegmentDef::Arc { center_mm, .. } => {
                *center_mm += offset_mm;
            }
            SegmentDef::PointTurn { point_mm, .. } => {
                *point_mm += offset_mm;
            }
        }
    }

    /// Query the given pose against this segment.
    ///
    /// Returns the cross-track and heading errors of the pose relative to
    /// the segment, the distance remaining to the segment's end and whether
    /// the pose projects inside the segment's extent.
    pub fn dist_to_segment(&self, pose: &Pose) -> SegmentQuery {
        match self.def {
            SegmentDef::Line { start_mm, end_mm } => self.dist_to_line(pose, start_mm, end_mm),
            SegmentDef::Arc {
                center_mm,
                radius_mm,
                start_rad,
                sweep_rad,
            } => self.dist_to_arc(pose, center_mm, radius_mm.abs(), start_rad, sweep_rad),
            SegmentDef::PointTurn {
                point_mm,
                target_angle,
                shortest_dir,
                ..
            } => self.dist_to_point_turn(pose, point_mm, target_angle, shortest_dir),
        }
    }

    /// Line variant of [`PathSegment::dist_to_segment`].
    fn dist_to_line(&self, pose: &Pose, start_mm: Vector2<f64>, end_mm: Vector2<f64>) -> SegmentQuery {
        let x = pose.position_mm.x;
        let y = pose.position_mm.y;

        let slope = (end_mm.y - start_mm.y) / (end_mm.x - start_mm.x);
        let intercept = start_mm.y - slope * start_mm.x;
        let dy_sign = if (end_mm.y - start_mm.y) >= 0.0 { 1.0 } else { -1.0 };
        let line_theta = NormAngle::new((end_mm.y - start_mm.y).atan2(end_mm.x - start_mm.x));

        let heading_error_rad = line_theta.diff(pose.heading);

        let sq_dist_to_start = (start_mm - pose.position_mm).norm_squared();
        let sq_dist_to_end = (end_mm - pose.position_mm).norm_squared();

        let mut range = SegmentRange::InRange;
        let offset_error_mm;
        let mut dist_to_end_mm;

        if slope.abs() > VERTICAL_SLOPE_LIMIT {
            // Special case: vertical line
            offset_error_mm = if end_mm.y > start_mm.y {
                start_mm.x - x
            } else {
                x - start_mm.x
            };

            dist_to_end_mm = (end_mm.y - y).abs();

            // If the projection of the pose is not between the start and end
            // points, and the pose is closer to the end than the start, the
            // segment has been passed
            if (start_mm.y - y).is_sign_negative() == (end_mm.y - y).is_sign_negative() {
                if sq_dist_to_start > sq_dist_to_end {
                    dist_to_end_mm = -dist_to_end_mm;
                    range = SegmentRange::NearEnd;
                } else {
                    range = SegmentRange::NearStart;
                }
            }
        } else if near_zero(slope, HORIZONTAL_SLOPE_TOL) {
            // Special case: horizontal line
            offset_error_mm = if end_mm.x > start_mm.x {
                y - start_mm.y
            } else {
                start_mm.y - y
            };

            dist_to_end_mm = (end_mm.x - x).abs();

            if (start_mm.x - x).is_sign_negative() == (end_mm.x - x).is_sign_negative() {
                if sq_dist_to_start > sq_dist_to_end {
                    dist_to_end_mm = -dist_to_end_mm;
                    range = SegmentRange::NearEnd;
                } else {
                    range = SegmentRange::NearStart;
                }
            }
        } else {
            // General case. The shortest path from the pose to the line runs
            // along the perpendicular through the pose: the intersection is
            // the solution of m*x + b == (-1/m)*x + b_inv.
            let b_inv = y + x / slope;

            let x_isect = slope * (b_inv - intercept) / (slope * slope + 1.0);
            let y_isect = -(x_isect / slope) + b_inv;

            let dy = y - y_isect;
            let dx = x - x_isect;

            let mut offset = (dy * dy + dx * dx).sqrt();

            // Recover the sign of the cross-track error (positive to the
            // left of the direction of travel)
            offset *= (if slope.is_sign_negative() { -1.0 } else { 1.0 })
                * (if dy.is_sign_negative() { -1.0 } else { 1.0 })
                * dy_sign;
            offset_error_mm = offset;

            dist_to_end_mm = (end_mm - Vector2::new(x_isect, y_isect)).norm();

            if (start_mm.x - x_isect).is_sign_negative() == (end_mm.x - x_isect).is_sign_negative()
                && (start_mm.y - y_isect).is_sign_negative()
                    == (end_mm.y - y_isect).is_sign_negative()
            {
                if sq_dist_to_start > sq_dist_to_end {
                    dist_to_end_mm = -dist_to_end_mm;
                    range = SegmentRange::NearEnd;
                } else {
                    range = SegmentRange::NearStart;
                }
            }
        }

        SegmentQuery {
            range,
            offset_error_mm,
            heading_error_rad,
            dist_to_end_mm,
        }
    }

    /// Arc variant of [`PathSegment::dist_to_segment`].
    ///
    /// Assumes the arc has been split so that it never sweeps across 0 or
    /// pi (see [`Path::append_arc`]).
    fn dist_to_arc(
        &self,
        pose: &Pose,
        center_mm: Vector2<f64>,
        radius_mm: f64,
        start_rad: f64,
        sweep_rad: f64,
    ) -> SegmentQuery {
        let rel = pose.position_mm - center_mm;

        let moving_ccw = sweep_rad >= 0.0;

        // Angle of the line from the circle centre to the pose, and the
        // expected heading at the closest point of the arc
        let theta_line = NormAngle::new(rel.y.atan2(rel.x));
        let theta_tangent = theta_line + if moving_ccw { FRAC_PI_2 } else { -FRAC_PI_2 };

        let heading_error_rad = theta_tangent.diff(pose.heading);

        let mut offset_error_mm = rel.norm() - radius_mm;
        if moving_ccw {
            offset_error_mm = -offset_error_mm;
        }

        let mut dist_to_end_mm =
            (NormAngle::new(start_rad + sweep_rad).diff(theta_line) * radius_mm).abs();

        // Check whether the angle swept so far exceeds the arc's sweep, also
        // allowing for the wrap between -pi and pi by treating anything more
        // than half the remaining circle as beyond the start
        let mut range = SegmentRange::InRange;
        let ang_diff = theta_line.diff(NormAngle::new(start_rad));

        if moving_ccw {
            if ang_diff > sweep_rad || ang_diff < -0.5 * (TAU - sweep_rad) {
                dist_to_end_mm = -dist_to_end_mm;
                range = SegmentRange::NearEnd;
            } else if ang_diff < 0.0 && ang_diff > -0.5 * (TAU - sweep_rad) {
                range = SegmentRange::NearStart;
            }
        } else if ang_diff < sweep_rad || ang_diff > 0.5 * (TAU + sweep_rad) {
            dist_to_end_mm = -dist_to_end_mm;
            range = SegmentRange::NearEnd;
        } else if ang_diff > 0.0 && ang_diff < 0.5 * (TAU - sweep_rad) {
            range = SegmentRange::NearStart;
        }

        SegmentQuery {
            range,
            offset_error_mm,
            heading_error_rad,
            dist_to_end_mm,
        }
    }

    /// Point turn variant of [`PathSegment::dist_to_segment`].
    ///
    /// Always reports [`SegmentRange::InRange`], since the pose alone cannot
    /// tell whether the turn is approaching or has passed the target angle.
    fn dist_to_point_turn(
        &self,
        pose: &Pose,
        point_mm: Vector2<f64>,
        target_angle: NormAngle,
        shortest_dir: bool,
    ) -> SegmentQuery {
        let offset_error_mm = (pose.position_mm - point_mm).norm();

        let heading_error_rad = if shortest_dir {
            target_angle.diff(pose.heading)
        } else {
            pose.heading
                .directed_dist(target_angle, self.profile.target_speed < 0.0)
        };

        SegmentQuery {
            range: SegmentRange::InRange,
            offset_error_mm,
            heading_error_rad,
            dist_to_end_mm: 0.0,
        }
    }
}

impl Path {
    /// Create a new empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all segments from the path.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Get the number of segments in the path.
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get the segment at the given index.
    pub fn get(&self, index: usize) -> Option<&PathSegment> {
        self.segments.get(index)
    }

    /// Get the total length of the path in mm.
    pub fn total_length_mm(&self) -> f64 {
        self.segments.iter().map(|s| s.length_mm()).sum()
    }

    /// Append a straight line segment.
    pub fn append_line(
        &mut self,
        start_mm: Vector2<f64>,
        end_mm: Vector2<f64>,
        profile: SpeedProfile,
    ) -> Result<(), PathError> {
        self.push(PathSegment {
            def: SegmentDef::Line { start_mm, end_mm },
            profile,
        })
    }

    /// Append an arc segment.
    ///
    /// Arcs must be single-valued functions of x so that segment-distance
    /// queries are well defined, which means a stored arc may not sweep
    /// across the angles 0 or pi. Any arc which would is split into several
    /// sub-arcs at those crossings.
    pub fn append_arc(
        &mut self,
        center_mm: Vector2<f64>,
        radius_mm: f64,
        start_rad: f64,
        sweep_rad: f64,
        profile: SpeedProfile,
    ) -> Result<(), PathError> {
        if near_zero(sweep_rad, SWEEP_SPLIT_TOL_RAD) {
            warn!("Cannot append arc with zero sweep angle");
            return Err(PathError::ZeroSweepArc);
        }

        let mut sweep_left = sweep_rad.abs();
        let mut curr_angle = NormAngle::new(start_rad);

        let zero_angle = NormAngle::new(0.0);
        let pi_angle = NormAngle::new(PI);

        // The limit angle toggles between 0 and pi for as long as traversing
        // the sweep crosses one of them
        let mut limit_angle = zero_angle;
        if (curr_angle.as_f64() >= 0.0 && curr_angle != pi_angle && sweep_rad > 0.0)
            || (curr_angle.as_f64() < 0.0 && sweep_rad < 0.0)
        {
            limit_angle = pi_angle;
        }

        while sweep_left > 0.0 {
            let sweep = if sweep_rad > 0.0 {
                limit_angle.diff(curr_angle).abs().min(sweep_left)
            } else {
                (-limit_angle.diff(curr_angle).abs()).max(-sweep_left)
            };

            if !near_zero(sweep, SWEEP_SPLIT_TOL_RAD) {
                self.push(PathSegment {
                    def: SegmentDef::Arc {
                        center_mm,
                        radius_mm,
                        start_rad: curr_angle.as_f64(),
                        sweep_rad: sweep,
                    },
                    profile,
                })?;
            }

            if sweep.abs() >= sweep_left {
                sweep_left = 0.0;
            } else {
                curr_angle = limit_angle;
                sweep_left -= sweep.abs();
            }

            // Toggle the limit angle
            limit_angle = if limit_angle == pi_angle {
                zero_angle
            } else {
                pi_angle
            };
        }

        Ok(())
    }

    /// Append a point turn segment.
    #[allow(clippy::too_many_arguments)]
    pub fn append_point_turn(
        &mut self,
        point_mm: Vector2<f64>,
        start_angle: NormAngle,
        target_angle: NormAngle,
        target_rot_speed_radps: f64,
        rot_accel_radps2: f64,
        rot_decel_radps2: f64,
        angle_tol_rad: f64,
        shortest_dir: bool,
    ) -> Result<(), PathError> {
        self.push(PathSegment {
            def: SegmentDef::PointTurn {
                point_mm,
                start_angle,
                target_angle,
                angle_tol_rad,
                shortest_dir,
            },
            profile: SpeedProfile::new(target_rot_speed_radps, rot_accel_radps2, rot_decel_radps2),
        })
    }

    /// Append an already constructed segment.
    pub fn append_segment(&mut self, segment: PathSegment) -> Result<(), PathError> {
        self.push(segment)
    }

    /// Discard the given number of segments from the front of the path.
    pub fn pop_front(&mut self, num_segments: usize) -> Result<(), PathError> {
        if num_segments > self.segments.len() {
            return Err(PathError::PopTooLarge {
                requested: num_segments,
                available: self.segments.len(),
            });
        }

        // heapless::Vec has no drain, shift the retained tail down instead
        let remaining = self.segments.len() - num_segments;
        for i in 0..remaining {
            self.segments[i] = self.segments[i + num_segments];
        }
        self.segments.truncate(remaining);

        Ok(())
    }

    /// Discard the given number of segments from the back of the path.
    pub fn pop_back(&mut self, num_segments: usize) -> Result<(), PathError> {
        if num_segments > self.segments.len() {
            return Err(PathError::PopTooLarge {
                requested: num_segments,
                available: self.segments.len(),
            });
        }

        self.segments.truncate(self.segments.len() - num_segments);

        Ok(())
    }

    /// Check that the segment at the given index starts where the previous
    /// segment ends, within the given squared distance tolerance.
    ///
    /// The first segment is always continuous; an index beyond the path is
    /// not.
    pub fn check_segment_continuity(&self, tolerance_mm_sq: f64, index: usize) -> bool {
        if index >= self.segments.len() {
            return false;
        }

        if index == 0 {
            return true;
        }

        let start = self.segments[index].start_point_mm();
        let end = self.segments[index - 1].end_pose().position_mm;

        if (start - end).norm_squared() < tolerance_mm_sq {
            true
        } else {
            warn!(
                "Continuity fail: segment {} start point ({:.2}, {:.2}), segment {} end point \
                 ({:.2}, {:.2})",
                index,
                start.x,
                start.y,
                index - 1,
                end.x,
                end.y
            );
            false
        }
    }

    /// Check continuity across the whole path.
    pub fn check_continuity(&self, tolerance_mm_sq: f64) -> bool {
        for i in 0..self.segments.len() {
            if !self.check_segment_continuity(tolerance_mm_sq, i) {
                warn!(
                    "Continuity check failed on segment {} of {}",
                    i,
                    self.segments.len()
                );
                return false;
            }
        }
        true
    }

    /// Push a segment, failing if the path is full.
    fn push(&mut self, segment: PathSegment) -> Result<(), PathError> {
        self.segments
            .push(segment)
            .map_err(|_| PathError::CapacityExceeded)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn profile() -> SpeedProfile {
        SpeedProfile::new(100.0, 200.0, 200.0)
    }

    #[test]
    fn test_line_end_pose() {
        let seg = PathSegment {
            def: SegmentDef::Line {
                start_mm: Vector2::new(0.0, 0.0),
                end_mm: Vector2::new(100.0, 100.0),
            },
            profile: profile(),
        };

        let end = seg.end_pose();
        assert_relative_eq!(end.position_mm.x, 100.0);
        assert_relative_eq!(end.position_mm.y, 100.0);
        assert_relative_eq!(end.heading.as_f64(), std::f64::consts::FRAC_PI_4);
        assert_relative_eq!(seg.length_mm(), 2f64.sqrt() * 100.0);

        // Reversed lines face away from the direction of travel
        let rev = PathSegment {
            profile: SpeedProfile::new(-100.0, 200.0, 200.0),
            ..seg
        };
        assert_relative_eq!(
            rev.end_pose().heading.as_f64(),
            std::f64::consts::FRAC_PI_4 - PI
        );
    }

    #[test]
    fn test_line_offset_sign() {
        // Horizontal line travelling +x: left of the path is +y
        let seg = PathSegment {
            def: SegmentDef::Line {
                start_mm: Vector2::new(0.0, 0.0),
                end_mm: Vector2::new(100.0, 0.0),
            },
            profile: profile(),
        };

        let q = seg.dist_to_segment(&Pose::new(50.0, 10.0, NormAngle::new(0.0)));
        assert_eq!(q.range, SegmentRange::InRange);
        assert_relative_eq!(q.offset_error_mm, 10.0);
        assert_relative_eq!(q.dist_to_end_mm, 50.0);

        // Diagonal line: point on the left gives positive offset
        let diag = PathSegment {
            def: SegmentDef::Line {
                start_mm: Vector2::new(0.0, 0.0),
                end_mm: Vector2::new(100.0, 100.0),
            },
            profile: profile(),
        };
        let q = diag.dist_to_segment(&Pose::new(0.0, 10.0, NormAngle::new(0.0)));
        assert!(q.offset_error_mm > 0.0);
        let q = diag.dist_to_segment(&Pose::new(10.0, 0.0, NormAngle::new(0.0)));
        assert!(q.offset_error_mm < 0.0);
    }

    #[test]
    fn test_line_passed_end() {
        let seg = PathSegment {
            def: SegmentDef::Line {
                start_mm: Vector2::new(0.0, 0.0),
                end_mm: Vector2::new(100.0, 0.0),
            },
            profile: profile(),
        };

        let q = seg.dist_to_segment(&Pose::new(110.0, 0.5, NormAngle::new(0.0)));
        assert_eq!(q.range, SegmentRange::NearEnd);
        assert!(q.dist_to_end_mm < 0.0);

        let q = seg.dist_to_segment(&Pose::new(-10.0, 0.5, NormAngle::new(0.0)));
        assert_eq!(q.range, SegmentRange::NearStart);
    }

    #[test]
    fn test_arc_offset_and_range() {
        // Quarter circle, radius 100, centred on origin, start angle -pi/2
        // (bottom of the circle), sweeping CCW towards angle 0
        let seg = PathSegment {
            def: SegmentDef::Arc {
                center_mm: Vector2::new(0.0, 0.0),
                radius_mm: 100.0,
                start_rad: -FRAC_PI_2,
                sweep_rad: FRAC_PI_2,
            },
            profile: profile(),
        };

        // Robot slightly outside the circle, at the arc's midpoint angle.
        // For CCW motion outside the circle is to the right: negative offset
        let ang = -FRAC_PI_2 / 2.0;
        let pos = 110.0 * Vector2::new(ang.cos(), ang.sin());
        let q = seg.dist_to_segment(&Pose::new(
            pos.x,
            pos.y,
            NormAngle::new(ang + FRAC_PI_2),
        ));
        assert_eq!(q.range, SegmentRange::InRange);
        assert_relative_eq!(q.offset_error_mm, -10.0, max_relative = 1e-9);
        assert_relative_eq!(q.heading_error_rad, 0.0, epsilon = 1e-9);
        assert_relative_eq!(q.dist_to_end_mm, FRAC_PI_2 / 2.0 * 100.0, max_relative = 1e-9);

        // Pose past the arc's end
        let ang: f64 = 0.2;
        let pos = 100.0 * Vector2::new(ang.cos(), ang.sin());
        let q = seg.dist_to_segment(&Pose::new(pos.x, pos.y, NormAngle::new(ang + FRAC_PI_2)));
        assert_eq!(q.range, SegmentRange::NearEnd);
        assert!(q.dist_to_end_mm < 0.0);
    }

    #[test]
    fn test_arc_splitting() {
        let mut path = Path::new();

        // A 3/4 turn starting at angle -pi/4 sweeping CCW crosses both 0 and
        // pi, so should be split into three sub-arcs
        path.append_arc(
            Vector2::new(0.0, 0.0),
            100.0,
            -std::f64::consts::FRAC_PI_4,
            1.5 * PI,
            profile(),
        )
        .unwrap();

        assert_eq!(path.num_segments(), 3);

        // Total sweep is preserved
        let total_sweep: f64 = (0..path.num_segments())
            .map(|i| match path.get(i).unwrap().def {
                SegmentDef::Arc { sweep_rad, .. } => sweep_rad,
                _ => panic!("expected arc"),
            })
            .sum();
        assert_relative_eq!(total_sweep, 1.5 * PI, max_relative = 1e-9);

        // And the sub-arcs are continuous
        assert!(path.check_continuity(0.01));
    }

    #[test]
    fn test_continuity() {
        let mut path = Path::new();
        path.append_line(Vector2::new(0.0, 0.0), Vector2::new(100.0, 0.0), profile())
            .unwrap();
        path.append_line(
            Vector2::new(100.0, 0.0),
            Vector2::new(200.0, 0.0),
            profile(),
        )
        .unwrap();
        assert!(path.check_continuity(0.01));

        // Perturb the second segment's start beyond the tolerance
        let mut path = Path::new();
        path.append_line(Vector2::new(0.0, 0.0), Vector2::new(100.0, 0.0), profile())
            .unwrap();
        path.append_line(
            Vector2::new(100.0, 0.5),
            Vector2::new(200.0, 0.5),
            profile(),
        )
        .unwrap();
        assert!(!path.check_continuity(0.01));
    }

    #[test]
    fn test_capacity() {
        let mut path = Path::new();
        for i in 0..MAX_PATH_SEGMENTS {
            path.append_line(
                Vector2::new(i as f64, 0.0),
                Vector2::new(i as f64 + 1.0, 0.0),
                profile(),
            )
            .unwrap();
        }

        let res = path.append_line(Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0), profile());
        assert!(matches!(res, Err(PathError::CapacityExceeded)));
    }

    #[test]
    fn test_offset_and_start_angle() {
        let mut seg = PathSegment {
            def: SegmentDef::Arc {
                center_mm: Vector2::new(0.0, 0.0),
                radius_mm: 100.0,
                start_rad: -FRAC_PI_2,
                sweep_rad: FRAC_PI_2,
            },
            profile: profile(),
        };

        // Tangent at the bottom of a CCW circle points along +X
        assert_relative_eq!(seg.start_angle().as_f64(), 0.0);

        seg.offset_start(Vector2::new(10.0, -5.0));
        let start = seg.start_point_mm();
        assert_relative_eq!(start.x, 10.0);
        assert_relative_eq!(start.y, -105.0);

        // Appending a pre-built segment behaves like the typed appends
        let mut path = Path::new();
        path.append_segment(seg).unwrap();
        assert_eq!(path.num_segments(), 1);
    }

    #[test]
    fn test_pop() {
        let mut path = Path::new();
        for i in 0..4 {
            path.append_line(
                Vector2::new(i as f64 * 10.0, 0.0),
                Vector2::new((i + 1) as f64 * 10.0, 0.0),
                profile(),
            )
            .unwrap();
        }

        path.pop_front(2).unwrap();
        assert_eq!(path.num_segments(), 2);
        assert_relative_eq!(path.get(0).unwrap().start_point_mm().x, 20.0);

        path.pop_back(1).unwrap();
        assert_eq!(path.num_segments(), 1);

        assert!(matches!(
            path.pop_front(2),
            Err(PathError::PopTooLarge { .. })
        ));
    }
}
