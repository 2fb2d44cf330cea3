//! # Path follower module
//!
//! Walks the robot along a [`Path`] one control tick at a time. Each tick
//! the follower reads the current pose from localisation, computes tracking
//! errors against the active segment at a lookahead point, decides when to
//! begin decelerating towards a stopping segment's end, manages transitions
//! between segments (including point turns, which are dispatched to the
//! steering collaborator and polled for completion) and pushes speed and
//! error targets to the speed/steering collaborator.
//!
//! Lifecycle events (started/completed/interrupted) are returned to the
//! caller for externally commanded paths, identified by a path id.

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

// Internal
use crate::hal::{SpeedControl, SteerControl};
use crate::loc::{Localization, Pose};
use crate::path::{Path, PathSegment, SegmentDef, SegmentRange};
use comms_if::motion::PathEvent;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The path follower state machine.
pub struct PathFollower {
    params: Params,

    /// The path being traversed.
    path: Path,

    /// Executing state
    state: FollowerState,

    /// Identifier of the current path, supplied by the commander.
    path_id: u16,

    /// True if the current path was externally commanded, in which case
    /// lifecycle events are emitted for it.
    external: bool,

    /// True once the end-of-segment deceleration has been commanded for the
    /// current segment.
    started_decel: bool,

    /// True once the point turn for the current segment has been issued to
    /// the steering collaborator.
    point_turn_issued: bool,

    /// True once tracking errors for the current (stopping) segment are
    /// referenced to the robot's true pose rather than the lookahead point.
    use_robot_ref: bool,

    report: StatusReport,
}

/// The status report containing the current tracking errors.
#[derive(Debug, Default, Copy, Clone)]
pub struct StatusReport {
    /// Index of the segment being traversed.
    pub seg_idx: usize,

    /// Cross-track error to the current segment in mm.
    pub offset_error_mm: f64,

    /// Heading error to the current segment in radians.
    pub heading_error_rad: f64,

    /// Distance remaining to the current segment's end in mm.
    pub dist_to_end_mm: f64,

    /// True once the end-of-segment deceleration has begun.
    pub decelerating: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Traversal state of the follower.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FollowerState {
    /// No path loaded.
    Idle,

    /// Traversing the segment at the contained index.
    Traversing { seg_idx: usize },
}

/// Possible errors raised when starting a traversal.
#[derive(Debug, thiserror::Error)]
pub enum FollowerError {
    /// A path is already being traversed. Clear it first.
    #[error("A path is already being traversed")]
    AlreadyTraversing,

    /// Attempted to start traversal of an empty path.
    #[error("Attempted to start traversal of an empty path")]
    EmptyPath,

    /// Consecutive segments do not connect within tolerance. The contained
    /// index is the first offending segment.
    #[error("Path continuity check failed at segment {0}")]
    DiscontinuousPath(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathFollower {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            path: Path::new(),
            state: FollowerState::Idle,
            path_id: 0,
            external: false,
            started_decel: false,
            point_turn_issued: false,
            use_robot_ref: false,
            report: StatusReport::default(),
        }
    }

    /// True while a path is loaded and being traversed.
    pub fn is_traversing(&self) -> bool {
        matches!(self.state, FollowerState::Traversing { .. })
    }

    /// Index of the segment currently being traversed.
    pub fn current_segment(&self) -> Option<usize> {
        match self.state {
            FollowerState::Traversing { seg_idx } => Some(seg_idx),
            FollowerState::Idle => None,
        }
    }

    /// The latest tracking errors, valid while traversing.
    pub fn status_report(&self) -> &StatusReport {
        &self.report
    }

    /// The latest (cross-track, heading) error pair, if a path is active.
    pub fn path_error(&self) -> Option<(f64, f64)> {
        match self.state {
            FollowerState::Traversing { .. } => {
                Some((self.report.offset_error_mm, self.report.heading_error_rad))
            }
            FollowerState::Idle => None,
        }
    }

    /// Begin traversing an externally commanded path.
    ///
    /// The path's continuity is verified before anything is started: a path
    /// whose segments do not connect is rejected and no state changes.
    /// Returns the started event for the commander.
    pub fn start_path_traversal<C: SpeedControl>(
        &mut self,
        path: Path,
        path_id: u16,
        ctrl: &mut C,
    ) -> Result<Option<PathEvent>, FollowerError> {
        self.begin(path, path_id, true, ctrl)?;

        Ok(Some(PathEvent::started(path_id)))
    }

    /// Begin traversing an internally generated path (no lifecycle events).
    pub fn start_path_traversal_internal<C: SpeedControl>(
        &mut self,
        path: Path,
        ctrl: &mut C,
    ) -> Result<(), FollowerError> {
        self.begin(path, 0, false, ctrl)
    }

    /// Abort the current path immediately.
    ///
    /// The path state is cleared synchronously; motion already commanded is
    /// left to the speed collaborator's own ramp-down. Returns the
    /// interruption event if an external path was in progress.
    pub fn clear_path(&mut self) -> Option<PathEvent> {
        match self.state {
            FollowerState::Idle => None,
            FollowerState::Traversing { .. } => {
                info!("Path {} cleared while traversing", self.path_id);
                self.finish(true)
            }
        }
    }

    /// Process one control tick.
    ///
    /// Localisation must have been updated for this tick before calling.
    /// Returns a lifecycle event when an external path completes or is
    /// aborted. Segments advance by at most one per call.
    pub fn update<C: SpeedControl + SteerControl>(
        &mut self,
        loc: &Localization,
        ctrl: &mut C,
    ) -> Option<PathEvent> {
        let seg_idx = match self.state {
            FollowerState::Idle => return None,
            FollowerState::Traversing { seg_idx } => seg_idx,
        };

        // Safe to unwrap, traversal start and advancement guarantee the
        // index is in range
        let seg = *self.path.get(seg_idx).unwrap();
        let pose = loc.current_pose();

        match seg.def {
            SegmentDef::PointTurn {
                target_angle,
                angle_tol_rad,
                shortest_dir,
                ..
            } => {
                if !self.point_turn_issued {
                    ctrl.execute_point_turn(
                        target_angle,
                        seg.profile.target_speed,
                        seg.profile.accel,
                        seg.profile.decel,
                        angle_tol_rad,
                        shortest_dir,
                    );
                    self.point_turn_issued = true;
                    None
                } else if ctrl.point_turn_complete() {
                    self.advance(seg_idx, ctrl)
                } else {
                    None
                }
            }
            SegmentDef::Line { .. } | SegmentDef::Arc { .. } => {
                self.update_drive_segment(seg_idx, &seg, &pose, ctrl)
            }
        }
    }

    /// Per-tick processing of a line or arc segment.
    fn update_drive_segment<C: SpeedControl + SteerControl>(
        &mut self,
        seg_idx: usize,
        seg: &PathSegment,
        pose: &Pose,
        ctrl: &mut C,
    ) -> Option<PathEvent> {
        // A stopping segment must end with the robot at rest: the last
        // segment of the path, or one followed by a point turn
        let stopping_segment = match self.path.get(seg_idx + 1) {
            None => true,
            Some(next) => matches!(next.def, SegmentDef::PointTurn { .. }),
        };

        // Tracking errors are evaluated at a lookahead point advanced along
        // the current heading, signed by the direction of travel
        let travel_sign = if seg.profile.is_reverse() { -1.0 } else { 1.0 };
        let lookahead_pose = Pose {
            position_mm: pose.position_mm
                + travel_sign * self.params.lookahead_dist_mm * pose.forward(),
            heading: pose.heading,
        };

        let query_look = seg.dist_to_segment(&lookahead_pose);

        // Once the lookahead point has fallen past a stopping segment's end
        // the error reference switches to the robot's true pose, so the
        // stopping distance isn't cut short by the lookahead
        if stopping_segment && !self.use_robot_ref && query_look.range == SegmentRange::NearEnd {
            self.use_robot_ref = true;
        }

        let query = if self.use_robot_ref {
            seg.dist_to_segment(pose)
        } else {
            query_look
        };

        self.report = StatusReport {
            seg_idx,
            offset_error_mm: query.offset_error_mm,
            heading_error_rad: query.heading_error_rad,
            dist_to_end_mm: query.dist_to_end_mm,
            decelerating: self.started_decel,
        };

        // Tracking divergence: abort as a runtime failure
        if query.offset_error_mm.abs() > self.params.abort_dist_error_mm {
            warn!(
                "Cross-track error {:.1} mm exceeds limit {:.1} mm on segment {}, aborting path",
                query.offset_error_mm, self.params.abort_dist_error_mm, seg_idx
            );
            ctrl.set_desired_speed(0.0);
            return self.finish(true);
        }

        ctrl.set_path_error(query.offset_error_mm, query.heading_error_rad);

        if stopping_segment {
            // Begin a controlled deceleration once the distance needed to
            // stop at the segment's decel rate no longer fits in the
            // remaining distance
            if !self.started_decel && query.dist_to_end_mm > 0.0 {
                let meas = ctrl.measured_speed();
                let decel = seg.profile.decel.abs();
                let stop_dist = if decel > 0.0 {
                    meas * meas / (2.0 * decel)
                } else {
                    f64::INFINITY
                };

                if stop_dist >= query.dist_to_end_mm {
                    // Too late for the nominal rate: steepen to what the
                    // remaining distance demands
                    let needed = (meas * meas / (2.0 * query.dist_to_end_mm)).max(decel);
                    debug!(
                        "Starting deceleration on segment {}: {:.1} mm left, decel {:.1}",
                        seg_idx, query.dist_to_end_mm, needed
                    );
                    ctrl.set_deceleration(needed);
                    ctrl.set_desired_speed(0.0);
                    self.started_decel = true;
                    self.report.decelerating = true;
                }
            }

            let past_end = self.use_robot_ref && query.range == SegmentRange::NearEnd;
            let stopped = self.started_decel
                && ctrl.measured_speed().abs() <= self.params.stopped_speed_mmps;

            if past_end || stopped {
                return self.advance(seg_idx, ctrl);
            }
        } else if query_look.range == SegmentRange::NearEnd {
            // Non-stopping segments hand over as soon as the lookahead
            // point passes their end, keeping speed through the transition
            return self.advance(seg_idx, ctrl);
        }

        None
    }

    /// Common traversal start checks and setup.
    fn begin<C: SpeedControl>(
        &mut self,
        path: Path,
        path_id: u16,
        external: bool,
        ctrl: &mut C,
    ) -> Result<(), FollowerError> {
        if self.is_traversing() {
            return Err(FollowerError::AlreadyTraversing);
        }

        if path.is_empty() {
            return Err(FollowerError::EmptyPath);
        }

        // Fail fast on discontinuous paths, never silently repair them
        let tol_sq = self.params.continuity_tol_mm * self.params.continuity_tol_mm;
        for i in 0..path.num_segments() {
            if !path.check_segment_continuity(tol_sq, i) {
                return Err(FollowerError::DiscontinuousPath(i));
            }
        }

        info!(
            "Starting traversal of path {} ({} segments, {:.1} mm)",
            path_id,
            path.num_segments(),
            path.total_length_mm()
        );

        self.path = path;
        self.path_id = path_id;
        self.external = external;
        self.state = FollowerState::Traversing { seg_idx: 0 };
        self.enter_segment(0, ctrl);

        Ok(())
    }

    /// Advance to the next segment, or finish the path if there is none.
    ///
    /// Called at most once per update, so segments can never be skipped.
    fn advance<C: SpeedControl>(&mut self, seg_idx: usize, ctrl: &mut C) -> Option<PathEvent> {
        let next = seg_idx + 1;

        if next >= self.path.num_segments() {
            ctrl.set_desired_speed(0.0);
            return self.finish(false);
        }

        debug!(
            "Advancing to segment {} of {}",
            next,
            self.path.num_segments()
        );
        self.state = FollowerState::Traversing { seg_idx: next };
        self.enter_segment(next, ctrl);

        None
    }

    /// Reset per-segment state and push the new segment's speed targets.
    fn enter_segment<C: SpeedControl>(&mut self, seg_idx: usize, ctrl: &mut C) {
        self.started_decel = false;
        self.point_turn_issued = false;
        self.use_robot_ref = false;

        // Safe to unwrap, callers guarantee the index is in range
        let seg = self.path.get(seg_idx).unwrap();

        // Point turns self-manage their speed through the steering
        // collaborator
        if !matches!(seg.def, SegmentDef::PointTurn { .. }) {
            ctrl.set_acceleration(seg.profile.accel.abs());
            ctrl.set_deceleration(seg.profile.decel.abs());
            ctrl.set_desired_speed(seg.profile.target_speed);
        }
    }

    /// Clear the path state and emit the terminal event.
    fn finish(&mut self, interrupted: bool) -> Option<PathEvent> {
        let event = if self.external {
            if interrupted {
                Some(PathEvent::interrupted(self.path_id))
            } else {
                Some(PathEvent::completed(self.path_id))
            }
        } else {
            None
        };

        info!(
            "Path {} {}",
            self.path_id,
            if interrupted { "interrupted" } else { "completed" }
        );

        self.path.clear();
        self.state = FollowerState::Idle;
        self.started_decel = false;
        self.point_turn_issued = false;
        self.use_robot_ref = false;
        self.report = StatusReport::default();

        event
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::OdometrySource;
    use crate::path::SpeedProfile;
    use approx::assert_relative_eq;
    use comms_if::motion::PathEventKind;
    use nalgebra::Vector2;
    use util::angle::NormAngle;

    /// Combined speed/steering collaborator mock.
    #[derive(Default)]
    struct MockCtrl {
        desired: f64,
        accel: f64,
        decel: f64,
        measured: f64,
        last_error: Option<(f64, f64)>,
        turns_issued: usize,
        complete: bool,
    }

    impl SpeedControl for MockCtrl {
        fn set_desired_speed(&mut self, speed_mmps: f64) {
            self.desired = speed_mmps;
        }
        fn set_acceleration(&mut self, accel_mmps2: f64) {
            self.accel = accel_mmps2;
        }
        fn set_deceleration(&mut self, decel_mmps2: f64) {
            self.decel = decel_mmps2;
        }
        fn measured_speed(&self) -> f64 {
            self.measured
        }
    }

    impl SteerControl for MockCtrl {
        fn set_path_error(&mut self, offset_error_mm: f64, heading_error_rad: f64) {
            self.last_error = Some((offset_error_mm, heading_error_rad));
        }
        fn execute_point_turn(
            &mut self,
            _target_angle: NormAngle,
            _max_angular_vel_radps: f64,
            _angular_accel_radps2: f64,
            _angular_decel_radps2: f64,
            _angle_tol_rad: f64,
            _shortest_dir: bool,
        ) {
            self.turns_issued += 1;
            self.complete = false;
        }
        fn point_turn_complete(&self) -> bool {
            self.complete
        }
    }

    /// Odometry stub reporting stationary wheels and a fixed gyro heading.
    struct FixedOdo {
        heading_rad: f64,
    }

    impl OdometrySource for FixedOdo {
        fn left_wheel_pos_mm(&self) -> f64 {
            0.0
        }
        fn right_wheel_pos_mm(&self) -> f64 {
            0.0
        }
        fn gyro_heading_rad(&self) -> f64 {
            self.heading_rad
        }
        fn micro_counter(&self) -> u64 {
            1_000_000
        }
    }

    /// Localisation pinned to the given pose.
    fn loc_at(x_mm: f64, y_mm: f64, heading_rad: f64) -> Localization {
        let mut loc = Localization::new(crate::loc::Params::default());
        loc.update_pose_with_keyframe(&comms_if::loc::PoseCorrection {
            frame_id: 0,
            timestamp_ms: 0,
            x_mm,
            y_mm,
            angle_rad: heading_rad,
        });
        // Seed history / prev-wheel state
        loc.update(&FixedOdo { heading_rad });
        loc
    }

    fn profile(speed: f64) -> SpeedProfile {
        SpeedProfile::new(speed, 200.0, 200.0)
    }

    fn two_line_path() -> Path {
        let mut path = Path::new();
        path.append_line(
            Vector2::new(0.0, 0.0),
            Vector2::new(100.0, 0.0),
            profile(100.0),
        )
        .unwrap();
        path.append_line(
            Vector2::new(100.0, 0.0),
            Vector2::new(200.0, 0.0),
            profile(50.0),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_continuity_check_rejects_path() {
        let mut follower = PathFollower::new(Params::default());
        let mut ctrl = MockCtrl::default();

        // Segment 3 starts 0.5 mm away from segment 2's end, tolerance is
        // 0.1 mm
        let mut path = Path::new();
        path.append_line(
            Vector2::new(0.0, 0.0),
            Vector2::new(100.0, 0.0),
            profile(100.0),
        )
        .unwrap();
        path.append_line(
            Vector2::new(100.0, 0.0),
            Vector2::new(200.0, 0.0),
            profile(100.0),
        )
        .unwrap();
        path.append_line(
            Vector2::new(200.0, 0.5),
            Vector2::new(300.0, 0.5),
            profile(100.0),
        )
        .unwrap();

        let res = follower.start_path_traversal(path, 1, &mut ctrl);
        assert!(matches!(res, Err(FollowerError::DiscontinuousPath(2))));
        assert!(!follower.is_traversing());

        // Nothing was commanded
        assert_eq!(ctrl.desired, 0.0);
    }

    #[test]
    fn test_start_pushes_speed_targets() {
        let mut follower = PathFollower::new(Params::default());
        let mut ctrl = MockCtrl::default();

        let event = follower
            .start_path_traversal(two_line_path(), 7, &mut ctrl)
            .unwrap();

        assert_eq!(event.unwrap().kind, PathEventKind::Started);
        assert!(follower.is_traversing());
        assert_eq!(follower.current_segment(), Some(0));
        assert_relative_eq!(ctrl.desired, 100.0);
        assert_relative_eq!(ctrl.accel, 200.0);
    }

    #[test]
    fn test_idle_update_is_noop() {
        let mut follower = PathFollower::new(Params::default());
        let mut ctrl = MockCtrl::default();
        let loc = loc_at(0.0, 0.0, 0.0);

        assert!(follower.update(&loc, &mut ctrl).is_none());
        assert!(ctrl.last_error.is_none());
    }

    #[test]
    fn test_lookahead_advances_segment() {
        let mut follower = PathFollower::new(Params::default());
        let mut ctrl = MockCtrl::default();

        follower
            .start_path_traversal(two_line_path(), 1, &mut ctrl)
            .unwrap();

        // Robot at 80 mm: the 30 mm lookahead point is past segment 0's end
        let loc = loc_at(80.0, 0.0, 0.0);
        ctrl.measured = 100.0;

        let event = follower.update(&loc, &mut ctrl);
        assert!(event.is_none());
        assert_eq!(follower.current_segment(), Some(1));

        // Segment 1's slower target speed was pushed on entry
        assert_relative_eq!(ctrl.desired, 50.0);
    }

    #[test]
    fn test_decel_onset_and_completion() {
        let mut follower = PathFollower::new(Params::default());
        let mut ctrl = MockCtrl::default();

        let mut path = Path::new();
        path.append_line(
            Vector2::new(0.0, 0.0),
            Vector2::new(100.0, 0.0),
            profile(100.0),
        )
        .unwrap();

        follower.start_path_traversal(path, 2, &mut ctrl).unwrap();

        // 5 mm from the end at 100 mm/s: stopping needs 25 mm at the
        // nominal 200 mm/s^2, so a steeper rate is commanded
        let loc = loc_at(95.0, 0.0, 0.0);
        ctrl.measured = 100.0;

        let event = follower.update(&loc, &mut ctrl);
        assert!(event.is_none());
        assert!(follower.status_report().decelerating);
        assert_relative_eq!(ctrl.desired, 0.0);
        assert_relative_eq!(ctrl.decel, 100.0 * 100.0 / (2.0 * 5.0));

        // Once the robot has ramped down, the segment completes
        ctrl.measured = 0.0;
        let event = follower.update(&loc, &mut ctrl);
        assert_eq!(event.unwrap().kind, PathEventKind::Completed);
        assert!(!follower.is_traversing());
    }

    #[test]
    fn test_point_turn_dispatch_and_single_advance() {
        let mut follower = PathFollower::new(Params::default());
        let mut ctrl = MockCtrl::default();

        let mut path = Path::new();
        path.append_point_turn(
            Vector2::new(0.0, 0.0),
            NormAngle::new(0.0),
            NormAngle::new(1.0),
            2.0,
            10.0,
            10.0,
            0.02,
            true,
        )
        .unwrap();
        path.append_point_turn(
            Vector2::new(0.0, 0.0),
            NormAngle::new(1.0),
            NormAngle::new(2.0),
            2.0,
            10.0,
            10.0,
            0.02,
            true,
        )
        .unwrap();

        follower.start_path_traversal(path, 3, &mut ctrl).unwrap();
        let loc = loc_at(0.0, 0.0, 0.0);

        // First update issues the first turn
        follower.update(&loc, &mut ctrl);
        assert_eq!(ctrl.turns_issued, 1);

        // Not complete yet: no advancement
        follower.update(&loc, &mut ctrl);
        assert_eq!(follower.current_segment(), Some(0));

        // Completion advances exactly one segment and issues the second
        // turn on the following update
        ctrl.complete = true;
        follower.update(&loc, &mut ctrl);
        assert_eq!(follower.current_segment(), Some(1));
        assert_eq!(ctrl.turns_issued, 1);

        follower.update(&loc, &mut ctrl);
        assert_eq!(ctrl.turns_issued, 2);

        // A stale complete flag from the first turn cannot skip the second:
        // the mock cleared it when the new turn was issued
        assert!(!ctrl.complete);
        follower.update(&loc, &mut ctrl);
        assert_eq!(follower.current_segment(), Some(1));

        // Second turn completes: path done
        ctrl.complete = true;
        let event = follower.update(&loc, &mut ctrl);
        assert_eq!(event.unwrap().kind, PathEventKind::Completed);
        assert!(!follower.is_traversing());
    }

    #[test]
    fn test_cross_track_abort() {
        let mut follower = PathFollower::new(Params::default());
        let mut ctrl = MockCtrl::default();

        follower
            .start_path_traversal(two_line_path(), 4, &mut ctrl)
            .unwrap();

        // 200 mm off the path, way beyond the 100 mm abort limit
        let loc = loc_at(50.0, 200.0, 0.0);
        ctrl.measured = 100.0;

        let event = follower.update(&loc, &mut ctrl);
        assert_eq!(event.unwrap().kind, PathEventKind::Interrupted);
        assert!(!follower.is_traversing());
        assert_relative_eq!(ctrl.desired, 0.0);
    }

    #[test]
    fn test_clear_path_emits_interruption() {
        let mut follower = PathFollower::new(Params::default());
        let mut ctrl = MockCtrl::default();

        follower
            .start_path_traversal(two_line_path(), 5, &mut ctrl)
            .unwrap();

        let event = follower.clear_path();
        assert_eq!(event.unwrap().kind, PathEventKind::Interrupted);
        assert!(!follower.is_traversing());

        // Clearing while idle does nothing
        assert!(follower.clear_path().is_none());
    }

    #[test]
    fn test_internal_path_emits_no_events() {
        let mut follower = PathFollower::new(Params::default());
        let mut ctrl = MockCtrl::default();

        let mut path = Path::new();
        path.append_line(
            Vector2::new(0.0, 0.0),
            Vector2::new(100.0, 0.0),
            profile(100.0),
        )
        .unwrap();
        follower
            .start_path_traversal_internal(path, &mut ctrl)
            .unwrap();

        let loc = loc_at(150.0, 0.0, 0.0);
        ctrl.measured = 0.0;

        // Robot past the end and stopped: completes silently
        let mut event = None;
        for _ in 0..3 {
            event = follower.update(&loc, &mut ctrl);
            if !follower.is_traversing() {
                break;
            }
        }
        assert!(event.is_none());
        assert!(!follower.is_traversing());
    }
}
