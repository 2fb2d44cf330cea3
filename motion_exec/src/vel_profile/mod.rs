//! # Velocity profile generator
//!
//! Produces smooth, acceleration-bounded speed-vs-time profiles for linear
//! travel and point turns. A profile is started with one of the
//! `start_profile*` methods and then advanced one control tick at a time
//! with [`VelocityProfileGenerator::step`], which returns the desired
//! (velocity, position) pair for that tick.
//!
//! Three profile forms exist:
//!
//! - **Unconstrained duration**: trapezoidal accelerate-cruise-decelerate
//!   between a start and end state, degrading to a triangular profile when
//!   the maximum speed is unreachable within the travel distance.
//! - **Velocity hold**: accelerate to a target velocity and hold it with no
//!   position target; never reports completion.
//! - **Fixed duration**: traverse an exact distance in an exact total time
//!   using configured ramp durations, solving for the unknown cruise
//!   velocity.
//!
//! Positions and velocities are unit-agnostic: the same generator drives
//! mm/s profiles for straight segments and rad/s profiles for point turns.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One constant-acceleration phase of a fixed-duration profile.
#[derive(Debug, Copy, Clone, PartialEq)]
struct ProfilePhase {
    /// Time at which the phase starts, relative to profile start.
    t_start_s: f64,

    /// Velocity at the start of the phase.
    vel_start: f64,

    /// Position at the start of the phase.
    pos_start: f64,

    /// Acceleration applied throughout the phase.
    accel: f64,
}

/// The internal shape of the active profile.
#[derive(Debug, Clone, PartialEq)]
enum ProfileKind {
    /// No profile started yet.
    Idle,

    /// Trapezoidal/triangular profile with a position target. The
    /// deceleration towards `end_vel` begins once the remaining distance
    /// drops below `decel_dist`.
    DistanceTriggered {
        end_vel: f64,
        end_pos: f64,
        accel: f64,
        decel_dist: f64,
        /// Direction of travel: +1 or -1.
        dir: f64,
    },

    /// Pure velocity hold, no position target.
    VelocityHold { accel: f64 },

    /// Fixed-duration profile, evaluated analytically from its phase plan.
    TimeTriggered {
        phases: heapless::Vec<ProfilePhase, 4>,
        end_pos: f64,
        total_duration_s: f64,
    },
}

/// Generator for accel-bounded velocity profiles.
///
/// One instance represents one profile at a time; starting a new profile
/// replaces the previous one.
#[derive(Debug, Clone)]
pub struct VelocityProfileGenerator {
    kind: ProfileKind,

    /// Step size used by [`VelocityProfileGenerator::step`].
    step_s: f64,

    curr_time_s: f64,
    curr_vel: f64,
    curr_pos: f64,

    /// Peak velocity this profile will actually reach.
    max_reachable_vel: f64,

    target_reached: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a fixed-duration profile cannot be generated.
///
/// A failed start leaves the generator's previous state untouched, so the
/// caller can retry with relaxed constraints.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Ramp durations exceed the total profile duration")]
    RampsExceedDuration,

    #[error("Required cruise velocity exceeds the maximum velocity")]
    VelExceedsMax,

    #[error("Required ramp acceleration exceeds the maximum acceleration")]
    AccelExceedsMax,

    #[error("No real solution for the cruise velocity (negative discriminant)")]
    NegativeDiscriminant,

    #[error("Start ramp alone would overshoot the target position")]
    StartRampOvershoot,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for VelocityProfileGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl VelocityProfileGenerator {
    pub fn new() -> Self {
        Self {
            kind: ProfileKind::Idle,
            step_s: 0.0,
            curr_time_s: 0.0,
            curr_vel: 0.0,
            curr_pos: 0.0,
            max_reachable_vel: 0.0,
            target_reached: false,
        }
    }

    /// Start a trapezoidal profile from `(start_vel, start_pos)` to
    /// `(end_vel, end_pos)`.
    ///
    /// If the travel distance is too short to reach `max_speed`, a reduced
    /// reachable peak velocity is used instead and the profile becomes
    /// triangular. The sign of the direction of travel is taken from the
    /// start-to-end displacement.
    pub fn start_profile(
        &mut self,
        start_vel: f64,
        start_pos: f64,
        max_speed: f64,
        accel: f64,
        end_vel: f64,
        end_pos: f64,
        step_s: f64,
    ) {
        let dist = end_pos - start_pos;
        let dir = if dist < 0.0 { -1.0 } else { 1.0 };
        let accel = accel.abs();

        let mut peak = max_speed.abs() * dir;

        // Distance needed to ramp start -> peak and peak -> end
        let d_start = (peak * peak - start_vel * start_vel).abs() / (2.0 * accel);
        let d_end = (peak * peak - end_vel * end_vel).abs() / (2.0 * accel);

        if d_start + d_end > dist.abs() {
            // Max speed unreachable in the available distance, use the
            // highest peak that still lets us hit the end conditions
            let peak_mag = ((2.0 * accel * dist.abs() + end_vel * end_vel + start_vel * start_vel)
                / 2.0)
                .sqrt();
            peak = peak_mag * dir;
        }

        let decel_dist = (peak * peak - end_vel * end_vel).abs() / (2.0 * accel);

        self.kind = ProfileKind::DistanceTriggered {
            end_vel,
            end_pos,
            accel,
            decel_dist,
            dir,
        };
        self.step_s = step_s;
        self.curr_time_s = 0.0;
        self.curr_vel = start_vel;
        self.curr_pos = start_pos;
        self.max_reachable_vel = peak;
        self.target_reached = false;

        debug!(
            "Profile start: {:.1} -> {:.1} over {:.1}, peak {:.1}",
            start_pos, end_pos, dist, peak
        );
    }

    /// Start a velocity-hold profile with no position target.
    ///
    /// The profile ramps to `max_speed` and holds it; `target_reached` never
    /// becomes true.
    pub fn start_profile_vel_only(
        &mut self,
        start_vel: f64,
        start_pos: f64,
        max_speed: f64,
        accel: f64,
        step_s: f64,
    ) {
        self.kind = ProfileKind::VelocityHold { accel: accel.abs() };
        self.step_s = step_s;
        self.curr_time_s = 0.0;
        self.curr_vel = start_vel;
        self.curr_pos = start_pos;
        self.max_reachable_vel = max_speed;
        self.target_reached = false;
    }

    /// Start a profile which covers the exact displacement from `start_pos`
    /// to `end_pos` in exactly `total_duration_s`, ending at rest.
    ///
    /// The profile ramps linearly for `accel_start_s` seconds, cruises at a
    /// solved mid velocity, then ramps to zero over `accel_end_s`. When the
    /// start ramp would cross zero velocity (the robot must reverse), the
    /// profile instead brakes to rest over the start ramp and re-launches in
    /// the opposite direction at `max_accel`, making the distance equation
    /// quadratic in the mid velocity.
    ///
    /// On failure the generator state is left untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn start_profile_fixed_duration(
        &mut self,
        start_pos: f64,
        start_vel: f64,
        accel_start_s: f64,
        end_pos: f64,
        accel_end_s: f64,
        max_vel: f64,
        max_accel: f64,
        total_duration_s: f64,
        step_s: f64,
    ) -> Result<(), ProfileError> {
        let t_s = accel_start_s;
        let t_e = accel_end_s;
        let big_t = total_duration_s;
        let max_vel = max_vel.abs();
        let max_accel = max_accel.abs();

        if t_s < 0.0 || t_e < 0.0 || t_s + t_e > big_t {
            return Err(ProfileError::RampsExceedDuration);
        }

        let dist = end_pos - start_pos;

        // Linear solve for the mid velocity with the plain three-phase
        // shape: dist = ts*(v0 + vm)/2 + vm*(T - ts - te) + vm*te/2
        let denom = big_t - t_s / 2.0 - t_e / 2.0;
        if denom <= 0.0 {
            return Err(ProfileError::RampsExceedDuration);
        }
        let v_mid_linear = (dist - start_vel * t_s / 2.0) / denom;

        let crosses_zero = start_vel != 0.0
            && v_mid_linear != 0.0
            && v_mid_linear.signum() != start_vel.signum();

        let (phases, peak) = if !crosses_zero {
            let v_mid = v_mid_linear;

            if v_mid.abs() > max_vel {
                return Err(ProfileError::VelExceedsMax);
            }
            check_ramp_accel(v_mid - start_vel, t_s, max_accel)?;
            check_ramp_accel(v_mid, t_e, max_accel)?;

            let peak = if v_mid.abs() > start_vel.abs() {
                v_mid
            } else {
                start_vel
            };
            if peak.abs() > max_vel {
                return Err(ProfileError::VelExceedsMax);
            }

            let mut phases: heapless::Vec<ProfilePhase, 4> = heapless::Vec::new();
            let mut builder = PhaseBuilder::new(start_pos, start_vel);
            builder.push(&mut phases, t_s, ramp_accel(v_mid - start_vel, t_s));
            builder.push(&mut phases, big_t - t_s - t_e, 0.0);
            builder.push(&mut phases, t_e, ramp_accel(-v_mid, t_e));

            (phases, peak)
        } else {
            // The robot has to reverse. If the braking ramp alone already
            // carries us past the target in the start direction the request
            // is ambiguous: the caller should shorten the ramp or lower the
            // start velocity.
            let brake_dist = start_vel * t_s / 2.0;
            if dist.signum() == start_vel.signum() && brake_dist.abs() >= dist.abs() {
                return Err(ProfileError::StartRampOvershoot);
            }

            check_ramp_accel(-start_vel, t_s, max_accel)?;

            // Remaining displacement after braking to rest, in the reversed
            // direction
            let s = -start_vel.signum();
            let d_rev = (dist - brake_dist) * s;
            debug_assert!(d_rev > 0.0);

            // Solve u^2/(2*am) - u*(T - ts - te/2) + d_rev = 0 for the
            // reversed cruise speed magnitude u, from:
            //   d_rev = u^2/(2*am) + u*(T - ts - u/am - te) + u*te/2
            let tau = big_t - t_s - t_e / 2.0;
            let disc = max_accel * max_accel * tau * tau - 2.0 * max_accel * d_rev;
            if disc < 0.0 {
                return Err(ProfileError::NegativeDiscriminant);
            }

            let sqrt_disc = disc.sqrt();
            let roots = [
                max_accel * tau - sqrt_disc,
                max_accel * tau + sqrt_disc,
            ];

            // Pick the smaller feasible root: non-negative, within the
            // velocity limit, and leaving a non-negative cruise time
            let cruise_time = |u: f64| big_t - t_s - u / max_accel - t_e;
            let u = roots
                .iter()
                .cloned()
                .find(|&u| u >= 0.0 && u <= max_vel && cruise_time(u) >= -1e-9);

            let u = match u {
                Some(u) => u,
                None => {
                    if roots.iter().any(|&u| u >= 0.0 && cruise_time(u) >= -1e-9) {
                        return Err(ProfileError::VelExceedsMax);
                    }
                    return Err(ProfileError::RampsExceedDuration);
                }
            };

            check_ramp_accel(u, t_e, max_accel)?;

            let v_mid = s * u;
            let relaunch_s = u / max_accel;

            let mut phases: heapless::Vec<ProfilePhase, 4> = heapless::Vec::new();
            let mut builder = PhaseBuilder::new(start_pos, start_vel);
            builder.push(&mut phases, t_s, ramp_accel(-start_vel, t_s));
            builder.push(&mut phases, relaunch_s, s * max_accel);
            builder.push(&mut phases, cruise_time(u).max(0.0), 0.0);
            builder.push(&mut phases, t_e, ramp_accel(-v_mid, t_e));

            (phases, v_mid)
        };

        self.kind = ProfileKind::TimeTriggered {
            phases,
            end_pos,
            total_duration_s: big_t,
        };
        self.step_s = step_s;
        self.curr_time_s = 0.0;
        self.curr_vel = start_vel;
        self.curr_pos = start_pos;
        self.max_reachable_vel = peak;
        self.target_reached = false;

        Ok(())
    }

    /// Advance the profile by one step, returning the desired velocity and
    /// position for this tick.
    ///
    /// Once the target has been reached the terminal state is returned
    /// unchanged on every further call.
    pub fn step(&mut self) -> (f64, f64) {
        if self.target_reached {
            return (self.curr_vel, self.curr_pos);
        }

        let dt = self.step_s;
        self.curr_time_s += dt;

        match &self.kind {
            ProfileKind::Idle => {}

            ProfileKind::VelocityHold { accel } => {
                self.curr_vel = step_towards(self.curr_vel, self.max_reachable_vel, accel * dt);
                self.curr_pos += self.curr_vel * dt;
            }

            ProfileKind::DistanceTriggered {
                end_vel,
                end_pos,
                accel,
                decel_dist,
                dir,
            } => {
                let remaining = (end_pos - self.curr_pos) * dir;
                let decelerating = remaining <= *decel_dist;

                if decelerating {
                    // Final ramp towards the end velocity
                    self.curr_vel = step_towards(self.curr_vel, *end_vel, accel * dt);
                } else {
                    self.curr_vel =
                        step_towards(self.curr_vel, self.max_reachable_vel, accel * dt);
                }

                self.curr_pos += self.curr_vel * dt;

                // Clamp to the exact end state once the target is reached.
                // A ramp-to-rest can come to rest fractionally short of the
                // target due to the discrete steps, which also terminates
                // the profile.
                if (end_pos - self.curr_pos) * dir <= 0.0
                    || (decelerating && *end_vel == 0.0 && self.curr_vel == 0.0)
                {
                    self.curr_pos = *end_pos;
                    self.curr_vel = *end_vel;
                    self.target_reached = true;
                }
            }

            ProfileKind::TimeTriggered {
                phases,
                end_pos,
                total_duration_s,
            } => {
                if self.curr_time_s >= *total_duration_s {
                    self.curr_pos = *end_pos;
                    self.curr_vel = 0.0;
                    self.target_reached = true;
                } else {
                    // Evaluate the phase plan analytically so integration
                    // error cannot accumulate over long profiles
                    let t = self.curr_time_s;
                    let mut vel = 0.0;
                    let mut pos = *end_pos;
                    for phase in phases.iter() {
                        if t >= phase.t_start_s {
                            let dt_phase = t - phase.t_start_s;
                            vel = phase.vel_start + phase.accel * dt_phase;
                            pos = phase.pos_start
                                + phase.vel_start * dt_phase
                                + 0.5 * phase.accel * dt_phase * dt_phase;
                        }
                    }
                    self.curr_vel = vel;
                    self.curr_pos = pos;
                }
            }
        }

        (self.curr_vel, self.curr_pos)
    }

    /// True once the profile's target has been reached. Always false for
    /// velocity-hold profiles.
    pub fn target_reached(&self) -> bool {
        self.target_reached
    }

    /// The peak velocity this profile will reach.
    pub fn max_reachable_vel(&self) -> f64 {
        self.max_reachable_vel
    }

    /// Time elapsed since the profile was started.
    pub fn elapsed_s(&self) -> f64 {
        self.curr_time_s
    }
}

// ---------------------------------------------------------------------------
// PRIVATE ITEMS
// ---------------------------------------------------------------------------

/// Builds consecutive phases, tracking the running time/velocity/position
/// anchors.
struct PhaseBuilder {
    t_s: f64,
    vel: f64,
    pos: f64,
}

impl PhaseBuilder {
    fn new(pos: f64, vel: f64) -> Self {
        Self { t_s: 0.0, vel, pos }
    }

    fn push(&mut self, phases: &mut heapless::Vec<ProfilePhase, 4>, duration_s: f64, accel: f64) {
        if duration_s <= 0.0 {
            return;
        }

        // Capacity 4 matches the maximum number of phases any form builds
        let _ = phases.push(ProfilePhase {
            t_start_s: self.t_s,
            vel_start: self.vel,
            pos_start: self.pos,
            accel,
        });

        self.pos += self.vel * duration_s + 0.5 * accel * duration_s * duration_s;
        self.vel += accel * duration_s;
        self.t_s += duration_s;
    }
}

/// Acceleration of a ramp covering `dv` in `duration_s`. Zero-duration ramps
/// with no velocity change have zero acceleration.
fn ramp_accel(dv: f64, duration_s: f64) -> f64 {
    if duration_s > 0.0 {
        dv / duration_s
    } else {
        0.0
    }
}

/// Check a ramp's implied acceleration against the limit.
fn check_ramp_accel(dv: f64, duration_s: f64, max_accel: f64) -> Result<(), ProfileError> {
    if duration_s > 0.0 {
        if (dv / duration_s).abs() > max_accel {
            return Err(ProfileError::AccelExceedsMax);
        }
    } else if dv.abs() > 1e-12 {
        // An instantaneous velocity change needs infinite acceleration
        return Err(ProfileError::AccelExceedsMax);
    }
    Ok(())
}

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

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    const DT: f64 = 0.005;

    /// Run a profile to completion, returning (ticks, final_vel, final_pos).
    fn run_to_completion(vpg: &mut VelocityProfileGenerator, max_ticks: usize) -> (usize, f64, f64) {
        let mut out = (0.0, 0.0);
        for i in 0..max_ticks {
            out = vpg.step();
            if vpg.target_reached() {
                return (i + 1, out.0, out.1);
            }
        }
        panic!(
            "profile did not complete in {} ticks (vel {}, pos {})",
            max_ticks, out.0, out.1
        );
    }

    #[test]
    fn test_trapezoid() {
        let mut vpg = VelocityProfileGenerator::new();
        vpg.start_profile(0.0, 0.0, 100.0, 200.0, 0.0, 500.0, DT);

        // 500 mm at 100 mm/s with 200 mm/s^2 ramps: max speed is reachable
        assert_relative_eq!(vpg.max_reachable_vel(), 100.0);

        let (_, vel, pos) = run_to_completion(&mut vpg, 4000);
        assert_relative_eq!(pos, 500.0);
        assert_relative_eq!(vel, 0.0);
    }

    #[test]
    fn test_triangle_reduced_peak() {
        let mut vpg = VelocityProfileGenerator::new();
        // Only 20 mm of travel: nowhere near enough to reach 100 mm/s
        vpg.start_profile(0.0, 0.0, 100.0, 200.0, 0.0, 20.0, DT);

        let expected_peak = (2.0f64 * 200.0 * 20.0 / 2.0).sqrt();
        assert_relative_eq!(vpg.max_reachable_vel(), expected_peak);
        assert!(vpg.max_reachable_vel() < 100.0);

        let (_, vel, pos) = run_to_completion(&mut vpg, 4000);
        assert_relative_eq!(pos, 20.0);
        assert_relative_eq!(vel, 0.0);
    }

    #[test]
    fn test_reverse_profile() {
        let mut vpg = VelocityProfileGenerator::new();
        vpg.start_profile(0.0, 100.0, -80.0, 200.0, 0.0, -300.0, DT);

        assert!(vpg.max_reachable_vel() < 0.0);

        let (_, vel, pos) = run_to_completion(&mut vpg, 8000);
        assert_relative_eq!(pos, -300.0);
        assert_relative_eq!(vel, 0.0);
    }

    #[test]
    fn test_step_idempotent_after_completion() {
        let mut vpg = VelocityProfileGenerator::new();
        vpg.start_profile(0.0, 0.0, 100.0, 200.0, 0.0, 100.0, DT);

        let (_, vel, pos) = run_to_completion(&mut vpg, 4000);

        for _ in 0..10 {
            let (v, p) = vpg.step();
            assert_eq!(v, vel);
            assert_eq!(p, pos);
            assert!(vpg.target_reached());
        }
    }

    #[test]
    fn test_vel_only_never_completes() {
        let mut vpg = VelocityProfileGenerator::new();
        vpg.start_profile_vel_only(0.0, 0.0, 50.0, 100.0, DT);

        let mut pos = 0.0;
        for _ in 0..2000 {
            let (vel, p) = vpg.step();
            pos = p;
            assert!(!vpg.target_reached());
            assert!(vel <= 50.0 + 1e-9);
        }
        // 10 s at up to 50 mm/s, minus the ramp-up
        assert!(pos > 400.0);
    }

    #[test]
    fn test_fixed_duration_basic() {
        let mut vpg = VelocityProfileGenerator::new();
        vpg.start_profile_fixed_duration(0.0, 0.0, 0.5, 200.0, 0.5, 300.0, 1000.0, 2.0, DT)
            .unwrap();

        // dist = vm*(T - ts/2 - te/2) => vm = 200/1.5
        assert_relative_eq!(vpg.max_reachable_vel(), 200.0 / 1.5, max_relative = 1e-9);

        let (ticks, vel, pos) = run_to_completion(&mut vpg, 4000);
        assert_relative_eq!(pos, 200.0);
        assert_relative_eq!(vel, 0.0);

        // Total elapsed time must equal the requested duration to within a
        // single step
        let elapsed = ticks as f64 * DT;
        assert!((elapsed - 2.0).abs() <= DT + 1e-9);
    }

    #[test]
    fn test_fixed_duration_infeasible() {
        let mut vpg = VelocityProfileGenerator::new();
        vpg.start_profile(0.0, 0.0, 100.0, 200.0, 0.0, 500.0, DT);
        let before_vel = vpg.max_reachable_vel();

        // Ramps longer than the total duration
        assert_eq!(
            vpg.start_profile_fixed_duration(0.0, 0.0, 1.5, 100.0, 1.0, 300.0, 1000.0, 2.0, DT),
            Err(ProfileError::RampsExceedDuration)
        );

        // Required cruise speed above the velocity limit
        assert_eq!(
            vpg.start_profile_fixed_duration(0.0, 0.0, 0.5, 1000.0, 0.5, 100.0, 10000.0, 2.0, DT),
            Err(ProfileError::VelExceedsMax)
        );

        // Required ramp acceleration above the acceleration limit
        assert_eq!(
            vpg.start_profile_fixed_duration(0.0, 0.0, 0.1, 150.0, 0.5, 300.0, 100.0, 2.0, DT),
            Err(ProfileError::AccelExceedsMax)
        );

        // Start ramp alone overshoots the target
        assert_eq!(
            vpg.start_profile_fixed_duration(0.0, 100.0, 1.0, 10.0, 0.5, 300.0, 1000.0, 2.0, DT),
            Err(ProfileError::StartRampOvershoot)
        );

        // A failed start must not disturb the running profile
        assert_eq!(vpg.max_reachable_vel(), before_vel);
        assert!(!vpg.target_reached());
    }

    #[test]
    fn test_fixed_duration_reversal() {
        let mut vpg = VelocityProfileGenerator::new();
        // Moving at +100 but the target is behind us: the start ramp must
        // cross zero and the quadratic branch engages
        vpg.start_profile_fixed_duration(0.0, 100.0, 0.4, -200.0, 0.4, 400.0, 2000.0, 3.0, DT)
            .unwrap();

        assert!(vpg.max_reachable_vel() < 0.0);

        let (ticks, vel, pos) = run_to_completion(&mut vpg, 4000);
        assert_relative_eq!(pos, -200.0);
        assert_relative_eq!(vel, 0.0);

        let elapsed = ticks as f64 * DT;
        assert!((elapsed - 3.0).abs() <= DT + 1e-9);
    }

    proptest! {
        /// Whenever the fixed-duration solver accepts a request, the
        /// resulting profile must cover the displacement in the requested
        /// time, including the zero-crossing quadratic branch.
        #[test]
        fn prop_fixed_duration_honest(
            start_vel in -300.0f64..300.0,
            dist in -2000.0f64..2000.0,
            t_s in 0.01f64..1.0,
            t_e in 0.01f64..1.0,
            total in 1.0f64..6.0,
        ) {
            prop_assume!(t_s + t_e < total);

            let mut vpg = VelocityProfileGenerator::new();
            let res = vpg.start_profile_fixed_duration(
                0.0, start_vel, t_s, dist, t_e, 500.0, 3000.0, total, DT,
            );

            if res.is_ok() {
                let mut ticks = 0;
                let mut out = (0.0, 0.0);
                while !vpg.target_reached() {
                    out = vpg.step();
                    ticks += 1;
                    prop_assert!(ticks < 10_000, "profile never completed");
                }

                prop_assert!((out.1 - dist).abs() < 1e-6,
                    "final position {} != {}", out.1, dist);
                let elapsed = ticks as f64 * DT;
                prop_assert!((elapsed - total).abs() <= DT + 1e-9,
                    "elapsed {} != requested {}", elapsed, total);
            }
        }
    }
}
