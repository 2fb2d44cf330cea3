//! # Dubins path synthesis
//!
//! Computes the shortest drivable curve between two oriented poses subject
//! to a minimum turning radius, as a curve-straight-curve (CSC) path. All
//! four CSC families (LSL, LSR, RSL, RSR) are evaluated and the shortest
//! valid one is appended to the caller's path, optionally followed by a
//! final straight approach segment along the end heading.
//!
//! Construction follows the classic tangent-circle method: each family
//! places one circle at the start pose and one at the end pose, connects
//! them with the appropriate tangent line, and reads the arc-line-arc
//! triple off the tangent points.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use super::{Path, PathError, PathSegment, SegmentDef, SpeedProfile};
use crate::loc::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Summary of a successful Dubins synthesis.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DubinsSummary {
    /// Number of segments the path now holds.
    pub num_segments: usize,

    /// Total length of the generated path in mm, including the final
    /// straight approach.
    pub length_mm: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The four CSC families, named by the turn direction at each end.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CscFamily {
    Lsl,
    Lsr,
    Rsl,
    Rsr,
}

impl CscFamily {
    /// All families, in evaluation order.
    pub const ALL: [CscFamily; 4] = [
        CscFamily::Lsl,
        CscFamily::Lsr,
        CscFamily::Rsl,
        CscFamily::Rsr,
    ];

    /// Turn signs for this family: 1.0 for right turns, -1.0 for left.
    fn signs(&self) -> (f64, f64) {
        match self {
            CscFamily::Rsr => (1.0, 1.0),
            CscFamily::Lsl => (-1.0, -1.0),
            CscFamily::Rsl => (1.0, -1.0),
            CscFamily::Lsr => (-1.0, 1.0),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Generate the Dubins path between two poses and append it to `path`.
///
/// `start_radius_mm` and `end_radius_mm` set the turning radius of the two
/// curved sections (usually both the vehicle's minimum radius). A final
/// straight segment of `final_straight_mm` is appended along the end
/// heading so the robot arrives at the end pose already aligned with it;
/// the curved part of the path therefore targets the point
/// `final_straight_mm` behind the end pose.
///
/// Fails with [`PathError::NoPathFound`] if no family produces a valid
/// path (for example when the poses are closer together than the turning
/// circles allow).
pub fn generate_dubins_path(
    path: &mut Path,
    start_pose: &Pose,
    end_pose: &Pose,
    start_radius_mm: f64,
    end_radius_mm: f64,
    profile: SpeedProfile,
    final_straight_mm: f64,
) -> Result<DubinsSummary, PathError> {
    // Compute the end point of the curved section, before the final
    // straight approach
    let pre_approach_mm = end_pose.position_mm
        - final_straight_mm * Vector2::new(end_pose.heading.cos(), end_pose.heading.sin());

    let mut shortest: Option<(CscFamily, heapless::Vec<PathSegment, 3>, f64)> = None;

    for family in CscFamily::ALL.iter() {
        let curve = generate_csc_curve(
            start_pose,
            pre_approach_mm,
            end_pose.heading.as_f64(),
            start_radius_mm,
            end_radius_mm,
            profile,
            *family,
        );

        if let Some((segments, length_mm)) = curve {
            debug!(
                "Dubins {:?}: {} segments, length {:.1} mm",
                family,
                segments.len(),
                length_mm
            );

            let shorter = match &shortest {
                Some((_, _, best)) => length_mm < *best,
                None => true,
            };
            if shorter {
                shortest = Some((*family, segments, length_mm));
            }
        } else {
            debug!("Dubins {:?}: degenerate, discarded", family);
        }
    }

    let (family, segments, mut length_mm) = shortest.ok_or(PathError::NoPathFound)?;

    debug!(
        "Dubins: shortest family {:?}, length {:.1} mm",
        family, length_mm
    );

    // Append the winning segments, re-splitting arcs so stored arcs stay
    // single-valued in x
    for segment in &segments {
        match segment.def {
            SegmentDef::Line { start_mm, end_mm } => {
                path.append_line(start_mm, end_mm, profile)?;
            }
            SegmentDef::Arc {
                center_mm,
                radius_mm,
                start_rad,
                sweep_rad,
            } => {
                path.append_arc(center_mm, radius_mm, start_rad, sweep_rad, profile)?;
            }
            SegmentDef::PointTurn { .. } => unreachable!("CSC curves contain no point turns"),
        }
    }

    // Append the final straight approach
    if final_straight_mm != 0.0 {
        path.append_line(pre_approach_mm, end_pose.position_mm, profile)?;
        length_mm += final_straight_mm;
    }

    Ok(DubinsSummary {
        num_segments: path.num_segments(),
        length_mm,
    })
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Generate a single CSC curve, returning its segments and total length, or
/// `None` if the family is degenerate for these poses.
///
/// The tangent construction: with circle centres `c1` and `c2` of radii
/// `r1`, `r2`, the unit normal `n` to the tangent line satisfies
/// `n . v1 = (r1 - r2) / |c2 - c1|` (signs folded into the radii by the
/// family), so `n` is `v1` rotated by the angle whose cosine is that value.
/// Following `n` by each radius from each centre gives the tangent points.
fn generate_csc_curve(
    start_pose: &Pose,
    end_mm: Vector2<f64>,
    end_theta: f64,
    start_radius_mm: f64,
    end_radius_mm: f64,
    profile: SpeedProfile,
    family: CscFamily,
) -> Option<(heapless::Vec<PathSegment, 3>, f64)> {
    let r1 = start_radius_mm.abs();
    let r2 = end_radius_mm.abs();

    let (sign1, sign2) = family.signs();

    // Families turning the same way at both ends need the tangent line that
    // does not cross between the circles; opposite-turn families need the
    // crossing tangent, which only exists when the circles are fully apart
    let min_circle_dist = match family {
        CscFamily::Rsr | CscFamily::Lsl => (r1 - r2).abs(),
        CscFamily::Rsl | CscFamily::Lsr => r1 + r2,
    };

    let start_mm = start_pose.position_mm;
    let start_theta = start_pose.heading.as_f64();

    // Centres of the turning circles, offset perpendicular to each heading
    let c1 = Vector2::new(
        start_mm.x + sign1 * r1 * start_theta.sin(),
        start_mm.y - sign1 * r1 * start_theta.cos(),
    );
    let c2 = Vector2::new(
        end_mm.x + sign2 * r2 * end_theta.sin(),
        end_mm.y - sign2 * r2 * end_theta.cos(),
    );

    let v1 = c2 - c1;
    let v1_mag = v1.norm();

    // Circle centres too close together for this family's tangent
    if v1_mag <= min_circle_dist {
        return None;
    }

    let v1_unit = v1 / v1_mag;

    let cos_tan_angle = (sign1 * r1 - sign2 * r2) / v1_mag;
    let sin_tan_angle = (1.0 - cos_tan_angle * cos_tan_angle).sqrt();

    // Unit normal to the tangent line: v1 rotated by the tangent angle
    let n = Vector2::new(
        v1_unit.x * cos_tan_angle - v1_unit.y * sin_tan_angle,
        v1_unit.x * sin_tan_angle + v1_unit.y * cos_tan_angle,
    );

    // Tangent points on each circle
    let t1 = c1 + n * r1 * sign1;
    let t2 = c2 + n * r2 * sign2;

    let mut segments: heapless::Vec<PathSegment, 3> = heapless::Vec::new();
    let mut length_mm = 0.0;

    let mut push = |segment: PathSegment, length_mm: &mut f64| {
        let seg_length = segment.length_mm();
        // Skip degenerate zero-length pieces
        if seg_length > 0.0 {
            *length_mm += seg_length;
            // Capacity 3 can't overflow: at most arc + line + arc
            let _ = segments.push(segment);
        }
    };

    push(
        PathSegment {
            def: SegmentDef::Arc {
                center_mm: c1,
                radius_mm: start_radius_mm,
                start_rad: (start_mm.y - c1.y).atan2(start_mm.x - c1.x),
                sweep_rad: arc_angle(start_mm, t1, c1, sign1 < 0.0),
            },
            profile,
        },
        &mut length_mm,
    );

    push(
        PathSegment {
            def: SegmentDef::Line {
                start_mm: t1,
                end_mm: t2,
            },
            profile,
        },
        &mut length_mm,
    );

    push(
        PathSegment {
            def: SegmentDef::Arc {
                center_mm: c2,
                radius_mm: end_radius_mm,
                start_rad: (t2.y - c2.y).atan2(t2.x - c2.x),
                sweep_rad: arc_angle(t2, end_mm, c2, sign2 < 0.0),
            },
            profile,
        },
        &mut length_mm,
    );

    Some((segments, length_mm))
}

/// Angle swept between two points on a circle about `center`, in the given
/// direction.
///
/// The naive `atan2` difference is corrected by a full turn when its sign
/// disagrees with the intended turn direction.
fn arc_angle(start: Vector2<f64>, end: Vector2<f64>, center: Vector2<f64>, ccw: bool) -> f64 {
    let a_start = start - center;
    let a_end = end - center;

    let theta = a_end.y.atan2(a_end.x) - a_start.y.atan2(a_start.x);

    if theta < 0.0 && ccw {
        theta + std::f64::consts::TAU
    } else if theta > 0.0 && !ccw {
        theta - std::f64::consts::TAU
    } else {
        theta
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
