//! Path follower parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the path follower
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Distance ahead of the robot at which tracking errors are evaluated,
    /// in mm.
    pub lookahead_dist_mm: f64,

    /// Cross-track error above which the path is aborted as a tracking
    /// failure, in mm.
    pub abort_dist_error_mm: f64,

    /// Tolerance on the gap between consecutive segments when verifying
    /// path continuity, in mm.
    pub continuity_tol_mm: f64,

    /// Speed considered "stopped" when finishing a decelerating segment, in
    /// mm/s.
    pub stopped_speed_mmps: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            lookahead_dist_mm: 30.0,
            abort_dist_error_mm: 100.0,
            continuity_tol_mm: 0.1,
            stopped_speed_mmps: 2.0,
        }
    }
}
