//! Main motion-control executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Localisation update (dead reckoning)
//!         - Path follower update
//!         - Simulated robot propagation
//!
//! Without hardware attached the executable drives the simulated robot
//! along a demonstration Dubins path and exits when the path completes.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use motion_lib::{
    follower::{self, PathFollower},
    hal::sim::SimRobot,
    loc::{self, Localization, Pose},
    path::{dubins::generate_dubins_path, Path, SpeedProfile},
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::env;

// Internal
use util::{
    host,
    logger::{logger_init, LevelFilter},
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.01;

/// Maximum number of cycles before the demo is considered hung.
const MAX_CYCLES: usize = 100_000;

/// Wheelbase of the simulated robot in mm.
const SIM_WHEEL_DIST_MM: f64 = 48.0;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // Default the software root to the working directory so the demo can be
    // run straight from the repo
    if host::get_sw_root().is_err() {
        env::set_var(host::SW_ROOT_ENV_VAR, ".");
    }

    let session = Session::new("motion_exec", "sessions")
        .wrap_err("Failed to create the session")?;
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise the logger")?;

    info!("Motion control exec starting");

    // Load module parameters, falling back to defaults if the files are
    // missing
    let follower_params: follower::Params = match params::load("follower.toml") {
        Ok(p) => p,
        Err(e) => {
            warn!("Could not load follower params ({}), using defaults", e);
            follower::Params::default()
        }
    };
    let loc_params: loc::Params = match params::load("loc.toml") {
        Ok(p) => p,
        Err(e) => {
            warn!("Could not load loc params ({}), using defaults", e);
            loc::Params::default()
        }
    };

    // Module states
    let mut sim = SimRobot::new(SIM_WHEEL_DIST_MM, CYCLE_PERIOD_S);
    let mut localization = Localization::new(loc_params);
    let mut follower = PathFollower::new(follower_params);

    // Build the demonstration path: a Dubins curve to a pose ahead and to
    // the left, arriving along +X
    let start = Pose::new(0.0, 0.0, util::angle::NormAngle::new(0.0));
    let end = Pose::new(600.0, 300.0, util::angle::NormAngle::new(0.0));

    let mut path = Path::new();
    let summary = generate_dubins_path(
        &mut path,
        &start,
        &end,
        100.0,
        100.0,
        SpeedProfile::new(100.0, 200.0, 200.0),
        50.0,
    )
    .wrap_err("Failed to generate the demonstration path")?;

    info!(
        "Demonstration path: {} segments, {:.1} mm",
        summary.num_segments, summary.length_mm
    );

    // Drop a summary of the generated path into the session directory
    let mut summary_path = session.session_root.clone();
    summary_path.push("demo_path.json");
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&summary_path, json) {
                warn!("Could not write path summary: {}", e);
            }
        }
        Err(e) => warn!("Could not serialise path summary: {}", e),
    }

    if let Some(event) = follower
        .start_path_traversal(path, 1, &mut sim)
        .wrap_err("Failed to start path traversal")?
    {
        info!("Event: {:?}", event);
    }

    // ---------------------------------------------------------------------
    // MAIN LOOP
    // ---------------------------------------------------------------------

    for cycle in 0..MAX_CYCLES {
        // Localisation first so the follower sees the freshest pose
        localization.update(&sim);

        if let Some(event) = follower.update(&localization, &mut sim) {
            info!("Event: {:?}", event);
        }

        if cycle % 100 == 0 {
            let report = follower.status_report();
            debug!(
                "Cycle {}: segment {}, offset {:.1} mm, heading err {:.3} rad, {:.1} mm to end",
                cycle,
                report.seg_idx,
                report.offset_error_mm,
                report.heading_error_rad,
                report.dist_to_end_mm
            );
        }

        if !follower.is_traversing() {
            let pose = localization.current_pose();
            info!(
                "Path finished after {} cycles at ({:.1}, {:.1}, {:.3})",
                cycle,
                pose.position_mm.x,
                pose.position_mm.y,
                pose.heading.as_f64()
            );
            return Ok(());
        }

        // Propagate the simulated robot
        sim.step(CYCLE_PERIOD_S);
    }

    Err(eyre!("Demo path did not complete within {} cycles", MAX_CYCLES))
}
