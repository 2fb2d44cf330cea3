//! # Motion control library.
//!
//! The onboard motion-control core of the robot: converts desired geometric
//! moves into time-parameterised speed commands, tracks the robot's
//! estimated pose while executing them, and reconciles that estimate
//! against delayed corrections from the external vision system.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Path follower - walks the robot along a path, managing segment
/// transitions and deceleration
pub mod follower;

/// Hardware abstraction seams - sensor readers and actuator collaborators
pub mod hal;

/// Localisation module - dead reckoning and keyframe drift correction
pub mod loc;

/// Path module - typed segment paths and Dubins synthesis
pub mod path;

/// Velocity profile generator - accel-bounded speed-vs-time profiles
pub mod vel_profile;
