//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.
//! Messages cross process boundaries as JSON.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Pose correction messages produced by the external vision/relocalisation
/// subsystem.
pub mod loc;

/// Motion telemetry produced by the path follower.
pub mod motion;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised when encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum MsgError {
    #[error("Failed to encode/decode message JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
