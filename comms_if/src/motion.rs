//! # Motion telemetry messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A path-following lifecycle event.
///
/// Emitted by the path follower only for externally commanded paths,
/// identified by the `path_id` the commander supplied.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEvent {
    /// Identifier of the path this event refers to.
    pub path_id: u16,

    /// What happened to the path.
    pub kind: PathEventKind,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// The kinds of path-following lifecycle event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathEventKind {
    /// Traversal of the path has begun.
    Started,

    /// The final segment of the path was completed and the path cleared.
    Completed,

    /// The path was aborted before its final segment completed, either by an
    /// explicit clear or by a tracking failure.
    Interrupted,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl PathEvent {
    /// Encode the event into its JSON wire form.
    pub fn to_json(&self) -> Result<String, crate::MsgError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn started(path_id: u16) -> Self {
        Self {
            path_id,
            kind: PathEventKind::Started,
        }
    }

    pub fn completed(path_id: u16) -> Self {
        Self {
            path_id,
            kind: PathEventKind::Completed,
        }
    }

    pub fn interrupted(path_id: u16) -> Self {
        Self {
            path_id,
            kind: PathEventKind::Interrupted,
        }
    }
}
