//! Error taxonomy for the media library core.
//!
//! Not-found conditions are reported as `Ok(None)` by the individual
//! operations; the variants here cover conflicts, precondition violations
//! and storage failures that must abort (and roll back) an operation.

use crate::aspect::AspectId;
use crate::library::ShareId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LibraryError>;

#[derive(Debug, Error)]
pub enum LibraryError {
    /// A share already exists for the same (system id, base path) pair.
    #[error("share already registered for system {system_id} at {path}")]
    ShareConflict { system_id: String, path: String },

    /// The share addressed by a mutating operation no longer exists.
    #[error("share {0} not found")]
    ShareNotFound(ShareId),

    /// An aspect id was used that has no storage registered for it.
    #[error("unknown aspect {0}")]
    UnknownAspect(AspectId),

    /// An attribute name was used that the aspect's metadata does not declare.
    #[error("aspect {aspect} has no attribute '{attribute}'")]
    UnknownAttribute { aspect: AspectId, attribute: String },

    /// An import-result write arrived for a path no registered share covers.
    #[error("no registered share covers {path} on system {system_id}")]
    NoShareForPath { system_id: String, path: String },

    /// The persisted schema version cannot be brought to the expected one.
    #[error("database schema version {found} cannot be upgraded to expected version {expected}")]
    SchemaVersion { found: i64, expected: i64 },

    /// A string could not be parsed as a provider-qualified resource path.
    #[error("invalid resource path: {0}")]
    InvalidResourcePath(String),

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
