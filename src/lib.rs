//! Mediarium Media Library
//!
//! Schema-on-write aspect storage over SQLite plus a filter algebra that
//! compiles to parameterized SQL joins. Plugins declare aspect metadata,
//! the storage manager derives the physical tables, and `MediaLibrary`
//! fronts items, shares, playlists, online systems and the importer
//! contracts.

pub mod aspect;
pub mod config;
pub mod error;
pub mod importer;
pub mod library;
pub mod mia;
pub mod query;
pub mod resource_path;
pub mod sqlite_schema;

// Re-export commonly used types for convenience
pub use aspect::{AspectId, AspectInstance, AspectMetadata, AttributeValue};
pub use config::LibraryConfig;
pub use error::{LibraryError, Result};
pub use library::{MediaItem, MediaItemId, MediaLibrary, RelocationMode, Share};
pub use query::{Filter, MediaQuery};
pub use resource_path::ResourcePath;
