//! Media-item-aspect (MIA) storage management.

mod manager;

pub use manager::AspectStorageManager;
