//! Contracts between the library core and the external importer process.
//!
//! The importer walks filesystems and extracts metadata elsewhere; this
//! core only hands it two callback objects on activation and drives it
//! through the control interface. Scheduling and cancellation are
//! fire-and-forget from the core's perspective.

use crate::aspect::AspectInstance;
use crate::error::Result;
use crate::library::{MediaItem, MediaItemId};
use crate::resource_path::ResourcePath;
use std::sync::Arc;

/// Browse callback the importer uses to inspect what the library already
/// knows about a directory level.
pub trait MediaBrowsing: Send + Sync {
    /// Items directly under `path`, excluding deeper descendants.
    fn browse(
        &self,
        system_id: &str,
        path: &ResourcePath,
        necessary: &[crate::aspect::AspectId],
        optional: &[crate::aspect::AspectId],
    ) -> Result<Vec<MediaItem>>;
}

/// Result callback the importer feeds extracted metadata into.
pub trait ImportResultHandler: Send + Sync {
    fn update_item(
        &self,
        system_id: &str,
        path: &ResourcePath,
        aspects: Vec<AspectInstance>,
    ) -> Result<MediaItemId>;

    fn delete_item(&self, system_id: &str, path: &ResourcePath) -> Result<()>;
}

/// Control interface of the external importer, consumed by the library.
pub trait ImporterControl: Send + Sync {
    fn activate(
        &self,
        browsing: Arc<dyn MediaBrowsing>,
        results: Arc<dyn ImportResultHandler>,
    );
    fn suspend(&self);
    fn schedule_import(&self, base_path: &ResourcePath, categories: &[String], recursive: bool);
    fn cancel_jobs_for_path(&self, base_path: &ResourcePath);
}

/// Recorded importer-control call, for assertions in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum ImporterCall {
    Activate,
    Suspend,
    ScheduleImport {
        base_path: ResourcePath,
        categories: Vec<String>,
        recursive: bool,
    },
    CancelJobsForPath {
        base_path: ResourcePath,
    },
}

/// Importer stub that records control calls and never imports anything.
/// It keeps the callbacks handed over on activation so tests can feed
/// results through them directly.
#[derive(Default)]
pub struct InertImporter {
    calls: std::sync::Mutex<Vec<ImporterCall>>,
    browsing: std::sync::Mutex<Option<Arc<dyn MediaBrowsing>>>,
    results: std::sync::Mutex<Option<Arc<dyn ImportResultHandler>>>,
}

impl InertImporter {
    pub fn new() -> Self {
        InertImporter::default()
    }

    pub fn calls(&self) -> Vec<ImporterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn browsing(&self) -> Option<Arc<dyn MediaBrowsing>> {
        self.browsing.lock().unwrap().clone()
    }

    pub fn results(&self) -> Option<Arc<dyn ImportResultHandler>> {
        self.results.lock().unwrap().clone()
    }
}

impl ImporterControl for InertImporter {
    fn activate(
        &self,
        browsing: Arc<dyn MediaBrowsing>,
        results: Arc<dyn ImportResultHandler>,
    ) {
        *self.browsing.lock().unwrap() = Some(browsing);
        *self.results.lock().unwrap() = Some(results);
        self.calls.lock().unwrap().push(ImporterCall::Activate);
    }

    fn suspend(&self) {
        self.calls.lock().unwrap().push(ImporterCall::Suspend);
    }

    fn schedule_import(&self, base_path: &ResourcePath, categories: &[String], recursive: bool) {
        self.calls
            .lock()
            .unwrap()
            .push(ImporterCall::ScheduleImport {
                base_path: base_path.clone(),
                categories: categories.to_vec(),
                recursive,
            });
    }

    fn cancel_jobs_for_path(&self, base_path: &ResourcePath) {
        self.calls
            .lock()
            .unwrap()
            .push(ImporterCall::CancelJobsForPath {
                base_path: base_path.clone(),
            });
    }
}
