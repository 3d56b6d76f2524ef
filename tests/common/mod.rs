//! Shared fixtures for media library integration tests.
//!
//! `TestLibrary::open()` gives every test a file-backed library with the
//! movie and audio aspects registered and one local share at
//! `fs:///library`, plus the recording importer handed to it.

// Not every test binary uses every helper.
#![allow(dead_code)]

use mediarium::aspect::{AspectId, AspectMetadata, AttributeSpec, AttributeType};
use mediarium::importer::InertImporter;
use mediarium::library::{MediaItemId, Share};
use mediarium::{AspectInstance, LibraryConfig, MediaLibrary, ResourcePath};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const MOVIE_ASPECT_ID: AspectId = AspectId(Uuid::from_u128(0xaaaa_0000_0000_0001));
pub const AUDIO_ASPECT_ID: AspectId = AspectId(Uuid::from_u128(0xaaaa_0000_0000_0002));

pub fn movie_aspect() -> AspectMetadata {
    AspectMetadata::new(
        MOVIE_ASPECT_ID,
        "movie",
        vec![
            AttributeSpec::single("title", AttributeType::text(200)),
            AttributeSpec::single("year", AttributeType::Integer),
            AttributeSpec::single("plot", AttributeType::large_text()),
            AttributeSpec::multi("genres", AttributeType::text(50)),
        ],
    )
}

pub fn audio_aspect() -> AspectMetadata {
    AspectMetadata::new(
        AUDIO_ASPECT_ID,
        "audio",
        vec![AttributeSpec::single("artist", AttributeType::text(100))],
    )
}

pub struct TestLibrary {
    pub library: MediaLibrary,
    pub importer: Arc<InertImporter>,
    pub system_id: String,
    pub config: LibraryConfig,
    _dir: TempDir,
}

impl TestLibrary {
    pub fn open() -> TestLibrary {
        let dir = tempfile::tempdir().unwrap();
        let config = LibraryConfig::new(dir.path().join("library.db"));
        let importer = Arc::new(InertImporter::new());
        let library = MediaLibrary::open(&config, importer.clone()).unwrap();
        library.register_aspect_storage(movie_aspect()).unwrap();
        library.register_aspect_storage(audio_aspect()).unwrap();
        let system_id = library.local_system_id().to_string();
        library
            .register_share(Share::new(
                system_id.clone(),
                path("/library"),
                "main library",
                ["video".to_string()],
            ))
            .unwrap();
        TestLibrary {
            library,
            importer,
            system_id,
            config,
            _dir: dir,
        }
    }

    /// Reopen the same database with a fresh importer.
    pub fn reopen(self) -> TestLibrary {
        let TestLibrary {
            library,
            system_id,
            config,
            _dir,
            ..
        } = self;
        library.shutdown();
        drop(library);
        let importer = Arc::new(InertImporter::new());
        let library = MediaLibrary::open(&config, importer.clone()).unwrap();
        TestLibrary {
            library,
            importer,
            system_id,
            config,
            _dir,
        }
    }

    pub fn add_movie(&self, file: &str, title: &str, year: i64) -> MediaItemId {
        self.add_movie_instance(
            file,
            AspectInstance::new(MOVIE_ASPECT_ID)
                .set("title", title)
                .set("year", year),
        )
    }

    pub fn add_movie_instance(&self, file: &str, movie: AspectInstance) -> MediaItemId {
        self.library
            .add_or_update_item(
                &self.system_id,
                &path(&format!("/library/{file}")),
                vec![movie],
            )
            .unwrap()
    }
}

pub fn path(p: &str) -> ResourcePath {
    ResourcePath::new("fs", p)
}
