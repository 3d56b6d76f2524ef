//! Static core tables of the library database.
//!
//! Aspect tables are provisioned dynamically by the storage manager and are
//! deliberately absent here; this schema only carries the fixed backbone:
//! item identities, the persisted aspect-type registry, shares and
//! playlists.

use super::{Column, SqlType, Table, VersionedSchema};

const MEDIA_ITEMS_TABLE: Table = Table {
    name: "media_items",
    columns: &[Column::new("id", SqlType::Text).primary_key()],
    indices: &[],
    unique_constraints: &[],
};

/// Persisted registry of aspect types with provisioned storage. The
/// definition column holds the serialized `AspectMetadata` so the in-memory
/// registry can be rebuilt at startup.
const ASPECT_TYPES_TABLE: Table = Table {
    name: "aspect_types",
    columns: &[
        Column::new("id", SqlType::Text).primary_key(),
        Column::new("name", SqlType::Text).not_null(),
        Column::new("definition", SqlType::Text).not_null(),
    ],
    indices: &[],
    unique_constraints: &[],
};

const SHARES_TABLE: Table = Table {
    name: "shares",
    columns: &[
        Column::new("id", SqlType::Text).primary_key(),
        Column::new("system_id", SqlType::Text).not_null(),
        Column::new("base_path", SqlType::Text).not_null(),
        Column::new("name", SqlType::Text).not_null(),
    ],
    indices: &[("idx_shares_system", "system_id")],
    unique_constraints: &[&["system_id", "base_path"]],
};

const SHARE_CATEGORIES_TABLE: Table = Table {
    name: "share_categories",
    columns: &[
        Column::new("share_id", SqlType::Text)
            .not_null()
            .cascade_from("shares", "id"),
        Column::new("category", SqlType::Text).not_null(),
    ],
    indices: &[("idx_share_categories_share", "share_id")],
    unique_constraints: &[&["share_id", "category"]],
};

const PLAYLISTS_TABLE: Table = Table {
    name: "playlists",
    columns: &[
        Column::new("id", SqlType::Text).primary_key(),
        Column::new("name", SqlType::Text).not_null(),
        Column::new("playlist_type", SqlType::Text).not_null(),
    ],
    indices: &[],
    unique_constraints: &[],
};

const PLAYLIST_ITEMS_TABLE: Table = Table {
    name: "playlist_items",
    columns: &[
        Column::new("playlist_id", SqlType::Text)
            .not_null()
            .cascade_from("playlists", "id"),
        Column::new("position", SqlType::Integer).not_null(),
        Column::new("media_item_id", SqlType::Text)
            .not_null()
            .cascade_from("media_items", "id"),
    ],
    indices: &[
        ("idx_playlist_items_playlist", "playlist_id"),
        ("idx_playlist_items_item", "media_item_id"),
    ],
    unique_constraints: &[&["playlist_id", "position"]],
};

pub const CORE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        MEDIA_ITEMS_TABLE,
        ASPECT_TYPES_TABLE,
        SHARES_TABLE,
        SHARE_CATEGORIES_TABLE,
        PLAYLISTS_TABLE,
        PLAYLIST_ITEMS_TABLE,
    ],
    migration: None,
}];

/// Table names the rest of the crate addresses by hand-written SQL.
pub struct CoreTables;

impl CoreTables {
    pub const MEDIA_ITEMS: &'static str = "media_items";
    pub const ASPECT_TYPES: &'static str = "aspect_types";
    pub const SHARES: &'static str = "shares";
    pub const SHARE_CATEGORIES: &'static str = "share_categories";
    pub const PLAYLISTS: &'static str = "playlists";
    pub const PLAYLIST_ITEMS: &'static str = "playlist_items";
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn core_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = &CORE_VERSIONED_SCHEMAS[CORE_VERSIONED_SCHEMAS.len() - 1];
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
    }

    #[test]
    fn share_categories_cascade_with_share() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        CORE_VERSIONED_SCHEMAS[0].create(&conn).unwrap();

        conn.execute(
            "INSERT INTO shares (id, system_id, base_path, name) VALUES ('s1', 'sys', 'fs:///a', 'A')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO share_categories (share_id, category) VALUES ('s1', 'video')",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM shares WHERE id = 's1'", []).unwrap();

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM share_categories", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
