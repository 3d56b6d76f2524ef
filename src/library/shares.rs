//! Shares: registered import roots.
//!
//! A share binds an owning system, a base resource path, a display name
//! and a set of media categories; categories decide which metadata
//! extractors apply under the root. At most one share may exist per
//! (system id, base path) pair.
//!
//! This module holds the value type and the row-level persistence helpers;
//! transaction boundaries and importer notifications belong to the façade.

use crate::error::{LibraryError, Result};
use crate::resource_path::ResourcePath;
use crate::sqlite_schema::CoreTables;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareId(pub Uuid);

impl ShareId {
    pub fn new() -> Self {
        ShareId(Uuid::new_v4())
    }
}

impl Default for ShareId {
    fn default() -> Self {
        ShareId::new()
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Policy applied when a share's base path changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelocationMode {
    /// Rewrite stored item paths in place; identities and aspects survive.
    Relocate,
    /// Delete everything under the old base and re-import under the new one.
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub id: ShareId,
    pub system_id: String,
    pub base_path: ResourcePath,
    pub name: String,
    pub categories: BTreeSet<String>,
}

impl Share {
    pub fn new(
        system_id: impl Into<String>,
        base_path: ResourcePath,
        name: impl Into<String>,
        categories: impl IntoIterator<Item = String>,
    ) -> Self {
        Share {
            id: ShareId::new(),
            system_id: system_id.into(),
            base_path,
            name: name.into(),
            categories: categories.into_iter().collect(),
        }
    }
}

pub(crate) fn share_exists_for(
    conn: &Connection,
    system_id: &str,
    base_path: &ResourcePath,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE system_id = ?1 AND base_path = ?2",
            CoreTables::SHARES
        ),
        params![system_id, base_path.serialize()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn insert_share(conn: &Connection, share: &Share) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} (id, system_id, base_path, name) VALUES (?1, ?2, ?3, ?4)",
            CoreTables::SHARES
        ),
        params![
            share.id.to_string(),
            share.system_id,
            share.base_path.serialize(),
            share.name
        ],
    )?;
    for category in &share.categories {
        conn.execute(
            &format!(
                "INSERT INTO {} (share_id, category) VALUES (?1, ?2)",
                CoreTables::SHARE_CATEGORIES
            ),
            params![share.id.to_string(), category],
        )?;
    }
    Ok(())
}

pub(crate) fn read_share(conn: &Connection, id: ShareId) -> Result<Option<Share>> {
    let row: Option<(String, String, String)> = conn
        .query_row(
            &format!(
                "SELECT system_id, base_path, name FROM {} WHERE id = ?1",
                CoreTables::SHARES
            ),
            params![id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    let Some((system_id, base_path, name)) = row else {
        return Ok(None);
    };
    Ok(Some(Share {
        id,
        system_id,
        base_path: ResourcePath::parse(&base_path)?,
        name,
        categories: read_categories(conn, id)?,
    }))
}

fn read_categories(conn: &Connection, id: ShareId) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT category FROM {} WHERE share_id = ?1",
        CoreTables::SHARE_CATEGORIES
    ))?;
    let categories = stmt
        .query_map(params![id.to_string()], |row| row.get(0))?
        .collect::<std::result::Result<BTreeSet<String>, _>>()?;
    Ok(categories)
}

pub(crate) fn shares_for_system(conn: &Connection, system_id: &str) -> Result<Vec<Share>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id FROM {} WHERE system_id = ?1 ORDER BY base_path",
        CoreTables::SHARES
    ))?;
    let ids: Vec<String> = stmt
        .query_map(params![system_id], |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;
    collect_shares(conn, ids)
}

pub(crate) fn all_shares(conn: &Connection) -> Result<Vec<Share>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id FROM {} ORDER BY system_id, base_path",
        CoreTables::SHARES
    ))?;
    let ids: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;
    collect_shares(conn, ids)
}

fn collect_shares(conn: &Connection, ids: Vec<String>) -> Result<Vec<Share>> {
    let mut shares = Vec::with_capacity(ids.len());
    for id in ids {
        let share_id = ShareId(
            Uuid::parse_str(&id)
                .map_err(|e| anyhow::anyhow!("invalid share id '{id}': {e}"))?,
        );
        if let Some(share) = read_share(conn, share_id)? {
            shares.push(share);
        }
    }
    Ok(shares)
}

/// Rewrite the share row and diff its category child rows. The caller has
/// already re-read the prior state inside the same transaction.
pub(crate) fn update_share_row(
    conn: &Connection,
    prior: &Share,
    new_path: &ResourcePath,
    new_name: &str,
    new_categories: &BTreeSet<String>,
) -> Result<()> {
    conn.execute(
        &format!(
            "UPDATE {} SET base_path = ?1, name = ?2 WHERE id = ?3",
            CoreTables::SHARES
        ),
        params![new_path.serialize(), new_name, prior.id.to_string()],
    )?;
    for added in new_categories.difference(&prior.categories) {
        conn.execute(
            &format!(
                "INSERT INTO {} (share_id, category) VALUES (?1, ?2)",
                CoreTables::SHARE_CATEGORIES
            ),
            params![prior.id.to_string(), added],
        )?;
    }
    for removed in prior.categories.difference(new_categories) {
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE share_id = ?1 AND category = ?2",
                CoreTables::SHARE_CATEGORIES
            ),
            params![prior.id.to_string(), removed],
        )?;
    }
    Ok(())
}

pub(crate) fn delete_share_row(conn: &Connection, id: ShareId) -> Result<()> {
    // Category rows cascade.
    let deleted = conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1", CoreTables::SHARES),
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(LibraryError::ShareNotFound(id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_schema::CORE_VERSIONED_SCHEMAS;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        CORE_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        conn
    }

    fn sample_share() -> Share {
        Share::new(
            "sys-1",
            ResourcePath::new("fs", "/media/movies"),
            "Movies",
            ["video".to_string(), "movie".to_string()],
        )
    }

    #[test]
    fn insert_and_read_round_trips() {
        let conn = setup();
        let share = sample_share();
        insert_share(&conn, &share).unwrap();
        assert_eq!(read_share(&conn, share.id).unwrap().unwrap(), share);
    }

    #[test]
    fn missing_share_reads_as_none() {
        let conn = setup();
        assert!(read_share(&conn, ShareId::new()).unwrap().is_none());
    }

    #[test]
    fn duplicate_system_path_pair_violates_unique_constraint() {
        let conn = setup();
        let share = sample_share();
        insert_share(&conn, &share).unwrap();
        let mut twin = sample_share();
        twin.id = ShareId::new();
        assert!(insert_share(&conn, &twin).is_err());
        assert!(share_exists_for(&conn, "sys-1", &share.base_path).unwrap());
    }

    #[test]
    fn update_diffs_categories() {
        let conn = setup();
        let share = sample_share();
        insert_share(&conn, &share).unwrap();

        let new_categories: BTreeSet<String> =
            ["video".to_string(), "series".to_string()].into();
        update_share_row(
            &conn,
            &share,
            &share.base_path,
            "Renamed",
            &new_categories,
        )
        .unwrap();

        let updated = read_share(&conn, share.id).unwrap().unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.categories, new_categories);
    }

    #[test]
    fn delete_of_missing_share_is_not_found() {
        let conn = setup();
        let err = delete_share_row(&conn, ShareId::new()).unwrap_err();
        assert!(matches!(err, LibraryError::ShareNotFound(_)));
    }

    #[test]
    fn shares_for_system_filters_by_owner() {
        let conn = setup();
        insert_share(&conn, &sample_share()).unwrap();
        let other = Share::new(
            "sys-2",
            ResourcePath::new("fs", "/media/music"),
            "Music",
            ["audio".to_string()],
        );
        insert_share(&conn, &other).unwrap();

        assert_eq!(shares_for_system(&conn, "sys-1").unwrap().len(), 1);
        assert_eq!(all_shares(&conn).unwrap().len(), 2);
    }
}
