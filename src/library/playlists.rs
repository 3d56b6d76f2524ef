//! Playlist persistence: named ordered item-id lists with a type tag.
//!
//! Saving rewrites the full ordered membership (delete then re-insert)
//! rather than diffing; playlists are small and the transaction keeps the
//! rewrite atomic.

use crate::error::Result;
use crate::library::MediaItemId;
use crate::sqlite_schema::CoreTables;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(pub Uuid);

impl PlaylistId {
    pub fn new() -> Self {
        PlaylistId(Uuid::new_v4())
    }
}

impl Default for PlaylistId {
    fn default() -> Self {
        PlaylistId::new()
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub playlist_type: String,
    pub item_ids: Vec<MediaItemId>,
}

impl Playlist {
    pub fn new(
        name: impl Into<String>,
        playlist_type: impl Into<String>,
        item_ids: Vec<MediaItemId>,
    ) -> Self {
        Playlist {
            id: PlaylistId::new(),
            name: name.into(),
            playlist_type: playlist_type.into(),
            item_ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    pub name: String,
    pub playlist_type: String,
    pub item_count: usize,
}

pub(crate) fn save_playlist(conn: &Connection, playlist: &Playlist) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} (id, name, playlist_type) VALUES (?1, ?2, ?3) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, \
             playlist_type = excluded.playlist_type",
            CoreTables::PLAYLISTS
        ),
        params![
            playlist.id.to_string(),
            playlist.name,
            playlist.playlist_type
        ],
    )?;
    conn.execute(
        &format!(
            "DELETE FROM {} WHERE playlist_id = ?1",
            CoreTables::PLAYLIST_ITEMS
        ),
        params![playlist.id.to_string()],
    )?;
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} (playlist_id, position, media_item_id) VALUES (?1, ?2, ?3)",
        CoreTables::PLAYLIST_ITEMS
    ))?;
    for (position, item_id) in playlist.item_ids.iter().enumerate() {
        stmt.execute(params![
            playlist.id.to_string(),
            position as i64,
            item_id.to_string()
        ])?;
    }
    Ok(())
}

pub(crate) fn load_playlist(conn: &Connection, id: PlaylistId) -> Result<Option<Playlist>> {
    let row: Option<(String, String)> = conn
        .query_row(
            &format!(
                "SELECT name, playlist_type FROM {} WHERE id = ?1",
                CoreTables::PLAYLISTS
            ),
            params![id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((name, playlist_type)) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT media_item_id FROM {} WHERE playlist_id = ?1 ORDER BY position",
        CoreTables::PLAYLIST_ITEMS
    ))?;
    let raw_ids: Vec<String> = stmt
        .query_map(params![id.to_string()], |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;
    let item_ids = raw_ids
        .iter()
        .map(|s| MediaItemId::parse(s))
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(Playlist {
        id,
        name,
        playlist_type,
        item_ids,
    }))
}

pub(crate) fn delete_playlist(conn: &Connection, id: PlaylistId) -> Result<bool> {
    // Membership rows cascade.
    let deleted = conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1", CoreTables::PLAYLISTS),
        params![id.to_string()],
    )?;
    Ok(deleted > 0)
}

pub(crate) fn list_playlists(conn: &Connection) -> Result<Vec<PlaylistSummary>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT p.id, p.name, p.playlist_type, COUNT(pi.media_item_id) \
         FROM {} p LEFT JOIN {} pi ON pi.playlist_id = p.id \
         GROUP BY p.id ORDER BY p.name",
        CoreTables::PLAYLISTS,
        CoreTables::PLAYLIST_ITEMS
    ))?;
    let summaries = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut result = Vec::with_capacity(summaries.len());
    for (id, name, playlist_type, count) in summaries {
        result.push(PlaylistSummary {
            id: PlaylistId(
                Uuid::parse_str(&id)
                    .map_err(|e| anyhow::anyhow!("invalid playlist id '{id}': {e}"))?,
            ),
            name,
            playlist_type,
            item_count: count as usize,
        });
    }
    Ok(result)
}
