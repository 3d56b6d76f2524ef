//! The media library façade.
//!
//! `MediaLibrary` owns the SQLite connection, the aspect storage manager
//! and the online-system registry, and wires the importer callbacks on
//! startup. Every mutation runs inside one transaction that commits
//! whole or rolls back whole; reads go straight through the connection
//! lock.

use crate::aspect::{
    importer_state, provider_resource, AspectId, AspectInstance, AspectMetadata, AttributeValue,
    ImporterStateAspect, ProviderResourceAspect,
};
use crate::config::LibraryConfig;
use crate::error::{LibraryError, Result};
use crate::importer::{ImportResultHandler, ImporterControl, MediaBrowsing};
use crate::library::item::{MediaItem, MediaItemId};
use crate::library::online::OnlineSystemRegistry;
use crate::library::playlists::{self, Playlist, PlaylistId, PlaylistSummary};
use crate::library::shares::{self, RelocationMode, Share, ShareId};
use crate::mia::AspectStorageManager;
use crate::query::{
    escape_like, AttributeRef, Filter, GroupingFunction, MediaItemGroup, MediaQuery, QueryCompiler,
    LIKE_ESCAPE_CHAR,
};
use crate::resource_path::{ensure_trailing_separator, ResourcePath};
use crate::sqlite_schema::{migrate_to_latest, CoreTables, CORE_VERSIONED_SCHEMAS};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

pub struct MediaLibrary {
    inner: Arc<LibraryInner>,
}

struct LibraryInner {
    conn: Mutex<Connection>,
    aspects: AspectStorageManager,
    online: OnlineSystemRegistry,
    importer: Arc<dyn ImporterControl>,
    local_system_id: String,
}

/// Resolved table/column names of the provider-resource aspect storage,
/// for the few operations that address its rows directly.
struct ProviderStorage {
    table: String,
    system_column: String,
    path_column: String,
}

fn provider_storage() -> ProviderStorage {
    let metadata = provider_resource();
    let mut system_column = String::new();
    let mut path_column = String::new();
    for spec in &metadata.attributes {
        let column = AspectStorageManager::column_name(spec);
        if spec.name == ProviderResourceAspect::ATTR_SYSTEM_ID {
            system_column = column;
        } else if spec.name == ProviderResourceAspect::ATTR_PATH {
            path_column = column;
        }
    }
    ProviderStorage {
        table: AspectStorageManager::table_name(&metadata),
        system_column,
        path_column,
    }
}

impl MediaLibrary {
    /// Open (creating on first use) the library database, bring the core
    /// schema to the current version, rebuild the aspect registry and
    /// activate the importer. The local system is reported online last.
    pub fn open(config: &LibraryConfig, importer: Arc<dyn ImporterControl>) -> Result<MediaLibrary> {
        let mut conn = Connection::open(&config.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // Paths are byte-wise identities; prefix matching must not fold
        // case. Case-insensitive filters lowercase both sides explicitly.
        conn.pragma_update(None, "case_sensitive_like", true)?;
        migrate_to_latest(&mut conn, CORE_VERSIONED_SCHEMAS)?;

        let aspects = AspectStorageManager::new();
        aspects.load_registered(&conn)?;
        {
            let tx = conn.transaction()?;
            aspects.add_storage(&tx, provider_resource())?;
            aspects.add_storage(&tx, importer_state())?;
            // (system, path) is the external item identity; the storage
            // manager only keys aspect tables by item id.
            let storage = provider_storage();
            tx.execute(
                &format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_{}_identity ON {} ({}, {})",
                    storage.table, storage.table, storage.system_column, storage.path_column
                ),
                [],
            )?;
            tx.commit()?;
        }

        let inner = Arc::new(LibraryInner {
            conn: Mutex::new(conn),
            aspects,
            online: OnlineSystemRegistry::new(),
            importer: importer.clone(),
            local_system_id: config.local_system_id.clone(),
        });

        importer.activate(
            Arc::new(BrowseCallback {
                inner: inner.clone(),
            }),
            Arc::new(ImportCallback {
                inner: inner.clone(),
            }),
        );
        inner
            .online
            .set_online(&config.local_system_id, &config.local_system_name);
        info!(system = %config.local_system_id, db = %config.db_path.display(), "media library open");
        Ok(MediaLibrary { inner })
    }

    /// Suspend the importer and take the local system offline. The database
    /// needs no teardown beyond dropping the library.
    pub fn shutdown(&self) {
        self.inner.importer.suspend();
        self.inner.online.set_offline(&self.inner.local_system_id);
        info!("media library shut down");
    }

    // =========================================================================
    // Aspect storage
    // =========================================================================

    pub fn register_aspect_storage(&self, metadata: AspectMetadata) -> Result<()> {
        self.inner
            .with_transaction("register_aspect_storage", |tx| {
                self.inner.aspects.add_storage(tx, metadata)
            })
    }

    pub fn remove_aspect_storage(&self, aspect_id: AspectId) -> Result<()> {
        self.inner.with_transaction("remove_aspect_storage", |tx| {
            self.inner.aspects.remove_storage(tx, aspect_id)
        })
    }

    pub fn managed_aspects(&self) -> Vec<AspectMetadata> {
        self.inner.aspects.managed_aspects()
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Upsert the item at `path` together with the supplied aspect data.
    /// Paths outside every registered share are rejected.
    pub fn add_or_update_item(
        &self,
        system_id: &str,
        path: &ResourcePath,
        aspects: Vec<AspectInstance>,
    ) -> Result<MediaItemId> {
        self.inner.with_transaction("add_or_update_item", |tx| {
            self.inner.guarded_upsert(tx, system_id, path, aspects)
        })
    }

    /// Delete the item at `path` plus everything below it, or a whole
    /// system's items when `path` is `None`. Aspect rows, playlist
    /// membership and child rows go with them. Returns the number of
    /// items removed.
    pub fn delete_media_item_or_path(
        &self,
        system_id: &str,
        path: Option<&ResourcePath>,
    ) -> Result<usize> {
        self.inner.with_transaction("delete_media_item_or_path", |tx| {
            self.inner.delete_under(tx, system_id, path)
        })
    }

    pub fn search(&self, query: &MediaQuery, only_online: bool) -> Result<Vec<MediaItem>> {
        self.inner.search(query, only_online)
    }

    /// Substring search across the text attributes of all managed aspects,
    /// narrowed by `extra_filter` when given.
    pub fn simple_text_search(
        &self,
        term: &str,
        necessary: &[AspectId],
        optional: &[AspectId],
        extra_filter: Option<Filter>,
        include_large_text: bool,
        only_online: bool,
    ) -> Result<Vec<MediaItem>> {
        let text_filter = {
            let compiler = QueryCompiler::new(&self.inner.aspects);
            compiler.text_search_filter(term, &[], include_large_text)?
        };
        let filter = match extra_filter {
            Some(extra) => Filter::and([text_filter, extra]),
            None => text_filter,
        };
        let query = MediaQuery::new(necessary.to_vec(), optional.to_vec(), Some(filter));
        self.inner.search(&query, only_online)
    }

    /// Bucket one attribute's value distribution under `filter` with the
    /// given grouping function.
    pub fn group_values(
        &self,
        attr: &AttributeRef,
        filter: Option<&Filter>,
        grouping: &impl GroupingFunction,
    ) -> Result<Vec<MediaItemGroup>> {
        let conn = self.inner.conn.lock().unwrap();
        let distribution = QueryCompiler::new(&self.inner.aspects)
            .execute_value_distribution(&conn, attr, filter)?;
        let pairs: Vec<(Option<String>, i64)> = distribution
            .into_iter()
            .map(|(value, count)| (value.as_ref().and_then(group_text), count))
            .collect();
        Ok(grouping.accumulate(pairs.iter().map(|(value, count)| (value.as_deref(), *count))))
    }

    /// Items directly under `path`, excluding deeper descendants.
    pub fn browse(
        &self,
        system_id: &str,
        path: &ResourcePath,
        necessary: &[AspectId],
        optional: &[AspectId],
    ) -> Result<Vec<MediaItem>> {
        self.inner.browse(system_id, path, necessary, optional)
    }

    pub fn item_by_path(
        &self,
        system_id: &str,
        path: &ResourcePath,
        necessary: &[AspectId],
        optional: &[AspectId],
    ) -> Result<Option<MediaItem>> {
        let provider = ProviderResourceAspect::ASPECT_ID;
        let filter = Filter::and([
            Filter::eq(
                AttributeRef::new(provider, ProviderResourceAspect::ATTR_SYSTEM_ID),
                system_id,
            ),
            Filter::eq(
                AttributeRef::new(provider, ProviderResourceAspect::ATTR_PATH),
                path.serialize().as_str(),
            ),
        ]);
        let query = MediaQuery::new(necessary.to_vec(), optional.to_vec(), Some(filter));
        Ok(self.inner.search(&query, false)?.into_iter().next())
    }

    // =========================================================================
    // Shares
    // =========================================================================

    /// Register a new share. At most one share may exist per
    /// (system id, base path) pair. Local shares get an initial recursive
    /// import scheduled.
    pub fn register_share(&self, share: Share) -> Result<()> {
        self.inner.with_transaction("register_share", |tx| {
            if shares::share_exists_for(tx, &share.system_id, &share.base_path)? {
                return Err(LibraryError::ShareConflict {
                    system_id: share.system_id.clone(),
                    path: share.base_path.serialize(),
                });
            }
            shares::insert_share(tx, &share)
        })?;
        info!(share = %share.id, path = %share.base_path, "share registered");
        if share.system_id == self.inner.local_system_id {
            let categories: Vec<String> = share.categories.iter().cloned().collect();
            self.inner
                .importer
                .schedule_import(&share.base_path, &categories, true);
        }
        Ok(())
    }

    /// Reconfigure a share. When the base path changes, `mode` decides
    /// whether the items under the old base are relocated in place or
    /// removed (and, for local shares, re-imported from the new base).
    pub fn update_share(
        &self,
        id: ShareId,
        new_path: ResourcePath,
        new_name: &str,
        new_categories: BTreeSet<String>,
        mode: RelocationMode,
    ) -> Result<()> {
        let prior = self.inner.with_transaction("update_share", |tx| {
            let prior = shares::read_share(tx, id)?.ok_or(LibraryError::ShareNotFound(id))?;
            shares::update_share_row(tx, &prior, &new_path, new_name, &new_categories)?;
            if prior.base_path != new_path {
                match mode {
                    RelocationMode::Relocate => {
                        let moved = self.inner.relocate_items(
                            tx,
                            &prior.system_id,
                            &prior.base_path,
                            &new_path,
                        )?;
                        info!(share = %id, moved, from = %prior.base_path, to = %new_path, "share relocated");
                    }
                    RelocationMode::Remove => {
                        let removed =
                            self.inner
                                .delete_under(tx, &prior.system_id, Some(&prior.base_path))?;
                        info!(share = %id, removed, from = %prior.base_path, "share contents removed");
                    }
                }
            }
            Ok(prior)
        })?;
        if mode == RelocationMode::Remove
            && prior.base_path != new_path
            && prior.system_id == self.inner.local_system_id
        {
            let categories: Vec<String> = new_categories.iter().cloned().collect();
            self.inner.importer.schedule_import(&new_path, &categories, true);
        }
        Ok(())
    }

    /// Remove a share and everything imported under it. Pending import jobs
    /// for the share's subtree are cancelled first, so late results cannot
    /// resurrect deleted items. Returns `false` when no such share exists.
    pub fn remove_share(&self, id: ShareId) -> Result<bool> {
        let share = {
            let conn = self.inner.conn.lock().unwrap();
            shares::read_share(&conn, id)?
        };
        let Some(share) = share else {
            return Ok(false);
        };
        if share.system_id == self.inner.local_system_id {
            self.inner.importer.cancel_jobs_for_path(&share.base_path);
        }
        self.inner.with_transaction("remove_share", |tx| {
            shares::delete_share_row(tx, id)?;
            self.inner
                .delete_under(tx, &share.system_id, Some(&share.base_path))?;
            Ok(())
        })?;
        info!(share = %id, path = %share.base_path, "share removed");
        Ok(true)
    }

    pub fn share(&self, id: ShareId) -> Result<Option<Share>> {
        let conn = self.inner.conn.lock().unwrap();
        shares::read_share(&conn, id)
    }

    pub fn shares_for_system(&self, system_id: &str) -> Result<Vec<Share>> {
        let conn = self.inner.conn.lock().unwrap();
        shares::shares_for_system(&conn, system_id)
    }

    pub fn shares(&self) -> Result<Vec<Share>> {
        let conn = self.inner.conn.lock().unwrap();
        shares::all_shares(&conn)
    }

    // =========================================================================
    // Playlists
    // =========================================================================

    pub fn save_playlist(&self, playlist: &Playlist) -> Result<()> {
        self.inner
            .with_transaction("save_playlist", |tx| playlists::save_playlist(tx, playlist))
    }

    pub fn playlist(&self, id: PlaylistId) -> Result<Option<Playlist>> {
        let conn = self.inner.conn.lock().unwrap();
        playlists::load_playlist(&conn, id)
    }

    pub fn delete_playlist(&self, id: PlaylistId) -> Result<bool> {
        self.inner
            .with_transaction("delete_playlist", |tx| playlists::delete_playlist(tx, id))
    }

    pub fn playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let conn = self.inner.conn.lock().unwrap();
        playlists::list_playlists(&conn)
    }

    /// Materialize a playlist's members in stored order. Members whose item
    /// no longer exists (or lacks a `necessary` aspect) are silently
    /// omitted.
    pub fn playlist_items(
        &self,
        id: PlaylistId,
        necessary: &[AspectId],
        optional: &[AspectId],
    ) -> Result<Option<Vec<MediaItem>>> {
        let playlist = {
            let conn = self.inner.conn.lock().unwrap();
            playlists::load_playlist(&conn, id)?
        };
        let Some(playlist) = playlist else {
            return Ok(None);
        };
        if playlist.item_ids.is_empty() {
            return Ok(Some(Vec::new()));
        }
        let query = MediaQuery::new(
            necessary.to_vec(),
            optional.to_vec(),
            Some(Filter::IdIn(playlist.item_ids.clone())),
        );
        let items = self.inner.search(&query, false)?;
        let mut by_id: HashMap<MediaItemId, MediaItem> =
            items.into_iter().map(|item| (item.id, item)).collect();
        Ok(Some(
            playlist
                .item_ids
                .iter()
                .filter_map(|item_id| by_id.remove(item_id))
                .collect(),
        ))
    }

    // =========================================================================
    // Online systems
    // =========================================================================

    pub fn notify_system_online(&self, system_id: &str, name: &str) {
        self.inner.online.set_online(system_id, name);
    }

    pub fn notify_system_offline(&self, system_id: &str) {
        self.inner.online.set_offline(system_id);
    }

    pub fn online_systems(&self) -> HashMap<String, String> {
        self.inner.online.online_systems()
    }

    pub fn local_system_id(&self) -> &str {
        &self.inner.local_system_id
    }
}

impl LibraryInner {
    /// Run one mutation inside a transaction. Commit on success; on error
    /// the dropped transaction rolls back and the failure is logged once,
    /// here.
    fn with_transaction<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&Transaction) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                error!(operation, error = %e, "library mutation rolled back");
                Err(e)
            }
        }
    }

    fn search(&self, query: &MediaQuery, only_online: bool) -> Result<Vec<MediaItem>> {
        let conn = self.conn.lock().unwrap();
        let compiler = QueryCompiler::new(&self.aspects);
        if !only_online {
            return compiler.execute(&conn, query);
        }
        // The online check needs each item's owning system, so the provider
        // aspect is requested for the duration of the query and detached
        // again when the caller did not ask for it.
        let provider = ProviderResourceAspect::ASPECT_ID;
        let provider_requested =
            query.necessary.contains(&provider) || query.optional.contains(&provider);
        let mut widened = query.clone();
        if !provider_requested {
            widened.optional.push(provider);
        }
        let mut items = compiler.execute(&conn, &widened)?;
        items.retain(|item| {
            item.system_id()
                .map_or(false, |system| self.online.is_online(system))
        });
        if !provider_requested {
            for item in &mut items {
                item.detach(provider);
            }
        }
        Ok(items)
    }

    fn browse(
        &self,
        system_id: &str,
        path: &ResourcePath,
        necessary: &[AspectId],
        optional: &[AspectId],
    ) -> Result<Vec<MediaItem>> {
        let provider = ProviderResourceAspect::ASPECT_ID;
        let path_attr = AttributeRef::new(provider, ProviderResourceAspect::ATTR_PATH);
        let prefix = ensure_trailing_separator(&path.serialize());
        let escaped = escape_like(&prefix, LIKE_ESCAPE_CHAR);
        let filter = Filter::and([
            Filter::eq(
                AttributeRef::new(provider, ProviderResourceAspect::ATTR_SYSTEM_ID),
                system_id,
            ),
            Filter::Like {
                attr: path_attr.clone(),
                pattern: format!("{escaped}%"),
                escape: LIKE_ESCAPE_CHAR,
                case_sensitive: true,
            },
            // A second separator after the prefix means a deeper level.
            Filter::not(Filter::Like {
                attr: path_attr,
                pattern: format!("{escaped}%/%"),
                escape: LIKE_ESCAPE_CHAR,
                case_sensitive: true,
            }),
        ]);
        let query = MediaQuery::new(necessary.to_vec(), optional.to_vec(), Some(filter));
        let conn = self.conn.lock().unwrap();
        QueryCompiler::new(&self.aspects).execute(&conn, &query)
    }

    /// Share-coverage gate in front of [`LibraryInner::upsert_item`]; import
    /// results and direct writes both pass through it.
    fn guarded_upsert(
        &self,
        tx: &Transaction,
        system_id: &str,
        path: &ResourcePath,
        aspects: Vec<AspectInstance>,
    ) -> Result<MediaItemId> {
        if !self.covering_share_exists(tx, system_id, path)? {
            return Err(LibraryError::NoShareForPath {
                system_id: system_id.to_string(),
                path: path.serialize(),
            });
        }
        self.upsert_item(tx, system_id, path, aspects)
    }

    fn covering_share_exists(
        &self,
        conn: &Connection,
        system_id: &str,
        path: &ResourcePath,
    ) -> Result<bool> {
        for share in shares::shares_for_system(conn, system_id)? {
            if path == &share.base_path || path.is_under(&share.base_path) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Upsert one item keyed by its (system id, path) identity. New items
    /// get a fresh id plus the provider-resource and importer-state
    /// aspects; existing items only advance `last_seen`. Supplied aspects
    /// without registered storage are skipped with a warning.
    fn upsert_item(
        &self,
        tx: &Transaction,
        system_id: &str,
        path: &ResourcePath,
        aspects: Vec<AspectInstance>,
    ) -> Result<MediaItemId> {
        let now = Utc::now();
        let (item_id, is_new) = match self.lookup_item_id(tx, system_id, path)? {
            Some(id) => (id, false),
            None => {
                let id = MediaItemId::new();
                tx.execute(
                    &format!("INSERT INTO {} (id) VALUES (?1)", CoreTables::MEDIA_ITEMS),
                    params![id.to_string()],
                )?;
                (id, true)
            }
        };

        if is_new {
            self.aspects.add_or_update(
                tx,
                item_id,
                &ProviderResourceAspect::instance(system_id, path),
                true,
            )?;
            self.aspects
                .add_or_update(tx, item_id, &ImporterStateAspect::fresh(now), true)?;
            debug!(item = %item_id, path = %path, "media item created");
        } else {
            let mut state = self
                .aspects
                .get(tx, item_id, ImporterStateAspect::ASPECT_ID)?
                .unwrap_or_else(|| ImporterStateAspect::fresh(now));
            state.insert(
                ImporterStateAspect::ATTR_LAST_SEEN,
                AttributeValue::DateTime(now),
            );
            self.aspects.add_or_update(tx, item_id, &state, false)?;
        }

        for instance in aspects {
            let aspect_id = instance.aspect_id;
            if aspect_id == ProviderResourceAspect::ASPECT_ID
                || aspect_id == ImporterStateAspect::ASPECT_ID
            {
                debug!(item = %item_id, aspect = %aspect_id, "system-managed aspect in payload ignored");
                continue;
            }
            if !self.aspects.storage_exists(aspect_id) {
                warn!(item = %item_id, aspect = %aspect_id, "no storage registered for aspect, skipped");
                continue;
            }
            self.aspects.add_or_update(tx, item_id, &instance, is_new)?;
        }
        Ok(item_id)
    }

    fn lookup_item_id(
        &self,
        conn: &Connection,
        system_id: &str,
        path: &ResourcePath,
    ) -> Result<Option<MediaItemId>> {
        let storage = provider_storage();
        let raw: Option<String> = conn
            .query_row(
                &format!(
                    "SELECT media_item_id FROM {} WHERE {} = ?1 AND {} = ?2",
                    storage.table, storage.system_column, storage.path_column
                ),
                params![system_id, path.serialize()],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|id| MediaItemId::parse(&id)).transpose()
    }

    /// Delete items at/under `path` (or the system's whole item set).
    /// Aspect rows, child rows and playlist membership follow through
    /// foreign-key cascades.
    fn delete_under(
        &self,
        conn: &Connection,
        system_id: &str,
        path: Option<&ResourcePath>,
    ) -> Result<usize> {
        let storage = provider_storage();
        let deleted = match path {
            Some(path) => {
                let exact = path.serialize();
                let pattern = format!(
                    "{}%",
                    escape_like(&ensure_trailing_separator(&exact), LIKE_ESCAPE_CHAR)
                );
                conn.execute(
                    &format!(
                        "DELETE FROM {} WHERE id IN (SELECT media_item_id FROM {} \
                         WHERE {} = ?1 AND ({} = ?2 OR {} LIKE ?3 ESCAPE ?4))",
                        CoreTables::MEDIA_ITEMS,
                        storage.table,
                        storage.system_column,
                        storage.path_column,
                        storage.path_column
                    ),
                    params![system_id, exact, pattern, LIKE_ESCAPE_CHAR.to_string()],
                )?
            }
            None => conn.execute(
                &format!(
                    "DELETE FROM {} WHERE id IN (SELECT media_item_id FROM {} WHERE {} = ?1)",
                    CoreTables::MEDIA_ITEMS,
                    storage.table,
                    storage.system_column
                ),
                params![system_id],
            )?,
        };
        Ok(deleted)
    }

    /// Rewrite stored paths under `old_base` to live under `new_base`.
    /// Item ids and all attached aspects survive.
    fn relocate_items(
        &self,
        conn: &Connection,
        system_id: &str,
        old_base: &ResourcePath,
        new_base: &ResourcePath,
    ) -> Result<usize> {
        let storage = provider_storage();
        let old_prefix = ensure_trailing_separator(&old_base.serialize());
        let new_prefix = ensure_trailing_separator(&new_base.serialize());
        let pattern = format!("{}%", escape_like(&old_prefix, LIKE_ESCAPE_CHAR));

        // Sources whose rewritten path is already occupied would break the
        // unique (system, path) identity; the item already stored at the
        // destination keeps it and the relocating duplicate is dropped.
        let collided = conn.execute(
            &format!(
                "DELETE FROM {items} WHERE id IN (SELECT src.media_item_id FROM {t} src \
                 WHERE src.{sys} = ?1 AND (src.{path} = ?2 OR src.{path} LIKE ?3 ESCAPE ?4) \
                 AND EXISTS (SELECT 1 FROM {t} dst WHERE dst.{sys} = ?1 AND dst.{path} = \
                 CASE WHEN src.{path} = ?2 THEN ?5 \
                 ELSE ?6 || SUBSTR(src.{path}, LENGTH(?7) + 1) END))",
                items = CoreTables::MEDIA_ITEMS,
                t = storage.table,
                sys = storage.system_column,
                path = storage.path_column
            ),
            params![
                system_id,
                old_base.serialize(),
                pattern,
                LIKE_ESCAPE_CHAR.to_string(),
                new_base.serialize(),
                new_prefix,
                old_prefix
            ],
        )?;
        if collided > 0 {
            warn!(
                collided,
                from = %old_base,
                to = %new_base,
                "relocation collisions resolved in favor of existing items"
            );
        }

        let mut moved = conn.execute(
            &format!(
                "UPDATE {} SET {} = ?1 WHERE {} = ?2 AND {} = ?3",
                storage.table, storage.path_column, storage.system_column, storage.path_column
            ),
            params![new_base.serialize(), system_id, old_base.serialize()],
        )?;
        moved += conn.execute(
            &format!(
                "UPDATE {} SET {} = ?1 || SUBSTR({}, LENGTH(?2) + 1) \
                 WHERE {} = ?3 AND {} LIKE ?4 ESCAPE ?5",
                storage.table,
                storage.path_column,
                storage.path_column,
                storage.system_column,
                storage.path_column
            ),
            params![
                new_prefix,
                old_prefix,
                system_id,
                pattern,
                LIKE_ESCAPE_CHAR.to_string()
            ],
        )?;
        Ok(moved)
    }
}

fn group_text(value: &AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Text(s) => Some(s.clone()),
        AttributeValue::Integer(i) => Some(i.to_string()),
        AttributeValue::Real(r) => Some(r.to_string()),
        AttributeValue::Bool(b) => Some(b.to_string()),
        AttributeValue::DateTime(dt) => Some(dt.to_rfc3339()),
        AttributeValue::Id(id) => Some(id.to_string()),
        AttributeValue::Binary(_) => None,
    }
}

struct BrowseCallback {
    inner: Arc<LibraryInner>,
}

impl MediaBrowsing for BrowseCallback {
    fn browse(
        &self,
        system_id: &str,
        path: &ResourcePath,
        necessary: &[AspectId],
        optional: &[AspectId],
    ) -> Result<Vec<MediaItem>> {
        self.inner.browse(system_id, path, necessary, optional)
    }
}

struct ImportCallback {
    inner: Arc<LibraryInner>,
}

impl ImportResultHandler for ImportCallback {
    fn update_item(
        &self,
        system_id: &str,
        path: &ResourcePath,
        aspects: Vec<AspectInstance>,
    ) -> Result<MediaItemId> {
        self.inner.with_transaction("import_update_item", |tx| {
            self.inner.guarded_upsert(tx, system_id, path, aspects)
        })
    }

    fn delete_item(&self, system_id: &str, path: &ResourcePath) -> Result<()> {
        self.inner.with_transaction("import_delete_item", |tx| {
            self.inner.delete_under(tx, system_id, Some(path))?;
            Ok(())
        })
    }
}
