//! Schema-on-write storage for media item aspects.
//!
//! Each managed aspect type gets a dedicated main table (one column per
//! single-value attribute, keyed by item id) plus one child table per
//! multi-value attribute. The manager is the single owner of the naming
//! rules; the query compiler asks it for table and column names instead of
//! re-deriving them.
//!
//! All storage operations take a `&Connection` so callers can pass their
//! open `rusqlite::Transaction` (which derefs to `Connection`) and keep the
//! whole façade operation atomic.

use crate::aspect::{AspectId, AspectInstance, AspectMetadata, AttributeSpec, AttributeType};
use crate::error::{LibraryError, Result};
use crate::library::MediaItemId;
use crate::sqlite_schema::CoreTables;
use anyhow::anyhow;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};

pub struct AspectStorageManager {
    // Read-mostly after startup; storage add/remove is administrative and
    // serialized by the caller.
    registry: Mutex<HashMap<AspectId, AspectMetadata>>,
}

impl AspectStorageManager {
    pub fn new() -> Self {
        AspectStorageManager {
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Rebuild the in-memory registry from the persisted `aspect_types`
    /// rows. Called once at service startup.
    pub fn load_registered(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!(
            "SELECT definition FROM {}",
            CoreTables::ASPECT_TYPES
        ))?;
        let definitions: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;

        let mut registry = self.registry.lock().unwrap();
        for definition in definitions {
            let metadata: AspectMetadata = serde_json::from_str(&definition)
                .map_err(|e| anyhow!("corrupt aspect definition in registry: {e}"))?;
            registry.insert(metadata.id, metadata);
        }
        debug!(aspects = registry.len(), "aspect registry loaded");
        Ok(())
    }

    // =========================================================================
    // Registry access
    // =========================================================================

    pub fn storage_exists(&self, aspect_id: AspectId) -> bool {
        self.registry.lock().unwrap().contains_key(&aspect_id)
    }

    pub fn managed_aspects(&self) -> Vec<AspectMetadata> {
        self.registry.lock().unwrap().values().cloned().collect()
    }

    pub fn metadata(&self, aspect_id: AspectId) -> Result<AspectMetadata> {
        self.registry
            .lock()
            .unwrap()
            .get(&aspect_id)
            .cloned()
            .ok_or(LibraryError::UnknownAspect(aspect_id))
    }

    // =========================================================================
    // Name derivation (pure functions of the descriptor)
    // =========================================================================

    /// Main table name for an aspect: sanitized name plus the first eight
    /// hex digits of the aspect id, so renamed or same-named aspects never
    /// collide.
    pub fn table_name(metadata: &AspectMetadata) -> String {
        let id_hex = metadata.id.0.simple().to_string();
        format!("mia_{}_{}", sanitize_identifier(&metadata.name), &id_hex[..8])
    }

    pub fn column_name(spec: &AttributeSpec) -> String {
        format!("a_{}", sanitize_identifier(&spec.name))
    }

    /// Child table holding the rows of one multi-value attribute.
    pub fn child_table_name(metadata: &AspectMetadata, spec: &AttributeSpec) -> String {
        format!(
            "{}__{}",
            Self::table_name(metadata),
            sanitize_identifier(&spec.name)
        )
    }

    pub fn is_large_text(spec: &AttributeSpec) -> bool {
        spec.value_type.is_large_text()
    }

    // =========================================================================
    // Storage lifecycle
    // =========================================================================

    /// Provision the backing tables for an aspect type and record it in the
    /// persisted registry. Re-adding an already-managed aspect with an
    /// identical definition is a no-op; a conflicting definition is an
    /// error. Existing data is never dropped here.
    pub fn add_storage(&self, conn: &Connection, metadata: AspectMetadata) -> Result<()> {
        {
            let registry = self.registry.lock().unwrap();
            if let Some(existing) = registry.get(&metadata.id) {
                if *existing == metadata {
                    return Ok(());
                }
                return Err(LibraryError::Other(anyhow!(
                    "aspect {} already registered with a different definition",
                    metadata.id
                )));
            }
        }

        let table = Self::table_name(&metadata);
        let mut columns = vec![format!(
            "media_item_id TEXT NOT NULL PRIMARY KEY REFERENCES {}(id) ON DELETE CASCADE",
            CoreTables::MEDIA_ITEMS
        )];
        for spec in metadata.single_value_attributes() {
            columns.push(format!(
                "{} {}",
                Self::column_name(spec),
                sql_type_of(&spec.value_type)
            ));
        }
        conn.execute(
            &format!("CREATE TABLE {} ({})", table, columns.join(", ")),
            [],
        )?;

        for spec in metadata.multi_value_attributes() {
            let child = Self::child_table_name(&metadata, spec);
            conn.execute(
                &format!(
                    "CREATE TABLE {} (media_item_id TEXT NOT NULL REFERENCES {}(id) \
                     ON DELETE CASCADE, value {} NOT NULL)",
                    child,
                    CoreTables::MEDIA_ITEMS,
                    sql_type_of(&spec.value_type)
                ),
                [],
            )?;
            conn.execute(
                &format!("CREATE INDEX idx_{child}_item ON {child}(media_item_id)"),
                [],
            )?;
        }

        let definition = serde_json::to_string(&metadata)
            .map_err(|e| anyhow!("failed to serialize aspect definition: {e}"))?;
        conn.execute(
            &format!(
                "INSERT INTO {} (id, name, definition) VALUES (?1, ?2, ?3)",
                CoreTables::ASPECT_TYPES
            ),
            params![metadata.id.0.to_string(), metadata.name, definition],
        )?;

        info!(aspect = %metadata.id, name = %metadata.name, table = %table, "aspect storage provisioned");
        self.registry.lock().unwrap().insert(metadata.id, metadata);
        Ok(())
    }

    /// Drop an aspect's tables, its registry row and its in-memory entry.
    pub fn remove_storage(&self, conn: &Connection, aspect_id: AspectId) -> Result<()> {
        let metadata = self.metadata(aspect_id)?;

        for spec in metadata.multi_value_attributes() {
            conn.execute(
                &format!("DROP TABLE {}", Self::child_table_name(&metadata, spec)),
                [],
            )?;
        }
        conn.execute(&format!("DROP TABLE {}", Self::table_name(&metadata)), [])?;
        conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", CoreTables::ASPECT_TYPES),
            params![aspect_id.0.to_string()],
        )?;

        info!(aspect = %aspect_id, name = %metadata.name, "aspect storage dropped");
        self.registry.lock().unwrap().remove(&aspect_id);
        Ok(())
    }

    // =========================================================================
    // Per-item aspect data
    // =========================================================================

    /// Write all attribute values of one aspect instance for one item.
    /// Single-value attributes upsert the aspect's row (plain INSERT when
    /// `is_new_item`); multi-value attributes replace the full child-row
    /// set, so re-importing identical data never duplicates rows.
    pub fn add_or_update(
        &self,
        conn: &Connection,
        item_id: MediaItemId,
        instance: &AspectInstance,
        is_new_item: bool,
    ) -> Result<()> {
        let metadata = self.metadata(instance.aspect_id)?;
        validate_instance(&metadata, instance)?;

        let table = Self::table_name(&metadata);
        let item_key = item_id.to_string();

        let single_specs: Vec<&AttributeSpec> = metadata.single_value_attributes().collect();
        let mut column_names = vec!["media_item_id".to_string()];
        let mut bindings: Vec<SqlValue> = vec![SqlValue::Text(item_key.clone())];
        for spec in &single_specs {
            column_names.push(Self::column_name(spec));
            bindings.push(
                instance
                    .get(&spec.name)
                    .map(|v| v.to_sql_value())
                    .unwrap_or(SqlValue::Null),
            );
        }
        let placeholders: Vec<String> = (1..=column_names.len()).map(|i| format!("?{i}")).collect();

        if is_new_item {
            conn.execute(
                &format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table,
                    column_names.join(", "),
                    placeholders.join(", ")
                ),
                params_from_iter(bindings),
            )?;
        } else {
            let conflict_action = if single_specs.is_empty() {
                "DO NOTHING".to_string()
            } else {
                let assignments: Vec<String> = single_specs
                    .iter()
                    .map(|spec| {
                        let col = Self::column_name(spec);
                        format!("{col} = excluded.{col}")
                    })
                    .collect();
                format!("DO UPDATE SET {}", assignments.join(", "))
            };
            conn.execute(
                &format!(
                    "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(media_item_id) {}",
                    table,
                    column_names.join(", "),
                    placeholders.join(", "),
                    conflict_action
                ),
                params_from_iter(bindings),
            )?;
        }

        for spec in metadata.multi_value_attributes() {
            let child = Self::child_table_name(&metadata, spec);
            conn.execute(
                &format!("DELETE FROM {child} WHERE media_item_id = ?1"),
                params![item_key],
            )?;
            if let Some(values) = instance.get_multi(&spec.name) {
                let mut stmt = conn.prepare(&format!(
                    "INSERT INTO {child} (media_item_id, value) VALUES (?1, ?2)"
                ))?;
                for value in values {
                    stmt.execute(params![item_key, value.to_sql_value()])?;
                }
            }
        }
        Ok(())
    }

    /// Read one aspect instance for one item; `None` when the aspect is not
    /// attached.
    pub fn get(
        &self,
        conn: &Connection,
        item_id: MediaItemId,
        aspect_id: AspectId,
    ) -> Result<Option<AspectInstance>> {
        let metadata = self.metadata(aspect_id)?;
        let table = Self::table_name(&metadata);
        let item_key = item_id.to_string();

        let single_specs: Vec<&AttributeSpec> = metadata.single_value_attributes().collect();
        let column_list = if single_specs.is_empty() {
            "media_item_id".to_string()
        } else {
            single_specs
                .iter()
                .map(|spec| Self::column_name(spec))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let row: Option<Vec<SqlValue>> = conn
            .query_row(
                &format!("SELECT {column_list} FROM {table} WHERE media_item_id = ?1"),
                params![item_key],
                |row| {
                    (0..single_specs.len())
                        .map(|i| row.get::<_, SqlValue>(i))
                        .collect()
                },
            )
            .optional()?;

        let Some(stored) = row else {
            return Ok(None);
        };

        let mut instance = AspectInstance::new(aspect_id);
        for (spec, value) in single_specs.iter().zip(stored) {
            if let Some(decoded) = crate::aspect::AttributeValue::from_sql_value(value, &spec.value_type)? {
                instance.insert(spec.name.clone(), decoded);
            }
        }

        for spec in metadata.multi_value_attributes() {
            let child = Self::child_table_name(&metadata, spec);
            let mut stmt = conn.prepare(&format!(
                "SELECT value FROM {child} WHERE media_item_id = ?1 ORDER BY rowid"
            ))?;
            let values: Vec<crate::aspect::AttributeValue> = stmt
                .query_map(params![item_key], |row| row.get::<_, SqlValue>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
                .into_iter()
                .filter_map(|v| {
                    crate::aspect::AttributeValue::from_sql_value(v, &spec.value_type).transpose()
                })
                .collect::<std::result::Result<_, _>>()?;
            if !values.is_empty() {
                instance.insert_multi(spec.name.clone(), values);
            }
        }
        Ok(Some(instance))
    }

    /// Detach one aspect from one item.
    pub fn delete(
        &self,
        conn: &Connection,
        item_id: MediaItemId,
        aspect_id: AspectId,
    ) -> Result<()> {
        let metadata = self.metadata(aspect_id)?;
        let item_key = item_id.to_string();
        for spec in metadata.multi_value_attributes() {
            conn.execute(
                &format!(
                    "DELETE FROM {} WHERE media_item_id = ?1",
                    Self::child_table_name(&metadata, spec)
                ),
                params![item_key],
            )?;
        }
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE media_item_id = ?1",
                Self::table_name(&metadata)
            ),
            params![item_key],
        )?;
        Ok(())
    }
}

impl Default for AspectStorageManager {
    fn default() -> Self {
        AspectStorageManager::new()
    }
}

fn validate_instance(metadata: &AspectMetadata, instance: &AspectInstance) -> Result<()> {
    for (name, _) in instance.single_values() {
        match metadata.attribute(name) {
            Some(spec) if spec.is_single() => {}
            _ => {
                return Err(LibraryError::UnknownAttribute {
                    aspect: metadata.id,
                    attribute: name.clone(),
                })
            }
        }
    }
    for (name, _) in instance.multi_values() {
        match metadata.attribute(name) {
            Some(spec) if !spec.is_single() => {}
            _ => {
                return Err(LibraryError::UnknownAttribute {
                    aspect: metadata.id,
                    attribute: name.clone(),
                })
            }
        }
    }
    Ok(())
}

fn sql_type_of(value_type: &AttributeType) -> &'static str {
    match value_type {
        AttributeType::Text { .. } | AttributeType::DateTime | AttributeType::Id => "TEXT",
        AttributeType::Integer | AttributeType::Bool => "INTEGER",
        AttributeType::Real => "REAL",
        AttributeType::Binary => "BLOB",
    }
}

/// Lowercase, alphanumerics kept, everything else folded to `_`, leading
/// digit prefixed. Collision safety across aspects comes from the id suffix
/// in the table name, not from this function.
fn sanitize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.extend(c.to_lowercase());
        } else {
            out.push('_');
        }
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
