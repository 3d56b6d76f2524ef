//! Declarative SQLite schema machinery.
//!
//! Tables are described as data (`Table`/`Column` constants) so that DDL,
//! startup validation and versioned migration are all driven from one
//! source of truth. `PRAGMA user_version` carries the installed schema
//! version offset by [`BASE_DB_VERSION`] to distinguish databases managed
//! by this crate from unversioned files.

mod core_tables;

pub use core_tables::{CoreTables, CORE_VERSIONED_SCHEMAS};

use crate::error::{LibraryError, Result};
use anyhow::bail;
use rusqlite::Connection;
use tracing::info;

pub const BASE_DB_VERSION: i64 = 73000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }

    fn from_decl(decl: &str) -> Option<SqlType> {
        match decl {
            "TEXT" => Some(SqlType::Text),
            "INTEGER" => Some(SqlType::Integer),
            "REAL" => Some(SqlType::Real),
            "BLOB" => Some(SqlType::Blob),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub not_null: bool,
    pub default_value: Option<&'static str>,
    /// Always emitted with ON DELETE CASCADE; child collections in this
    /// schema have no other lifecycle than their parent's.
    pub cascade_from: Option<ForeignKey>,
}

impl Column {
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Column {
            name,
            sql_type,
            primary_key: false,
            not_null: false,
            default_value: None,
            cascade_from: None,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub const fn default_value(mut self, value: &'static str) -> Self {
        self.default_value = Some(value);
        self
    }

    pub const fn cascade_from(mut self, table: &'static str, column: &'static str) -> Self {
        self.cascade_from = Some(ForeignKey { table, column });
        self
    }

    fn ddl(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type.as_sql());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(fk) = self.cascade_from {
            sql.push_str(&format!(
                " REFERENCES {}({}) ON DELETE CASCADE",
                fk.table, fk.column
            ));
        }
        sql
    }
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// (index name, indexed column) pairs.
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let mut parts: Vec<String> = self.columns.iter().map(Column::ddl).collect();
        for unique in self.unique_constraints {
            parts.push(format!("UNIQUE ({})", unique.join(", ")));
        }
        conn.execute(
            &format!("CREATE TABLE {} ({})", self.name, parts.join(", ")),
            [],
        )?;
        for (index_name, column) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({})", index_name, self.name, column),
                [],
            )?;
        }
        Ok(())
    }

    /// Check the live database against this declaration: column shape,
    /// declared indices and unique constraints.
    pub fn validate(&self, conn: &Connection) -> anyhow::Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", self.name))?;
        let actual: Vec<(String, String, bool, bool)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)? == 1,
                    row.get::<_, i32>(5)? == 1,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        if actual.len() != self.columns.len() {
            bail!(
                "table {}: expected {} columns, found {} ({})",
                self.name,
                self.columns.len(),
                actual.len(),
                actual
                    .iter()
                    .map(|(name, ..)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        for (expected, (name, decl, not_null, primary_key)) in
            self.columns.iter().zip(actual.iter())
        {
            if expected.name != name {
                bail!(
                    "table {}: column name mismatch, expected {}, found {}",
                    self.name,
                    expected.name,
                    name
                );
            }
            if SqlType::from_decl(decl) != Some(expected.sql_type) {
                bail!(
                    "table {}: column {} type mismatch, expected {:?}, found {}",
                    self.name,
                    name,
                    expected.sql_type,
                    decl
                );
            }
            if *not_null != expected.not_null {
                bail!(
                    "table {}: column {} NOT NULL mismatch",
                    self.name,
                    name
                );
            }
            if *primary_key != expected.primary_key {
                bail!(
                    "table {}: column {} PRIMARY KEY mismatch",
                    self.name,
                    name
                );
            }
        }

        for (index_name, _) in self.indices {
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1 AND tbl_name = ?2",
                    rusqlite::params![index_name, self.name],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !exists {
                bail!("table {}: missing index {}", self.name, index_name);
            }
        }

        if !self.unique_constraints.is_empty() {
            let unique_column_sets = unique_index_column_sets(conn, self.name)?;
            for expected in self.unique_constraints {
                let mut expected_sorted: Vec<&str> = expected.to_vec();
                expected_sorted.sort_unstable();
                let found = unique_column_sets.iter().any(|cols| {
                    cols.iter().map(String::as_str).collect::<Vec<_>>() == expected_sorted
                });
                if !found {
                    bail!(
                        "table {}: missing unique constraint on ({})",
                        self.name,
                        expected.join(", ")
                    );
                }
            }
        }
        Ok(())
    }
}

fn unique_index_column_sets(conn: &Connection, table: &str) -> anyhow::Result<Vec<Vec<String>>> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", table))?;
    let unique_indices: Vec<String> = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(1)?, row.get::<_, i32>(2)?))
        })?
        .filter_map(|r| r.ok())
        .filter(|(_, is_unique)| *is_unique == 1)
        .map(|(name, _)| name)
        .collect();

    let mut sets = Vec::with_capacity(unique_indices.len());
    for index in &unique_indices {
        let mut stmt = conn.prepare(&format!("PRAGMA index_info({})", index))?;
        let mut columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(2))?
            .filter_map(|r| r.ok())
            .collect();
        columns.sort_unstable();
        sets.push(columns);
    }
    Ok(sets)
}

pub struct VersionedSchema {
    pub version: i64,
    pub tables: &'static [Table],
    /// Brings a database at `version - 1` up to `version`.
    pub migration: Option<fn(&Connection) -> anyhow::Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.create(conn)?;
        }
        conn.pragma_update(None, "user_version", BASE_DB_VERSION + self.version)?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> anyhow::Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

/// Create or migrate the database to the newest schema in `schemas`.
///
/// A brand new database gets the latest schema directly. An existing one is
/// walked through the migration chain inside a single transaction. A
/// version newer than this build understands is a hard startup failure.
pub fn migrate_to_latest(conn: &mut Connection, schemas: &[VersionedSchema]) -> Result<()> {
    let latest = &schemas[schemas.len() - 1];

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);
    if table_count == 0 {
        info!(version = latest.version, "creating library schema");
        return latest.create(conn);
    }

    let user_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    let expected = BASE_DB_VERSION + latest.version;
    if user_version == expected {
        return Ok(());
    }
    if user_version < BASE_DB_VERSION || user_version > expected {
        return Err(LibraryError::SchemaVersion {
            found: user_version,
            expected,
        });
    }

    let mut current = user_version - BASE_DB_VERSION;
    let tx = conn.transaction()?;
    for schema in schemas {
        if schema.version <= current {
            continue;
        }
        match schema.migration {
            Some(migration) => {
                info!(from = current, to = schema.version, "migrating library schema");
                migration(&tx)?;
                current = schema.version;
            }
            None => {
                return Err(LibraryError::SchemaVersion {
                    found: user_version,
                    expected,
                })
            }
        }
    }
    tx.pragma_update(None, "user_version", BASE_DB_VERSION + current)?;
    tx.commit()?;
    Ok(())
}
