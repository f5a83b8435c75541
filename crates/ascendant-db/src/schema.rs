//! Versioned table definitions and the migration engine
//!
//! Each managed table carries a current code version, creation DDL, and
//! per-version migration steps. `ensure_schema` walks every table: missing
//! tables are created at the current version; existing tables are migrated
//! version-by-version (never version-skipping), recording each step in
//! `schema_version_history` before the next one runs. The run completes only
//! once every managed table is `Ready`.
//!
//! A failed creation or migration leaves the table's gate closed and is never
//! retried automatically; queries against that table keep failing with
//! `SchemaNotReady` until an operator intervenes.

use crate::error::{Error, Result};
use crate::gate::{SchemaGates, TableState};
use rusqlite::{Connection, OptionalExtension};
use tracing::{error, info, warn};

/// Per-player skill levels and experience
pub const SKILL_DATA_TABLE: &str = "skill_data";
/// Presence row means "this ability is toggled off"
pub const ABILITY_TOGGLED_OFF_TABLE: &str = "ability_toggled_off";
/// Typed per-ability attribute rows
pub const ABILITY_ATTRIBUTES_TABLE: &str = "ability_attributes";
/// One version row per managed table
pub const SCHEMA_VERSION_TABLE: &str = "schema_version_history";

/// A single migration step bringing a table to `version`
///
/// Steps for version 1 never exist: version 0 -> 1 only adopts an existing
/// table into version tracking.
pub type MigrationStep = fn(&Connection, i64) -> Result<()>;

/// Definition of one managed table
pub struct TableDef {
    /// Table name; also the version-history key
    pub name: &'static str,
    /// The schema version this code expects
    pub current_version: i64,
    /// DDL executed when the table does not exist
    pub create_sql: &'static str,
    /// Structural transform for versions >= 2, if any
    pub migrate: Option<MigrationStep>,
}

/// The set of managed tables and the engine that converges them
pub struct SchemaRegistry {
    tables: Vec<TableDef>,
}

impl SchemaRegistry {
    /// The four managed tables of the progression schema
    pub fn managed() -> Self {
        Self {
            tables: vec![
                TableDef {
                    name: SCHEMA_VERSION_TABLE,
                    current_version: 1,
                    create_sql: "CREATE TABLE schema_version_history (\
                         table_name TEXT NOT NULL,\
                         version INTEGER NOT NULL DEFAULT 0,\
                         PRIMARY KEY (table_name)\
                         );",
                    migrate: None,
                },
                TableDef {
                    name: SKILL_DATA_TABLE,
                    current_version: 1,
                    create_sql: "CREATE TABLE skill_data (\
                         player_id TEXT NOT NULL,\
                         skill_kind TEXT NOT NULL,\
                         current_level INTEGER NOT NULL DEFAULT 0,\
                         current_exp INTEGER NOT NULL DEFAULT 0,\
                         PRIMARY KEY (player_id, skill_kind)\
                         );",
                    migrate: None,
                },
                TableDef {
                    name: ABILITY_TOGGLED_OFF_TABLE,
                    current_version: 1,
                    create_sql: "CREATE TABLE ability_toggled_off (\
                         player_id TEXT NOT NULL,\
                         ability_id TEXT NOT NULL,\
                         PRIMARY KEY (player_id, ability_id)\
                         );",
                    migrate: None,
                },
                TableDef {
                    name: ABILITY_ATTRIBUTES_TABLE,
                    current_version: 1,
                    create_sql: "CREATE TABLE ability_attributes (\
                         player_id TEXT NOT NULL,\
                         ability_id TEXT NOT NULL,\
                         key TEXT NOT NULL,\
                         value TEXT NOT NULL,\
                         PRIMARY KEY (player_id, ability_id, key)\
                         );",
                    migrate: None,
                },
            ],
        }
    }

    /// Build a registry from explicit table definitions
    pub fn with_tables(tables: Vec<TableDef>) -> Self {
        Self { tables }
    }

    /// Names of every managed table, in ensure order
    pub fn table_names(&self) -> Vec<&'static str> {
        self.tables.iter().map(|t| t.name).collect()
    }

    /// Converge every managed table to its current version
    ///
    /// Idempotent: re-running against an already-`Ready` schema at the
    /// current version executes no DDL. Returns only once all tables are
    /// `Ready`, or the first failure (whose gate stays closed).
    pub fn ensure_schema(&self, conn: &Connection, gates: &SchemaGates) -> Result<()> {
        for table in &self.tables {
            self.ensure_table(conn, gates, table)?;
        }
        Ok(())
    }

    fn ensure_table(&self, conn: &Connection, gates: &SchemaGates, table: &TableDef) -> Result<()> {
        let gate = gates.gate(table.name);

        if !table_exists(conn, table.name)? {
            if !gate.try_begin_create() {
                return Err(Error::SchemaNotReady {
                    table: table.name,
                    state: gate.state().as_str(),
                });
            }
            info!(table = table.name, version = table.current_version, "creating table");
            conn.execute_batch(table.create_sql).map_err(|e| {
                error!(table = table.name, %e, "table creation failed");
                Error::MigrationFailed {
                    table: table.name,
                    version: table.current_version,
                    message: e.to_string(),
                }
            })?;
            set_table_version(conn, table.name, table.current_version)?;
            gate.mark_ready();
            return Ok(());
        }

        let stored = latest_version(conn, table.name)?;
        if gate.state() == TableState::Uninitialized {
            // Existing table seen for the first time this boot
            gate.mark_ready();
        }

        if stored == table.current_version {
            // Already current; no DDL, no version write
            return Ok(());
        }
        if stored > table.current_version {
            warn!(
                table = table.name,
                stored,
                current = table.current_version,
                "stored schema version is newer than this code"
            );
            return Ok(());
        }

        if !gate.try_begin_migrate() {
            return Err(Error::SchemaNotReady {
                table: table.name,
                state: gate.state().as_str(),
            });
        }
        for version in (stored + 1)..=table.current_version {
            if version > 1 {
                let step = table.migrate.ok_or(Error::MigrationFailed {
                    table: table.name,
                    version,
                    message: "no migration step defined".to_string(),
                })?;
                step(conn, version).map_err(|e| {
                    error!(table = table.name, version, %e, "migration step failed");
                    Error::MigrationFailed {
                        table: table.name,
                        version,
                        message: e.to_string(),
                    }
                })?;
            }
            // Version 1 from 0 only adopts the table into tracking
            set_table_version(conn, table.name, version)?;
            info!(table = table.name, version, "migrated table");
        }
        gate.mark_ready();
        Ok(())
    }
}

/// Check whether a table exists in the live database
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1;",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// The stored version for a table; 0 if it has no version row yet
pub fn latest_version(conn: &Connection, name: &str) -> Result<i64> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT version FROM schema_version_history WHERE table_name = ?1;",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.unwrap_or(0))
}

fn set_table_version(conn: &Connection, name: &str, version: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version_history (table_name, version) VALUES (?1, ?2) \
         ON CONFLICT (table_name) DO UPDATE SET version = excluded.version;",
        rusqlite::params![name, version],
    )?;
    Ok(())
}
