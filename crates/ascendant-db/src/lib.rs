//! Ascendant DB - Versioned relational persistence for the progression core
//!
//! Provides durable storage for:
//! - Per-player skill levels and experience (`skill_data`)
//! - Toggled-off abilities, presence-keyed (`ability_toggled_off`)
//! - Typed per-ability attributes (`ability_attributes`)
//! - Per-table schema versions (`schema_version_history`)
//!
//! Structural changes are serialized against live queries by per-table
//! atomic admission gates; all I/O runs on a bounded worker pool off the
//! game thread.

mod error;
mod gate;
mod models;
mod pool;
mod schema;
mod store;

pub use error::{Error, Result};
pub use gate::{SchemaGates, TableGate, TableState};
pub use models::{AbilitySnapshot, HolderSnapshot, SkillSnapshot};
pub use pool::{Completion, PersistencePool, PoolConfig};
pub use schema::{
    MigrationStep, SchemaRegistry, TableDef, ABILITY_ATTRIBUTES_TABLE,
    ABILITY_TOGGLED_OFF_TABLE, SCHEMA_VERSION_TABLE, SKILL_DATA_TABLE,
};
pub use store::Store;
