//! Database store wrapper
//!
//! A `Store` owns one connection plus a shared view of the per-table
//! admission gates. Every row operation passes the gate first; a table that
//! is mid-creation or mid-migration answers `SchemaNotReady` instead of
//! interleaving with DDL.

use crate::error::Result;
use crate::gate::SchemaGates;
use crate::models::{decode_value, encode_value, HolderSnapshot};
use crate::schema::{
    SchemaRegistry, ABILITY_ATTRIBUTES_TABLE, ABILITY_TOGGLED_OFF_TABLE, SKILL_DATA_TABLE,
};
use ascendant_core::{
    AttributeValue, FlushReceipt, PlayerId, ProgressionConfig, ProgressionHolder, SkillKind,
    TOGGLED_KEY,
};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Store for one connection to the progression database
pub struct Store {
    conn: Connection,
    registry: SchemaRegistry,
    gates: Arc<SchemaGates>,
}

impl Store {
    /// Open or create a database at the given path
    pub fn open(path: impl AsRef<Path>, gates: Arc<SchemaGates>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        // Workers share the file; WAL keeps readers off the writer's lock
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn,
            registry: SchemaRegistry::managed(),
            gates,
        })
    }

    /// Create an in-memory database (single-connection, for tests)
    pub fn in_memory(gates: Arc<SchemaGates>) -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            registry: SchemaRegistry::managed(),
            gates,
        })
    }

    /// The shared admission gates
    pub fn gates(&self) -> &Arc<SchemaGates> {
        &self.gates
    }

    /// Converge the schema; see [`SchemaRegistry::ensure_schema`]
    pub fn ensure_schema(&self) -> Result<()> {
        self.registry.ensure_schema(&self.conn, &self.gates)
    }

    fn admit_player_tables(&self) -> Result<()> {
        self.gates.admit(SKILL_DATA_TABLE)?;
        self.gates.admit(ABILITY_TOGGLED_OFF_TABLE)?;
        self.gates.admit(ABILITY_ATTRIBUTES_TABLE)?;
        Ok(())
    }

    /// Load a player's holder, defaulting state with no stored rows
    pub fn load_holder(
        &self,
        player: PlayerId,
        config: &ProgressionConfig,
    ) -> Result<ProgressionHolder> {
        self.admit_player_tables()?;
        let player_id = player.to_string();
        let mut holder = ProgressionHolder::new(player, config);

        let mut stmt = self.conn.prepare(
            "SELECT skill_kind, current_level, current_exp FROM skill_data WHERE player_id = ?1;",
        )?;
        let rows = stmt.query_map([&player_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for row in rows {
            let (kind, level, exp) = row?;
            match SkillKind::parse(&kind) {
                Some(kind) => holder.hydrate_skill(kind, level.max(0) as u32, exp.max(0) as u64),
                None => warn!(player = %player_id, skill = %kind, "ignoring unknown skill row"),
            }
        }

        let mut stmt = self
            .conn
            .prepare("SELECT ability_id FROM ability_toggled_off WHERE player_id = ?1;")?;
        let rows = stmt.query_map([&player_id], |row| row.get::<_, String>(0))?;
        for row in rows {
            let ability_id = row?;
            match holder.ability_mut(&ability_id.as_str().into()) {
                Ok(ability) => ability
                    .attributes_mut()
                    .hydrate(TOGGLED_KEY, AttributeValue::Bool(false)),
                Err(_) => {
                    warn!(player = %player_id, ability = %ability_id, "ignoring toggle row for unknown ability")
                }
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT ability_id, key, value FROM ability_attributes WHERE player_id = ?1;",
        )?;
        let rows = stmt.query_map([&player_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (ability_id, key, raw) = row?;
            let value = decode_value(&raw)?;
            match holder.ability_mut(&ability_id.as_str().into()) {
                Ok(ability) => ability.attributes_mut().hydrate(&key, value),
                Err(_) => {
                    warn!(player = %player_id, ability = %ability_id, "ignoring attribute row for unknown ability")
                }
            }
        }

        holder.recompute_all();
        Ok(holder)
    }

    /// Write a dirty-state snapshot in one transaction
    ///
    /// Returns the receipt the holder uses to clear exactly the flushed
    /// revisions. Nothing is written for an empty snapshot.
    pub fn flush(&self, snapshot: &HolderSnapshot) -> Result<FlushReceipt> {
        if snapshot.is_empty() {
            return Ok(snapshot.receipt());
        }
        self.admit_player_tables()?;
        let player_id = snapshot.player.to_string();

        let tx = self.conn.unchecked_transaction()?;
        for skill in &snapshot.skills {
            tx.execute(
                "INSERT INTO skill_data (player_id, skill_kind, current_level, current_exp) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT (player_id, skill_kind) DO UPDATE SET \
                 current_level = excluded.current_level, current_exp = excluded.current_exp;",
                rusqlite::params![
                    player_id,
                    skill.kind.as_str(),
                    i64::from(skill.current_level),
                    skill.current_exp as i64,
                ],
            )?;
        }
        for ability in &snapshot.abilities {
            if ability.toggled {
                tx.execute(
                    "DELETE FROM ability_toggled_off WHERE player_id = ?1 AND ability_id = ?2;",
                    rusqlite::params![player_id, ability.key],
                )?;
            } else {
                tx.execute(
                    "INSERT OR REPLACE INTO ability_toggled_off (player_id, ability_id) \
                     VALUES (?1, ?2);",
                    rusqlite::params![player_id, ability.key],
                )?;
            }
            for (key, value) in &ability.attributes {
                tx.execute(
                    "INSERT INTO ability_attributes (player_id, ability_id, key, value) \
                     VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT (player_id, ability_id, key) DO UPDATE SET \
                     value = excluded.value;",
                    rusqlite::params![player_id, ability.key, key, encode_value(value)?],
                )?;
            }
        }
        tx.commit()?;
        Ok(snapshot.receipt())
    }

    /// Delete every stored row for a player
    pub fn purge_player(&self, player: PlayerId) -> Result<()> {
        self.admit_player_tables()?;
        let player_id = player.to_string();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM skill_data WHERE player_id = ?1;", [&player_id])?;
        tx.execute(
            "DELETE FROM ability_toggled_off WHERE player_id = ?1;",
            [&player_id],
        )?;
        tx.execute(
            "DELETE FROM ability_attributes WHERE player_id = ?1;",
            [&player_id],
        )?;
        tx.commit()?;
        Ok(())
    }
}
