//! Per-table query-admission gates
//!
//! Each managed table carries an atomic state value; admission decisions are
//! race-free under concurrent callers. The gate is the only cross-request
//! shared mutable state in the persistence layer.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of one managed table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TableState {
    /// Not yet checked against the live database
    Uninitialized = 0,
    /// DDL creation in progress (or failed; the gate stays closed)
    Creating = 1,
    /// Accepting queries at the current schema version
    Ready = 2,
    /// Structural migration in progress (or failed; the gate stays closed)
    Migrating = 3,
}

impl TableState {
    fn from_u8(raw: u8) -> TableState {
        match raw {
            1 => TableState::Creating,
            2 => TableState::Ready,
            3 => TableState::Migrating,
            _ => TableState::Uninitialized,
        }
    }

    /// Short name for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            TableState::Uninitialized => "uninitialized",
            TableState::Creating => "creating",
            TableState::Ready => "ready",
            TableState::Migrating => "migrating",
        }
    }
}

/// Atomic admission gate for one table
#[derive(Debug)]
pub struct TableGate {
    state: AtomicU8,
}

impl TableGate {
    /// Create a gate in the `Uninitialized` state
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(TableState::Uninitialized as u8),
        }
    }

    /// Current state
    pub fn state(&self) -> TableState {
        TableState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Deny unless the table is `Ready`
    pub fn admit(&self, table: &'static str) -> Result<()> {
        let state = self.state();
        if state == TableState::Ready {
            Ok(())
        } else {
            Err(Error::SchemaNotReady {
                table,
                state: state.as_str(),
            })
        }
    }

    /// `Uninitialized -> Creating`; false if another caller won the race
    pub fn try_begin_create(&self) -> bool {
        self.transition(TableState::Uninitialized, TableState::Creating)
    }

    /// `Ready -> Migrating`; false if another caller won the race
    pub fn try_begin_migrate(&self) -> bool {
        self.transition(TableState::Ready, TableState::Migrating)
    }

    /// Open the gate
    pub fn mark_ready(&self) {
        self.state
            .store(TableState::Ready as u8, Ordering::Release);
    }

    fn transition(&self, from: TableState, to: TableState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for TableGate {
    fn default() -> Self {
        Self::new()
    }
}

/// The gates of every managed table
///
/// Gates are independent: a migration on one table never blocks queries on
/// another.
#[derive(Debug)]
pub struct SchemaGates {
    gates: Vec<(&'static str, TableGate)>,
}

impl SchemaGates {
    /// Create one gate per table name
    pub fn for_tables(names: &[&'static str]) -> Self {
        Self {
            gates: names.iter().map(|n| (*n, TableGate::new())).collect(),
        }
    }

    /// The gate for a managed table; panics on unmanaged names, which would
    /// be a registry wiring bug
    pub fn gate(&self, table: &'static str) -> &TableGate {
        self.gates
            .iter()
            .find(|(n, _)| *n == table)
            .map(|(_, g)| g)
            .unwrap_or_else(|| panic!("unmanaged table: {table}"))
    }

    /// Deny unless the named table is `Ready`
    pub fn admit(&self, table: &'static str) -> Result<()> {
        self.gate(table).admit(table)
    }

    /// Whether every managed table is `Ready`
    pub fn all_ready(&self) -> bool {
        self.gates.iter().all(|(_, g)| g.state() == TableState::Ready)
    }
}
