//! Error types for persistence operations.

use thiserror::Error;

/// Errors that can occur during persistence operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The table is mid-creation or mid-migration; the caller may retry
    /// once the schema settles. Never queued by this crate.
    #[error("Table '{table}' is not accepting queries (state: {state})")]
    SchemaNotReady {
        table: &'static str,
        state: &'static str,
    },

    /// A migration step failed. The table's gate stays closed until an
    /// operator intervenes; there is no automatic retry.
    #[error("Migration of table '{table}' to version {version} failed: {message}")]
    MigrationFailed {
        table: &'static str,
        version: i64,
        message: String,
    },

    /// Storage backend error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Attribute value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A worker's bounded queue is full; retry is a caller decision.
    #[error("Persistence queue is full")]
    Busy,

    /// The worker pool has shut down or a worker panicked.
    #[error("Persistence worker is gone")]
    WorkerGone,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, Error>;
