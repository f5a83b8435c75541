//! Error types for ascendant-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Type mismatch for attribute '{key}': stored {stored}, supplied {supplied}")]
    TypeMismatch {
        key: String,
        stored: &'static str,
        supplied: &'static str,
    },

    #[error("Attribute key '{0}' is reserved")]
    ReservedKey(String),

    #[error("Ability '{0}' is not toggleable")]
    NotToggleable(String),

    #[error("Ability '{0}' is not tierable")]
    NotTierable(String),

    #[error("Ability '{0}' is not unlockable")]
    NotUnlockable(String),

    #[error("Ability '{ability}' unlocks at level {required}, skill is level {actual}")]
    UnlockPreconditionNotMet {
        ability: String,
        required: u32,
        actual: u32,
    },

    #[error("Ability '{0}' is already unlocked")]
    AlreadyUnlocked(String),

    #[error("Ability '{0}' is already at its maximum tier")]
    MaxTierReached(String),

    #[error("No upgrade points available")]
    NoUpgradePoints,

    #[error("Unknown ability: {0}")]
    UnknownAbility(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
