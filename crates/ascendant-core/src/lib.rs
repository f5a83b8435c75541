//! Ascendant Core - Skill progression engine
//!
//! This crate provides the progression core for an RPG layer on a live
//! multiplayer game:
//! - Typed attribute values and dirty-tracked attribute storage
//!   (`AttributeValue`, `AttributeStore`)
//! - Skill kinds and per-skill level/exp state (`SkillKind`, `Skill`)
//! - Experience curves and the leveling state machine (`ExpCurve`,
//!   `ExperienceEngine`)
//! - Abilities with orthogonal capability records (`Ability`, `Capabilities`)
//! - The per-player aggregate and unit of persistence (`ProgressionHolder`)
//! - A synchronous host hook contract for vetoing/rewriting experience gains
//!   (`ProgressionHook`)
//!
//! Persistence lives in `ascendant-db`; this crate performs no I/O.

mod ability;
mod attributes;
mod config;
mod display;
mod error;
mod experience;
mod hook;
mod holder;
mod skill;
mod value;

pub use ability::{Ability, AbilityKey, Capabilities, Tierable, Toggleable, Unlockable};
pub use attributes::{AttributeStore, RESERVED_PREFIX, TIER_KEY, TOGGLED_KEY, UNLOCKED_KEY};
pub use config::{AbilityDef, ProgressionConfig};
pub use display::{AbilitySort, AbilitySummary, SortCycle};
pub use error::{Error, Result};
pub use experience::{ExpCurve, ExperienceEngine, LevelingOutcome};
pub use hook::{ExpDecision, GainReason, NoopHook, ProgressionHook};
pub use holder::{FlushReceipt, PlayerId, ProgressionHolder, SkillState};
pub use skill::{Skill, SkillKind};
pub use value::AttributeValue;
