//! Row models and snapshot types for persistence
//!
//! Snapshots are taken on the game thread from dirty entities only, then
//! shipped to a worker; the receipt built from a successful flush carries the
//! captured revisions back so the holder can clear exactly that dirt.

use crate::error::{Error, Result};
use ascendant_core::{
    Ability, AttributeValue, FlushReceipt, PlayerId, ProgressionHolder, Skill, SkillKind,
    TOGGLED_KEY,
};

/// Encode an attribute value into the text `value` column
pub fn encode_value(value: &AttributeValue) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode the text `value` column back into an attribute value
pub fn decode_value(raw: &str) -> Result<AttributeValue> {
    serde_json::from_str(raw).map_err(|e| Error::Serialization(e.to_string()))
}

/// Captured state of one dirty skill
#[derive(Debug, Clone)]
pub struct SkillSnapshot {
    pub kind: SkillKind,
    pub current_level: u32,
    pub current_exp: u64,
    pub revision: u64,
}

impl SkillSnapshot {
    fn capture(skill: &Skill) -> Self {
        Self {
            kind: skill.kind(),
            current_level: skill.current_level(),
            current_exp: skill.current_exp(),
            revision: skill.revision(),
        }
    }
}

/// Captured state of one dirty ability
#[derive(Debug, Clone)]
pub struct AbilitySnapshot {
    pub key: String,
    pub toggled: bool,
    /// Attribute entries except the toggle, which lives in its own table
    pub attributes: Vec<(String, AttributeValue)>,
    pub revision: u64,
}

impl AbilitySnapshot {
    fn capture(ability: &Ability) -> Self {
        Self {
            key: ability.key().to_string(),
            toggled: ability.toggled(),
            attributes: ability
                .attributes()
                .entries()
                .filter(|(key, _, _)| *key != TOGGLED_KEY)
                .map(|(key, _, value)| (key.to_string(), value.clone()))
                .collect(),
            revision: ability.revision(),
        }
    }
}

/// Everything a flush writes for one holder
#[derive(Debug, Clone)]
pub struct HolderSnapshot {
    pub player: PlayerId,
    pub skills: Vec<SkillSnapshot>,
    pub abilities: Vec<AbilitySnapshot>,
}

impl HolderSnapshot {
    /// Capture the dirty subset of a holder
    pub fn dirty_of(holder: &ProgressionHolder) -> Self {
        Self {
            player: holder.player(),
            skills: holder.dirty_skills().map(SkillSnapshot::capture).collect(),
            abilities: holder
                .dirty_abilities()
                .map(AbilitySnapshot::capture)
                .collect(),
        }
    }

    /// Whether there is anything to write
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty() && self.abilities.is_empty()
    }

    /// The receipt acknowledging this snapshot, handed back on success
    pub fn receipt(&self) -> FlushReceipt {
        FlushReceipt {
            skills: self.skills.iter().map(|s| (s.kind, s.revision)).collect(),
            abilities: self
                .abilities
                .iter()
                .map(|a| (a.key.as_str().into(), a.revision))
                .collect(),
        }
    }
}
