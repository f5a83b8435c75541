//! Abilities and their capability records
//!
//! Capabilities are orthogonal, optional records attached to an ability,
//! not a class hierarchy: an ability may be any subset of tierable,
//! toggleable, and unlockable. Presence of the record gates the matching
//! operation.

use crate::attributes::{AttributeStore, TIER_KEY, TOGGLED_KEY, UNLOCKED_KEY};
use crate::error::{Error, Result};
use crate::skill::SkillKind;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Globally unique identifier for an ability
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityKey(pub String);

impl AbilityKey {
    /// Create a new ability key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AbilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AbilityKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AbilityKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Capability record: the ability has an integer tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tierable {
    /// Highest tier upgrades can reach
    pub max_tier: u32,
}

/// Capability record: the ability can be toggled on and off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Toggleable;

/// Capability record: the ability must be unlocked at a skill level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unlockable {
    /// Skill level required before the ability can be unlocked
    pub unlock_level: u32,
}

/// The optional capability records of one ability
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Present if the ability has tiers
    #[serde(default)]
    pub tierable: Option<Tierable>,
    /// Present if the ability can be toggled
    #[serde(default)]
    pub toggleable: Option<Toggleable>,
    /// Present if the ability must be unlocked
    #[serde(default)]
    pub unlockable: Option<Unlockable>,
}

/// One ability instance owned by a progression holder
#[derive(Debug, Clone)]
pub struct Ability {
    key: AbilityKey,
    skill: Option<SkillKind>,
    capabilities: Capabilities,
    attributes: AttributeStore,
    /// Host tick until which the ability is on cooldown; transient, never
    /// persisted
    cooldown_until: Option<u64>,
}

impl Ability {
    /// Create an ability in its default state (toggled on, tier 0, locked)
    pub fn new(key: AbilityKey, skill: Option<SkillKind>, capabilities: Capabilities) -> Self {
        Self {
            key,
            skill,
            capabilities,
            attributes: AttributeStore::new(),
            cooldown_until: None,
        }
    }

    /// This ability's key
    pub fn key(&self) -> &AbilityKey {
        &self.key
    }

    /// The skill this ability belongs to, if any
    pub fn skill(&self) -> Option<SkillKind> {
        self.skill
    }

    /// This ability's capability records
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The attribute store backing this ability
    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// Mutable access to the attribute store
    pub fn attributes_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }

    /// Current tier; 0 unless raised by upgrades
    pub fn tier(&self) -> u32 {
        self.attributes
            .get_int(TIER_KEY)
            .map(|t| t.max(0) as u32)
            .unwrap_or(0)
    }

    /// Set the tier, gated on the tierable capability and its maximum
    pub fn set_tier(&mut self, tier: u32) -> Result<()> {
        let tierable = self
            .capabilities
            .tierable
            .ok_or_else(|| Error::NotTierable(self.key.to_string()))?;
        if tier > tierable.max_tier {
            return Err(Error::MaxTierReached(self.key.to_string()));
        }
        self.attributes
            .set_reserved(TIER_KEY, AttributeValue::Int(i64::from(tier)))
    }

    /// Whether the ability is toggled on; defaults to on
    pub fn toggled(&self) -> bool {
        self.attributes.get_bool(TOGGLED_KEY).unwrap_or(true)
    }

    /// Flip the toggle state, returning the new state
    pub fn toggle(&mut self) -> Result<bool> {
        if self.capabilities.toggleable.is_none() {
            return Err(Error::NotToggleable(self.key.to_string()));
        }
        let next = !self.toggled();
        self.attributes
            .set_reserved(TOGGLED_KEY, AttributeValue::Bool(next))?;
        Ok(next)
    }

    /// Whether the ability has been unlocked; defaults to locked
    pub fn unlocked(&self) -> bool {
        self.attributes.get_bool(UNLOCKED_KEY).unwrap_or(false)
    }

    /// Unlock the ability, gated on the unlockable capability and the owning
    /// skill's current level
    pub fn unlock(&mut self, skill_level: u32) -> Result<()> {
        let unlockable = self
            .capabilities
            .unlockable
            .ok_or_else(|| Error::NotUnlockable(self.key.to_string()))?;
        if self.unlocked() {
            return Err(Error::AlreadyUnlocked(self.key.to_string()));
        }
        if skill_level < unlockable.unlock_level {
            return Err(Error::UnlockPreconditionNotMet {
                ability: self.key.to_string(),
                required: unlockable.unlock_level,
                actual: skill_level,
            });
        }
        self.attributes
            .set_reserved(UNLOCKED_KEY, AttributeValue::Bool(true))
    }

    /// Restore capability state to defaults: toggled on, tier 0, locked
    pub fn reset_capabilities(&mut self) {
        // Reserved keys always hold their declared types, so these cannot
        // fail with a type mismatch.
        if self.capabilities.toggleable.is_some() {
            let _ = self
                .attributes
                .set_reserved(TOGGLED_KEY, AttributeValue::Bool(true));
        }
        if self.capabilities.tierable.is_some() {
            let _ = self
                .attributes
                .set_reserved(TIER_KEY, AttributeValue::Int(0));
        }
        if self.capabilities.unlockable.is_some() {
            let _ = self
                .attributes
                .set_reserved(UNLOCKED_KEY, AttributeValue::Bool(false));
        }
    }

    /// Put the ability on cooldown until the given host tick
    pub fn set_cooldown_until(&mut self, tick: u64) {
        self.cooldown_until = Some(tick);
    }

    /// The host tick until which the ability is cooling down
    pub fn cooldown_until(&self) -> Option<u64> {
        self.cooldown_until
    }

    /// Whether the ability is ready at the given host tick
    pub fn is_ready(&self, now: u64) -> bool {
        self.cooldown_until.map_or(true, |until| now >= until)
    }

    /// Clear any transient cooldown
    pub fn clear_cooldown(&mut self) {
        self.cooldown_until = None;
    }

    /// Whether this ability has unsaved mutations
    pub fn is_dirty(&self) -> bool {
        self.attributes.is_dirty()
    }

    /// The current mutation revision, captured by flush snapshots
    pub fn revision(&self) -> u64 {
        self.attributes.revision()
    }

    /// Clear the dirty flag if no mutation landed since `revision` was captured
    pub fn acknowledge_flush(&mut self, revision: u64) {
        self.attributes.acknowledge_flush(revision);
    }
}
