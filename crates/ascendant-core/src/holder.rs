//! The per-player progression aggregate
//!
//! A [`ProgressionHolder`] owns every skill and ability instance for one
//! player identity. It is the unit of persistence: dirty skills and abilities
//! are snapshotted by the storage layer and their dirty flags cleared only
//! when a flush is acknowledged.

use crate::ability::{Ability, AbilityKey};
use crate::config::ProgressionConfig;
use crate::error::{Error, Result};
use crate::experience::{ExperienceEngine, LevelingOutcome};
use crate::hook::{GainReason, ProgressionHook};
use crate::skill::{Skill, SkillKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable player identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Wrap an existing UUID
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh random identity
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID
    pub fn raw(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One skill plus its leveling engine and the abilities filed under it
#[derive(Debug, Clone)]
pub struct SkillState {
    skill: Skill,
    engine: ExperienceEngine,
    ability_keys: Vec<AbilityKey>,
}

impl SkillState {
    /// The skill's progression state
    pub fn skill(&self) -> &Skill {
        &self.skill
    }

    /// The engine evaluating this skill's curve
    pub fn engine(&self) -> &ExperienceEngine {
        &self.engine
    }

    /// Keys of the abilities filed under this skill
    pub fn ability_keys(&self) -> &[AbilityKey] {
        &self.ability_keys
    }
}

/// Receipt describing exactly which state revisions a flush persisted
///
/// Produced by the storage layer on a confirmed successful flush and handed
/// back to [`ProgressionHolder::acknowledge_flush`]. Revisions guard against
/// clearing dirt from mutations that landed while the save was in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReceipt {
    /// Flushed skills and their captured revisions
    pub skills: Vec<(SkillKind, u64)>,
    /// Flushed abilities and their captured revisions
    pub abilities: Vec<(AbilityKey, u64)>,
}

impl FlushReceipt {
    /// Whether the receipt covers nothing
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty() && self.abilities.is_empty()
    }
}

/// All progression state for one player
#[derive(Debug)]
pub struct ProgressionHolder {
    player: PlayerId,
    skills: IndexMap<SkillKind, SkillState>,
    abilities: IndexMap<AbilityKey, Ability>,
    /// Unspent upgrade points; granted on level-up, spent on tier upgrades.
    /// In-memory only (the persisted schema does not carry them).
    upgrade_points: u32,
}

impl ProgressionHolder {
    /// Create a defaulted holder: every skill at level 0, every configured
    /// ability in its default state
    pub fn new(player: PlayerId, config: &ProgressionConfig) -> Self {
        let mut abilities = IndexMap::new();
        for def in &config.abilities {
            abilities.insert(
                def.key.clone(),
                Ability::new(def.key.clone(), def.skill, def.capabilities),
            );
        }

        let mut skills = IndexMap::new();
        for kind in SkillKind::ALL {
            let ability_keys = config
                .abilities
                .iter()
                .filter(|def| def.skill == Some(kind))
                .map(|def| def.key.clone())
                .collect();
            skills.insert(
                kind,
                SkillState {
                    skill: Skill::new(kind),
                    engine: ExperienceEngine::new(config.curve(kind)),
                    ability_keys,
                },
            );
        }

        let mut holder = Self {
            player,
            skills,
            abilities,
            upgrade_points: 0,
        };
        holder.recompute_all();
        holder
    }

    /// The player this holder belongs to
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Derived power level: the sum of all skill levels
    pub fn power_level(&self) -> u64 {
        self.skills
            .values()
            .map(|s| u64::from(s.skill.current_level()))
            .sum()
    }

    fn other_levels(&self, kind: SkillKind) -> u64 {
        self.power_level() - u64::from(self.level(kind))
    }

    /// A skill's current level
    pub fn level(&self, kind: SkillKind) -> u32 {
        self.skills[&kind].skill.current_level()
    }

    /// Borrow a skill's state
    pub fn skill(&self, kind: SkillKind) -> &Skill {
        &self.skills[&kind].skill
    }

    /// Borrow a skill's full state (engine and ability keys included)
    pub fn skill_state(&self, kind: SkillKind) -> &SkillState {
        &self.skills[&kind]
    }

    /// Iterate over all skills
    pub fn skills(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values().map(|s| &s.skill)
    }

    /// Borrow an ability by key
    pub fn ability(&self, key: &AbilityKey) -> Option<&Ability> {
        self.abilities.get(key)
    }

    /// Mutably borrow an ability by key
    pub fn ability_mut(&mut self, key: &AbilityKey) -> Result<&mut Ability> {
        self.abilities
            .get_mut(key)
            .ok_or_else(|| Error::UnknownAbility(key.to_string()))
    }

    /// Iterate over all abilities
    pub fn abilities(&self) -> impl Iterator<Item = &Ability> {
        self.abilities.values()
    }

    /// Unspent upgrade points
    pub fn upgrade_points(&self) -> u32 {
        self.upgrade_points
    }

    /// Grant upgrade points (administrative or hook-driven)
    pub fn grant_upgrade_points(&mut self, points: u32) {
        self.upgrade_points = self.upgrade_points.saturating_add(points);
    }

    /// Recompute every skill's derived `exp_to_level`; call after hydration
    pub fn recompute_all(&mut self) {
        let levels: Vec<(SkillKind, u64)> = self
            .skills
            .iter()
            .map(|(k, s)| (*k, u64::from(s.skill.current_level())))
            .collect();
        let total: u64 = levels.iter().map(|(_, l)| l).sum();
        for (kind, level) in levels {
            let state = &mut self.skills[&kind];
            state.engine.recompute_exp_to_level(&mut state.skill, total - level);
        }
    }

    /// Replace a skill's level/exp with persisted values, without dirtying
    pub fn hydrate_skill(&mut self, kind: SkillKind, level: u32, exp: u64) {
        self.skills[&kind].skill = Skill::from_saved(kind, level, exp);
    }

    /// Apply a raw experience delta to one skill
    ///
    /// Each level gained also grants one upgrade point.
    pub fn gain_experience(
        &mut self,
        kind: SkillKind,
        amount: i64,
        reason: GainReason,
        hook: &dyn ProgressionHook,
    ) -> LevelingOutcome {
        let other_levels = self.other_levels(kind);
        let player = self.player;
        let state = &mut self.skills[&kind];
        let outcome =
            state
                .engine
                .apply_experience(player, &mut state.skill, other_levels, amount, reason, hook);
        if let LevelingOutcome::Applied { levels_gained, .. } = outcome {
            self.upgrade_points = self.upgrade_points.saturating_add(levels_gained);
        }
        outcome
    }

    /// Add levels to one skill directly, bypassing exp accumulation
    pub fn give_levels(
        &mut self,
        kind: SkillKind,
        levels: u32,
        reset_exp: bool,
        hook: &dyn ProgressionHook,
    ) {
        let other_levels = self.other_levels(kind);
        let player = self.player;
        let state = &mut self.skills[&kind];
        state
            .engine
            .give_levels(player, &mut state.skill, other_levels, levels, reset_exp, hook);
        self.upgrade_points = self.upgrade_points.saturating_add(levels);
    }

    /// Flip an ability's toggle state
    pub fn toggle(&mut self, key: &AbilityKey) -> Result<bool> {
        self.ability_mut(key)?.toggle()
    }

    /// Unlock an ability against its owning skill's current level
    ///
    /// Abilities with no skill association are checked against level 0.
    pub fn unlock(&mut self, key: &AbilityKey) -> Result<()> {
        let ability = self
            .abilities
            .get(key)
            .ok_or_else(|| Error::UnknownAbility(key.to_string()))?;
        let skill_level = ability.skill().map_or(0, |kind| self.level(kind));
        self.abilities[key].unlock(skill_level)
    }

    /// Spend one upgrade point to raise an ability's tier by one
    ///
    /// The ability must be tierable, below its maximum tier, and unlocked if
    /// it carries the unlockable capability.
    pub fn upgrade_ability(&mut self, key: &AbilityKey) -> Result<u32> {
        if self.upgrade_points == 0 {
            return Err(Error::NoUpgradePoints);
        }
        let ability = self
            .abilities
            .get(key)
            .ok_or_else(|| Error::UnknownAbility(key.to_string()))?;
        if let Some(unlockable) = ability.capabilities().unlockable {
            if !ability.unlocked() {
                let actual = ability.skill().map_or(0, |kind| self.level(kind));
                return Err(Error::UnlockPreconditionNotMet {
                    ability: key.to_string(),
                    required: unlockable.unlock_level,
                    actual,
                });
            }
        }
        let next_tier = ability.tier() + 1;
        self.abilities[key].set_tier(next_tier)?;
        self.upgrade_points -= 1;
        Ok(next_tier)
    }

    /// Reset one skill to level 0 and all its abilities to their defaults
    pub fn reset_skill(&mut self, kind: SkillKind) {
        let other_levels = self.other_levels(kind);
        let state = &mut self.skills[&kind];
        state.engine.reset(&mut state.skill, other_levels);
        let keys: Vec<AbilityKey> = state.ability_keys.clone();
        for key in keys {
            if let Some(ability) = self.abilities.get_mut(&key) {
                ability.reset_capabilities();
            }
        }
        // Resetting one skill changes the power level every other curve sees
        self.recompute_all();
    }

    /// Full reset: every skill back to level 0, every ability to defaults,
    /// upgrade points cleared
    pub fn reset_all_skills(&mut self) {
        self.cleanup();
        for kind in SkillKind::ALL {
            self.reset_skill(kind);
        }
        self.upgrade_points = 0;
    }

    /// Clear ability-scoped transient timers and cooldowns
    ///
    /// Invoked before a full reset and on holder teardown; touches no
    /// persisted state.
    pub fn cleanup(&mut self) {
        for ability in self.abilities.values_mut() {
            ability.clear_cooldown();
        }
    }

    /// Whether any owned skill or ability has unsaved mutations
    pub fn is_dirty(&self) -> bool {
        self.skills.values().any(|s| s.skill.is_dirty())
            || self.abilities.values().any(|a| a.is_dirty())
    }

    /// Iterate over dirty skills
    pub fn dirty_skills(&self) -> impl Iterator<Item = &Skill> {
        self.skills
            .values()
            .map(|s| &s.skill)
            .filter(|s| s.is_dirty())
    }

    /// Iterate over dirty abilities
    pub fn dirty_abilities(&self) -> impl Iterator<Item = &Ability> {
        self.abilities.values().filter(|a| a.is_dirty())
    }

    /// Clear dirty flags for exactly the revisions a confirmed flush covered
    pub fn acknowledge_flush(&mut self, receipt: &FlushReceipt) {
        for (kind, revision) in &receipt.skills {
            if let Some(state) = self.skills.get_mut(kind) {
                state.skill.acknowledge_flush(*revision);
            }
        }
        for (key, revision) in &receipt.abilities {
            if let Some(ability) = self.abilities.get_mut(key) {
                ability.acknowledge_flush(*revision);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experience::ExpCurve;
    use crate::hook::NoopHook;

    fn flat_config(cost: f64) -> ProgressionConfig {
        let mut config = ProgressionConfig::default();
        for kind in SkillKind::ALL {
            config.curves.insert(
                kind,
                ExpCurve {
                    base: cost,
                    growth: 0.0,
                    exponent: 1.0,
                    power_weight: 0.0,
                },
            );
        }
        config
    }

    fn holder() -> ProgressionHolder {
        ProgressionHolder::new(PlayerId::random(), &flat_config(100.0))
    }

    #[test]
    fn test_power_level_sums_skills() {
        let mut holder = holder();
        holder.give_levels(SkillKind::Swords, 3, false, &NoopHook);
        holder.give_levels(SkillKind::Mining, 2, false, &NoopHook);
        assert_eq!(holder.power_level(), 5);
    }

    #[test]
    fn test_level_up_grants_upgrade_points() {
        let mut holder = holder();
        holder.gain_experience(SkillKind::Swords, 250, GainReason::Combat, &NoopHook);
        assert_eq!(holder.level(SkillKind::Swords), 2);
        assert_eq!(holder.upgrade_points(), 2);
    }

    #[test]
    fn test_unlock_gated_by_skill_level() {
        let mut holder = holder();
        let key = AbilityKey::new("serrated_strikes");

        assert!(matches!(
            holder.unlock(&key),
            Err(Error::UnlockPreconditionNotMet { required: 10, .. })
        ));

        holder.give_levels(SkillKind::Swords, 10, false, &NoopHook);
        holder.unlock(&key).unwrap();
        assert!(holder.ability(&key).unwrap().unlocked());
    }

    #[test]
    fn test_upgrade_spends_points() {
        let mut holder = holder();
        let key = AbilityKey::new("bleed");

        assert!(matches!(
            holder.upgrade_ability(&key),
            Err(Error::NoUpgradePoints)
        ));

        holder.grant_upgrade_points(2);
        assert_eq!(holder.upgrade_ability(&key).unwrap(), 1);
        assert_eq!(holder.upgrade_ability(&key).unwrap(), 2);
        assert_eq!(holder.upgrade_points(), 0);
        assert_eq!(holder.ability(&key).unwrap().tier(), 2);
    }

    #[test]
    fn test_upgrade_requires_unlock_first() {
        let mut holder = holder();
        let key = AbilityKey::new("serrated_strikes");
        holder.grant_upgrade_points(1);

        assert!(matches!(
            holder.upgrade_ability(&key),
            Err(Error::UnlockPreconditionNotMet { .. })
        ));
    }

    #[test]
    fn test_reset_all_restores_defaults() {
        let mut holder = holder();
        let key = AbilityKey::new("bleed");

        holder.gain_experience(SkillKind::Swords, 550, GainReason::Combat, &NoopHook);
        holder.toggle(&key).unwrap();
        holder.grant_upgrade_points(1);
        holder.upgrade_ability(&key).unwrap();

        holder.reset_all_skills();

        assert_eq!(holder.power_level(), 0);
        assert_eq!(holder.upgrade_points(), 0);
        let ability = holder.ability(&key).unwrap();
        assert!(ability.toggled());
        assert_eq!(ability.tier(), 0);
        for skill in holder.skills() {
            assert_eq!(skill.current_level(), 0);
            assert_eq!(skill.current_exp(), 0);
            assert!(skill.exp_to_level() >= 1);
        }
    }

    #[test]
    fn test_dirty_tracking_and_receipt() {
        let mut holder = holder();
        let key = AbilityKey::new("bleed");
        holder.gain_experience(SkillKind::Swords, 10, GainReason::Combat, &NoopHook);
        holder.toggle(&key).unwrap();
        assert!(holder.is_dirty());

        let receipt = FlushReceipt {
            skills: holder
                .dirty_skills()
                .map(|s| (s.kind(), s.revision()))
                .collect(),
            abilities: holder
                .dirty_abilities()
                .map(|a| (a.key().clone(), a.revision()))
                .collect(),
        };
        holder.acknowledge_flush(&receipt);
        assert!(!holder.is_dirty());
    }

    #[test]
    fn test_receipt_does_not_clear_racing_mutation() {
        let mut holder = holder();
        holder.gain_experience(SkillKind::Swords, 10, GainReason::Combat, &NoopHook);
        let receipt = FlushReceipt {
            skills: holder
                .dirty_skills()
                .map(|s| (s.kind(), s.revision()))
                .collect(),
            abilities: Vec::new(),
        };

        // Mutation lands while the flush is "in flight"
        holder.gain_experience(SkillKind::Swords, 5, GainReason::Combat, &NoopHook);
        holder.acknowledge_flush(&receipt);
        assert!(holder.is_dirty());
    }

    #[test]
    fn test_cleanup_clears_cooldowns() {
        let mut holder = holder();
        let key = AbilityKey::new("bleed");
        holder.ability_mut(&key).unwrap().set_cooldown_until(500);
        holder.cleanup();
        assert!(holder.ability(&key).unwrap().is_ready(0));
    }
}
