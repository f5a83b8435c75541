//! Read-only display surface for GUIs and commands
//!
//! Presentation layers consume summaries instead of reaching into live
//! state. Sort options are a fixed ordered sequence cycled by index, not a
//! mutable node graph.

use crate::ability::Ability;
use crate::holder::ProgressionHolder;
use crate::skill::SkillKind;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};

/// Snapshot of one ability for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilitySummary {
    /// The ability's key
    pub key: String,
    /// Owning skill, if any
    pub skill: Option<SkillKind>,
    /// Current tier
    pub tier: u32,
    /// Toggle state
    pub toggled: bool,
    /// Unlock state
    pub unlocked: bool,
    /// Unlock threshold, if the ability is unlockable
    pub unlock_level: Option<u32>,
    /// Display-flagged attributes only
    pub attributes: Vec<(String, AttributeValue)>,
}

impl AbilitySummary {
    /// Build a summary from a live ability
    pub fn from_ability(ability: &Ability) -> Self {
        Self {
            key: ability.key().to_string(),
            skill: ability.skill(),
            tier: ability.tier(),
            toggled: ability.toggled(),
            unlocked: ability.unlocked(),
            unlock_level: ability.capabilities().unlockable.map(|u| u.unlock_level),
            attributes: ability
                .attributes()
                .entries()
                .filter(|(_, displayable, _)| *displayable)
                .map(|(key, _, value)| (key.to_string(), value.clone()))
                .collect(),
        }
    }
}

/// Orderings a GUI can present abilities in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilitySort {
    /// Plain alphabetical by key
    Alphabetical,
    /// Abilities with no unlock requirement first, then alphabetical
    DefaultFirst,
    /// Grouped by owning skill, then alphabetical
    BySkill,
    /// Ascending unlock threshold, then alphabetical
    ByUnlockLevel,
}

impl AbilitySort {
    /// All sort options, in cycle order
    pub const ALL: [AbilitySort; 4] = [
        AbilitySort::Alphabetical,
        AbilitySort::DefaultFirst,
        AbilitySort::BySkill,
        AbilitySort::ByUnlockLevel,
    ];

    /// Order a list of summaries in place
    pub fn apply(&self, summaries: &mut [AbilitySummary]) {
        match self {
            AbilitySort::Alphabetical => summaries.sort_by(|a, b| a.key.cmp(&b.key)),
            AbilitySort::DefaultFirst => summaries.sort_by(|a, b| {
                a.unlock_level
                    .is_some()
                    .cmp(&b.unlock_level.is_some())
                    .then_with(|| a.key.cmp(&b.key))
            }),
            AbilitySort::BySkill => summaries.sort_by(|a, b| {
                let skill_name = |s: &AbilitySummary| s.skill.map(|k| k.as_str()).unwrap_or("");
                skill_name(a)
                    .cmp(skill_name(b))
                    .then_with(|| a.key.cmp(&b.key))
            }),
            AbilitySort::ByUnlockLevel => summaries.sort_by(|a, b| {
                a.unlock_level
                    .unwrap_or(0)
                    .cmp(&b.unlock_level.unwrap_or(0))
                    .then_with(|| a.key.cmp(&b.key))
            }),
        }
    }
}

/// Cycles through the fixed sort options by index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortCycle {
    index: usize,
}

impl SortCycle {
    /// Start at the first sort option
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently selected sort option
    pub fn current(&self) -> AbilitySort {
        AbilitySort::ALL[self.index]
    }

    /// Advance to the next option, wrapping around
    pub fn advance(&mut self) -> AbilitySort {
        self.index = (self.index + 1) % AbilitySort::ALL.len();
        self.current()
    }
}

impl ProgressionHolder {
    /// Summaries of all owned abilities, in the given order
    pub fn ability_summaries(&self, sort: AbilitySort) -> Vec<AbilitySummary> {
        let mut summaries: Vec<AbilitySummary> =
            self.abilities().map(AbilitySummary::from_ability).collect();
        sort.apply(&mut summaries);
        summaries
    }
}
