//! Skill kinds and per-skill progression state

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of progression tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    Swords,
    Axes,
    Unarmed,
    Mining,
    Woodcutting,
    Excavation,
    Herbalism,
    Fishing,
}

impl SkillKind {
    /// All skill kinds, in display order
    pub const ALL: [SkillKind; 8] = [
        SkillKind::Swords,
        SkillKind::Axes,
        SkillKind::Unarmed,
        SkillKind::Mining,
        SkillKind::Woodcutting,
        SkillKind::Excavation,
        SkillKind::Herbalism,
        SkillKind::Fishing,
    ];

    /// Stable identifier used in persistence rows
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillKind::Swords => "swords",
            SkillKind::Axes => "axes",
            SkillKind::Unarmed => "unarmed",
            SkillKind::Mining => "mining",
            SkillKind::Woodcutting => "woodcutting",
            SkillKind::Excavation => "excavation",
            SkillKind::Herbalism => "herbalism",
            SkillKind::Fishing => "fishing",
        }
    }

    /// Parse a stable identifier back into a kind
    pub fn parse(s: &str) -> Option<SkillKind> {
        SkillKind::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for SkillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One progression track for one player
///
/// Invariant: after any mutation resolves, `current_exp < exp_to_level`
/// (overflow is rolled into level-ups by the experience engine).
#[derive(Debug, Clone)]
pub struct Skill {
    kind: SkillKind,
    current_level: u32,
    current_exp: u64,
    exp_to_level: u64,
    dirty: bool,
    revision: u64,
}

impl Skill {
    /// Create a fresh level-0 skill; `exp_to_level` is recomputed by the
    /// engine before first use
    pub fn new(kind: SkillKind) -> Self {
        Self {
            kind,
            current_level: 0,
            current_exp: 0,
            exp_to_level: 1,
            dirty: false,
            revision: 0,
        }
    }

    /// Rebuild a skill from persisted level/exp
    pub fn from_saved(kind: SkillKind, current_level: u32, current_exp: u64) -> Self {
        Self {
            kind,
            current_level,
            current_exp,
            exp_to_level: 1,
            dirty: false,
            revision: 0,
        }
    }

    /// The kind of this skill
    pub fn kind(&self) -> SkillKind {
        self.kind
    }

    /// Current level
    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    /// Experience accumulated toward the next level
    pub fn current_exp(&self) -> u64 {
        self.current_exp
    }

    /// Experience required to reach the next level (derived, never persisted)
    pub fn exp_to_level(&self) -> u64 {
        self.exp_to_level
    }

    pub(crate) fn set_level(&mut self, level: u32) {
        self.current_level = level;
        self.mark_dirty();
    }

    pub(crate) fn set_exp(&mut self, exp: u64) {
        self.current_exp = exp;
        self.mark_dirty();
    }

    /// Derived state only; does not dirty the skill
    pub(crate) fn set_exp_to_level(&mut self, exp_to_level: u64) {
        self.exp_to_level = exp_to_level;
    }

    /// Whether this skill has unsaved mutations
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the skill dirty; idempotent
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.revision = self.revision.wrapping_add(1);
    }

    /// The current mutation revision, captured by flush snapshots
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Clear the dirty flag if no mutation landed since `revision` was captured
    pub fn acknowledge_flush(&mut self, revision: u64) {
        if self.revision == revision {
            self.dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in SkillKind::ALL {
            assert_eq!(SkillKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SkillKind::parse("alchemy"), None);
    }

    #[test]
    fn test_dirty_tracking() {
        let mut skill = Skill::new(SkillKind::Mining);
        assert!(!skill.is_dirty());

        skill.set_exp(10);
        assert!(skill.is_dirty());

        let rev = skill.revision();
        skill.acknowledge_flush(rev);
        assert!(!skill.is_dirty());
    }
}
