//! Progression configuration: per-skill curves and ability definitions
//!
//! Definitions are data-driven and loadable from RON, so deployments can
//! tune curves and the ability roster without code changes.

use crate::ability::{AbilityKey, Capabilities, Tierable, Toggleable, Unlockable};
use crate::error::{Error, Result};
use crate::experience::ExpCurve;
use crate::skill::SkillKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Static definition of one ability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityDef {
    /// Globally unique key
    pub key: AbilityKey,
    /// Owning skill, if any
    #[serde(default)]
    pub skill: Option<SkillKind>,
    /// Capability records
    #[serde(default)]
    pub capabilities: Capabilities,
}

/// Full progression configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// Experience curve per skill; skills without an entry use the default
    /// curve
    #[serde(default)]
    pub curves: IndexMap<SkillKind, ExpCurve>,
    /// The ability roster
    #[serde(default)]
    pub abilities: Vec<AbilityDef>,
}

impl ProgressionConfig {
    /// Load a configuration from a RON string
    pub fn from_ron_str(content: &str) -> Result<Self> {
        ron::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// The curve for a skill, falling back to the default curve
    pub fn curve(&self, kind: SkillKind) -> ExpCurve {
        self.curves.get(&kind).copied().unwrap_or_default()
    }

    /// Find an ability definition by key
    pub fn ability(&self, key: &AbilityKey) -> Option<&AbilityDef> {
        self.abilities.iter().find(|def| &def.key == key)
    }
}

impl Default for ProgressionConfig {
    /// A small stock roster; real deployments load their own RON
    fn default() -> Self {
        let abilities = vec![
            AbilityDef {
                key: AbilityKey::new("bleed"),
                skill: Some(SkillKind::Swords),
                capabilities: Capabilities {
                    tierable: Some(Tierable { max_tier: 5 }),
                    toggleable: Some(Toggleable),
                    ..Default::default()
                },
            },
            AbilityDef {
                key: AbilityKey::new("serrated_strikes"),
                skill: Some(SkillKind::Swords),
                capabilities: Capabilities {
                    tierable: Some(Tierable { max_tier: 5 }),
                    toggleable: Some(Toggleable),
                    unlockable: Some(Unlockable { unlock_level: 10 }),
                },
            },
            AbilityDef {
                key: AbilityKey::new("double_drops"),
                skill: Some(SkillKind::Mining),
                capabilities: Capabilities {
                    tierable: Some(Tierable { max_tier: 5 }),
                    toggleable: Some(Toggleable),
                    ..Default::default()
                },
            },
            AbilityDef {
                key: AbilityKey::new("blast_mining"),
                skill: Some(SkillKind::Mining),
                capabilities: Capabilities {
                    tierable: Some(Tierable { max_tier: 4 }),
                    toggleable: Some(Toggleable),
                    unlockable: Some(Unlockable { unlock_level: 25 }),
                },
            },
            AbilityDef {
                key: AbilityKey::new("tree_feller"),
                skill: Some(SkillKind::Woodcutting),
                capabilities: Capabilities {
                    tierable: Some(Tierable { max_tier: 5 }),
                    toggleable: Some(Toggleable),
                    unlockable: Some(Unlockable { unlock_level: 15 }),
                },
            },
        ];
        Self {
            curves: IndexMap::new(),
            abilities,
        }
    }
}
