//! Host hook contract for experience gain and level changes
//!
//! The host environment observes progression through a synchronous callback
//! contract rather than mutable event objects: the pre-mutation hook returns
//! a decision value (proceed, possibly with a rewritten amount, or veto), and
//! the post-mutation level-change hook is notification only.

use crate::holder::PlayerId;
use crate::skill::SkillKind;
use serde::{Deserialize, Serialize};

/// Why experience is being granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainReason {
    /// Earned through combat
    Combat,
    /// Earned through gathering/harvesting
    Gathering,
    /// Granted by an administrative command
    Command,
    /// Redeemed from a stored reward
    Redeem,
    /// Anything else (third-party integrations)
    Other,
}

/// Decision returned by the pre-mutation experience hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpDecision {
    /// Apply the gain with this (possibly rewritten) amount
    Proceed(u64),
    /// Apply nothing; all skill state is left untouched
    Veto,
}

/// Callbacks the host registers to observe or veto progression changes
pub trait ProgressionHook {
    /// Called before experience is applied; may rewrite the amount or veto
    fn on_experience_gain(
        &self,
        _player: PlayerId,
        _skill: SkillKind,
        amount: u64,
        _reason: GainReason,
    ) -> ExpDecision {
        ExpDecision::Proceed(amount)
    }

    /// Called after one or more level-ups resolved; notification only
    fn on_level_change(
        &self,
        _player: PlayerId,
        _skill: SkillKind,
        _old_level: u32,
        _new_level: u32,
        _levels_gained: u32,
    ) {
    }
}

/// Hook that applies every gain unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl ProgressionHook for NoopHook {}
