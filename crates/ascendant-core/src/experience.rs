//! Experience curves and the leveling state machine
//!
//! The engine converts raw experience deltas into level/exp transitions.
//! Overflow past `exp_to_level` is rolled into one or more level-ups in a
//! loop; the curve is re-evaluated each iteration against the new level and
//! the holder's power level as it grows.

use crate::hook::{ExpDecision, GainReason, ProgressionHook};
use crate::holder::PlayerId;
use crate::skill::Skill;
use serde::{Deserialize, Serialize};

/// Parameters of an experience curve
///
/// `exp_to_level = base + growth * level^exponent + power_weight * power_level`,
/// truncated to an integer and clamped to at least 1.
///
/// Precondition for loop termination in the engine: the curve must be strictly
/// increasing in `level` for a fixed power level, which holds whenever
/// `growth > 0` and `exponent > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpCurve {
    /// Flat cost at level 0
    pub base: f64,
    /// Per-level scaling factor
    pub growth: f64,
    /// Exponent applied to the level term
    pub exponent: f64,
    /// Weight of the holder's aggregate power level
    pub power_weight: f64,
}

impl Default for ExpCurve {
    fn default() -> Self {
        Self {
            base: 100.0,
            growth: 25.0,
            exponent: 1.2,
            power_weight: 2.0,
        }
    }
}

impl ExpCurve {
    /// Evaluate the curve; float internally, truncated (not rounded) to an
    /// integer before comparison or storage
    pub fn exp_to_level(&self, level: u32, power_level: u64) -> u64 {
        let raw = self.base
            + self.growth * f64::from(level).powf(self.exponent)
            + self.power_weight * power_level as f64;
        (raw.trunc() as u64).max(1)
    }
}

/// Outcome of an `apply_experience` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelingOutcome {
    /// The host hook vetoed the gain; no state changed
    Vetoed,
    /// The gain was applied (possibly with a rewritten amount)
    Applied {
        /// Amount actually applied after the hook resolved
        amount: u64,
        /// Level before the gain
        old_level: u32,
        /// Level after the gain
        new_level: u32,
        /// Number of level-ups resolved (0 for a plain exp gain)
        levels_gained: u32,
    },
}

/// The leveling state machine for one skill
#[derive(Debug, Clone)]
pub struct ExperienceEngine {
    curve: ExpCurve,
}

impl ExperienceEngine {
    /// Create an engine evaluating the given curve
    pub fn new(curve: ExpCurve) -> Self {
        Self { curve }
    }

    /// The curve this engine evaluates
    pub fn curve(&self) -> &ExpCurve {
        &self.curve
    }

    /// Recompute the skill's derived `exp_to_level` for its current level
    ///
    /// `other_levels` is the sum of the holder's other skill levels; the
    /// power level is that sum plus this skill's own level.
    pub fn recompute_exp_to_level(&self, skill: &mut Skill, other_levels: u64) {
        let power = other_levels + u64::from(skill.current_level());
        let exp_to_level = self.curve.exp_to_level(skill.current_level(), power);
        skill.set_exp_to_level(exp_to_level);
    }

    /// Apply a raw experience delta, resolving level-ups
    ///
    /// The amount is clamped to >= 0 at the boundary, then the host hook may
    /// rewrite or veto it. Level-change notification fires once, after the
    /// whole gain resolved.
    pub fn apply_experience(
        &self,
        player: PlayerId,
        skill: &mut Skill,
        other_levels: u64,
        raw_amount: i64,
        reason: GainReason,
        hook: &dyn ProgressionHook,
    ) -> LevelingOutcome {
        let clamped = raw_amount.max(0) as u64;
        let mut amount = match hook.on_experience_gain(player, skill.kind(), clamped, reason) {
            ExpDecision::Proceed(rewritten) => rewritten,
            ExpDecision::Veto => return LevelingOutcome::Vetoed,
        };

        let old_level = skill.current_level();
        let applied = amount;

        if skill.current_exp() + amount < skill.exp_to_level() {
            if amount > 0 {
                skill.set_exp(skill.current_exp() + amount);
            }
            return LevelingOutcome::Applied {
                amount: applied,
                old_level,
                new_level: old_level,
                levels_gained: 0,
            };
        }

        let mut level = skill.current_level();
        let mut exp = skill.current_exp();
        let mut exp_to_level = skill.exp_to_level();
        let mut levels_gained = 0u32;

        // Terminates because the curve is strictly increasing in level while
        // leftover exp only shrinks once the incoming amount is consumed.
        while exp + amount >= exp_to_level {
            let leftover = exp + amount - exp_to_level;
            level += 1;
            levels_gained += 1;
            amount = 0;
            let power = other_levels + u64::from(level);
            exp_to_level = self.curve.exp_to_level(level, power);
            exp = leftover;
        }

        skill.set_level(level);
        skill.set_exp(exp);
        skill.set_exp_to_level(exp_to_level);

        hook.on_level_change(player, skill.kind(), old_level, level, levels_gained);

        LevelingOutcome::Applied {
            amount: applied,
            old_level,
            new_level: level,
            levels_gained,
        }
    }

    /// Add levels directly, bypassing exp accumulation
    pub fn give_levels(
        &self,
        player: PlayerId,
        skill: &mut Skill,
        other_levels: u64,
        levels: u32,
        reset_exp: bool,
        hook: &dyn ProgressionHook,
    ) {
        let old_level = skill.current_level();
        let new_level = old_level.saturating_add(levels);
        skill.set_level(new_level);
        self.recompute_exp_to_level(skill, other_levels);
        if reset_exp {
            skill.set_exp(0);
        }
        if levels > 0 {
            hook.on_level_change(player, skill.kind(), old_level, new_level, levels);
        }
    }

    /// Zero the skill's level and exp, then recompute the curve at level 0
    ///
    /// Capability resets on the skill's abilities are handled by the owning
    /// holder.
    pub fn reset(&self, skill: &mut Skill, other_levels: u64) {
        skill.set_level(0);
        skill.set_exp(0);
        skill.set_exp_to_level(0);
        self.recompute_exp_to_level(skill, other_levels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::NoopHook;
    use crate::skill::SkillKind;
    use std::sync::Mutex;

    fn flat_curve(cost: f64) -> ExpCurve {
        ExpCurve {
            base: cost,
            growth: 0.0,
            exponent: 1.0,
            power_weight: 0.0,
        }
    }

    fn linear_curve(per_level: f64) -> ExpCurve {
        ExpCurve {
            base: 0.0,
            growth: per_level,
            exponent: 1.0,
            power_weight: 0.0,
        }
    }

    fn player() -> PlayerId {
        PlayerId::new(uuid::Uuid::nil())
    }

    struct Rewriter(u64);

    impl ProgressionHook for Rewriter {
        fn on_experience_gain(
            &self,
            _player: PlayerId,
            _skill: SkillKind,
            _amount: u64,
            _reason: GainReason,
        ) -> ExpDecision {
            ExpDecision::Proceed(self.0)
        }
    }

    struct VetoAll;

    impl ProgressionHook for VetoAll {
        fn on_experience_gain(
            &self,
            _player: PlayerId,
            _skill: SkillKind,
            _amount: u64,
            _reason: GainReason,
        ) -> ExpDecision {
            ExpDecision::Veto
        }
    }

    #[derive(Default)]
    struct LevelRecorder {
        changes: Mutex<Vec<(u32, u32, u32)>>,
    }

    impl ProgressionHook for LevelRecorder {
        fn on_level_change(
            &self,
            _player: PlayerId,
            _skill: SkillKind,
            old_level: u32,
            new_level: u32,
            levels_gained: u32,
        ) {
            self.changes
                .lock()
                .unwrap()
                .push((old_level, new_level, levels_gained));
        }
    }

    #[test]
    fn test_plain_gain_no_level_up() {
        let engine = ExperienceEngine::new(flat_curve(100.0));
        let mut skill = Skill::new(SkillKind::Swords);
        engine.recompute_exp_to_level(&mut skill, 0);

        let outcome =
            engine.apply_experience(player(), &mut skill, 0, 40, GainReason::Combat, &NoopHook);

        assert_eq!(
            outcome,
            LevelingOutcome::Applied {
                amount: 40,
                old_level: 0,
                new_level: 0,
                levels_gained: 0,
            }
        );
        assert_eq!(skill.current_exp(), 40);
        assert_eq!(skill.current_level(), 0);
    }

    #[test]
    fn test_single_level_up_with_recomputed_curve() {
        // exp_to_level = 20 * level, so level 5 costs 100 and level 6 costs 120
        let engine = ExperienceEngine::new(linear_curve(20.0));
        let mut skill = Skill::from_saved(SkillKind::Swords, 5, 90);
        engine.recompute_exp_to_level(&mut skill, 0);
        assert_eq!(skill.exp_to_level(), 100);

        let recorder = LevelRecorder::default();
        let outcome =
            engine.apply_experience(player(), &mut skill, 0, 30, GainReason::Combat, &recorder);

        assert_eq!(
            outcome,
            LevelingOutcome::Applied {
                amount: 30,
                old_level: 5,
                new_level: 6,
                levels_gained: 1,
            }
        );
        assert_eq!(skill.current_level(), 6);
        assert_eq!(skill.current_exp(), 20);
        assert_eq!(skill.exp_to_level(), 120);
        assert_eq!(*recorder.changes.lock().unwrap(), vec![(5, 6, 1)]);
    }

    #[test]
    fn test_multi_level_up() {
        let engine = ExperienceEngine::new(flat_curve(100.0));
        let mut skill = Skill::new(SkillKind::Mining);
        engine.recompute_exp_to_level(&mut skill, 0);

        let outcome =
            engine.apply_experience(player(), &mut skill, 0, 250, GainReason::Gathering, &NoopHook);

        assert_eq!(
            outcome,
            LevelingOutcome::Applied {
                amount: 250,
                old_level: 0,
                new_level: 2,
                levels_gained: 2,
            }
        );
        assert_eq!(skill.current_exp(), 50);
    }

    #[test]
    fn test_invariant_exp_below_threshold() {
        let engine = ExperienceEngine::new(ExpCurve::default());
        let mut skill = Skill::new(SkillKind::Fishing);
        engine.recompute_exp_to_level(&mut skill, 0);

        for amount in [0, 1, 99, 100, 250, 1000, 12345] {
            engine.apply_experience(player(), &mut skill, 0, amount, GainReason::Other, &NoopHook);
            assert!(skill.current_exp() < skill.exp_to_level());
        }
    }

    #[test]
    fn test_negative_amount_clamped() {
        let engine = ExperienceEngine::new(flat_curve(100.0));
        let mut skill = Skill::from_saved(SkillKind::Axes, 3, 50);
        engine.recompute_exp_to_level(&mut skill, 0);

        let outcome =
            engine.apply_experience(player(), &mut skill, 0, -40, GainReason::Command, &NoopHook);

        assert_eq!(
            outcome,
            LevelingOutcome::Applied {
                amount: 0,
                old_level: 3,
                new_level: 3,
                levels_gained: 0,
            }
        );
        assert_eq!(skill.current_exp(), 50);
    }

    #[test]
    fn test_veto_leaves_state_unchanged() {
        let engine = ExperienceEngine::new(flat_curve(100.0));
        let mut skill = Skill::from_saved(SkillKind::Unarmed, 2, 60);
        engine.recompute_exp_to_level(&mut skill, 0);

        let outcome =
            engine.apply_experience(player(), &mut skill, 0, 500, GainReason::Combat, &VetoAll);

        assert_eq!(outcome, LevelingOutcome::Vetoed);
        assert_eq!(skill.current_level(), 2);
        assert_eq!(skill.current_exp(), 60);
        assert_eq!(skill.exp_to_level(), 100);
        assert!(!skill.is_dirty());
    }

    #[test]
    fn test_hook_rewrites_amount() {
        let engine = ExperienceEngine::new(flat_curve(100.0));
        let mut skill = Skill::new(SkillKind::Herbalism);
        engine.recompute_exp_to_level(&mut skill, 0);

        let outcome =
            engine.apply_experience(player(), &mut skill, 0, 500, GainReason::Combat, &Rewriter(10));

        assert_eq!(
            outcome,
            LevelingOutcome::Applied {
                amount: 10,
                old_level: 0,
                new_level: 0,
                levels_gained: 0,
            }
        );
        assert_eq!(skill.current_exp(), 10);
    }

    #[test]
    fn test_level_non_decreasing() {
        let engine = ExperienceEngine::new(ExpCurve::default());
        let mut skill = Skill::new(SkillKind::Woodcutting);
        engine.recompute_exp_to_level(&mut skill, 0);

        let mut last = 0;
        for amount in [500, 0, 3, 10_000, 1, 700] {
            engine.apply_experience(player(), &mut skill, 0, amount, GainReason::Other, &NoopHook);
            assert!(skill.current_level() >= last);
            last = skill.current_level();
        }
    }

    #[test]
    fn test_give_levels_resets_exp() {
        let engine = ExperienceEngine::new(linear_curve(20.0));
        let mut skill = Skill::from_saved(SkillKind::Swords, 2, 30);
        engine.recompute_exp_to_level(&mut skill, 0);

        let recorder = LevelRecorder::default();
        engine.give_levels(player(), &mut skill, 0, 3, true, &recorder);

        assert_eq!(skill.current_level(), 5);
        assert_eq!(skill.current_exp(), 0);
        assert_eq!(skill.exp_to_level(), 100);
        assert_eq!(*recorder.changes.lock().unwrap(), vec![(2, 5, 3)]);
    }

    #[test]
    fn test_give_zero_levels_is_silent() {
        let engine = ExperienceEngine::new(linear_curve(20.0));
        let mut skill = Skill::from_saved(SkillKind::Swords, 2, 30);
        engine.recompute_exp_to_level(&mut skill, 0);

        let recorder = LevelRecorder::default();
        engine.give_levels(player(), &mut skill, 0, 0, false, &recorder);

        assert_eq!(skill.current_level(), 2);
        assert!(recorder.changes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reset_then_zero_gain() {
        let engine = ExperienceEngine::new(ExpCurve::default());
        let mut skill = Skill::from_saved(SkillKind::Mining, 14, 55);
        engine.recompute_exp_to_level(&mut skill, 6);

        engine.reset(&mut skill, 6);
        engine.apply_experience(player(), &mut skill, 6, 0, GainReason::Other, &NoopHook);

        assert_eq!(skill.current_level(), 0);
        assert_eq!(skill.current_exp(), 0);
        assert_eq!(skill.exp_to_level(), engine.curve().exp_to_level(0, 6));
    }

    #[test]
    fn test_power_level_grows_during_loop() {
        // Power weight makes each level-up more expensive as power rises
        let curve = ExpCurve {
            base: 10.0,
            growth: 0.0,
            exponent: 1.0,
            power_weight: 10.0,
        };
        let engine = ExperienceEngine::new(curve);
        let mut skill = Skill::new(SkillKind::Excavation);
        engine.recompute_exp_to_level(&mut skill, 0);
        assert_eq!(skill.exp_to_level(), 10);

        // 10 -> level 1 (leftover 25), curve(1, 1) = 20 -> level 2 (leftover 5)
        engine.apply_experience(player(), &mut skill, 0, 35, GainReason::Other, &NoopHook);
        assert_eq!(skill.current_level(), 2);
        assert_eq!(skill.current_exp(), 5);
        assert_eq!(skill.exp_to_level(), 30);
    }

    #[test]
    fn test_truncation_not_rounding() {
        let curve = ExpCurve {
            base: 99.9,
            growth: 0.0,
            exponent: 1.0,
            power_weight: 0.0,
        };
        assert_eq!(curve.exp_to_level(0, 0), 99);
    }
}
