//! Cooldown reset applied to both duelists when a duel starts.
//!
//! Resetting happens in two steps so that an unknown spell aborts before
//! anything is mutated: [`CooldownResetEngine::plan`] reads the ledger and
//! resolves every spell definition, then [`CooldownResetEngine::apply`]
//! clears the ledgers.

use gauntlet_common::{GameTime, InvariantViolation, SpellId, IN_MILLISECONDS};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::modifiers::{AuraType, SpellModOp};
use crate::participant::Player;
use crate::spell::SpellStore;

/// Per-spell figures computed while planning a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpellCooldownDecision {
    /// Spell the entry belongs to
    pub spell: SpellId,
    /// Milliseconds left at planning time
    pub remaining_ms: u64,
    /// Recovery time with the participant's modifiers applied
    pub total_cooldown_ms: i32,
    /// Category recovery time, modified unless the spell opts out
    pub category_cooldown_ms: i32,
    /// Entry is on hold and skipped by the selective pass
    pub on_hold: bool,
    /// Entry is cleared by the selective pass
    pub clear: bool,
}

/// Decisions for one participant, computed before any mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetPlan {
    decisions: Vec<SpellCooldownDecision>,
}

impl ResetPlan {
    /// All per-spell decisions, ordered by spell ID.
    #[must_use]
    pub fn decisions(&self) -> &[SpellCooldownDecision] {
        &self.decisions
    }

    /// Decision for `spell`.
    #[must_use]
    pub fn decision(&self, spell: SpellId) -> Option<&SpellCooldownDecision> {
        self.decisions.iter().find(|d| d.spell == spell)
    }

    fn clears(&self, spell: SpellId) -> bool {
        self.decision(spell).is_some_and(|d| d.clear)
    }
}

/// What a reset removed from one participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownResetReport {
    /// Spells lifted by the selective pass
    pub cleared: Vec<SpellId>,
    /// Entries dropped by the unconditional pass
    pub baseline_cleared: usize,
    /// Entries dropped from the pet's ledger
    pub pet_cleared: usize,
}

impl CooldownResetReport {
    /// Whether the reset changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cleared.is_empty() && self.baseline_cleared == 0 && self.pet_cleared == 0
    }
}

/// Computes and applies the duel-start cooldown reset.
#[derive(Debug, Clone, Copy)]
pub struct CooldownResetEngine<'a> {
    spells: &'a SpellStore,
    reset_pet: bool,
}

impl<'a> CooldownResetEngine<'a> {
    /// Creates an engine reading definitions from `spells`.
    #[must_use]
    pub fn new(spells: &'a SpellStore) -> Self {
        Self {
            spells,
            reset_pet: true,
        }
    }

    /// Sets whether pet cooldowns are cleared too.
    #[must_use]
    pub fn with_pet_reset(mut self, reset_pet: bool) -> Self {
        self.reset_pet = reset_pet;
        self
    }

    /// Computes the reset decisions for `player` without touching it.
    pub fn plan(&self, player: &Player, now: GameTime) -> Result<ResetPlan, InvariantViolation> {
        let history = player.spell_history();
        let cooldown_aura = player.total_aura_modifier(AuraType::ModCooldown);

        let mut decisions = Vec::with_capacity(history.len());
        for entry in history.entries() {
            let info = self.spells.assert_spell_info(entry.spell)?;
            let remaining_ms = history.remaining_cooldown(info.id, now);

            let mut total_cooldown_ms =
                player.apply_spell_mod(info.id, SpellModOp::Cooldown, info.recovery_time_ms);
            if cooldown_aura != 0 {
                total_cooldown_ms =
                    total_cooldown_ms.saturating_add(cooldown_aura.saturating_mul(IN_MILLISECONDS as i32));
            }

            let mut category_cooldown_ms = info.category_recovery_time_ms;
            if !info.ignore_category_cooldown_mods {
                category_cooldown_ms =
                    player.apply_spell_mod(info.id, SpellModOp::Cooldown, category_cooldown_ms);
            }

            let clear = !entry.on_hold && remaining_ms > 0;
            trace!(
                player = %player.id(),
                spell = %info.id,
                remaining_ms,
                total_cooldown_ms,
                category_cooldown_ms,
                on_hold = entry.on_hold,
                clear,
                "Planned duel cooldown reset"
            );

            decisions.push(SpellCooldownDecision {
                spell: info.id,
                remaining_ms,
                total_cooldown_ms,
                category_cooldown_ms,
                on_hold: entry.on_hold,
                clear,
            });
        }
        decisions.sort_unstable_by_key(|d| d.spell);

        Ok(ResetPlan { decisions })
    }

    /// Clears `player`'s ledgers according to `plan`.
    ///
    /// The selective pass lifts planned spells, then every remaining entry
    /// (on-hold ones included) is dropped, then the pet's ledger is emptied.
    pub fn apply(&self, plan: &ResetPlan, player: &mut Player) -> CooldownResetReport {
        let history = player.spell_history_mut();
        let cleared = history.reset_cooldowns(|entry| plan.clears(entry.spell), false);
        let baseline_cleared = history.reset_all_cooldowns();

        let pet_cleared = match player.pet_mut() {
            Some(pet) if self.reset_pet => pet.spell_history_mut().reset_all_cooldowns(),
            _ => 0,
        };

        CooldownResetReport {
            cleared,
            baseline_cleared,
            pet_cleared,
        }
    }

    /// Plans and applies in one step.
    pub fn reset_for_duel_start(
        &self,
        player: &mut Player,
        now: GameTime,
    ) -> Result<CooldownResetReport, InvariantViolation> {
        let plan = self.plan(player, now)?;
        Ok(self.apply(&plan, player))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::{ModifierTable, SpellMod};
    use crate::participant::Pet;
    use crate::spell::SpellInfo;
    use proptest::prelude::*;

    const NOW: GameTime = GameTime::from_secs(10_000);
    const FIREBALL: SpellId = SpellId::new(133);
    const BLINK: SpellId = SpellId::new(1953);
    const ICE_BLOCK: SpellId = SpellId::new(45438);
    const PET_BITE: SpellId = SpellId::new(17253);

    fn spells() -> SpellStore {
        SpellStore::from_spells([
            SpellInfo::new(FIREBALL, "Fireball").with_recovery(0),
            SpellInfo::new(BLINK, "Blink")
                .with_recovery(15_000)
                .with_category(4, 10_000)
                .ignoring_category_mods(),
            SpellInfo::new(ICE_BLOCK, "Ice Block")
                .with_recovery(300_000)
                .with_category(7, 60_000),
            SpellInfo::new(PET_BITE, "Bite").with_recovery(10_000),
        ])
        .expect("unique spells")
    }

    fn mage() -> Player {
        let mut player = Player::new("Mage").with_pet(Pet::new("Water Elemental"));
        let history = player.spell_history_mut();
        history.add_cooldown(FIREBALL, NOW, 0);
        history.add_cooldown(BLINK, NOW, 12_000);
        history.add_on_hold(ICE_BLOCK, NOW, 300_000);
        if let Some(pet) = player.pet_mut() {
            pet.spell_history_mut().add_cooldown(PET_BITE, NOW, 8000);
        }
        player
    }

    #[test]
    fn test_plan_selects_running_cooldowns_only() {
        let store = spells();
        let engine = CooldownResetEngine::new(&store);
        let plan = engine.plan(&mage(), NOW).expect("known spells");

        assert_eq!(plan.decisions().len(), 3);
        assert!(!plan.decision(FIREBALL).expect("fireball").clear);
        assert!(plan.decision(BLINK).expect("blink").clear);

        let ice_block = plan.decision(ICE_BLOCK).expect("ice block");
        assert!(ice_block.on_hold);
        assert!(!ice_block.clear);
    }

    #[test]
    fn test_plan_applies_modifiers() {
        let store = spells();
        let engine = CooldownResetEngine::new(&store);
        let player = mage().with_modifiers(
            ModifierTable::new()
                .with_spell_mod(BLINK, SpellModOp::Cooldown, SpellMod { flat: -2000, pct: 0 })
                .with_spell_mod(ICE_BLOCK, SpellModOp::Cooldown, SpellMod { flat: 0, pct: -20 })
                .with_aura(AuraType::ModCooldown, -1),
        );
        let plan = engine.plan(&player, NOW).expect("known spells");

        let blink = plan.decision(BLINK).expect("blink");
        // 15000 - 2000 flat, then -1s from the aura
        assert_eq!(blink.total_cooldown_ms, 12_000);
        // category ignores modifiers
        assert_eq!(blink.category_cooldown_ms, 10_000);

        let ice_block = plan.decision(ICE_BLOCK).expect("ice block");
        assert_eq!(ice_block.total_cooldown_ms, 239_000);
        assert_eq!(ice_block.category_cooldown_ms, 48_000);
    }

    #[test]
    fn test_reset_clears_everything() {
        let store = spells();
        let engine = CooldownResetEngine::new(&store);
        let mut player = mage();

        let report = engine.reset_for_duel_start(&mut player, NOW).expect("known spells");
        assert_eq!(report.cleared, vec![BLINK]);
        // fireball (zero remaining) and ice block (on hold) fall to the baseline pass
        assert_eq!(report.baseline_cleared, 2);
        assert_eq!(report.pet_cleared, 1);

        assert!(player.spell_history().is_empty());
        assert!(player.pet().is_some_and(|pet| pet.spell_history().is_empty()));
    }

    #[test]
    fn test_pet_reset_can_be_disabled() {
        let store = spells();
        let engine = CooldownResetEngine::new(&store).with_pet_reset(false);
        let mut player = mage();

        let report = engine.reset_for_duel_start(&mut player, NOW).expect("known spells");
        assert_eq!(report.pet_cleared, 0);
        assert!(player
            .pet()
            .is_some_and(|pet| pet.spell_history().has_cooldown(PET_BITE, NOW)));
    }

    #[test]
    fn test_unknown_spell_aborts_before_mutation() {
        let store = spells();
        let engine = CooldownResetEngine::new(&store);
        let mut player = mage();
        player.spell_history_mut().add_cooldown(SpellId::new(999_999), NOW, 5000);

        let err = engine
            .reset_for_duel_start(&mut player, NOW)
            .expect_err("unknown spell");
        assert_eq!(
            err,
            InvariantViolation::UnknownSpell {
                spell: SpellId::new(999_999)
            }
        );
        assert_eq!(player.spell_history().len(), 4);
        assert!(player.pet().is_some_and(|pet| !pet.spell_history().is_empty()));
    }

    #[test]
    fn test_empty_ledger_is_noop() {
        let store = spells();
        let engine = CooldownResetEngine::new(&store);
        let mut player = Player::new("Warrior");
        let report = engine.reset_for_duel_start(&mut player, NOW).expect("nothing to look up");
        assert!(report.is_empty());
    }

    proptest! {
        #[test]
        fn prop_reset_is_idempotent(
            durations in proptest::collection::vec((0u64..600_000, any::<bool>()), 0..4),
            pet_ms in 0u64..60_000,
        ) {
            let store = spells();
            let engine = CooldownResetEngine::new(&store);
            let ids = [FIREBALL, BLINK, ICE_BLOCK, PET_BITE];

            let mut player = Player::new("Rogue").with_pet(Pet::new("Imp"));
            let mut expected = Vec::new();
            for (spell, (ms, on_hold)) in ids.iter().zip(durations) {
                if on_hold {
                    player.spell_history_mut().add_on_hold(*spell, NOW, ms);
                } else {
                    player.spell_history_mut().add_cooldown(*spell, NOW, ms);
                    if ms > 0 {
                        expected.push(*spell);
                    }
                }
            }
            expected.sort_unstable();
            if let Some(pet) = player.pet_mut() {
                pet.spell_history_mut().add_cooldown(PET_BITE, NOW, pet_ms);
            }

            let first = engine.reset_for_duel_start(&mut player, NOW).expect("known spells");
            prop_assert_eq!(first.cleared, expected);
            prop_assert!(player.spell_history().is_empty());

            let second = engine.reset_for_duel_start(&mut player, NOW).expect("known spells");
            prop_assert!(second.is_empty());
            prop_assert!(player.spell_history().is_empty());
            prop_assert!(player.pet().is_some_and(|pet| pet.spell_history().is_empty()));
        }
    }
}
