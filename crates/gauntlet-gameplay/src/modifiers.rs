//! Spell and aura modifiers.
//!
//! The real modifier tables live in the combat model; the duel core only
//! needs to ask a participant "what does this base value become" and "what
//! is the total of this aura". [`ModifierTable`] is the in-memory version
//! used by replays and tests.

use ahash::AHashMap;
use gauntlet_common::SpellId;
use serde::{Deserialize, Serialize};

/// Which spell property a modifier applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpellModOp {
    /// Recovery time
    Cooldown,
}

/// Aura kinds whose totals the duel core reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuraType {
    /// Global cooldown reduction, in seconds (usually negative)
    ModCooldown,
}

/// Capability to apply a participant's modifiers.
pub trait SpellModifierSource: Send + Sync {
    /// Applies every modifier of kind `op` on `spell` to `base`.
    fn apply_spell_mod(&self, spell: SpellId, op: SpellModOp, base: i32) -> i32;

    /// Sum of all active auras of `aura` type.
    fn total_aura_modifier(&self, aura: AuraType) -> i32;
}

/// Flat and percentage modifier for one spell property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellMod {
    /// Added to the base value
    #[serde(default)]
    pub flat: i32,
    /// Percent change applied after the flat part
    #[serde(default)]
    pub pct: i32,
}

/// In-memory modifier table.
#[derive(Debug, Clone, Default)]
pub struct ModifierTable {
    spell_mods: AHashMap<(SpellId, SpellModOp), SpellMod>,
    auras: AHashMap<AuraType, i32>,
}

impl ModifierTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a spell modifier, stacking with any existing one.
    pub fn add_spell_mod(&mut self, spell: SpellId, op: SpellModOp, modifier: SpellMod) {
        let entry = self.spell_mods.entry((spell, op)).or_default();
        entry.flat = entry.flat.saturating_add(modifier.flat);
        entry.pct = entry.pct.saturating_add(modifier.pct);
    }

    /// Adds an aura amount.
    pub fn add_aura(&mut self, aura: AuraType, amount: i32) {
        let total = self.auras.entry(aura).or_insert(0);
        *total = total.saturating_add(amount);
    }

    /// Builder form of [`Self::add_spell_mod`].
    #[must_use]
    pub fn with_spell_mod(mut self, spell: SpellId, op: SpellModOp, modifier: SpellMod) -> Self {
        self.add_spell_mod(spell, op, modifier);
        self
    }

    /// Builder form of [`Self::add_aura`].
    #[must_use]
    pub fn with_aura(mut self, aura: AuraType, amount: i32) -> Self {
        self.add_aura(aura, amount);
        self
    }
}

impl SpellModifierSource for ModifierTable {
    fn apply_spell_mod(&self, spell: SpellId, op: SpellModOp, base: i32) -> i32 {
        match self.spell_mods.get(&(spell, op)) {
            Some(m) => {
                let flat = i64::from(base) + i64::from(m.flat);
                let scaled = flat.saturating_mul(100 + i64::from(m.pct)) / 100;
                scaled.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
            },
            None => base,
        }
    }

    fn total_aura_modifier(&self, aura: AuraType) -> i32 {
        self.auras.get(&aura).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_modifiers_is_identity() {
        let table = ModifierTable::new();
        assert_eq!(table.apply_spell_mod(SpellId::new(1), SpellModOp::Cooldown, 8000), 8000);
        assert_eq!(table.total_aura_modifier(AuraType::ModCooldown), 0);
    }

    #[test]
    fn test_flat_then_pct() {
        let table = ModifierTable::new().with_spell_mod(
            SpellId::new(1),
            SpellModOp::Cooldown,
            SpellMod { flat: -2000, pct: -50 },
        );
        // (10000 - 2000) * 50%
        assert_eq!(table.apply_spell_mod(SpellId::new(1), SpellModOp::Cooldown, 10_000), 4000);
        assert_eq!(table.apply_spell_mod(SpellId::new(2), SpellModOp::Cooldown, 10_000), 10_000);
    }

    #[test]
    fn test_modifiers_stack() {
        let mut table = ModifierTable::new();
        table.add_spell_mod(SpellId::new(3), SpellModOp::Cooldown, SpellMod { flat: -1000, pct: 0 });
        table.add_spell_mod(SpellId::new(3), SpellModOp::Cooldown, SpellMod { flat: -1000, pct: 10 });
        table.add_aura(AuraType::ModCooldown, -2);
        table.add_aura(AuraType::ModCooldown, -1);

        assert_eq!(table.apply_spell_mod(SpellId::new(3), SpellModOp::Cooldown, 5000), 3300);
        assert_eq!(table.total_aura_modifier(AuraType::ModCooldown), -3);
    }

    #[test]
    fn test_stacking_saturates() {
        let spell = SpellId::new(4);
        let mut table = ModifierTable::new();
        for _ in 0..3 {
            table.add_spell_mod(spell, SpellModOp::Cooldown, SpellMod { flat: i32::MAX, pct: i32::MAX });
            table.add_aura(AuraType::ModCooldown, i32::MIN);
        }

        assert_eq!(table.total_aura_modifier(AuraType::ModCooldown), i32::MIN);
        assert_eq!(table.apply_spell_mod(spell, SpellModOp::Cooldown, i32::MAX), i32::MAX);
        assert_eq!(table.apply_spell_mod(spell, SpellModOp::Cooldown, 0), i32::MAX);
    }
}
