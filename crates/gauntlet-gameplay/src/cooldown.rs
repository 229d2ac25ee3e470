//! Per-participant cooldown ledger.

use ahash::AHashMap;
use gauntlet_common::{GameTime, SpellId};
use serde::{Deserialize, Serialize};

/// Cooldown bookkeeping for one spell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownEntry {
    /// Spell on cooldown
    pub spell: SpellId,
    /// When the per-spell cooldown ends
    pub cooldown_end: GameTime,
    /// Cooldown category (0 = none)
    pub category: u32,
    /// When the category cooldown ends
    pub category_end: GameTime,
    /// Held by another game rule until explicitly released
    pub on_hold: bool,
}

impl CooldownEntry {
    /// Milliseconds until both the spell and category cooldown are over.
    #[must_use]
    pub fn remaining(&self, now: GameTime) -> u64 {
        self.cooldown_end.max(self.category_end).millis_since(now)
    }
}

/// Spell cooldown history of a participant or pet.
#[derive(Debug, Clone, Default)]
pub struct SpellHistory {
    cooldowns: AHashMap<SpellId, CooldownEntry>,
}

impl SpellHistory {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a cooldown of `duration_ms` for `spell`.
    pub fn add_cooldown(&mut self, spell: SpellId, now: GameTime, duration_ms: u64) {
        self.add_cooldown_with_category(spell, now, duration_ms, 0, 0);
    }

    /// Starts a per-spell and a category cooldown.
    pub fn add_cooldown_with_category(
        &mut self,
        spell: SpellId,
        now: GameTime,
        duration_ms: u64,
        category: u32,
        category_ms: u64,
    ) {
        self.cooldowns.insert(
            spell,
            CooldownEntry {
                spell,
                cooldown_end: now.add_millis(duration_ms),
                category,
                category_end: now.add_millis(category_ms),
                on_hold: false,
            },
        );
    }

    /// Puts `spell` on hold; it stays unusable until released.
    pub fn add_on_hold(&mut self, spell: SpellId, now: GameTime, duration_ms: u64) {
        self.add_cooldown(spell, now, duration_ms);
        if let Some(entry) = self.cooldowns.get_mut(&spell) {
            entry.on_hold = true;
        }
    }

    /// Looks up the entry for `spell`.
    #[must_use]
    pub fn entry(&self, spell: SpellId) -> Option<&CooldownEntry> {
        self.cooldowns.get(&spell)
    }

    /// Iterates all tracked entries.
    pub fn entries(&self) -> impl Iterator<Item = &CooldownEntry> {
        self.cooldowns.values()
    }

    /// Milliseconds left on `spell`, zero when it is not tracked.
    #[must_use]
    pub fn remaining_cooldown(&self, spell: SpellId, now: GameTime) -> u64 {
        self.cooldowns.get(&spell).map_or(0, |entry| entry.remaining(now))
    }

    /// Whether `spell` still has time left.
    #[must_use]
    pub fn has_cooldown(&self, spell: SpellId, now: GameTime) -> bool {
        self.remaining_cooldown(spell, now) > 0
    }

    /// Removes entries matching `predicate`.
    ///
    /// On-hold entries are never offered to the predicate unless
    /// `clear_on_hold` is set. Returns the cleared spells in ascending order.
    pub fn reset_cooldowns<F>(&mut self, mut predicate: F, clear_on_hold: bool) -> Vec<SpellId>
    where
        F: FnMut(&CooldownEntry) -> bool,
    {
        let mut cleared = Vec::new();
        self.cooldowns.retain(|spell, entry| {
            if entry.on_hold && !clear_on_hold {
                return true;
            }
            if predicate(entry) {
                cleared.push(*spell);
                false
            } else {
                true
            }
        });
        cleared.sort_unstable();
        cleared
    }

    /// Drops every entry, on-hold ones included. Returns how many were dropped.
    pub fn reset_all_cooldowns(&mut self) -> usize {
        let count = self.cooldowns.len();
        self.cooldowns.clear();
        count
    }

    /// Number of tracked entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cooldowns.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cooldowns.is_empty()
    }
}
