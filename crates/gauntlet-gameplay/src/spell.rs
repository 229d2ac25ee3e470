//! Spell metadata store.
//!
//! Only the fields the duel core reads are modelled: recovery times,
//! category grouping and the category-mod attribute.

use ahash::AHashMap;
use gauntlet_common::{InvariantViolation, SpellId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Spell store loading errors.
#[derive(Debug, Error)]
pub enum SpellStoreError {
    /// TOML parse failure
    #[error("failed to parse spell table: {0}")]
    Parse(#[from] toml::de::Error),

    /// The same spell ID appears twice
    #[error("duplicate spell definition: {0}")]
    Duplicate(SpellId),
}

/// Static definition of a spell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellInfo {
    /// Spell ID
    pub id: SpellId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Base per-spell recovery time in milliseconds
    #[serde(default)]
    pub recovery_time_ms: i32,
    /// Cooldown category (0 = none)
    #[serde(default)]
    pub category: u32,
    /// Base category recovery time in milliseconds
    #[serde(default)]
    pub category_recovery_time_ms: i32,
    /// Cooldown modifiers are not applied to the category recovery time
    #[serde(default)]
    pub ignore_category_cooldown_mods: bool,
}

impl SpellInfo {
    /// Creates a spell with no recovery time.
    #[must_use]
    pub fn new(id: SpellId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            recovery_time_ms: 0,
            category: 0,
            category_recovery_time_ms: 0,
            ignore_category_cooldown_mods: false,
        }
    }

    /// Sets the per-spell recovery time.
    #[must_use]
    pub fn with_recovery(mut self, ms: i32) -> Self {
        self.recovery_time_ms = ms;
        self
    }

    /// Sets the category and its recovery time.
    #[must_use]
    pub fn with_category(mut self, category: u32, ms: i32) -> Self {
        self.category = category;
        self.category_recovery_time_ms = ms;
        self
    }

    /// Marks the spell as ignoring category cooldown modifiers.
    #[must_use]
    pub fn ignoring_category_mods(mut self) -> Self {
        self.ignore_category_cooldown_mods = true;
        self
    }
}

#[derive(Deserialize)]
struct SpellTable {
    #[serde(default)]
    spells: Vec<SpellInfo>,
}

/// Lookup table of spell definitions.
#[derive(Debug, Clone, Default)]
pub struct SpellStore {
    spells: AHashMap<SpellId, SpellInfo>,
}

impl SpellStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from definitions, rejecting duplicate IDs.
    pub fn from_spells(spells: impl IntoIterator<Item = SpellInfo>) -> Result<Self, SpellStoreError> {
        let mut store = Self::new();
        for spell in spells {
            if store.spells.contains_key(&spell.id) {
                return Err(SpellStoreError::Duplicate(spell.id));
            }
            store.insert(spell);
        }
        Ok(store)
    }

    /// Parses a `[[spells]]` TOML table.
    pub fn from_toml_str(contents: &str) -> Result<Self, SpellStoreError> {
        let table: SpellTable = toml::from_str(contents)?;
        Self::from_spells(table.spells)
    }

    /// Inserts or replaces a definition.
    pub fn insert(&mut self, spell: SpellInfo) {
        self.spells.insert(spell.id, spell);
    }

    /// Looks up a definition.
    #[must_use]
    pub fn get(&self, id: SpellId) -> Option<&SpellInfo> {
        self.spells.get(&id)
    }

    /// Looks up a definition that must exist.
    ///
    /// Every spell referenced by a cooldown ledger has a definition in
    /// correct data, so a miss is reported as an [`InvariantViolation`].
    pub fn assert_spell_info(&self, id: SpellId) -> Result<&SpellInfo, InvariantViolation> {
        self.spells
            .get(&id)
            .ok_or(InvariantViolation::UnknownSpell { spell: id })
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spells.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spells.is_empty()
    }
}
