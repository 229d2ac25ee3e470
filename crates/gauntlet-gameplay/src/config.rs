//! Duel configuration.
//!
//! Usually embedded as the `[duel]` table of the engine config.

use gauntlet_common::SpellId;
use serde::{Deserialize, Serialize};

/// Default countdown between accept and combat.
pub const DEFAULT_COUNTDOWN_MS: u64 = 3000;

/// Longest countdown `validate` allows.
pub const MAX_COUNTDOWN_MS: u64 = 60_000;

/// "Beg" emote spell cast on a participant who forfeits.
pub const SUBMISSION_SPELL_ID: SpellId = SpellId::new(7267);

/// Duel tuning parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuelConfig {
    /// Delay between accept and combat start, in milliseconds
    pub countdown_ms: u64,
    /// Spell cast on the forfeiting participant
    pub submission_spell_id: SpellId,
    /// Clear both duelists' cooldowns when the countdown starts
    pub reset_cooldowns_on_start: bool,
    /// Also clear pet cooldowns
    pub reset_pet_cooldowns: bool,
    /// Capacity of the outbound event bus
    pub event_capacity: usize,
}

impl Default for DuelConfig {
    fn default() -> Self {
        Self {
            countdown_ms: DEFAULT_COUNTDOWN_MS,
            submission_spell_id: SUBMISSION_SPELL_ID,
            reset_cooldowns_on_start: true,
            reset_pet_cooldowns: true,
            event_capacity: 1024,
        }
    }
}

impl DuelConfig {
    /// Clamp values to sensible ranges.
    pub fn validate(&mut self) {
        self.countdown_ms = self.countdown_ms.min(MAX_COUNTDOWN_MS);
        self.event_capacity = self.event_capacity.clamp(16, 1 << 20);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DuelConfig::default();
        assert_eq!(config.countdown_ms, 3000);
        assert_eq!(config.submission_spell_id, SpellId::new(7267));
        assert!(config.reset_cooldowns_on_start);
        assert!(config.reset_pet_cooldowns);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: DuelConfig =
            toml::from_str("countdown_ms = 5000\nreset_pet_cooldowns = false\n").expect("valid toml");
        assert_eq!(config.countdown_ms, 5000);
        assert!(!config.reset_pet_cooldowns);
        assert!(config.reset_cooldowns_on_start);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config: DuelConfig =
            toml::from_str("countdown_ms = 999999\nevent_capacity = 0\n").expect("valid toml");
        config.validate();
        assert_eq!(config.countdown_ms, MAX_COUNTDOWN_MS);
        assert_eq!(config.event_capacity, 16);
    }
}
