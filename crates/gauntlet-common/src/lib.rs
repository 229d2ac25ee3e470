//! # Gauntlet Common
//!
//! Common types, utilities, and shared abstractions for Project Gauntlet.
//!
//! This crate provides foundational types used across all Gauntlet subsystems:
//! - ID types (ParticipantId, SpellId, ObjectGuid)
//! - Server time and clocks
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;
pub mod time;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::time::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_participant_id_generation() {
        let id1 = ParticipantId::new();
        let id2 = ParticipantId::new();
        assert_ne!(id1, id2);
        assert!(id1 < id2);
        assert_eq!(ParticipantId::from_raw(id1.raw()), id1);
    }

    #[test]
    fn test_object_guid_empty() {
        assert!(ObjectGuid::EMPTY.is_empty());
        assert!(!ObjectGuid::new(0xF130_0000_0000_0001).is_empty());
        assert_eq!(ObjectGuid::new(255).to_string(), "0x00000000000000FF");
    }

    #[test]
    fn test_game_time_arithmetic() {
        let t = GameTime::from_secs(10);
        assert_eq!(t.as_millis(), 10_000);
        assert_eq!(t.add_millis(3000), GameTime::from_secs(13));
        assert_eq!(t.add(Duration::from_millis(250)).as_millis(), 10_250);
        assert_eq!(GameTime::from_secs(13).millis_since(t), 3000);
        assert_eq!(t.millis_since(GameTime::from_secs(13)), 0);
        assert_eq!(GameTime::from_millis(u64::MAX).add_millis(1).as_millis(), u64::MAX);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(GameTime::from_secs(100));
        assert_eq!(clock.now(), GameTime::from_secs(100));
        clock.advance_millis(1500);
        assert_eq!(clock.now().as_millis(), 101_500);
        clock.set(GameTime::ZERO);
        assert_eq!(clock.now(), GameTime::ZERO);
    }

    #[test]
    fn test_system_clock_is_past_epoch() {
        assert!(SystemClock.now() > GameTime::ZERO);
    }

    #[test]
    fn test_invariant_violation_display() {
        let err = InvariantViolation::UnknownSpell {
            spell: SpellId::new(42),
        };
        assert_eq!(err.to_string(), "cooldown entry references unknown spell Spell-42");

        let err = DuelError::AlreadyDueling(ParticipantId::from_raw(7));
        assert_eq!(err.to_string(), "participant Player-7 is already in a duel");
    }
}
