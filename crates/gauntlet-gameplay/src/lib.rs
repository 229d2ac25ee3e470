//! # Gauntlet Gameplay
//!
//! Duel lifecycle core for Project Gauntlet.
//!
//! This crate provides everything between an inbound duel signal and the
//! outbound effects it produces:
//! - Participants, their cooldown ledgers and pets
//! - Spell definitions and per-player cooldown modifiers
//! - The duel session state machine
//! - The duel-start cooldown reset
//! - The protocol handler validating accept/cancel signals
//! - Event bus for outbound effects

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod cooldown;
pub mod cooldown_reset;
pub mod events;
pub mod handler;
pub mod modifiers;
pub mod participant;
pub mod session;
pub mod spell;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::cooldown::*;
    pub use crate::cooldown_reset::*;
    pub use crate::events::*;
    pub use crate::handler::*;
    pub use crate::modifiers::*;
    pub use crate::participant::*;
    pub use crate::session::*;
    pub use crate::spell::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_common::{Clock, GameTime, ManualClock, ObjectGuid, SpellId};
    use std::sync::Arc;

    const SPELLS: &str = r#"
        [[spells]]
        id = 1953
        name = "Blink"
        recovery_time_ms = 15000

        [[spells]]
        id = 45438
        name = "Ice Block"
        recovery_time_ms = 300000
        category = 1
        category_recovery_time_ms = 60000
    "#;

    #[test]
    fn test_full_duel_lifecycle() {
        let start = GameTime::from_secs(3600);
        let clock = Arc::new(ManualClock::new(start));
        let registry = Arc::new(ParticipantRegistry::new());
        let spells = SpellStore::from_toml_str(SPELLS).expect("valid spell table");
        let handler = DuelProtocolHandler::new(
            Arc::clone(&registry),
            Arc::new(spells),
            Arc::clone(&clock) as Arc<dyn Clock>,
            DuelConfig::default(),
        );

        let mut mage = Player::new("Jaina").with_modifiers(
            ModifierTable::new().with_spell_mod(
                SpellId::new(1953),
                SpellModOp::Cooldown,
                SpellMod { flat: -2000, pct: 0 },
            ),
        );
        mage.spell_history_mut().add_cooldown(SpellId::new(1953), start, 9000);
        let mut rogue = Player::new("Garona");
        rogue
            .spell_history_mut()
            .add_cooldown_with_category(SpellId::new(45438), start, 200_000, 1, 40_000);

        let mage = registry.register(mage);
        let rogue = registry.register(rogue);
        let arbiter = ObjectGuid::new(0xF110_0000_0000_00AA);

        let session = handler
            .open_challenge(mage.id(), rogue.id(), arbiter)
            .expect("challenge opens");
        let accepted = handler
            .handle(rogue.id(), DuelSignal::Accept { arbiter_guid: arbiter })
            .expect("no invariant violation");
        assert_eq!(
            accepted,
            SignalOutcome::CountdownStarted {
                start_time: start.add_millis(3000)
            }
        );
        assert!(mage.lock().spell_history().is_empty());
        assert!(rogue.lock().spell_history().is_empty());

        clock.advance_millis(3000);
        handler.begin_combat(rogue.id()).expect("no invariant violation");
        assert_eq!(session.state(), DuelState::InProgress);

        clock.advance_millis(20_000);
        let ended = handler
            .handle(rogue.id(), DuelSignal::Cancel { guid: ObjectGuid::EMPTY })
            .expect("no invariant violation");
        assert_eq!(
            ended,
            SignalOutcome::Forfeited {
                winner: mage.id(),
                loser: rogue.id()
            }
        );
        assert_eq!(
            session.outcome(),
            Some(DuelOutcome::Victory {
                winner: mage.id(),
                loser: rogue.id(),
                ended_at: start.add_millis(23_000),
            })
        );

        let events = handler.events().drain();
        assert!(events.contains(&DuelEvent::DuelComplete {
            participant: mage.id(),
            result: DuelResult::Won,
        }));
        assert!(events.contains(&DuelEvent::CastSpell {
            caster: rogue.id(),
            target: rogue.id(),
            spell_id: SUBMISSION_SPELL_ID,
            triggered: true,
        }));
    }

    #[test]
    fn test_signal_json_shape() {
        let signal: DuelSignal =
            serde_json::from_str(r#"{"kind":"accept","arbiter_guid":42}"#).expect("valid signal");
        assert_eq!(
            signal,
            DuelSignal::Accept {
                arbiter_guid: ObjectGuid::new(42)
            }
        );
    }
}
