//! Outbound duel effects.
//!
//! The duel core never talks to clients or to the combat model directly.
//! Every effect is published on a [`DuelEventBus`] and drained by the
//! session/presentation layer.

use crossbeam_channel::{bounded, Receiver, Sender};
use gauntlet_common::{ParticipantId, SpellId};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

/// Per-recipient duel result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuelResult {
    /// The recipient won
    Won,
    /// The recipient forfeited
    Lost,
    /// The duel was called off
    Interrupted,
}

/// Effects emitted by the duel core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DuelEvent {
    /// Start the client-side countdown
    DuelCountdown {
        /// Recipient
        participant: ParticipantId,
        /// Countdown length in milliseconds
        countdown_ms: u64,
    },
    /// Cooldowns were lifted for the duel
    CooldownsCleared {
        /// Recipient
        participant: ParticipantId,
        /// Spells lifted by the selective pass
        spells: Vec<SpellId>,
        /// Pet cooldowns dropped
        pet_cleared: usize,
    },
    /// Stop combat for a participant and its pets
    CombatStopWithPets {
        /// Participant to pacify
        participant: ParticipantId,
    },
    /// Cast a spell
    CastSpell {
        /// Caster
        caster: ParticipantId,
        /// Target
        target: ParticipantId,
        /// Spell to cast
        spell_id: SpellId,
        /// Cast instantly, ignoring costs and cast time
        triggered: bool,
    },
    /// The duel ended for a participant
    DuelComplete {
        /// Recipient
        participant: ParticipantId,
        /// Result from the recipient's point of view
        result: DuelResult,
    },
}

impl DuelEvent {
    /// The participant the event is addressed to.
    #[must_use]
    pub fn recipient(&self) -> ParticipantId {
        match self {
            Self::DuelCountdown { participant, .. }
            | Self::CooldownsCleared { participant, .. }
            | Self::CombatStopWithPets { participant }
            | Self::DuelComplete { participant, .. } => *participant,
            Self::CastSpell { caster, .. } => *caster,
        }
    }
}

/// Bounded channel of outbound duel events.
///
/// Publishing goes through [`DuelEventBus::reserve`]: a transition claims
/// room for all of its effects before it commits, so a committed transition
/// never loses an effect to a full channel.
#[derive(Debug, Clone)]
pub struct DuelEventBus {
    sender: Sender<DuelEvent>,
    receiver: Receiver<DuelEvent>,
    capacity: usize,
    publish_lock: Arc<Mutex<()>>,
}

/// Room for a fixed number of events on a [`DuelEventBus`].
///
/// Other publishers wait while a permit is alive; draining can only add
/// room, so every reserved slot stays free until used.
#[derive(Debug)]
pub struct EventPermit<'a> {
    sender: &'a Sender<DuelEvent>,
    remaining: usize,
    _guard: MutexGuard<'a, ()>,
}

impl EventPermit<'_> {
    /// Publishes one reserved event.
    pub fn publish(&mut self, event: DuelEvent) {
        debug_assert!(self.remaining > 0, "published more events than reserved");
        self.remaining = self.remaining.saturating_sub(1);
        if let Err(err) = self.sender.try_send(event) {
            error!(event = ?err.into_inner(), "Reserved duel event slot was not available");
        }
    }

    /// Reserved slots not used yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl Default for DuelEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl DuelEventBus {
    /// Creates a bus holding up to `capacity` undrained events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
            publish_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Reserves room for `count` events, or `None` if the consumer is too
    /// far behind.
    pub fn reserve(&self, count: usize) -> Option<EventPermit<'_>> {
        let guard = self.publish_lock.lock();
        let free = self.capacity.saturating_sub(self.sender.len());
        if free < count {
            warn!(needed = count, free, "Duel event bus backlogged");
            return None;
        }
        Some(EventPermit {
            sender: &self.sender,
            remaining: count,
            _guard: guard,
        })
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<DuelEvent> {
        self.receiver.try_iter().collect()
    }

    /// Number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_drain() {
        let bus = DuelEventBus::new(8);
        let p = ParticipantId::from_raw(1);
        {
            let mut permit = bus.reserve(2).expect("room for two");
            permit.publish(DuelEvent::DuelCountdown {
                participant: p,
                countdown_ms: 3000,
            });
            permit.publish(DuelEvent::CombatStopWithPets { participant: p });
            assert_eq!(permit.remaining(), 0);
        }
        assert_eq!(bus.pending_count(), 2);

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.recipient() == p));
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_reserve_refuses_when_backlogged() {
        let bus = DuelEventBus::new(3);
        let p = ParticipantId::from_raw(1);
        let mut permit = bus.reserve(2).expect("room for two");
        permit.publish(DuelEvent::CombatStopWithPets { participant: p });
        permit.publish(DuelEvent::CombatStopWithPets { participant: p });
        drop(permit);

        assert!(bus.reserve(2).is_none());
        assert_eq!(bus.pending_count(), 2);
        assert!(bus.reserve(1).is_some());

        bus.drain();
        assert!(bus.reserve(3).is_some());
        assert!(bus.reserve(4).is_none());
    }

    #[test]
    fn test_clones_share_the_reservation_lock() {
        let bus = DuelEventBus::new(4);
        let other = bus.clone();
        let p = ParticipantId::from_raw(1);

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let bus = other.clone();
                std::thread::spawn(move || {
                    bus.reserve(2).map(|mut permit| {
                        permit.publish(DuelEvent::CombatStopWithPets { participant: p });
                        permit.publish(DuelEvent::CombatStopWithPets { participant: p });
                    })
                })
            })
            .collect();
        let granted = workers
            .into_iter()
            .map(|w| w.join().expect("worker panicked"))
            .filter(Option::is_some)
            .count();

        assert_eq!(granted, 2);
        assert_eq!(bus.drain().len(), 4);
    }

    #[test]
    fn test_event_json_shape() {
        let event = DuelEvent::DuelComplete {
            participant: ParticipantId::from_raw(4),
            result: DuelResult::Won,
        };
        let json = serde_json::to_string(&event).expect("serializable");
        assert_eq!(json, r#"{"event":"duel_complete","participant":4,"result":"won"}"#);
    }
}
