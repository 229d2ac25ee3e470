//! Inbound duel signal handling.
//!
//! Each participant's session actor calls [`DuelProtocolHandler::handle`]
//! with the signals its client sent. Signals that no longer match the duel
//! (wrong sender, wrong state, stale arbiter, no duel) are dropped without
//! mutation or output; they are normal on a network where messages arrive
//! late or twice.
//!
//! Every transition runs with both participants locked through
//! [`lock_pair`], and the session is re-checked under those locks before
//! anything changes.

use gauntlet_common::{
    Clock, DuelError, GameTime, GauntletResult, InvariantViolation, ObjectGuid, ParticipantId,
};
use parking_lot::MutexGuard;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::DuelConfig;
use crate::cooldown_reset::{CooldownResetEngine, CooldownResetReport};
use crate::events::{DuelEvent, DuelEventBus, DuelResult, EventPermit};
use crate::participant::{lock_pair, ParticipantHandle, ParticipantRegistry, Player};
use crate::session::{CancelResolution, DuelSession, DuelState, IgnoreReason};
use crate::spell::SpellStore;

/// Duel messages a client can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DuelSignal {
    /// Accept a pending challenge, echoing the arbiter GUID
    Accept {
        /// Arbiter the client saw
        arbiter_guid: ObjectGuid,
    },
    /// Cancel a challenge or forfeit a running duel
    Cancel {
        /// Carried by the client; not validated
        guid: ObjectGuid,
    },
}

impl DuelSignal {
    fn name(self) -> &'static str {
        match self {
            Self::Accept { .. } => "accept",
            Self::Cancel { .. } => "cancel",
        }
    }
}

/// What handling a signal did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SignalOutcome {
    /// Dropped; nothing changed and nothing was emitted
    Ignored {
        /// Why
        reason: IgnoreReason,
    },
    /// Challenge accepted
    CountdownStarted {
        /// When combat begins
        start_time: GameTime,
    },
    /// Countdown elapsed and combat is live
    CombatStarted,
    /// A duelist forfeited during combat
    Forfeited {
        /// Remaining duelist
        winner: ParticipantId,
        /// Forfeiting duelist
        loser: ParticipantId,
    },
    /// Called off before combat
    Interrupted,
}

impl SignalOutcome {
    /// Whether the signal was dropped.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored { .. })
    }
}

/// Both duelists and their shared session, resolved but not yet locked.
struct DuelPair {
    sender: ParticipantHandle,
    other: ParticipantHandle,
    session: Arc<DuelSession>,
}

/// Validates duel signals and drives the session state machine.
pub struct DuelProtocolHandler {
    registry: Arc<ParticipantRegistry>,
    spells: Arc<SpellStore>,
    clock: Arc<dyn Clock>,
    events: DuelEventBus,
    config: DuelConfig,
}

impl fmt::Debug for DuelProtocolHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuelProtocolHandler")
            .field("participants", &self.registry.len())
            .field("spells", &self.spells.len())
            .field("pending_events", &self.events.pending_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DuelProtocolHandler {
    /// Creates a handler with its own event bus. `config` is validated first.
    #[must_use]
    pub fn new(
        registry: Arc<ParticipantRegistry>,
        spells: Arc<SpellStore>,
        clock: Arc<dyn Clock>,
        mut config: DuelConfig,
    ) -> Self {
        config.validate();
        let events = DuelEventBus::new(config.event_capacity);
        Self {
            registry,
            spells,
            clock,
            events,
            config,
        }
    }

    /// Outbound events.
    #[must_use]
    pub fn events(&self) -> &DuelEventBus {
        &self.events
    }

    /// Connected players.
    #[must_use]
    pub fn registry(&self) -> &Arc<ParticipantRegistry> {
        &self.registry
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &DuelConfig {
        &self.config
    }

    /// Creates a challenged session between two idle players.
    ///
    /// This is the hook for the challenge-issuing flow; it does no range or
    /// eligibility checks beyond the one-duel-per-player rule.
    pub fn open_challenge(
        &self,
        initiator: ParticipantId,
        opponent: ParticipantId,
        arbiter: ObjectGuid,
    ) -> GauntletResult<Arc<DuelSession>> {
        if initiator == opponent {
            return Err(DuelError::SelfChallenge(initiator));
        }
        let initiator_handle = self.registry.require(initiator)?;
        let opponent_handle = self.registry.require(opponent)?;

        let (mut first, mut second) = lock_pair(&initiator_handle, &opponent_handle);
        for player in [&first, &second] {
            if player.duel().is_some() {
                return Err(DuelError::AlreadyDueling(player.id()));
            }
        }

        let session = Arc::new(DuelSession::new(initiator, opponent, arbiter, self.clock.now()));
        first.attach_duel(Arc::clone(&session));
        second.attach_duel(Arc::clone(&session));

        info!(
            %initiator,
            %opponent,
            %arbiter,
            "Duel challenge opened between {} and {}",
            first.name(),
            second.name()
        );
        Ok(session)
    }

    /// Handles one inbound signal from `sender`.
    ///
    /// Protocol mismatches come back as [`SignalOutcome::Ignored`]. An `Err`
    /// means the duel data is corrupt and the caller must abort.
    pub fn handle(
        &self,
        sender: ParticipantId,
        signal: DuelSignal,
    ) -> Result<SignalOutcome, InvariantViolation> {
        let outcome = match signal {
            DuelSignal::Accept { arbiter_guid } => self.handle_accept(sender, arbiter_guid)?,
            DuelSignal::Cancel { guid } => self.handle_cancel(sender, guid)?,
        };
        if let SignalOutcome::Ignored { reason } = outcome {
            debug!(participant = %sender, signal = signal.name(), %reason, "Ignoring duel signal");
        }
        Ok(outcome)
    }

    /// Accepts the pending challenge of `sender`.
    pub fn handle_accept(
        &self,
        sender: ParticipantId,
        arbiter_guid: ObjectGuid,
    ) -> Result<SignalOutcome, InvariantViolation> {
        let pair = match self.resolve(sender)? {
            Ok(pair) => pair,
            Err(reason) => return Ok(SignalOutcome::Ignored { reason }),
        };
        let (mut me, mut them) = lock_pair(&pair.sender, &pair.other);
        if let Err(reason) = Self::check_attached(&me, &them, &pair.session)? {
            return Ok(SignalOutcome::Ignored { reason });
        }
        if let Err(reason) = pair.session.check_accept(sender, arbiter_guid) {
            return Ok(SignalOutcome::Ignored { reason });
        }

        let needed = if self.config.reset_cooldowns_on_start { 4 } else { 2 };
        let Some(mut permit) = self.events.reserve(needed) else {
            return Ok(SignalOutcome::Ignored {
                reason: IgnoreReason::EventBacklog,
            });
        };
        debug!(accepted_by = %me.id(), challenger = %them.id(), "{} accepted a duel from {}", me.name(), them.name());

        let now = self.clock.now();
        let plans = if self.config.reset_cooldowns_on_start {
            let engine = self.cooldown_engine();
            let mine = engine.plan(&me, now).map_err(Self::fatal)?;
            let theirs = engine.plan(&them, now).map_err(Self::fatal)?;
            Some((mine, theirs))
        } else {
            None
        };

        let start_time = pair.session.start_countdown(now, self.config.countdown_ms);
        info!(
            initiator = %pair.session.initiator(),
            opponent = %pair.session.opponent(),
            %start_time,
            "Duel accepted, countdown started"
        );

        if let Some((mine, theirs)) = plans {
            let engine = self.cooldown_engine();
            let report = engine.apply(&mine, &mut me);
            Self::publish_cooldowns(&mut permit, me.id(), report);
            let report = engine.apply(&theirs, &mut them);
            Self::publish_cooldowns(&mut permit, them.id(), report);
        }

        for participant in [me.id(), them.id()] {
            permit.publish(DuelEvent::DuelCountdown {
                participant,
                countdown_ms: self.config.countdown_ms,
            });
        }

        Ok(SignalOutcome::CountdownStarted { start_time })
    }

    /// Cancels or forfeits the duel of `sender`.
    pub fn handle_cancel(
        &self,
        sender: ParticipantId,
        guid: ObjectGuid,
    ) -> Result<SignalOutcome, InvariantViolation> {
        debug!(participant = %sender, %guid, "Received duel cancel");

        let pair = match self.resolve(sender)? {
            Ok(pair) => pair,
            Err(reason) => return Ok(SignalOutcome::Ignored { reason }),
        };
        let (mut me, mut them) = lock_pair(&pair.sender, &pair.other);
        if let Err(reason) = Self::check_attached(&me, &them, &pair.session)? {
            return Ok(SignalOutcome::Ignored { reason });
        }

        let needed = if pair.session.state() == DuelState::InProgress { 5 } else { 2 };
        let Some(mut permit) = self.events.reserve(needed) else {
            return Ok(SignalOutcome::Ignored {
                reason: IgnoreReason::EventBacklog,
            });
        };

        let resolution = match pair.session.resolve_cancel(sender, self.clock.now()) {
            Ok(resolution) => resolution,
            Err(reason) => return Ok(SignalOutcome::Ignored { reason }),
        };
        me.detach_duel();
        them.detach_duel();

        match resolution {
            CancelResolution::Forfeit { winner, loser } => {
                permit.publish(DuelEvent::CombatStopWithPets { participant: me.id() });
                permit.publish(DuelEvent::CombatStopWithPets { participant: them.id() });
                permit.publish(DuelEvent::CastSpell {
                    caster: me.id(),
                    target: me.id(),
                    spell_id: self.config.submission_spell_id,
                    triggered: true,
                });
                permit.publish(DuelEvent::DuelComplete {
                    participant: winner,
                    result: DuelResult::Won,
                });
                permit.publish(DuelEvent::DuelComplete {
                    participant: loser,
                    result: DuelResult::Lost,
                });
                info!(%winner, %loser, "{} forfeited the duel to {}", me.name(), them.name());
                Ok(SignalOutcome::Forfeited { winner, loser })
            },
            CancelResolution::Interrupted => {
                for participant in [me.id(), them.id()] {
                    permit.publish(DuelEvent::DuelComplete {
                        participant,
                        result: DuelResult::Interrupted,
                    });
                }
                info!(cancelled_by = %sender, "Duel interrupted");
                Ok(SignalOutcome::Interrupted)
            },
        }
    }

    /// Starts combat for the duel of `participant` once its countdown is over.
    ///
    /// Called by the world tick that owns combat timing.
    pub fn begin_combat(&self, participant: ParticipantId) -> Result<SignalOutcome, InvariantViolation> {
        let pair = match self.resolve(participant)? {
            Ok(pair) => pair,
            Err(reason) => return Ok(SignalOutcome::Ignored { reason }),
        };
        let (me, them) = lock_pair(&pair.sender, &pair.other);
        if let Err(reason) = Self::check_attached(&me, &them, &pair.session)? {
            return Ok(SignalOutcome::Ignored { reason });
        }

        match pair.session.begin_combat(self.clock.now()) {
            Ok(()) => {
                info!(
                    initiator = %pair.session.initiator(),
                    opponent = %pair.session.opponent(),
                    "Duel combat started"
                );
                Ok(SignalOutcome::CombatStarted)
            },
            Err(reason) => Ok(SignalOutcome::Ignored { reason }),
        }
    }

    fn cooldown_engine(&self) -> CooldownResetEngine<'_> {
        CooldownResetEngine::new(&self.spells).with_pet_reset(self.config.reset_pet_cooldowns)
    }

    fn publish_cooldowns(permit: &mut EventPermit<'_>, participant: ParticipantId, report: CooldownResetReport) {
        debug!(
            %participant,
            cleared = report.cleared.len(),
            baseline = report.baseline_cleared,
            pet = report.pet_cleared,
            "Reset duel cooldowns"
        );
        permit.publish(DuelEvent::CooldownsCleared {
            participant,
            spells: report.cleared,
            pet_cleared: report.pet_cleared,
        });
    }

    /// Finds the sender's duel and the other side's handle without locking
    /// both players.
    fn resolve(&self, sender: ParticipantId) -> Result<Result<DuelPair, IgnoreReason>, InvariantViolation> {
        let Some(handle) = self.registry.get(sender) else {
            return Ok(Err(IgnoreReason::UnknownParticipant));
        };
        let Some(session) = handle.lock().duel().cloned() else {
            return Ok(Err(IgnoreReason::NoSession));
        };
        let Some(other_id) = session.other_side(sender) else {
            return Ok(Err(IgnoreReason::NotParticipant));
        };
        let Some(other) = self.registry.get(other_id) else {
            return Err(Self::fatal(InvariantViolation::AsymmetricSession {
                participant: sender,
                opponent: other_id,
            }));
        };
        Ok(Ok(DuelPair {
            sender: handle,
            other,
            session,
        }))
    }

    /// Re-checks, under both locks, that the session resolved earlier is
    /// still the one both players hold.
    fn check_attached(
        me: &MutexGuard<'_, Player>,
        them: &MutexGuard<'_, Player>,
        session: &Arc<DuelSession>,
    ) -> Result<Result<(), IgnoreReason>, InvariantViolation> {
        if !me.is_in_duel(session) {
            return Ok(Err(IgnoreReason::SessionChanged));
        }
        if !them.is_in_duel(session) {
            return Err(Self::fatal(InvariantViolation::AsymmetricSession {
                participant: me.id(),
                opponent: them.id(),
            }));
        }
        Ok(Ok(()))
    }

    fn fatal(violation: InvariantViolation) -> InvariantViolation {
        error!(%violation, "Duel invariant violated");
        violation
    }
}
