//! Duel session state machine.
//!
//! One [`DuelSession`] is shared by both participants through an `Arc`.
//! Its progress sits behind its own lock, but every mutating call is made
//! while the caller already holds both participants (see
//! [`crate::participant::lock_pair`]), so the two sides can never observe
//! different states.

use gauntlet_common::{GameTime, ObjectGuid, ParticipantId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuelState {
    /// Challenge issued, waiting for the opponent
    Challenged,
    /// Accepted, combat starts at the session start time
    Countdown,
    /// Combat is live
    InProgress,
    /// Resolved with a winner
    Completed,
    /// Called off before or during the countdown
    Interrupted,
}

impl DuelState {
    /// Whether the duel has ended.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Interrupted)
    }
}

impl fmt::Display for DuelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Challenged => "challenged",
            Self::Countdown => "countdown",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

/// Why a signal was dropped without effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Sender is not registered
    UnknownParticipant,
    /// Sender has no duel
    NoSession,
    /// Sender is not one of the two duelists
    NotParticipant,
    /// The initiator cannot accept its own challenge
    SenderIsInitiator,
    /// The duel is not in a state that accepts this signal
    WrongState(DuelState),
    /// The accept echoed a different arbiter
    ArbiterMismatch,
    /// Combat start time has not been reached
    CountdownRunning,
    /// The duel already ended
    AlreadyCompleted,
    /// The sender's duel changed while the signal was in flight
    SessionChanged,
    /// The outbound event bus cannot take the transition's effects yet
    EventBacklog,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownParticipant => f.write_str("unknown participant"),
            Self::NoSession => f.write_str("no duel"),
            Self::NotParticipant => f.write_str("not a duelist"),
            Self::SenderIsInitiator => f.write_str("sender is the initiator"),
            Self::WrongState(state) => write!(f, "duel is {state}"),
            Self::ArbiterMismatch => f.write_str("arbiter mismatch"),
            Self::CountdownRunning => f.write_str("countdown still running"),
            Self::AlreadyCompleted => f.write_str("duel already completed"),
            Self::SessionChanged => f.write_str("duel changed"),
            Self::EventBacklog => f.write_str("event bus backlogged"),
        }
    }
}

/// Final result recorded on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DuelOutcome {
    /// One side forfeited
    Victory {
        /// Remaining duelist
        winner: ParticipantId,
        /// Forfeiting duelist
        loser: ParticipantId,
        /// Resolution time
        ended_at: GameTime,
    },
    /// Called off before combat
    Interrupted {
        /// Who sent the cancel
        cancelled_by: ParticipantId,
        /// Resolution time
        ended_at: GameTime,
    },
}

/// How a cancel resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelResolution {
    /// Cancel during combat
    Forfeit {
        /// Remaining duelist
        winner: ParticipantId,
        /// Cancelling duelist
        loser: ParticipantId,
    },
    /// Cancel before combat
    Interrupted,
}

#[derive(Debug)]
struct DuelProgress {
    state: DuelState,
    start_time: Option<GameTime>,
    outcome: Option<DuelOutcome>,
}

/// One duel pairing, shared by both participants.
#[derive(Debug)]
pub struct DuelSession {
    initiator: ParticipantId,
    opponent: ParticipantId,
    arbiter: ObjectGuid,
    challenged_at: GameTime,
    progress: Mutex<DuelProgress>,
}

impl DuelSession {
    pub(crate) fn new(
        initiator: ParticipantId,
        opponent: ParticipantId,
        arbiter: ObjectGuid,
        challenged_at: GameTime,
    ) -> Self {
        debug_assert_ne!(initiator, opponent);
        Self {
            initiator,
            opponent,
            arbiter,
            challenged_at,
            progress: Mutex::new(DuelProgress {
                state: DuelState::Challenged,
                start_time: None,
                outcome: None,
            }),
        }
    }

    /// Who issued the challenge.
    #[must_use]
    pub fn initiator(&self) -> ParticipantId {
        self.initiator
    }

    /// Who was challenged.
    #[must_use]
    pub fn opponent(&self) -> ParticipantId {
        self.opponent
    }

    /// Arbiter GUID the accept must echo.
    #[must_use]
    pub fn arbiter(&self) -> ObjectGuid {
        self.arbiter
    }

    /// When the challenge was issued.
    #[must_use]
    pub fn challenged_at(&self) -> GameTime {
        self.challenged_at
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DuelState {
        self.progress.lock().state
    }

    /// When combat starts; set once the challenge is accepted.
    #[must_use]
    pub fn start_time(&self) -> Option<GameTime> {
        self.progress.lock().start_time
    }

    /// Final result once the duel has ended.
    #[must_use]
    pub fn outcome(&self) -> Option<DuelOutcome> {
        self.progress.lock().outcome
    }

    /// The other duelist, or `None` if `participant` is not in this duel.
    #[must_use]
    pub fn other_side(&self, participant: ParticipantId) -> Option<ParticipantId> {
        if participant == self.initiator {
            Some(self.opponent)
        } else if participant == self.opponent {
            Some(self.initiator)
        } else {
            None
        }
    }

    /// Checks whether `sender` may accept with `arbiter`. Does not mutate.
    pub fn check_accept(&self, sender: ParticipantId, arbiter: ObjectGuid) -> Result<(), IgnoreReason> {
        if self.other_side(sender).is_none() {
            return Err(IgnoreReason::NotParticipant);
        }
        if sender == self.initiator {
            return Err(IgnoreReason::SenderIsInitiator);
        }
        let state = self.state();
        if state != DuelState::Challenged {
            return Err(IgnoreReason::WrongState(state));
        }
        if arbiter != self.arbiter {
            return Err(IgnoreReason::ArbiterMismatch);
        }
        Ok(())
    }

    /// Moves to [`DuelState::Countdown`] with combat starting `countdown_ms`
    /// after `now`. Only valid after a successful [`Self::check_accept`].
    pub(crate) fn start_countdown(&self, now: GameTime, countdown_ms: u64) -> GameTime {
        let mut progress = self.progress.lock();
        debug_assert_eq!(progress.state, DuelState::Challenged);
        let start_time = now.add_millis(countdown_ms);
        progress.start_time = Some(start_time);
        progress.state = DuelState::Countdown;
        start_time
    }

    /// Moves from countdown to combat once `now` reaches the start time.
    pub(crate) fn begin_combat(&self, now: GameTime) -> Result<(), IgnoreReason> {
        let mut progress = self.progress.lock();
        if progress.state != DuelState::Countdown {
            return Err(IgnoreReason::WrongState(progress.state));
        }
        match progress.start_time {
            Some(start) if now >= start => {
                progress.state = DuelState::InProgress;
                Ok(())
            },
            _ => Err(IgnoreReason::CountdownRunning),
        }
    }

    /// Resolves a cancel sent by `canceller`.
    ///
    /// During combat the canceller forfeits; before combat the duel is
    /// interrupted. The outcome is recorded on the session.
    pub(crate) fn resolve_cancel(
        &self,
        canceller: ParticipantId,
        now: GameTime,
    ) -> Result<CancelResolution, IgnoreReason> {
        let Some(other) = self.other_side(canceller) else {
            return Err(IgnoreReason::NotParticipant);
        };
        let mut progress = self.progress.lock();
        match progress.state {
            DuelState::Completed | DuelState::Interrupted => Err(IgnoreReason::AlreadyCompleted),
            DuelState::InProgress => {
                progress.state = DuelState::Completed;
                progress.outcome = Some(DuelOutcome::Victory {
                    winner: other,
                    loser: canceller,
                    ended_at: now,
                });
                Ok(CancelResolution::Forfeit {
                    winner: other,
                    loser: canceller,
                })
            },
            DuelState::Challenged | DuelState::Countdown => {
                progress.state = DuelState::Interrupted;
                progress.outcome = Some(DuelOutcome::Interrupted {
                    cancelled_by: canceller,
                    ended_at: now,
                });
                Ok(CancelResolution::Interrupted)
            },
        }
    }
}
