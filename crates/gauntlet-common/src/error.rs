//! Error types for Project Gauntlet.

use thiserror::Error;

use crate::ids::{ParticipantId, SpellId};

/// Recoverable errors raised while setting up a duel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DuelError {
    /// A participant tried to duel themselves
    #[error("participant {0} cannot duel itself")]
    SelfChallenge(ParticipantId),

    /// A participant already has an active duel
    #[error("participant {0} is already in a duel")]
    AlreadyDueling(ParticipantId),

    /// Participant is not registered
    #[error("participant not found: {0}")]
    UnknownParticipant(ParticipantId),
}

/// Broken data or logic invariants.
///
/// These never come from client input. Callers must treat them as fatal:
/// log and abort instead of continuing with partially applied state.
#[must_use = "invariant violations must abort the caller"]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A cooldown entry references a spell with no definition
    #[error("cooldown entry references unknown spell {spell}")]
    UnknownSpell {
        /// Spell ID that failed the lookup
        spell: SpellId,
    },

    /// Only one side of a duel references the shared session
    #[error("duel session of {participant} is not referenced by {opponent}")]
    AsymmetricSession {
        /// Participant holding the session
        participant: ParticipantId,
        /// Opponent missing the reference
        opponent: ParticipantId,
    },
}

/// Result type alias for duel setup operations.
pub type GauntletResult<T> = Result<T, DuelError>;
