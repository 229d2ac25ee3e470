//! ID types for participants, spells, and world objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for participant IDs.
static PARTICIPANT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a duel participant (a connected player).
///
/// The ordering of IDs is used as the canonical lock order when a
/// transition needs both sides of a duel at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(u64);

impl ParticipantId {
    /// Creates a new unique participant ID.
    #[must_use]
    pub fn new() -> Self {
        Self(PARTICIPANT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a participant ID from a raw value (for deserialization).
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player-{}", self.0)
    }
}

/// Identifier of a spell definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpellId(u32);

impl SpellId {
    /// Creates a spell ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SpellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Spell-{}", self.0)
    }
}

/// Opaque world-object GUID as carried by client messages.
///
/// Duels use it for the arbiter (the flag object spawned between the two
/// players); the value is echoed back by the client when accepting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectGuid(u64);

impl ObjectGuid {
    /// The empty GUID.
    pub const EMPTY: Self = Self(0);

    /// Creates a GUID from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw GUID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Checks if this is the empty GUID.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ObjectGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}
