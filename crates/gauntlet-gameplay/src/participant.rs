//! Duel participants and the registry of connected players.
//!
//! A [`Player`] is owned by its session actor behind a
//! [`ParticipantHandle`]. The duel core only touches the parts listed here:
//! the cooldown ledger, the pet's ledger, the modifier capability and the
//! duel slot.

use dashmap::DashMap;
use gauntlet_common::{DuelError, GauntletResult, ParticipantId, SpellId};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;

use crate::cooldown::SpellHistory;
use crate::modifiers::{AuraType, ModifierTable, SpellModOp, SpellModifierSource};
use crate::session::DuelSession;

/// A player's companion with its own cooldowns.
#[derive(Debug, Clone, Default)]
pub struct Pet {
    /// Display name
    pub name: String,
    history: SpellHistory,
}

impl Pet {
    /// Creates a pet with no cooldowns.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            history: SpellHistory::new(),
        }
    }

    /// Cooldown ledger.
    #[must_use]
    pub fn spell_history(&self) -> &SpellHistory {
        &self.history
    }

    /// Mutable cooldown ledger.
    pub fn spell_history_mut(&mut self) -> &mut SpellHistory {
        &mut self.history
    }
}

/// A connected player as seen by the duel core.
pub struct Player {
    id: ParticipantId,
    name: String,
    history: SpellHistory,
    pet: Option<Pet>,
    modifiers: Box<dyn SpellModifierSource>,
    duel: Option<Arc<DuelSession>>,
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("cooldowns", &self.history.len())
            .field("pet", &self.pet.as_ref().map(|p| p.name.as_str()))
            .field("dueling", &self.duel.is_some())
            .finish()
    }
}

impl Player {
    /// Creates a player with a fresh ID and no modifiers.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ParticipantId::new(),
            name: name.into(),
            history: SpellHistory::new(),
            pet: None,
            modifiers: Box::new(ModifierTable::new()),
            duel: None,
        }
    }

    /// Replaces the modifier capability.
    #[must_use]
    pub fn with_modifiers(mut self, modifiers: impl SpellModifierSource + 'static) -> Self {
        self.modifiers = Box::new(modifiers);
        self
    }

    /// Gives the player a pet.
    #[must_use]
    pub fn with_pet(mut self, pet: Pet) -> Self {
        self.pet = Some(pet);
        self
    }

    /// Participant ID.
    #[must_use]
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cooldown ledger.
    #[must_use]
    pub fn spell_history(&self) -> &SpellHistory {
        &self.history
    }

    /// Mutable cooldown ledger.
    pub fn spell_history_mut(&mut self) -> &mut SpellHistory {
        &mut self.history
    }

    /// Active pet, if any.
    #[must_use]
    pub fn pet(&self) -> Option<&Pet> {
        self.pet.as_ref()
    }

    /// Mutable pet, if any.
    pub fn pet_mut(&mut self) -> Option<&mut Pet> {
        self.pet.as_mut()
    }

    /// Applies this player's modifiers of kind `op` on `spell` to `base`.
    #[must_use]
    pub fn apply_spell_mod(&self, spell: SpellId, op: SpellModOp, base: i32) -> i32 {
        self.modifiers.apply_spell_mod(spell, op, base)
    }

    /// Total of this player's auras of type `aura`.
    #[must_use]
    pub fn total_aura_modifier(&self, aura: AuraType) -> i32 {
        self.modifiers.total_aura_modifier(aura)
    }

    /// The duel this player is part of.
    #[must_use]
    pub fn duel(&self) -> Option<&Arc<DuelSession>> {
        self.duel.as_ref()
    }

    /// Whether this player references exactly `session`.
    #[must_use]
    pub fn is_in_duel(&self, session: &Arc<DuelSession>) -> bool {
        self.duel.as_ref().is_some_and(|d| Arc::ptr_eq(d, session))
    }

    pub(crate) fn attach_duel(&mut self, session: Arc<DuelSession>) {
        self.duel = Some(session);
    }

    pub(crate) fn detach_duel(&mut self) -> Option<Arc<DuelSession>> {
        self.duel.take()
    }
}

/// Shared handle to a player.
///
/// The ID lives outside the lock so lock ordering can be decided without
/// taking it.
#[derive(Debug, Clone)]
pub struct ParticipantHandle {
    id: ParticipantId,
    player: Arc<Mutex<Player>>,
}

impl ParticipantHandle {
    /// Wraps a player.
    #[must_use]
    pub fn new(player: Player) -> Self {
        Self {
            id: player.id(),
            player: Arc::new(Mutex::new(player)),
        }
    }

    /// Participant ID.
    #[must_use]
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Locks the player.
    pub fn lock(&self) -> MutexGuard<'_, Player> {
        self.player.lock()
    }
}

/// Locks two distinct players, lower ID first.
///
/// The guards are returned in argument order. Both duel sides always go
/// through here so two actors submitting signals at once cannot deadlock.
pub fn lock_pair<'a>(
    a: &'a ParticipantHandle,
    b: &'a ParticipantHandle,
) -> (MutexGuard<'a, Player>, MutexGuard<'a, Player>) {
    debug_assert_ne!(a.id(), b.id(), "lock_pair on the same participant");
    if a.id() < b.id() {
        let first = a.lock();
        let second = b.lock();
        (first, second)
    } else {
        let second = b.lock();
        let first = a.lock();
        (first, second)
    }
}

/// Connected players by ID.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    players: DashMap<ParticipantId, ParticipantHandle>,
}

impl ParticipantRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a player and returns its handle.
    pub fn register(&self, player: Player) -> ParticipantHandle {
        let handle = ParticipantHandle::new(player);
        self.players.insert(handle.id(), handle.clone());
        handle
    }

    /// Looks up a handle.
    #[must_use]
    pub fn get(&self, id: ParticipantId) -> Option<ParticipantHandle> {
        self.players.get(&id).map(|entry| entry.value().clone())
    }

    /// Looks up a handle, failing with [`DuelError::UnknownParticipant`].
    pub fn require(&self, id: ParticipantId) -> GauntletResult<ParticipantHandle> {
        self.get(id).ok_or(DuelError::UnknownParticipant(id))
    }

    /// Number of registered players.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether no player is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::SpellMod;
    use std::thread;

    #[test]
    fn test_registry_lookup() {
        let registry = ParticipantRegistry::new();
        let handle = registry.register(Player::new("Arthas"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(handle.id()).map(|h| h.id()), Some(handle.id()));

        let missing = ParticipantId::from_raw(u64::MAX);
        assert_eq!(registry.require(missing).err(), Some(DuelError::UnknownParticipant(missing)));
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_player_modifiers() {
        let spell = SpellId::new(10);
        let player = Player::new("Jaina").with_modifiers(
            ModifierTable::new()
                .with_spell_mod(spell, SpellModOp::Cooldown, SpellMod { flat: -500, pct: 0 })
                .with_aura(AuraType::ModCooldown, -1),
        );
        assert_eq!(player.apply_spell_mod(spell, SpellModOp::Cooldown, 1500), 1000);
        assert_eq!(player.total_aura_modifier(AuraType::ModCooldown), -1);
    }

    #[test]
    fn test_lock_pair_returns_argument_order() {
        let a = ParticipantHandle::new(Player::new("A"));
        let b = ParticipantHandle::new(Player::new("B"));

        let (ga, gb) = lock_pair(&b, &a);
        assert_eq!(ga.id(), b.id());
        assert_eq!(gb.id(), a.id());
    }

    #[test]
    fn test_lock_pair_opposite_orders_do_not_deadlock() {
        let a = ParticipantHandle::new(Player::new("A"));
        let b = ParticipantHandle::new(Player::new("B"));

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let (x, y) = if i % 2 == 0 {
                    (a.clone(), b.clone())
                } else {
                    (b.clone(), a.clone())
                };
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let (mut gx, _gy) = lock_pair(&x, &y);
                        gx.spell_history_mut().reset_all_cooldowns();
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().expect("worker panicked");
        }
    }
}
