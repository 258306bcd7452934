//! Per-system component storage
//!
//! Each system owns exactly one [`SlotTable`] holding every live component
//! of its declared type. Slots are identified by 1-based [`SlotId`]s that
//! stay stable for the lifetime of the slot and are recycled first-fit
//! after the occupant is destroyed. The table never shrinks: freed slots
//! become tombstones awaiting reuse.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::entity::Entity;
use crate::system::Component;

/// 1-based local identifier of a slot within one [`SlotTable`].
///
/// The value 0 is reserved as [`SlotId::INVALID`] and never denotes a live
/// slot. Ids are only meaningful to the table (and system) that issued
/// them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(u32);

impl SlotId {
    /// The reserved null id. Lookups with it always miss.
    pub const INVALID: SlotId = SlotId(0);

    /// Create a slot id from its raw 1-based value.
    pub const fn new(raw: u32) -> Self {
        SlotId(raw)
    }

    /// Raw 1-based value (0 for [`SlotId::INVALID`]).
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this id can denote a slot at all.
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Slot<C> {
    /// None marks a free slot awaiting reuse.
    payload: Option<C>,
    /// Back-reference to the owning entity, bound once after entity
    /// construction. Weak because the entity holds strong references to
    /// the owning system cell; a strong pointer here would cycle.
    entity: Weak<Entity>,
}

/// Dense, recyclable storage for components of a single type.
///
/// Allocation prefers the first free slot (linear scan) and appends only
/// when no tombstone exists. Destruction is idempotent. A freed id later
/// denotes the slot's *new* occupant, never the old payload.
pub struct SlotTable<C: Component> {
    slots: Vec<Slot<C>>,
    active: usize,
}

impl<C: Component> Default for SlotTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Component> SlotTable<C> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            active: 0,
        }
    }

    /// Construct a payload and place it in the first free slot, appending
    /// a new slot if none is free. Never returns [`SlotId::INVALID`].
    ///
    /// The payload is built before any slot is touched, so a panicking
    /// factory leaves the table unchanged.
    pub fn create(&mut self, factory: impl FnOnce() -> C) -> SlotId {
        let payload = factory();
        self.active += 1;
        if let Some(index) = self.slots.iter().position(|slot| slot.payload.is_none()) {
            self.slots[index].payload = Some(payload);
            SlotId::new(index as u32 + 1)
        } else {
            self.slots.push(Slot {
                payload: Some(payload),
                entity: Weak::new(),
            });
            SlotId::new(self.slots.len() as u32)
        }
    }

    /// Free a slot, dropping its payload and clearing the entity
    /// back-reference. No-op for invalid, out-of-range, or already-free
    /// ids; the active count drops exactly once per occupied-to-free
    /// transition.
    pub fn destroy(&mut self, id: SlotId) {
        let Some(slot) = id.index().and_then(|index| self.slots.get_mut(index)) else {
            return;
        };
        if slot.payload.take().is_some() {
            slot.entity = Weak::new();
            self.active -= 1;
        }
    }

    /// Component in `id`, or None for invalid, out-of-range, or free ids.
    pub fn get(&self, id: SlotId) -> Option<&C> {
        id.index()
            .and_then(|index| self.slots.get(index))
            .and_then(|slot| slot.payload.as_ref())
    }

    /// Mutable counterpart of [`SlotTable::get`].
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut C> {
        id.index()
            .and_then(|index| self.slots.get_mut(index))
            .and_then(|slot| slot.payload.as_mut())
    }

    /// Entity owning the component in `id`, if the slot has been bound.
    pub fn entity(&self, id: SlotId) -> Option<Arc<Entity>> {
        id.index()
            .and_then(|index| self.slots.get(index))
            .and_then(|slot| slot.entity.upgrade())
    }

    /// Bind the owning entity of an occupied slot. Set once per
    /// occupancy; rebinding a bound slot is a programming error.
    pub(crate) fn bind_entity(&mut self, id: SlotId, entity: &Arc<Entity>) {
        let slot = id
            .index()
            .and_then(|index| self.slots.get_mut(index))
            .expect("bind_entity: no such slot");
        debug_assert!(slot.payload.is_some(), "bind_entity on a free slot");
        debug_assert!(
            slot.entity.upgrade().is_none(),
            "slot {id} is already bound to an entity"
        );
        slot.entity = Arc::downgrade(entity);
    }

    /// Visit every occupied slot in storage order (insertion order of the
    /// underlying block, not id order once slots have been recycled).
    ///
    /// The entity is None for a slot that has not been bound yet, e.g. a
    /// component created directly on a system rather than through entity
    /// creation.
    pub fn for_each(&self, mut f: impl FnMut(Option<&Entity>, &C)) {
        for slot in &self.slots {
            if let Some(payload) = slot.payload.as_ref() {
                let entity = slot.entity.upgrade();
                f(entity.as_deref(), payload);
            }
        }
    }

    /// Mutable counterpart of [`SlotTable::for_each`].
    pub fn for_each_mut(&mut self, mut f: impl FnMut(Option<&Entity>, &mut C)) {
        for slot in &mut self.slots {
            if let Some(payload) = slot.payload.as_mut() {
                let entity = slot.entity.upgrade();
                f(entity.as_deref(), payload);
            }
        }
    }

    /// Number of live components.
    pub fn len(&self) -> usize {
        self.active
    }

    /// Whether no component is live.
    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    /// Number of slots ever allocated, freed ones included. Never
    /// shrinks.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
