//! Entity identity and lifecycle state
//!
//! An entity is a heap-shared identity object (`Arc<Entity>`) aggregating
//! one component per participating system. It never moves after
//! construction, so handles held across update cycles stay valid. The
//! lifecycle state only ever increases:
//!
//! ```text
//! None -> Initializing -> Running -> Teardown -> (reclaimed)
//! ```
//!
//! Transitions are driven by the [`World`](crate::World) during
//! `post_update` and fan out to every owning system's
//! `on_entity_state_changed` hook.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard,
};
use smallvec::SmallVec;

use crate::dispatch::ComponentInfo;
use crate::error::{EcsError, Result};
use crate::system::Component;

/// Process-unique entity identifier. Strictly increasing from 1, never
/// reused, even across destruction.
pub type Uid = u64;

/// Lifecycle stage of an entity. States only ever increase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EntityState {
    /// Freshly created; not yet seen by the update cycle.
    None = 0,
    /// Promoted once; becomes running after the next cycle.
    Initializing = 1,
    /// Member of the stable running set.
    Running = 2,
    /// Scheduled for destruction; lives for one more full cycle.
    Teardown = 3,
}

impl EntityState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Initializing,
            2 => Self::Running,
            3 => Self::Teardown,
            _ => unreachable!("invalid entity state tag"),
        }
    }
}

/// An identity aggregating one component per participating system.
///
/// The component list is fixed at creation. Component payloads live in
/// their systems' slot tables; the entity reaches them through per-type
/// dispatch tables, so lookups need no compile-time knowledge of which
/// systems participate.
pub struct Entity {
    uid: Uid,
    state: AtomicU8,
    components: SmallVec<[ComponentInfo; 4]>,
}

impl Entity {
    pub(crate) fn new(uid: Uid, components: SmallVec<[ComponentInfo; 4]>) -> Self {
        Self {
            uid,
            state: AtomicU8::new(EntityState::None as u8),
            components,
        }
    }

    /// Process-unique identifier of this entity.
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EntityState {
        EntityState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Advance the lifecycle state. States must strictly increase;
    /// regression is a programming error, fatal in debug builds.
    pub(crate) fn set_state(&self, state: EntityState) {
        let previous = self.state.swap(state as u8, Ordering::AcqRel);
        debug_assert!(
            previous < state as u8,
            "entity {} state may only increase",
            self.uid
        );
        let _ = previous;
    }

    pub(crate) fn components(&self) -> &[ComponentInfo] {
        &self.components
    }

    fn info<C: Component>(&self) -> Option<&ComponentInfo> {
        let type_id = TypeId::of::<C>();
        self.components
            .iter()
            .find(|info| info.component_type() == type_id)
    }

    /// Whether this entity owns a component of type `C`.
    pub fn has_component<C: Component>(&self) -> bool {
        self.info::<C>().is_some()
    }

    /// Shared access to this entity's `C` component, if present.
    ///
    /// Read-locks the owning system for the lifetime of the guard. Do not
    /// call this for a system's own component type from inside that
    /// system's hooks; use the slot table through `self` there instead.
    pub fn find_component<C: Component>(&self) -> Option<MappedRwLockReadGuard<'_, C>> {
        let info = self.info::<C>()?;
        let guard = info.system().read();
        RwLockReadGuard::try_map(guard, |system| {
            (info.runtime().find_component)(system.as_ref(), info.slot())
                .and_then(|component| component.downcast_ref::<C>())
        })
        .ok()
    }

    /// Exclusive access to this entity's `C` component, if present.
    ///
    /// Write-locks the owning system; the same reentrancy caveat as
    /// [`Entity::find_component`] applies.
    pub fn find_component_mut<C: Component>(&self) -> Option<MappedRwLockWriteGuard<'_, C>> {
        let info = self.info::<C>()?;
        let guard = info.system().write();
        RwLockWriteGuard::try_map(guard, |system| {
            (info.runtime().find_component_mut)(system.as_mut(), info.slot())
                .and_then(|component| component.downcast_mut::<C>())
        })
        .ok()
    }

    /// Raising form of [`Entity::find_component`].
    pub fn component<C: Component>(&self) -> Result<MappedRwLockReadGuard<'_, C>> {
        self.find_component::<C>().ok_or(EcsError::MissingComponent {
            uid: self.uid,
            component: type_name::<C>(),
        })
    }

    /// Raising form of [`Entity::find_component_mut`].
    pub fn component_mut<C: Component>(&self) -> Result<MappedRwLockWriteGuard<'_, C>> {
        self.find_component_mut::<C>()
            .ok_or(EcsError::MissingComponent {
                uid: self.uid,
                component: type_name::<C>(),
            })
    }

    /// The component entries owned by this entity, for diagnostics.
    pub fn component_infos(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.components.iter()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("uid", &self.uid)
            .field("state", &self.state())
            .field(
                "components",
                &self
                    .components
                    .iter()
                    .map(ComponentInfo::component_name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_ordering() {
        assert!(EntityState::None < EntityState::Initializing);
        assert!(EntityState::Initializing < EntityState::Running);
        assert!(EntityState::Running < EntityState::Teardown);
    }

    #[test]
    fn test_state_advances() {
        let entity = Entity::new(1, SmallVec::new());
        assert_eq!(entity.state(), EntityState::None);

        entity.set_state(EntityState::Initializing);
        entity.set_state(EntityState::Running);
        entity.set_state(EntityState::Teardown);
        assert_eq!(entity.state(), EntityState::Teardown);
    }

    #[test]
    #[should_panic(expected = "state may only increase")]
    fn test_state_regression_is_fatal() {
        let entity = Entity::new(1, SmallVec::new());
        entity.set_state(EntityState::Running);
        entity.set_state(EntityState::Initializing);
    }

    #[test]
    fn test_missing_component_lookup() {
        struct Absent;
        impl Component for Absent {}

        let entity = Entity::new(3, SmallVec::new());
        assert!(!entity.has_component::<Absent>());
        assert!(entity.find_component::<Absent>().is_none());
        assert!(matches!(
            entity.component::<Absent>(),
            Err(EcsError::MissingComponent { uid: 3, .. })
        ));
    }
}
