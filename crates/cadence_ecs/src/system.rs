//! System trait — the user extension point
//!
//! A system is the sole owner and allocator of components of one declared
//! type. Implementors hold a [`SlotTable`] and expose it through the two
//! accessor methods; everything else is provided.
//!
//! # Example
//!
//! ```rust,ignore
//! #[derive(Default)]
//! struct Health {
//!     current: f32,
//! }
//!
//! impl Component for Health {}
//!
//! #[derive(Default)]
//! struct HealthSystem {
//!     table: SlotTable<Health>,
//! }
//!
//! impl System for HealthSystem {
//!     type Component = Health;
//!
//!     fn table(&self) -> &SlotTable<Health> {
//!         &self.table
//!     }
//!
//!     fn table_mut(&mut self) -> &mut SlotTable<Health> {
//!         &mut self.table
//!     }
//!
//!     fn update(&mut self, delta: f32) {
//!         self.table.for_each_mut(|_, health| health.current -= delta);
//!     }
//! }
//! ```

use std::any::type_name;

use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::storage::{SlotId, SlotTable};

/// Trait for all components
///
/// Components are plain data payloads associated with exactly one system.
/// World-managed components additionally need [`Default`] so entity
/// creation can construct them.
pub trait Component: Send + Sync + 'static {}

/// Trait for systems owning and updating one component type.
///
/// The world calls the three update hooks once per cycle, in registration
/// order: every system's `pre_update` completes before any system's
/// `update` begins, and likewise for `post_update`.
pub trait System: Send + Sync + 'static {
    /// The component type owned by this system.
    type Component: Component;

    /// The component table owned by this system.
    fn table(&self) -> &SlotTable<Self::Component>;

    /// Mutable access to the component table.
    fn table_mut(&mut self) -> &mut SlotTable<Self::Component>;

    /// Called first each cycle.
    fn pre_update(&mut self) {}

    /// Called second each cycle with the tick delta.
    fn update(&mut self, _delta: f32) {}

    /// Called last each cycle, before the world advances entity queues.
    fn post_update(&mut self) {}

    /// Called whenever the entity owning `slot` changes lifecycle state.
    ///
    /// This is the only notification channel for component-side setup and
    /// teardown: one-time initialization belongs in the
    /// [`Initializing`](crate::EntityState::Initializing) transition,
    /// cleanup in [`Teardown`](crate::EntityState::Teardown) — by the
    /// next cycle the component is gone.
    fn on_entity_state_changed(&mut self, _slot: SlotId, _entity: &Entity) {}

    /// System name for diagnostics.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    // === Component API (provided) ===

    /// Allocate a default-constructed component, returning its local id.
    fn create_component(&mut self) -> SlotId
    where
        Self::Component: Default,
    {
        self.table_mut().create(Self::Component::default)
    }

    /// Allocate a component built by `factory`.
    fn create_component_with(&mut self, factory: impl FnOnce() -> Self::Component) -> SlotId
    where
        Self: Sized,
    {
        self.table_mut().create(factory)
    }

    /// Destroy a component. Idempotent; unknown ids are ignored.
    fn destroy_component(&mut self, id: SlotId) {
        self.table_mut().destroy(id);
    }

    /// Whether `id` denotes a live component.
    fn has_component(&self, id: SlotId) -> bool {
        self.table().get(id).is_some()
    }

    /// Component in `id`, or None.
    fn find_component(&self, id: SlotId) -> Option<&Self::Component> {
        self.table().get(id)
    }

    /// Mutable component in `id`, or None.
    fn find_component_mut(&mut self, id: SlotId) -> Option<&mut Self::Component> {
        self.table_mut().get_mut(id)
    }

    /// Raising form of [`System::find_component`].
    fn component(&self, id: SlotId) -> Result<&Self::Component> {
        self.table().get(id).ok_or(EcsError::ComponentNotFound {
            component: type_name::<Self::Component>(),
            slot: id,
        })
    }

    /// Raising form of [`System::find_component_mut`].
    fn component_mut(&mut self, id: SlotId) -> Result<&mut Self::Component> {
        self.table_mut()
            .get_mut(id)
            .ok_or(EcsError::ComponentNotFound {
                component: type_name::<Self::Component>(),
                slot: id,
            })
    }

    /// Number of live components.
    fn len(&self) -> usize {
        self.table().len()
    }

    /// Whether no component is live.
    fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Visit every live component in storage order. Intended for the
    /// update-family hook overrides.
    fn for_each_component(&self, f: impl FnMut(Option<&Entity>, &Self::Component))
    where
        Self: Sized,
    {
        self.table().for_each(f);
    }

    /// Mutable counterpart of [`System::for_each_component`].
    fn for_each_component_mut(&mut self, f: impl FnMut(Option<&Entity>, &mut Self::Component))
    where
        Self: Sized,
    {
        self.table_mut().for_each_mut(f);
    }
}
