//! Type-erased system dispatch
//!
//! The world stores systems behind `dyn` so it can drive heterogeneous
//! system types through one update loop. Per-component operations that
//! need the concrete type (allocation, slot lookup, entity binding) go
//! through a [`ComponentRuntimeInfo`] table of plain function pointers,
//! monomorphized once per system type at registration and shared by every
//! component entry that system issues.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entity::Entity;
use crate::storage::SlotId;
use crate::system::System;

/// Object-safe view of a [`System`], used by the world's update loop.
///
/// Blanket-implemented for every `System`; user code never implements
/// this directly.
pub trait ErasedSystem: Send + Sync + 'static {
    fn pre_update(&mut self);
    fn update(&mut self, delta: f32);
    fn post_update(&mut self);
    fn name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<S: System> ErasedSystem for S {
    fn pre_update(&mut self) {
        System::pre_update(self);
    }

    fn update(&mut self, delta: f32) {
        System::update(self, delta);
    }

    fn post_update(&mut self) {
        System::post_update(self);
    }

    fn name(&self) -> &'static str {
        System::name(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Shared, lock-guarded storage cell for one registered system.
pub(crate) type SystemCell = Arc<RwLock<Box<dyn ErasedSystem>>>;

fn concrete<S: System>(system: &dyn ErasedSystem) -> &S {
    system
        .as_any()
        .downcast_ref::<S>()
        .expect("dispatch table applied to a foreign system type")
}

fn concrete_mut<S: System>(system: &mut dyn ErasedSystem) -> &mut S {
    system
        .as_any_mut()
        .downcast_mut::<S>()
        .expect("dispatch table applied to a foreign system type")
}

fn create_erased<S>(system: &mut dyn ErasedSystem) -> SlotId
where
    S: System,
    S::Component: Default,
{
    concrete_mut::<S>(system)
        .table_mut()
        .create(S::Component::default)
}

fn destroy_erased<S: System>(system: &mut dyn ErasedSystem, slot: SlotId) {
    concrete_mut::<S>(system).table_mut().destroy(slot);
}

fn bind_entity_erased<S: System>(system: &mut dyn ErasedSystem, slot: SlotId, entity: &Arc<Entity>) {
    concrete_mut::<S>(system).table_mut().bind_entity(slot, entity);
}

fn notify_erased<S: System>(system: &mut dyn ErasedSystem, slot: SlotId, entity: &Entity) {
    concrete_mut::<S>(system).on_entity_state_changed(slot, entity);
}

fn find_component_erased<S: System>(
    system: &dyn ErasedSystem,
    slot: SlotId,
) -> Option<&dyn Any> {
    concrete::<S>(system)
        .table()
        .get(slot)
        .map(|component| component as &dyn Any)
}

fn find_component_mut_erased<S: System>(
    system: &mut dyn ErasedSystem,
    slot: SlotId,
) -> Option<&mut dyn Any> {
    concrete_mut::<S>(system)
        .table_mut()
        .get_mut(slot)
        .map(|component| component as &mut dyn Any)
}

fn table_erased<S: System>(system: &dyn ErasedSystem) -> &dyn Any {
    concrete::<S>(system).table()
}

fn table_mut_erased<S: System>(system: &mut dyn ErasedSystem) -> &mut dyn Any {
    concrete_mut::<S>(system).table_mut()
}

/// Dispatch table for one (system type, component type) pairing.
///
/// All pointers assume the target is the system type they were built
/// for; the world guarantees this by pairing each table with its cell at
/// registration and never mixing them afterwards.
pub struct ComponentRuntimeInfo {
    pub(crate) component_type: TypeId,
    pub(crate) component_name: &'static str,
    pub(crate) create: fn(&mut dyn ErasedSystem) -> SlotId,
    pub(crate) destroy: fn(&mut dyn ErasedSystem, SlotId),
    pub(crate) bind_entity: fn(&mut dyn ErasedSystem, SlotId, &Arc<Entity>),
    pub(crate) notify_state_changed: fn(&mut dyn ErasedSystem, SlotId, &Entity),
    pub(crate) find_component: for<'a> fn(&'a dyn ErasedSystem, SlotId) -> Option<&'a dyn Any>,
    pub(crate) find_component_mut:
        for<'a> fn(&'a mut dyn ErasedSystem, SlotId) -> Option<&'a mut dyn Any>,
    pub(crate) table: for<'a> fn(&'a dyn ErasedSystem) -> &'a dyn Any,
    pub(crate) table_mut: for<'a> fn(&'a mut dyn ErasedSystem) -> &'a mut dyn Any,
}

impl ComponentRuntimeInfo {
    pub(crate) fn of<S>() -> Arc<Self>
    where
        S: System,
        S::Component: Default,
    {
        Arc::new(Self {
            component_type: TypeId::of::<S::Component>(),
            component_name: type_name::<S::Component>(),
            create: create_erased::<S>,
            destroy: destroy_erased::<S>,
            bind_entity: bind_entity_erased::<S>,
            notify_state_changed: notify_erased::<S>,
            find_component: find_component_erased::<S>,
            find_component_mut: find_component_mut_erased::<S>,
            table: table_erased::<S>,
            table_mut: table_mut_erased::<S>,
        })
    }
}

impl fmt::Debug for ComponentRuntimeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRuntimeInfo")
            .field("component", &self.component_name)
            .finish_non_exhaustive()
    }
}

/// One component entry of an entity: the slot, the owning system cell,
/// and the dispatch table for reaching the component through erasure.
pub struct ComponentInfo {
    pub(crate) component_type: TypeId,
    pub(crate) slot: SlotId,
    pub(crate) system: SystemCell,
    pub(crate) runtime: Arc<ComponentRuntimeInfo>,
}

impl ComponentInfo {
    /// Type id of the component this entry points at.
    pub fn component_type(&self) -> TypeId {
        self.component_type
    }

    /// Slot of the component within its owning system's table.
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Component type name, for diagnostics.
    pub fn component_name(&self) -> &'static str {
        self.runtime.component_name
    }

    pub(crate) fn system(&self) -> &SystemCell {
        &self.system
    }

    pub(crate) fn runtime(&self) -> &ComponentRuntimeInfo {
        &self.runtime
    }
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("component", &self.component_name())
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}
