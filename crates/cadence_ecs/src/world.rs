//! World — system registry and entity lifecycle driver
//!
//! The world owns every registered system and drives the three-phase
//! update cycle. Entities move through four disjoint queues:
//!
//! ```text
//! new -> initializing -> running -> teardown -> (reclaimed)
//! ```
//!
//! Creation and destruction requests may arrive from any thread at any
//! time; they only take effect at well-defined points inside
//! [`World::post_update`], so systems observe a stable entity population
//! for the whole of each cycle.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, Mutex, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::bundle::ComponentBundle;
use crate::dispatch::{ComponentInfo, ComponentRuntimeInfo, SystemCell};
use crate::entity::{Entity, EntityState, Uid};
use crate::error::{EcsError, Result};
use crate::storage::SlotTable;
use crate::system::{Component, System};

/// One registered system: its lock-guarded cell plus the dispatch table
/// for reaching it through erasure.
pub(crate) struct SystemEntry {
    system_type: TypeId,
    component_type: TypeId,
    name: &'static str,
    runtime: Arc<ComponentRuntimeInfo>,
    cell: SystemCell,
}

impl SystemEntry {
    fn new<S>(system: S) -> Self
    where
        S: System,
        S::Component: Default,
    {
        let name = system.name();
        Self {
            system_type: TypeId::of::<S>(),
            component_type: TypeId::of::<S::Component>(),
            name,
            runtime: ComponentRuntimeInfo::of::<S>(),
            cell: Arc::new(RwLock::new(Box::new(system))),
        }
    }

    /// Allocate one default-constructed component and hand back the entry
    /// an entity needs to reach it later.
    pub(crate) fn allocate_component(&self) -> ComponentInfo {
        let slot = (self.runtime.create)(self.cell.write().as_mut());
        ComponentInfo {
            component_type: self.runtime.component_type,
            slot,
            system: Arc::clone(&self.cell),
            runtime: Arc::clone(&self.runtime),
        }
    }
}

/// New-entity staging area. The lock serializes uid assignment, so uids
/// are unique and strictly increasing across all creating threads.
struct Staging {
    next_uid: Uid,
    entities: Vec<Arc<Entity>>,
}

/// System registry and entity lifecycle driver.
///
/// All entity-facing operations take `&self` and are safe to call from
/// any thread; only [`World::register_system`] needs `&mut self` and is
/// meant for setup time. The update hooks themselves must be driven by a
/// single thread, exactly once each per tick, in pre/update/post order.
pub struct World {
    /// Registration order; update hooks run in this order.
    systems: Vec<SystemEntry>,
    by_system_type: FxHashMap<TypeId, usize>,
    by_component_type: FxHashMap<TypeId, usize>,
    staging: Mutex<Staging>,
    /// Entities promoted once, becoming running after the next cycle.
    initializing: Mutex<Vec<Arc<Entity>>>,
    /// The stable population, sorted by uid.
    running: RwLock<Vec<Arc<Entity>>>,
    /// Destruction requests awaiting reconciliation.
    destroy_requests: Mutex<Vec<Uid>>,
    /// Destroyed entities living out their grace cycle.
    teardown: Mutex<Vec<Arc<Entity>>>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create an empty world with no systems.
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
            by_system_type: FxHashMap::default(),
            by_component_type: FxHashMap::default(),
            staging: Mutex::new(Staging {
                next_uid: 1,
                entities: Vec::new(),
            }),
            initializing: Mutex::new(Vec::new()),
            running: RwLock::new(Vec::new()),
            destroy_requests: Mutex::new(Vec::new()),
            teardown: Mutex::new(Vec::new()),
        }
    }

    // === Systems ===

    /// Register a system, making its component type available to entity
    /// creation.
    ///
    /// Re-registering the same system type, or another system for the
    /// same component type, replaces the previous entry in place: the
    /// update position is kept, the old system and all its components are
    /// dropped. Entities still pointing at the old system keep it alive
    /// through their own references until reclaimed.
    pub fn register_system<S>(&mut self, system: S)
    where
        S: System,
        S::Component: Default,
    {
        let entry = SystemEntry::new(system);
        let existing = self
            .by_system_type
            .get(&entry.system_type)
            .or_else(|| self.by_component_type.get(&entry.component_type))
            .copied();
        if let Some(index) = existing {
            let old = std::mem::replace(&mut self.systems[index], entry);
            self.by_system_type.remove(&old.system_type);
            self.by_component_type.remove(&old.component_type);
            let new = &self.systems[index];
            self.by_system_type.insert(new.system_type, index);
            self.by_component_type.insert(new.component_type, index);
            debug!(system = new.name, replaced = old.name, "replaced system");
        } else {
            let index = self.systems.len();
            self.by_system_type.insert(entry.system_type, index);
            self.by_component_type.insert(entry.component_type, index);
            debug!(system = entry.name, "registered system");
            self.systems.push(entry);
        }
    }

    /// Shared access to the registered system of concrete type `S`.
    ///
    /// Read-locks the system's cell for the lifetime of the guard.
    pub fn find_system<S: System>(&self) -> Option<MappedRwLockReadGuard<'_, S>> {
        let index = *self.by_system_type.get(&TypeId::of::<S>())?;
        let guard = self.systems[index].cell.read();
        RwLockReadGuard::try_map(guard, |system| system.as_any().downcast_ref::<S>()).ok()
    }

    /// Exclusive counterpart of [`World::find_system`].
    pub fn find_system_mut<S: System>(&self) -> Option<MappedRwLockWriteGuard<'_, S>> {
        let index = *self.by_system_type.get(&TypeId::of::<S>())?;
        let guard = self.systems[index].cell.write();
        RwLockWriteGuard::try_map(guard, |system| system.as_any_mut().downcast_mut::<S>()).ok()
    }

    /// Raising form of [`World::find_system`].
    pub fn system<S: System>(&self) -> Result<MappedRwLockReadGuard<'_, S>> {
        self.find_system::<S>()
            .ok_or(EcsError::SystemNotFound(type_name::<S>()))
    }

    /// Raising form of [`World::find_system_mut`].
    pub fn system_mut<S: System>(&self) -> Result<MappedRwLockWriteGuard<'_, S>> {
        self.find_system_mut::<S>()
            .ok_or(EcsError::SystemNotFound(type_name::<S>()))
    }

    /// Component table of whichever system owns component type `C`.
    pub fn find_component_table<C: Component>(
        &self,
    ) -> Option<MappedRwLockReadGuard<'_, SlotTable<C>>> {
        let index = *self.by_component_type.get(&TypeId::of::<C>())?;
        let entry = &self.systems[index];
        let guard = entry.cell.read();
        RwLockReadGuard::try_map(guard, |system| {
            (entry.runtime.table)(system.as_ref()).downcast_ref::<SlotTable<C>>()
        })
        .ok()
    }

    /// Mutable counterpart of [`World::find_component_table`].
    pub fn find_component_table_mut<C: Component>(
        &self,
    ) -> Option<MappedRwLockWriteGuard<'_, SlotTable<C>>> {
        let index = *self.by_component_type.get(&TypeId::of::<C>())?;
        let entry = &self.systems[index];
        let guard = entry.cell.write();
        RwLockWriteGuard::try_map(guard, |system| {
            (entry.runtime.table_mut)(system.as_mut()).downcast_mut::<SlotTable<C>>()
        })
        .ok()
    }

    /// Raising form of [`World::find_component_table`].
    pub fn component_table<C: Component>(&self) -> Result<MappedRwLockReadGuard<'_, SlotTable<C>>> {
        self.find_component_table::<C>()
            .ok_or(EcsError::SystemNotFound(type_name::<C>()))
    }

    /// Raising form of [`World::find_component_table_mut`].
    pub fn component_table_mut<C: Component>(
        &self,
    ) -> Result<MappedRwLockWriteGuard<'_, SlotTable<C>>> {
        self.find_component_table_mut::<C>()
            .ok_or(EcsError::SystemNotFound(type_name::<C>()))
    }

    pub(crate) fn entry_for_component<C: Component>(&self) -> Result<&SystemEntry> {
        self.by_component_type
            .get(&TypeId::of::<C>())
            .map(|&index| &self.systems[index])
            .ok_or(EcsError::SystemNotFound(type_name::<C>()))
    }

    /// Number of registered systems.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    // === Entities ===

    /// Create an entity with one component per type named in the bundle.
    ///
    /// Every requested system is resolved before anything is allocated,
    /// so a missing system fails without leaving orphan slots. The entity
    /// is live immediately: its components exist and its handle resolves,
    /// but it stays outside the update population (state
    /// [`EntityState::None`]) until promoted during `post_update`.
    ///
    /// Callable from any thread, concurrently with the update cycle.
    pub fn create_entity<B: ComponentBundle>(&self) -> Result<Arc<Entity>> {
        let mut staging = self.staging.lock();
        let components = B::create_components(self)?;
        let uid = staging.next_uid;
        staging.next_uid += 1;
        let entity = Arc::new(Entity::new(uid, components));
        for info in entity.components() {
            (info.runtime().bind_entity)(info.system().write().as_mut(), info.slot(), &entity);
        }
        trace!(uid, components = entity.components().len(), "created entity");
        staging.entities.push(Arc::clone(&entity));
        Ok(entity)
    }

    /// Request destruction of an entity. Fire-and-forget: the request is
    /// reconciled during the next `post_update`, where duplicates and
    /// uids that are not in the running set are silently dropped.
    pub fn destroy_entity_later(&self, uid: Uid) {
        trace!(uid, "destruction requested");
        self.destroy_requests.lock().push(uid);
    }

    /// Look an entity up by uid in all four lifecycle queues. Entities in
    /// teardown are still found for their one grace cycle.
    pub fn find_entity(&self, uid: Uid) -> Option<Arc<Entity>> {
        {
            let running = self.running.read();
            if let Ok(index) = running.binary_search_by_key(&uid, |entity| entity.uid()) {
                return Some(Arc::clone(&running[index]));
            }
        }
        let scan = |entities: &[Arc<Entity>]| {
            entities
                .iter()
                .find(|entity| entity.uid() == uid)
                .map(Arc::clone)
        };
        if let Some(entity) = scan(&self.initializing.lock()) {
            return Some(entity);
        }
        if let Some(entity) = scan(&self.teardown.lock()) {
            return Some(entity);
        }
        scan(&self.staging.lock().entities)
    }

    /// Raising form of [`World::find_entity`].
    pub fn entity(&self, uid: Uid) -> Result<Arc<Entity>> {
        self.find_entity(uid).ok_or(EcsError::EntityNotFound(uid))
    }

    /// Number of entities in the running set. Entities still being
    /// staged, initialized, or torn down are not counted.
    pub fn entity_count(&self) -> usize {
        self.running.read().len()
    }

    // === Update cycle ===

    /// Run every system's `pre_update` hook in registration order.
    pub fn pre_update(&self) {
        for entry in &self.systems {
            entry.cell.write().pre_update();
        }
    }

    /// Run every system's `update` hook in registration order.
    pub fn update(&self, delta: f32) {
        for entry in &self.systems {
            entry.cell.write().update(delta);
        }
    }

    /// Run every system's `post_update` hook, then advance the entity
    /// lifecycle queues:
    ///
    /// 1. reclaim the previous cycle's teardown queue (component slots
    ///    are released here, exactly once);
    /// 2. system `post_update` hooks;
    /// 3. promote initializing entities to running;
    /// 4. promote newly created entities to initializing;
    /// 5. reconcile destruction requests, moving removed entities into
    ///    the teardown queue for their grace cycle.
    ///
    /// A destroyed entity therefore stays fully accessible, with live
    /// components, for exactly one more cycle after its removal from the
    /// running set.
    pub fn post_update(&self) {
        self.reclaim_teardown();
        for entry in &self.systems {
            entry.cell.write().post_update();
        }
        self.promote_initializing();
        self.promote_new();
        self.process_destruction();
    }

    /// Fan one entity's state change out to every owning system. No
    /// world-level lock is held here; only each system's own cell is
    /// write-locked for the duration of its callback.
    fn notify_state_changed(&self, entity: &Arc<Entity>) {
        for info in entity.components() {
            (info.runtime().notify_state_changed)(
                info.system().write().as_mut(),
                info.slot(),
                entity,
            );
        }
    }

    fn reclaim_teardown(&self) {
        let retired = std::mem::take(&mut *self.teardown.lock());
        for entity in &retired {
            for info in entity.components() {
                (info.runtime().destroy)(info.system().write().as_mut(), info.slot());
            }
            trace!(uid = entity.uid(), "reclaimed entity");
        }
    }

    fn promote_initializing(&self) {
        let promoted = std::mem::take(&mut *self.initializing.lock());
        if promoted.is_empty() {
            return;
        }
        for entity in &promoted {
            entity.set_state(EntityState::Running);
            self.notify_state_changed(entity);
        }
        trace!(count = promoted.len(), "entities promoted to running");
        let mut running = self.running.write();
        // Uids are assigned monotonically and promotion preserves
        // creation order, so appending keeps the set sorted.
        debug_assert!(running
            .last()
            .map_or(true, |last| last.uid() < promoted[0].uid()));
        running.extend(promoted);
    }

    fn promote_new(&self) {
        let fresh = std::mem::take(&mut self.staging.lock().entities);
        if fresh.is_empty() {
            return;
        }
        for entity in &fresh {
            entity.set_state(EntityState::Initializing);
            self.notify_state_changed(entity);
        }
        trace!(count = fresh.len(), "entities promoted to initializing");
        self.initializing.lock().extend(fresh);
    }

    fn process_destruction(&self) {
        let mut requests = std::mem::take(&mut *self.destroy_requests.lock());
        if requests.is_empty() {
            return;
        }
        requests.sort_unstable();
        requests.dedup();

        let mut removed = Vec::new();
        {
            let mut running = self.running.write();
            for uid in requests {
                // Requests for uids outside the running set are dropped:
                // either never promoted, already in teardown, or unknown.
                if let Ok(index) = running.binary_search_by_key(&uid, |entity| entity.uid()) {
                    removed.push(running.remove(index));
                }
            }
        }
        if removed.is_empty() {
            return;
        }
        for entity in &removed {
            entity.set_state(EntityState::Teardown);
            self.notify_state_changed(entity);
        }
        debug!(count = removed.len(), "entities entering teardown");
        self.teardown.lock().extend(removed);
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("systems", &self.systems.len())
            .field("running", &self.running.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SlotId;

    fn cycle(world: &World) {
        world.pre_update();
        world.update(0.016);
        world.post_update();
    }

    // === Fixtures ===

    #[derive(Debug, Default, PartialEq)]
    struct Counter {
        value: i32,
    }

    impl Component for Counter {}

    #[derive(Default)]
    struct CounterSystem {
        table: SlotTable<Counter>,
    }

    impl System for CounterSystem {
        type Component = Counter;

        fn table(&self) -> &SlotTable<Counter> {
            &self.table
        }

        fn table_mut(&mut self) -> &mut SlotTable<Counter> {
            &mut self.table
        }

        fn pre_update(&mut self) {
            self.table.for_each_mut(|_, counter| counter.value += 1);
        }

        fn update(&mut self, _delta: f32) {
            self.table.for_each_mut(|_, counter| counter.value += 2);
        }

        fn post_update(&mut self) {
            self.table.for_each_mut(|_, counter| counter.value += 4);
        }
    }

    #[derive(Debug, Default)]
    struct Position {
        x: f32,
    }

    impl Component for Position {}

    #[derive(Default)]
    struct MovementSystem {
        table: SlotTable<Position>,
    }

    impl System for MovementSystem {
        type Component = Position;

        fn table(&self) -> &SlotTable<Position> {
            &self.table
        }

        fn table_mut(&mut self) -> &mut SlotTable<Position> {
            &mut self.table
        }

        fn update(&mut self, delta: f32) {
            self.table.for_each_mut(|_, position| position.x += delta);
        }
    }

    #[derive(Debug, Default)]
    struct Probe;

    impl Component for Probe {}

    #[derive(Default)]
    struct ProbeSystem {
        table: SlotTable<Probe>,
        events: Vec<(SlotId, EntityState)>,
    }

    impl System for ProbeSystem {
        type Component = Probe;

        fn table(&self) -> &SlotTable<Probe> {
            &self.table
        }

        fn table_mut(&mut self) -> &mut SlotTable<Probe> {
            &mut self.table
        }

        fn on_entity_state_changed(&mut self, slot: SlotId, entity: &Entity) {
            self.events.push((slot, entity.state()));
        }
    }

    // === System registry ===

    #[test]
    fn test_system_lookup_by_type_and_component() {
        let mut world = World::new();
        assert!(world.find_system::<CounterSystem>().is_none());
        assert!(matches!(
            world.system::<CounterSystem>(),
            Err(EcsError::SystemNotFound(_))
        ));

        world.register_system(CounterSystem::default());
        assert_eq!(world.system_count(), 1);
        assert!(world.find_system::<CounterSystem>().is_some());
        assert!(world.find_component_table::<Counter>().is_some());
        assert!(world.find_component_table::<Position>().is_none());
        assert!(matches!(
            world.component_table::<Position>(),
            Err(EcsError::SystemNotFound(_))
        ));
    }

    #[test]
    fn test_typed_system_mutation() {
        let mut world = World::new();
        world.register_system(CounterSystem::default());

        let slot = world.system_mut::<CounterSystem>().unwrap().create_component();
        assert_eq!(world.system::<CounterSystem>().unwrap().len(), 1);

        world
            .find_component_table_mut::<Counter>()
            .unwrap()
            .get_mut(slot)
            .unwrap()
            .value = 5;
        assert_eq!(
            world.component_table::<Counter>().unwrap().get(slot),
            Some(&Counter { value: 5 })
        );
    }

    #[test]
    fn test_reregistration_replaces_in_place() {
        let mut world = World::new();
        world.register_system(CounterSystem::default());
        world.system_mut::<CounterSystem>().unwrap().create_component();
        assert_eq!(world.system::<CounterSystem>().unwrap().len(), 1);

        // Same system type again: the fresh instance takes the slot.
        world.register_system(CounterSystem::default());
        assert_eq!(world.system_count(), 1);
        assert_eq!(world.system::<CounterSystem>().unwrap().len(), 0);
    }

    #[test]
    fn test_reregistration_by_component_type() {
        #[derive(Default)]
        struct OtherCounterSystem {
            table: SlotTable<Counter>,
        }

        impl System for OtherCounterSystem {
            type Component = Counter;

            fn table(&self) -> &SlotTable<Counter> {
                &self.table
            }

            fn table_mut(&mut self) -> &mut SlotTable<Counter> {
                &mut self.table
            }
        }

        let mut world = World::new();
        world.register_system(CounterSystem::default());
        world.register_system(OtherCounterSystem::default());

        // One authority per component type: the newcomer replaced the
        // original in place.
        assert_eq!(world.system_count(), 1);
        assert!(world.find_system::<CounterSystem>().is_none());
        assert!(world.find_system::<OtherCounterSystem>().is_some());
        assert!(world.find_component_table::<Counter>().is_some());
    }

    // === Entity lifecycle ===

    #[test]
    fn test_create_entity_is_live_immediately() {
        let mut world = World::new();
        world.register_system(CounterSystem::default());

        let entity = world.create_entity::<(Counter,)>().unwrap();
        assert_eq!(entity.uid(), 1);
        assert_eq!(entity.state(), EntityState::None);
        assert!(entity.has_component::<Counter>());
        assert_eq!(entity.component::<Counter>().unwrap().value, 0);

        // Findable before any cycle has run, but not yet counted as part
        // of the update population.
        assert_eq!(world.find_entity(1).unwrap().uid(), 1);
        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.system::<CounterSystem>().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_system_allocates_nothing() {
        let mut world = World::new();
        world.register_system(CounterSystem::default());

        let result = world.create_entity::<(Counter, Position)>();
        assert!(matches!(result, Err(EcsError::SystemNotFound(_))));

        // Resolution happens before allocation: no orphan slot, and the
        // failed attempt consumed no uid.
        assert_eq!(world.system::<CounterSystem>().unwrap().len(), 0);
        let entity = world.create_entity::<(Counter,)>().unwrap();
        assert_eq!(entity.uid(), 1);
    }

    #[test]
    fn test_lifecycle_quarantine() {
        let mut world = World::new();
        world.register_system(CounterSystem::default());

        let entity = world.create_entity::<(Counter,)>().unwrap();
        assert_eq!(entity.state(), EntityState::None);

        cycle(&world);
        assert_eq!(entity.state(), EntityState::Initializing);
        assert_eq!(world.entity_count(), 0);
        assert!(world.find_entity(entity.uid()).is_some());

        cycle(&world);
        assert_eq!(entity.state(), EntityState::Running);
        assert_eq!(world.entity_count(), 1);
        assert!(world.find_entity(entity.uid()).is_some());
    }

    #[test]
    fn test_counter_full_scenario() {
        let mut world = World::new();
        world.register_system(CounterSystem::default());

        let entity = world.create_entity::<(Counter,)>().unwrap();
        let uid = entity.uid();

        // The component participates in all three hooks from the very
        // first cycle, while the entity is still being promoted.
        cycle(&world);
        assert_eq!(entity.component::<Counter>().unwrap().value, 7);

        world.destroy_entity_later(uid);
        cycle(&world);
        // Grace cycle: torn down, but component and handle stay valid.
        assert_eq!(entity.state(), EntityState::Teardown);
        assert_eq!(entity.component::<Counter>().unwrap().value, 14);
        assert!(world.find_entity(uid).is_some());

        cycle(&world);
        assert!(world.find_entity(uid).is_none());
        assert!(matches!(world.entity(uid), Err(EcsError::EntityNotFound(u)) if u == uid));
        assert!(world.system::<CounterSystem>().unwrap().is_empty());
        // Our own handle outlives reclamation, but the component is gone.
        assert!(entity.find_component::<Counter>().is_none());
    }

    #[test]
    fn test_uids_monotonic_across_destruction() {
        let mut world = World::new();
        world.register_system(CounterSystem::default());

        let a = world.create_entity::<(Counter,)>().unwrap();
        let b = world.create_entity::<(Counter,)>().unwrap();
        assert_eq!((a.uid(), b.uid()), (1, 2));

        for _ in 0..2 {
            cycle(&world);
        }
        world.destroy_entity_later(a.uid());
        world.destroy_entity_later(b.uid());
        for _ in 0..2 {
            cycle(&world);
        }
        assert_eq!(world.entity_count(), 0);

        // Destroyed uids are never reissued.
        let c = world.create_entity::<(Counter,)>().unwrap();
        assert_eq!(c.uid(), 3);
    }

    #[test]
    fn test_destruction_request_tolerance() {
        let mut world = World::new();
        world.register_system(CounterSystem::default());

        let entity = world.create_entity::<(Counter,)>().unwrap();
        for _ in 0..2 {
            cycle(&world);
        }

        // Duplicates and unknown uids are dropped at reconciliation.
        world.destroy_entity_later(entity.uid());
        world.destroy_entity_later(entity.uid());
        world.destroy_entity_later(9999);
        cycle(&world);
        assert_eq!(entity.state(), EntityState::Teardown);

        // A request against an entity already in teardown is ignored too.
        world.destroy_entity_later(entity.uid());
        cycle(&world);
        assert!(world.find_entity(entity.uid()).is_none());
    }

    #[test]
    fn test_destroy_before_running_takes_effect_after_promotion() {
        let mut world = World::new();
        world.register_system(CounterSystem::default());

        let entity = world.create_entity::<(Counter,)>().unwrap();
        // Requests only reconcile against the running set, so this one
        // sits in the queue until the entity gets there.
        world.destroy_entity_later(entity.uid());

        cycle(&world);
        assert_eq!(entity.state(), EntityState::Initializing);
        cycle(&world);
        assert_eq!(entity.state(), EntityState::Running);

        world.destroy_entity_later(entity.uid());
        cycle(&world);
        assert_eq!(entity.state(), EntityState::Teardown);
    }

    #[test]
    fn test_state_change_notification_sequence() {
        let mut world = World::new();
        world.register_system(ProbeSystem::default());

        let entity = world.create_entity::<(Probe,)>().unwrap();
        cycle(&world);
        cycle(&world);
        world.destroy_entity_later(entity.uid());
        cycle(&world);
        cycle(&world);

        let system = world.system::<ProbeSystem>().unwrap();
        let states: Vec<EntityState> = system.events.iter().map(|(_, state)| state).copied().collect();
        assert_eq!(
            states,
            vec![
                EntityState::Initializing,
                EntityState::Running,
                EntityState::Teardown,
            ]
        );
        // Every notification carried the same slot, and reclamation freed it.
        assert!(system.events.iter().all(|(slot, _)| slot.is_valid()));
        assert!(system.is_empty());
    }

    #[test]
    fn test_cross_system_composition() {
        let mut world = World::new();
        world.register_system(CounterSystem::default());
        world.register_system(MovementSystem::default());

        let entity = world.create_entity::<(Counter, Position)>().unwrap();
        assert!(entity.has_component::<Counter>());
        assert!(entity.has_component::<Position>());

        cycle(&world);
        assert_eq!(entity.component::<Counter>().unwrap().value, 7);
        assert!((entity.component::<Position>().unwrap().x - 0.016).abs() < f32::EPSILON);

        // A single-component entity coexists in the same world.
        let loner = world.create_entity::<(Position,)>().unwrap();
        assert!(!loner.has_component::<Counter>());
        assert!(matches!(
            loner.component::<Counter>(),
            Err(EcsError::MissingComponent { .. })
        ));
        assert_eq!(world.system::<CounterSystem>().unwrap().len(), 1);
        assert_eq!(world.system::<MovementSystem>().unwrap().len(), 2);
    }

    #[test]
    fn test_entity_write_guard_mutates_component() {
        let mut world = World::new();
        world.register_system(CounterSystem::default());

        let entity = world.create_entity::<(Counter,)>().unwrap();
        entity.component_mut::<Counter>().unwrap().value = 100;
        cycle(&world);
        assert_eq!(entity.component::<Counter>().unwrap().value, 107);
    }

    #[test]
    fn test_slot_recycling_across_entities() {
        let mut world = World::new();
        world.register_system(CounterSystem::default());

        let first = world.create_entity::<(Counter,)>().unwrap();
        for _ in 0..2 {
            cycle(&world);
        }
        world.destroy_entity_later(first.uid());
        for _ in 0..2 {
            cycle(&world);
        }

        // The freed slot is recycled for the next entity; the uid is not.
        let second = world.create_entity::<(Counter,)>().unwrap();
        assert!(second.uid() > first.uid());
        assert_eq!(world.system::<CounterSystem>().unwrap().table().capacity(), 1);
        assert_eq!(second.component::<Counter>().unwrap().value, 0);
    }

    #[test]
    fn test_concurrent_creation_and_destruction() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 25;

        let mut world = World::new();
        world.register_system(CounterSystem::default());
        let world = &world;

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(move || {
                    for i in 0..PER_THREAD {
                        let entity = world.create_entity::<(Counter,)>().unwrap();
                        assert!(world.find_entity(entity.uid()).is_some());
                        if i % 2 == 0 {
                            world.destroy_entity_later(entity.uid());
                        }
                    }
                });
            }
        });

        let mut uids: Vec<Uid> = Vec::new();
        {
            let staging = world.staging.lock();
            uids.extend(staging.entities.iter().map(|entity| entity.uid()));
        }
        assert_eq!(uids.len(), THREADS * PER_THREAD);
        uids.sort_unstable();
        uids.dedup();
        assert_eq!(uids.len(), THREADS * PER_THREAD, "uids must be unique");

        // Early destruction requests target entities that never reached
        // running, so they are dropped and every entity gets promoted.
        for _ in 0..2 {
            cycle(world);
        }
        assert_eq!(world.entity_count(), THREADS * PER_THREAD);

        // Destroy the even half now that everything is running.
        for uid in 1..=(THREADS * PER_THREAD) as Uid {
            if uid % 2 == 0 {
                world.destroy_entity_later(uid);
            }
        }
        for _ in 0..2 {
            cycle(world);
        }
        assert_eq!(world.entity_count(), THREADS * PER_THREAD / 2);
        assert_eq!(
            world.system::<CounterSystem>().unwrap().len(),
            THREADS * PER_THREAD / 2
        );
    }
}
