//! # cadence_ecs
//!
//! A small entity-component-system runtime built around system-owned
//! storage. Each system owns a slot table of components of one declared
//! type; entities are shared identity objects aggregating one component
//! per participating system; a [`World`] registers the systems and drives
//! the `pre_update` / `update` / `post_update` cycle.
//!
//! Entity creation and destruction are safe from any thread at any time,
//! and take effect at fixed points inside [`World::post_update`], so the
//! entity population is stable for the whole of each cycle. A new entity
//! spends one cycle initializing before it joins the running set; a
//! destroyed one stays accessible, components included, for one grace
//! cycle before its slots are reclaimed.
//!
//! # Example
//!
//! ```rust
//! use cadence_ecs::prelude::*;
//!
//! #[derive(Debug, Default)]
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
//!
//! let mut world = World::new();
//! world.register_system(HealthSystem::default());
//!
//! let player = world.create_entity::<(Health,)>()?;
//! player.component_mut::<Health>()?.current = 1.0;
//!
//! world.pre_update();
//! world.update(0.25);
//! world.post_update();
//!
//! assert_eq!(player.component::<Health>()?.current, 0.75);
//! # Ok::<(), cadence_ecs::EcsError>(())
//! ```

pub mod bundle;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod storage;
pub mod system;
pub mod world;

pub use bundle::ComponentBundle;
pub use dispatch::{ComponentInfo, ErasedSystem};
pub use entity::{Entity, EntityState, Uid};
pub use error::{EcsError, Result};
pub use storage::{SlotId, SlotTable};
pub use system::{Component, System};
pub use world::World;

/// Common imports for working with the crate.
pub mod prelude {
    pub use crate::bundle::ComponentBundle;
    pub use crate::entity::{Entity, EntityState, Uid};
    pub use crate::error::{EcsError, Result};
    pub use crate::storage::{SlotId, SlotTable};
    pub use crate::system::{Component, System};
    pub use crate::world::World;
}
