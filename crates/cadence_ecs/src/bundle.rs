//! Component bundles for entity creation
//!
//! [`World::create_entity`](crate::World::create_entity) takes the set of
//! component types as a tuple: `world.create_entity::<(Health, Position)>()`.
//! Each named type must have a registered owning system and be
//! default-constructible; the world allocates one slot per type.

use smallvec::SmallVec;

use crate::dispatch::ComponentInfo;
use crate::error::Result;
use crate::system::Component;
use crate::world::World;

/// The set of component types an entity is created with.
///
/// Implemented for tuples of one to eight component types. All systems
/// are resolved before anything is allocated, so a missing system fails
/// without leaving orphan slots behind.
pub trait ComponentBundle {
    #[doc(hidden)]
    fn create_components(world: &World) -> Result<SmallVec<[ComponentInfo; 4]>>;
}

macro_rules! impl_component_bundle {
    ($($component:ident),+) => {
        impl<$($component),+> ComponentBundle for ($($component,)+)
        where
            $($component: Component + Default,)+
        {
            fn create_components(world: &World) -> Result<SmallVec<[ComponentInfo; 4]>> {
                let entries = [$(world.entry_for_component::<$component>()?),+];
                Ok(entries.iter().map(|entry| entry.allocate_component()).collect())
            }
        }
    };
}

impl_component_bundle!(A);
impl_component_bundle!(A, B);
impl_component_bundle!(A, B, C);
impl_component_bundle!(A, B, C, D);
impl_component_bundle!(A, B, C, D, E);
impl_component_bundle!(A, B, C, D, E, F);
impl_component_bundle!(A, B, C, D, E, F, G);
impl_component_bundle!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EcsError;
    use crate::storage::SlotTable;
    use crate::system::System;

    macro_rules! marker_system {
        ($component:ident, $system:ident) => {
            #[derive(Debug, Default)]
            struct $component;

            impl Component for $component {}

            #[derive(Default)]
            struct $system {
                table: SlotTable<$component>,
            }

            impl System for $system {
                type Component = $component;

                fn table(&self) -> &SlotTable<$component> {
                    &self.table
                }

                fn table_mut(&mut self) -> &mut SlotTable<$component> {
                    &mut self.table
                }
            }
        };
    }

    marker_system!(Body, BodySystem);
    marker_system!(Sprite, SpriteSystem);
    marker_system!(Brain, BrainSystem);

    #[test]
    fn test_bundle_allocates_one_slot_per_type() {
        let mut world = World::new();
        world.register_system(BodySystem::default());
        world.register_system(SpriteSystem::default());
        world.register_system(BrainSystem::default());

        let entity = world.create_entity::<(Body, Sprite, Brain)>().unwrap();
        assert_eq!(entity.components().len(), 3);
        assert_eq!(world.system::<BodySystem>().unwrap().len(), 1);
        assert_eq!(world.system::<SpriteSystem>().unwrap().len(), 1);
        assert_eq!(world.system::<BrainSystem>().unwrap().len(), 1);
    }

    #[test]
    fn test_bundle_resolution_precedes_allocation() {
        let mut world = World::new();
        world.register_system(BodySystem::default());
        // Sprite has no system: the whole creation fails up front.
        let result = world.create_entity::<(Body, Sprite)>();
        assert!(matches!(result, Err(EcsError::SystemNotFound(_))));
        assert!(world.system::<BodySystem>().unwrap().is_empty());
    }
}
