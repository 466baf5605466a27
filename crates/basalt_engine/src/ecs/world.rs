//! ECS World implementation

use super::{Component, Entity};
use slotmap::{SecondaryMap, SlotMap};
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// ECS World containing all entities and components
pub struct World {
    entities: SlotMap<Entity, ()>,
    storages: HashMap<TypeId, StorageCell>,
}

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self {
            entities: SlotMap::with_key(),
            storages: HashMap::new(),
        }
    }

    /// Create a new entity
    pub fn spawn(&mut self) -> Entity {
        self.entities.insert(())
    }

    /// Destroy an entity and all of its components
    pub fn despawn(&mut self, entity: Entity) {
        self.entities.remove(entity);
        for cell in self.storages.values_mut() {
            (cell.remove)(cell.map.as_mut(), entity);
        }
    }

    /// Whether the entity is still alive
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Add a component to an entity, replacing any previous value
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) {
        debug_assert!(self.entities.contains_key(entity), "component added to dead entity");
        self.storage_mut::<T>().insert(entity, component);
    }

    /// Remove a component from an entity, returning it if present
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.typed_storage_mut::<T>()?.remove(entity)
    }

    /// Get a component from an entity
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.typed_storage::<T>()?.get(entity)
    }

    /// Get a mutable component from an entity
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.typed_storage_mut::<T>()?.get_mut(entity)
    }

    /// Iterate all entities carrying a component of type `T`
    pub fn view<'a, T: Component>(&'a self) -> impl Iterator<Item = (Entity, &'a T)> + 'a {
        self.typed_storage::<T>()
            .into_iter()
            .flat_map(|map| map.iter())
    }

    /// Iterate all entities carrying both `A` and `B`
    pub fn view2<'a, A: Component, B: Component>(
        &'a self,
    ) -> impl Iterator<Item = (Entity, &'a A, &'a B)> + 'a {
        self.view::<A>()
            .filter_map(move |(e, a)| self.get_component::<B>(e).map(|b| (e, a, b)))
    }

    /// Iterate all entities carrying `A`, `B` and `C`
    pub fn view3<'a, A: Component, B: Component, C: Component>(
        &'a self,
    ) -> impl Iterator<Item = (Entity, &'a A, &'a B, &'a C)> + 'a {
        self.view2::<A, B>()
            .filter_map(move |(e, a, b)| self.get_component::<C>(e).map(|c| (e, a, b, c)))
    }

    fn typed_storage<T: Component>(&self) -> Option<&SecondaryMap<Entity, T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|cell| cell.map.downcast_ref::<SecondaryMap<Entity, T>>())
    }

    fn typed_storage_mut<T: Component>(&mut self) -> Option<&mut SecondaryMap<Entity, T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|cell| cell.map.downcast_mut::<SecondaryMap<Entity, T>>())
    }

    fn storage_mut<T: Component>(&mut self) -> &mut SecondaryMap<Entity, T> {
        self.storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| StorageCell {
                map: Box::new(SecondaryMap::<Entity, T>::new()),
                remove: |map, entity| {
                    if let Some(map) = map.downcast_mut::<SecondaryMap<Entity, T>>() {
                        map.remove(entity);
                    }
                },
            })
            .map
            .downcast_mut::<SecondaryMap<Entity, T>>()
            .expect("storage cell type invariant")
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased component storage plus a monomorphized remover so `despawn`
/// can clear every storage without knowing the component types.
struct StorageCell {
    map: Box<dyn Any + Send + Sync>,
    remove: fn(&mut (dyn Any + Send + Sync), Entity),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    #[derive(Debug, PartialEq)]
    struct Name(&'static str);

    #[test]
    fn components_round_trip() {
        let mut world = World::new();
        let e = world.spawn();
        world.add_component(e, Health(10));
        assert_eq!(world.get_component::<Health>(e), Some(&Health(10)));
        world.get_component_mut::<Health>(e).unwrap().0 = 7;
        assert_eq!(world.remove_component::<Health>(e), Some(Health(7)));
        assert_eq!(world.get_component::<Health>(e), None);
    }

    #[test]
    fn view2_filters_to_entities_with_both_components() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        world.add_component(a, Health(1));
        world.add_component(a, Name("a"));
        world.add_component(b, Health(2));

        let matched: Vec<Entity> = world.view2::<Health, Name>().map(|(e, _, _)| e).collect();
        assert_eq!(matched, vec![a]);
    }

    #[test]
    fn despawn_removes_entity_and_components() {
        let mut world = World::new();
        let e = world.spawn();
        world.add_component(e, Health(1));
        world.despawn(e);
        assert!(!world.is_alive(e));
        assert_eq!(world.view::<Health>().count(), 0);
    }
}
