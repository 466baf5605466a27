//! Name → entity lookup for loaded scenes
//!
//! Loaders register every named node under a composite key so game code can
//! find entities by name. A missing name is a per-resource recoverable
//! condition: the lookup logs and the caller skips.

use crate::ecs::Entity;
use std::collections::HashMap;

/// Composite identifier for a named scene entity: source file, instance
/// index of that file, and the node name inside it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SceneKey {
    /// Scene/asset file the entity was loaded from
    pub source: String,
    /// Which instantiation of that file (files can be loaded repeatedly)
    pub instance: u32,
    /// Node name within the file
    pub name: String,
}

impl SceneKey {
    /// Build a key from its parts
    pub fn new(source: impl Into<String>, instance: u32, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            instance,
            name: name.into(),
        }
    }
}

/// Dictionary mapping composite scene keys to entities
#[derive(Default)]
pub struct SceneDictionary {
    entries: HashMap<SceneKey, Entity>,
}

impl SceneDictionary {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity under a key, replacing any previous entry
    pub fn insert(&mut self, key: SceneKey, entity: Entity) {
        if let Some(old) = self.entries.insert(key.clone(), entity) {
            log::debug!("Scene dictionary key {key:?} rebound from {old:?}");
        }
    }

    /// Look up an entity; logs and returns `None` when the name is unknown
    pub fn lookup(&self, key: &SceneKey) -> Option<Entity> {
        let found = self.entries.get(key).copied();
        if found.is_none() {
            log::warn!(
                "Named entity not found: {}#{} '{}'; skipping",
                key.source, key.instance, key.name
            );
        }
        found
    }

    /// Remove every entry originating from one source file instance
    pub fn remove_source(&mut self, source: &str, instance: u32) {
        self.entries
            .retain(|k, _| !(k.source == source && k.instance == instance));
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::World;

    #[test]
    fn lookup_distinguishes_file_instances() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        let mut dict = SceneDictionary::new();
        dict.insert(SceneKey::new("level.json", 0, "door"), a);
        dict.insert(SceneKey::new("level.json", 1, "door"), b);

        assert_eq!(dict.lookup(&SceneKey::new("level.json", 0, "door")), Some(a));
        assert_eq!(dict.lookup(&SceneKey::new("level.json", 1, "door")), Some(b));
        assert_eq!(dict.lookup(&SceneKey::new("level.json", 2, "door")), None);
    }

    #[test]
    fn remove_source_clears_only_that_instance() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        let mut dict = SceneDictionary::new();
        dict.insert(SceneKey::new("level.json", 0, "door"), a);
        dict.insert(SceneKey::new("props.json", 0, "crate"), b);
        dict.remove_source("level.json", 0);
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.lookup(&SceneKey::new("props.json", 0, "crate")), Some(b));
    }
}
