use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use sh_scene::{ModelDesc, WorldDesc};

/// Identifier of an entity within one world. Ids start at 1 and are never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a scene element became when instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// The world itself.
    World,
    /// A model, top-level or nested.
    Model,
    /// A rigid link of a model.
    Link,
    /// A light source.
    Light,
}

/// One live entity.
#[derive(Debug, Clone, Serialize)]
pub struct EntityRecord {
    /// Unique id.
    pub id: EntityId,
    /// Name from the scene description.
    pub name: String,
    /// Entity kind.
    pub kind: EntityKind,
    /// Owning entity, `None` for roots.
    pub parent: Option<EntityId>,
}

/// Entities of one world, in creation order.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    entities: BTreeMap<EntityId, EntityRecord>,
    next_id: u64,
}

impl EntityStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate a world description: the world, then each model depth
    /// first (model, its links, its nested models), then lights.
    pub fn from_world(world: &WorldDesc) -> Self {
        let mut store = Self::new();
        let root = store.create(&world.name, EntityKind::World, None);
        for model in &world.models {
            store.create_model(model, root);
        }
        for light in &world.lights {
            store.create(&light.name, EntityKind::Light, Some(root));
        }
        store
    }

    fn create_model(&mut self, model: &ModelDesc, parent: EntityId) {
        let id = self.create(&model.name, EntityKind::Model, Some(parent));
        for link in &model.links {
            self.create(&link.name, EntityKind::Link, Some(id));
        }
        for child in &model.models {
            self.create_model(child, id);
        }
    }

    /// Add an entity and return its id.
    pub fn create(
        &mut self,
        name: impl Into<String>,
        kind: EntityKind,
        parent: Option<EntityId>,
    ) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.entities.insert(
            id,
            EntityRecord {
                id,
                name: name.into(),
                kind,
                parent,
            },
        );
        id
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Look up an entity.
    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    /// Whether the id refers to a live entity.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// First entity, in creation order, with exactly this name.
    pub fn by_name(&self, name: &str) -> Option<EntityId> {
        self.entities
            .values()
            .find(|e| e.name == name)
            .map(|e| e.id)
    }

    /// Direct children of an entity.
    pub fn children(&self, id: EntityId) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.parent == Some(id))
            .map(|e| e.id)
            .collect()
    }

    /// All descendants of an entity, excluding itself.
    pub fn descendants(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack = self.children(id);
        while let Some(next) = stack.pop() {
            stack.extend(self.children(next));
            out.push(next);
        }
        out
    }

    /// Remove an entity. With `recursive`, descendants go too; otherwise
    /// direct children become roots. Returns the removed ids.
    pub fn remove(&mut self, id: EntityId, recursive: bool) -> Vec<EntityId> {
        if !self.contains(id) {
            return Vec::new();
        }

        let mut removed = vec![id];
        if recursive {
            removed.extend(self.descendants(id));
        } else {
            for child in self.children(id) {
                if let Some(record) = self.entities.get_mut(&child) {
                    record.parent = None;
                }
            }
        }

        for gone in &removed {
            self.entities.remove(gone);
        }
        removed
    }

    /// Iterate entities in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.entities.values()
    }
}
