use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::SceneError;
use crate::model::ModelDesc;
use crate::world::WorldDesc;

/// The top of a scene graph.
///
/// A root holds either one or more worlds, or a single bare model. The bare
/// form is what a model file produces on its own; the server wraps it in a
/// default world before simulating it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneRoot {
    worlds: Vec<WorldDesc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<ModelDesc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_path: Option<PathBuf>,
}

impl SceneRoot {
    /// Create an empty root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of worlds in the root.
    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    /// World at `index`, in declaration order.
    pub fn world_by_index(&self, index: usize) -> Option<&WorldDesc> {
        self.worlds.get(index)
    }

    /// Mutable world at `index`.
    pub fn world_by_index_mut(&mut self, index: usize) -> Option<&mut WorldDesc> {
        self.worlds.get_mut(index)
    }

    /// All worlds in declaration order.
    pub fn worlds(&self) -> &[WorldDesc] {
        &self.worlds
    }

    /// Mutable access to all worlds.
    pub fn worlds_mut(&mut self) -> &mut [WorldDesc] {
        &mut self.worlds
    }

    /// Append a world.
    pub fn add_world(&mut self, world: WorldDesc) {
        self.worlds.push(world);
    }

    /// The bare top-level model, if this root holds one.
    pub fn model(&self) -> Option<&ModelDesc> {
        self.model.as_ref()
    }

    /// Replace the bare top-level model.
    pub fn set_model(&mut self, model: ModelDesc) {
        self.model = Some(model);
    }

    /// Remove and return the bare top-level model.
    pub fn take_model(&mut self) -> Option<ModelDesc> {
        self.model.take()
    }

    /// The file this root was loaded from, if any.
    pub fn source_path(&self) -> Option<&std::path::Path> {
        self.source_path.as_deref()
    }

    /// Record the file this root was loaded from.
    pub fn set_source_path(&mut self, path: impl Into<PathBuf>) {
        self.source_path = Some(path.into());
    }

    /// Re-validate the whole graph after programmatic edits.
    ///
    /// Returns every problem found; an empty list means the graph is usable.
    pub fn update_graphs(&self) -> Vec<SceneError> {
        let mut errors = Vec::new();
        if !self.worlds.is_empty() && self.model.is_some() {
            errors.push(SceneError::MixedRoot);
        }
        for world in &self.worlds {
            world.validate(&mut errors);
        }
        if let Some(model) = &self.model {
            model.validate("scene root", &mut errors);
        }
        errors
    }

    /// Serialize the graph as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
