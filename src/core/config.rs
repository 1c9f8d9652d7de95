//! Layout settings for model objects and components.
//!
//! `GraphConfig` carries `pos`, `size` and `expanded` per model object. One
//! instance exists per loaded model and is shared by every graph view of
//! that model through the session's [`ConfigRegistry`].

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{ModelId, ObjectId};
use crate::position::Position;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub pos: Option<(f64, f64)>,
    pub size: Option<(f64, f64)>,
    pub expanded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GraphConfig {
    entries: HashMap<ObjectId, ObjectConfig>,
}

impl GraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for `id`; unset objects read as the defaults.
    pub fn get(&self, id: ObjectId) -> ObjectConfig {
        self.entries.get(&id).copied().unwrap_or_default()
    }

    pub fn entry(&mut self, id: ObjectId) -> &mut ObjectConfig {
        self.entries.entry(id).or_default()
    }

    pub fn pos(&self, id: ObjectId) -> Option<(f64, f64)> {
        self.get(id).pos
    }

    pub fn size(&self, id: ObjectId) -> Option<(f64, f64)> {
        self.get(id).size
    }

    pub fn expanded(&self, id: ObjectId) -> bool {
        self.get(id).expanded
    }

    pub fn set_pos(&mut self, id: ObjectId, x: f64, y: f64) {
        self.entry(id).pos = Some((x, y));
    }

    pub fn set_size(&mut self, id: ObjectId, width: f64, height: f64) {
        self.entry(id).size = Some((width, height));
    }

    pub fn set_expanded(&mut self, id: ObjectId, expanded: bool) {
        self.entry(id).expanded = expanded;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Assignment lines for the `.cfg` file. Objects without a name in
    /// `names` are skipped.
    pub fn code_python(&self, names: &HashMap<ObjectId, String>) -> Vec<String> {
        let mut ids: Vec<&ObjectId> = self.entries.keys().collect();
        ids.sort();

        let mut lines = Vec::new();
        for id in ids {
            let Some(name) = names.get(id) else { continue };
            let cfg = &self.entries[id];
            if let Some((x, y)) = cfg.pos {
                lines.push(format!("_viz_config[{name}].pos = ({x}, {y})"));
            }
            if let Some((w, h)) = cfg.size {
                lines.push(format!("_viz_config[{name}].size = ({w}, {h})"));
            }
            if cfg.expanded {
                lines.push(format!("_viz_config[{name}].expanded = True"));
            }
        }
        lines
    }
}

pub type SharedGraphConfig = Arc<Mutex<GraphConfig>>;

/// One `GraphConfig` per model, owned by the session rather than by any
/// component type.
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    configs: Mutex<HashMap<ModelId, SharedGraphConfig>>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_model(&self, model: ModelId) -> SharedGraphConfig {
        Arc::clone(self.configs.lock().entry(model).or_default())
    }

    /// Drop the config of a model that is no longer loaded.
    pub fn forget(&self, model: ModelId) -> Option<SharedGraphConfig> {
        self.configs.lock().remove(&model)
    }

    pub fn len(&self) -> usize {
        self.configs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.lock().is_empty()
    }
}

/// Per-component client settings, forwarded verbatim in create messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentConfig {
    params: Map<String, Value>,
}

impl ComponentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(pos: &Position) -> Self {
        let mut cfg = Self::new();
        cfg.set("x", pos.x);
        cfg.set("y", pos.y);
        cfg.set("width", pos.width);
        cfg.set("height", pos.height);
        cfg
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.params.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
