//! One visualization session: the loaded model, its coarse lock, and the
//! per-model layout configs.

use parking_lot::{Mutex, MutexGuard};

use crate::config::{ConfigRegistry, SharedGraphConfig};
use crate::error::Result;
use crate::model::{Model, ModelId, ObjectId};
use crate::prng::Prng;

#[derive(Debug)]
pub struct Session {
    /// Coarse lock; every read or mutation of the graph goes through it.
    model: Mutex<Model>,
    configs: ConfigRegistry,
    seed: Option<u64>,
}

impl Session {
    pub fn new(model: Model) -> Self {
        Self {
            model: Mutex::new(model),
            configs: ConfigRegistry::new(),
            seed: None,
        }
    }

    /// Fixed seed for default layout positions.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn lock(&self) -> MutexGuard<'_, Model> {
        self.model.lock()
    }

    pub fn model_id(&self) -> ModelId {
        self.model.lock().id()
    }

    pub fn root(&self) -> ObjectId {
        self.model.lock().root()
    }

    pub fn configs(&self) -> &ConfigRegistry {
        &self.configs
    }

    /// Layout config of the currently loaded model.
    pub fn graph_config(&self) -> SharedGraphConfig {
        self.configs.for_model(self.model_id())
    }

    pub fn get_uid(&self, obj: ObjectId) -> Result<String> {
        self.model.lock().get_uid(obj)
    }

    pub fn get_label(&self, obj: ObjectId) -> Result<String> {
        self.model.lock().get_label(obj)
    }

    /// Swap in a freshly loaded model. The old model's layout config is
    /// dropped with it; returns the old model.
    pub fn replace_model(&self, model: Model) -> Model {
        let old = std::mem::replace(&mut *self.model.lock(), model);
        self.configs.forget(old.id());
        old
    }

    pub fn rng(&self) -> Prng {
        match self.seed {
            Some(seed) => Prng::new(seed),
            None => Prng::from_time(),
        }
    }
}
