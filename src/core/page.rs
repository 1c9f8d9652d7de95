//! A page hosts the components of one visualization.
//!
//! Components are kept in insertion order and rendered by `order`. Hot
//! reload swaps in a new set of components: similar ones are diffed in
//! place, everything else is deleted and re-created. Superseded instances
//! stay reachable through `replace_with` until [`Page::prune`] drops them.

use hashbrown::HashMap;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::Client;
use crate::component::{Component, ComponentKey, NameTable, PageId};
use crate::config::ComponentConfig;
use crate::error::{Result, VizError};
use crate::model::Model;
use crate::session::Session;

/// The external build step, run between the components' model hooks.
pub trait Builder {
    fn build(&mut self, model: &Model) -> Result<()>;
}

impl<F> Builder for F
where
    F: FnMut(&Model) -> Result<()>,
{
    fn build(&mut self, model: &Model) -> Result<()> {
        self(model)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub updated: usize,
    pub replaced: usize,
    pub created: usize,
    pub removed: usize,
}

pub struct Page {
    id: PageId,
    components: HashMap<ComponentKey, Box<dyn Component>>,
    /// Live components in insertion order.
    live: Vec<ComponentKey>,
    retired: Vec<ComponentKey>,
    forwarding: HashMap<ComponentKey, ComponentKey>,
    /// Saved client settings by component uid, applied on add.
    saved_configs: HashMap<String, ComponentConfig>,
    next_key: u64,
}

impl Page {
    pub fn new(id: PageId) -> Self {
        Self {
            id,
            components: HashMap::new(),
            live: Vec::new(),
            retired: Vec::new(),
            forwarding: HashMap::new(),
            saved_configs: HashMap::new(),
            next_key: 0,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Settings to hand a component with this uid when it joins.
    pub fn set_saved_config(&mut self, uid: &str, config: ComponentConfig) {
        self.saved_configs.insert(uid.to_string(), config);
    }

    /// Add a component without telling the client.
    pub fn add(&mut self, component: Box<dyn Component>) -> ComponentKey {
        let key = self.insert(component);
        self.live.push(key);
        key
    }

    fn insert(&mut self, mut component: Box<dyn Component>) -> ComponentKey {
        let key = ComponentKey(self.next_key);
        self.next_key += 1;
        let config = self
            .saved_configs
            .get(component.uid())
            .cloned()
            .unwrap_or_else(|| ComponentConfig::from_position(&component.base().pos));
        component.on_page_add(self.id, config);
        self.components.insert(key, component);
        key
    }

    pub fn get(&self, key: ComponentKey) -> Option<&dyn Component> {
        self.components.get(&key).map(|c| c.as_ref())
    }

    pub fn get_mut(&mut self, key: ComponentKey) -> Option<&mut Box<dyn Component>> {
        self.components.get_mut(&key)
    }

    /// Live component with this uid.
    pub fn find(&self, uid: &str) -> Option<ComponentKey> {
        self.live
            .iter()
            .copied()
            .find(|k| self.components.get(k).is_some_and(|c| c.uid() == uid))
    }

    /// Follow `replace_with` links from `key` to the live successor.
    pub fn resolve(&self, key: ComponentKey) -> Option<ComponentKey> {
        let mut current = key;
        while let Some(next) = self.forwarding.get(&current) {
            current = *next;
        }
        self.live.contains(&current).then_some(current)
    }

    pub fn is_live(&self, key: ComponentKey) -> bool {
        self.live.contains(&key)
    }

    /// Live keys sorted by render order; ties keep insertion order.
    pub fn sorted_keys(&self) -> Vec<ComponentKey> {
        let mut keys = self.live.clone();
        keys.sort_by_key(|k| self.components.get(k).map(|c| c.order()).unwrap_or(0));
        keys
    }

    /// Send create instructions for every live component, in render order.
    pub fn create_all(&mut self, client: &mut dyn Client) -> Result<()> {
        for key in self.sorted_keys() {
            if let Some(c) = self.components.get_mut(&key) {
                c.create(client)?;
            }
        }
        Ok(())
    }

    pub fn poll(&mut self, key: ComponentKey, client: &mut dyn Client) -> Result<()> {
        self.live_mut(key)?.update_client(client)
    }

    pub fn message(&mut self, key: ComponentKey, msg: &str) -> Result<()> {
        self.live_mut(key)?.message(msg)
    }

    fn live_mut(&mut self, key: ComponentKey) -> Result<&mut Box<dyn Component>> {
        let live = self
            .resolve(key)
            .ok_or_else(|| VizError::UnknownComponent(format!("{:?}", key)))?;
        self.components
            .get_mut(&live)
            .ok_or_else(|| VizError::UnknownComponent(format!("{:?}", live)))
    }

    /// Swap in a fresh set of components. Similar components diff against
    /// their predecessor; dissimilar ones delete it and create themselves;
    /// predecessors with no counterpart are deleted.
    ///
    /// The bookkeeping always completes: when a client write fails the pass
    /// still retires every predecessor, and the first error is returned at
    /// the end.
    pub fn reload(
        &mut self,
        components: Vec<Box<dyn Component>>,
        client: &mut dyn Client,
    ) -> Result<ReloadSummary> {
        let mut summary = ReloadSummary::default();
        let mut failure = None;
        let mut previous = std::mem::take(&mut self.live);

        for component in components {
            let new_key = self.insert(component);
            self.live.push(new_key);

            let uid = self.components[&new_key].uid().to_string();
            let old_key = previous
                .iter()
                .position(|k| self.components.get(k).is_some_and(|c| c.uid() == uid))
                .map(|i| previous.remove(i));

            let Some(old_key) = old_key else {
                if let Some(new) = self.components.get_mut(&new_key) {
                    keep_first(&mut failure, new.create(client));
                }
                summary.created += 1;
                continue;
            };

            let Some(mut old) = self.components.remove(&old_key) else {
                continue;
            };
            if let Some(new) = self.components.get_mut(&new_key) {
                if new.similar(old.as_ref()) {
                    keep_first(&mut failure, new.update(old.as_ref(), client));
                    summary.updated += 1;
                } else {
                    keep_first(&mut failure, old.delete(client));
                    keep_first(&mut failure, new.create(client));
                    summary.replaced += 1;
                }
            }
            old.base_mut().replace_with = Some(new_key);
            self.forwarding.insert(old_key, new_key);
            self.components.insert(old_key, old);
            self.retired.push(old_key);
        }

        for old_key in previous {
            if let Some(old) = self.components.get_mut(&old_key) {
                keep_first(&mut failure, old.delete(client));
            }
            self.retired.push(old_key);
            summary.removed += 1;
        }

        info!(
            "page reloaded: {} updated, {} replaced, {} created, {} removed",
            summary.updated, summary.replaced, summary.created, summary.removed
        );
        match failure {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    /// Drop superseded components. Their forwarding links survive so stale
    /// keys still resolve to the live successor.
    pub fn prune(&mut self) -> usize {
        let n = self.retired.len();
        for key in self.retired.drain(..) {
            self.components.remove(&key);
        }
        n
    }

    /// Run `builder` with every component's model hooks around it. Objects
    /// added before the build are removed afterwards even when the build
    /// fails. The model lock is held throughout.
    pub fn build(&mut self, session: &Session, builder: &mut dyn Builder) -> Result<()> {
        let mut model = session.lock();
        let keys = self.sorted_keys();

        let mut added = Vec::with_capacity(keys.len());
        let mut result = Ok(());
        for key in keys {
            let Some(c) = self.components.get_mut(&key) else {
                continue;
            };
            if let Err(e) = c.add_model_objects(&mut model) {
                result = Err(e);
                // A failed add may be partial; let remove clean it up.
                added.push(key);
                break;
            }
            added.push(key);
        }

        if result.is_ok() {
            result = builder.build(&model);
        }

        for key in added.into_iter().rev() {
            let Some(c) = self.components.get_mut(&key) else {
                continue;
            };
            if let Err(e) = c.remove_model_objects(&mut model) {
                warn!(uid = c.uid(), "remove_model_objects failed: {}", e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Config-file text re-creating every live component and its client
    /// settings.
    pub fn code_python(&self, names: &NameTable) -> String {
        let mut lines = Vec::new();
        for key in self.sorted_keys() {
            let Some(c) = self.components.get(&key) else {
                continue;
            };
            let var = python_name(c.uid());
            lines.push(format!("{} = {}", var, c.code_python(names)));
            if let Some(cfg) = c.base().config() {
                for (k, v) in cfg.iter() {
                    lines.push(format!("_viz_config[{}].{} = {}", var, k, python_literal(v)));
                }
            }
        }
        lines.join("\n")
    }
}

fn keep_first(slot: &mut Option<VizError>, result: Result<()>) {
    if let Err(e) = result {
        warn!("reload: {}", e);
        slot.get_or_insert(e);
    }
}

fn python_name(uid: &str) -> String {
    let body: String = uid
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("_viz_{}", body)
}

fn python_literal(v: &Value) -> String {
    match v {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => Value::String(s.clone()).to_string(),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(python_literal).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", Value::String(k.clone()), python_literal(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}
