//! Server-side half of a user-interface component.
//!
//! Every part of the page has a client half (JavaScript) and a server half
//! implementing [`Component`]. The host calls [`Component::update_client`]
//! on a fixed interval to push state out, and routes every payload the
//! client sends into [`Component::message`].
//!
//! Components may also need objects in the simulation graph (probes,
//! input overrides). [`Component::add_model_objects`] runs once before each
//! build and [`Component::remove_model_objects`] once after, so the graph is
//! left exactly as the user wrote it between builds.

use std::any::Any;
use std::cmp::Ordering;

use hashbrown::HashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::{send_json, Client};
use crate::config::ComponentConfig;
use crate::error::{Result, VizError};
use crate::model::{Model, ObjectId};
use crate::position::Position;
use crate::widget::Widget;

/// Object -> variable name, the reverse of the script's namespace. Used to
/// write components back out as constructor calls.
pub type NameTable = HashMap<ObjectId, String>;

/// Page-assigned handle for one component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKey(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(pub u64);

/// State every component carries.
#[derive(Debug, Clone)]
pub struct ComponentBase {
    uid: String,
    /// Render order on the page; lower renders first.
    pub order: i32,
    pub pos: Position,
    /// Successor installed by a hot reload. Hosts holding this component
    /// should follow the link.
    pub replace_with: Option<ComponentKey>,
    config: Option<ComponentConfig>,
    page: Option<PageId>,
}

impl ComponentBase {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            order: 0,
            pos: Position::default(),
            replace_with: None,
            config: None,
            page: None,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_pos(mut self, pos: Position) -> Self {
        self.pos = pos;
        self
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn config(&self) -> Option<&ComponentConfig> {
        self.config.as_ref()
    }

    pub fn config_mut(&mut self) -> Option<&mut ComponentConfig> {
        self.config.as_mut()
    }

    pub fn page(&self) -> Option<PageId> {
        self.page
    }

    fn bind(&mut self, page: PageId, config: ComponentConfig) {
        self.page = Some(page);
        self.config = Some(config);
    }
}

pub trait Component: Any + Send {
    fn base(&self) -> &ComponentBase;

    fn base_mut(&mut self) -> &mut ComponentBase;

    /// Client-side class name, also used in config files.
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn uid(&self) -> &str {
        self.base().uid()
    }

    fn order(&self) -> i32 {
        self.base().order
    }

    /// Fired once when the component joins a page.
    fn on_page_add(&mut self, page: PageId, config: ComponentConfig) {
        self.base_mut().bind(page, config);
    }

    /// Instruct the client to create this component.
    fn create(&mut self, client: &mut dyn Client) -> Result<()>;

    /// Instruct the client to delete this component.
    fn delete(&mut self, client: &mut dyn Client) -> Result<()>;

    /// Push whatever differs between `old` (the instance being superseded)
    /// and `self`. Only called when `self.similar(old)`.
    fn update(&mut self, old: &dyn Component, client: &mut dyn Client) -> Result<()>;

    /// Polled by the host; send any pending state.
    fn update_client(&mut self, _client: &mut dyn Client) -> Result<()> {
        Ok(())
    }

    /// Raw payload from the client half.
    fn message(&mut self, msg: &str) -> Result<()> {
        debug!(uid = self.uid(), "unhandled message: {}", msg);
        Ok(())
    }

    /// The fast-transport half, for components that stream data.
    fn widget_mut(&mut self) -> Option<&mut Widget> {
        None
    }

    /// Runs just before each build. Must be idempotent.
    fn add_model_objects(&mut self, _model: &mut Model) -> Result<()> {
        Ok(())
    }

    /// Runs after each build; undoes `add_model_objects` completely.
    fn remove_model_objects(&mut self, _model: &mut Model) -> Result<()> {
        Ok(())
    }

    /// True when `update` can morph `other` into `self`: same uid and same
    /// concrete type.
    fn similar(&self, other: &dyn Component) -> bool {
        self.uid() == other.uid() && self.as_any().type_id() == other.as_any().type_id()
    }

    /// Merge this component's config into `cfg` for the client. Keys that
    /// are already present are rejected rather than overwritten.
    fn javascript_config(&self, mut cfg: Map<String, Value>) -> Result<String> {
        if let Some(own) = self.base().config() {
            for (key, value) in own.iter() {
                if cfg.contains_key(key) {
                    return Err(VizError::DuplicateConfigKey(key.clone()));
                }
                cfg.insert(key.clone(), value.clone());
            }
        }
        Ok(serde_json::to_string(&cfg)?)
    }

    /// Constructor arguments for [`Component::code_python`].
    fn code_python_args(&self, _names: &NameTable) -> Vec<String> {
        Vec::new()
    }

    /// Expression that re-creates this component from a config file.
    fn code_python(&self, names: &NameTable) -> String {
        format!(
            "nengo_gui.components.{}({})",
            self.type_name(),
            self.code_python_args(names).join(",")
        )
    }
}

/// Compare by render order only. Components with equal order are not
/// considered the same component.
pub fn order_cmp(a: &dyn Component, b: &dyn Component) -> Ordering {
    a.order().cmp(&b.order())
}

/// Stable: ties keep their insertion order.
pub fn sort_by_order(components: &mut [Box<dyn Component>]) {
    components.sort_by(|a, b| order_cmp(a.as_ref(), b.as_ref()));
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum LifecycleMessage<'a> {
    Delete { uid: &'a str },
}

/// Standard create instruction: type, component class and uid, followed by
/// the component's config entries.
pub fn send_create(component: &dyn Component, client: &mut dyn Client) -> Result<()> {
    let mut cfg = Map::new();
    cfg.insert("type".into(), Value::from("create"));
    cfg.insert("component".into(), Value::from(component.type_name()));
    cfg.insert("uid".into(), Value::from(component.uid()));
    let text = component.javascript_config(cfg)?;
    client.write(&text)
}

pub fn send_delete(uid: &str, client: &mut dyn Client) -> Result<()> {
    send_json(client, &LifecycleMessage::Delete { uid })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::BufferedClient;

    /// Minimal component for exercising the trait defaults.
    pub(crate) struct Probe {
        base: ComponentBase,
        pub(crate) updates: usize,
    }

    impl Probe {
        pub(crate) fn new(uid: &str, order: i32) -> Self {
            Self {
                base: ComponentBase::new(uid).with_order(order),
                updates: 0,
            }
        }
    }

    impl Component for Probe {
        fn base(&self) -> &ComponentBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut ComponentBase {
            &mut self.base
        }
        fn type_name(&self) -> &'static str {
            "Probe"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn create(&mut self, client: &mut dyn Client) -> Result<()> {
            send_create(&*self, client)
        }
        fn delete(&mut self, client: &mut dyn Client) -> Result<()> {
            send_delete(self.uid(), client)
        }
        fn update(&mut self, _old: &dyn Component, _client: &mut dyn Client) -> Result<()> {
            self.updates += 1;
            Ok(())
        }
    }

    pub(crate) struct OtherProbe(ComponentBase);

    impl OtherProbe {
        pub(crate) fn new(uid: &str) -> Self {
            Self(ComponentBase::new(uid))
        }
    }

    impl Component for OtherProbe {
        fn base(&self) -> &ComponentBase {
            &self.0
        }
        fn base_mut(&mut self) -> &mut ComponentBase {
            &mut self.0
        }
        fn type_name(&self) -> &'static str {
            "OtherProbe"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn create(&mut self, client: &mut dyn Client) -> Result<()> {
            send_create(&*self, client)
        }
        fn delete(&mut self, client: &mut dyn Client) -> Result<()> {
            send_delete(self.uid(), client)
        }
        fn update(&mut self, _old: &dyn Component, _client: &mut dyn Client) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn similar_requires_same_uid_and_type() {
        let a = Probe::new("x", 0);
        let b = Probe::new("x", 5);
        let c = Probe::new("y", 0);
        let d = OtherProbe::new("x");

        assert!(a.similar(&b));
        assert!(!a.similar(&c));
        assert!(!a.similar(&d));
        assert!(!d.similar(&a));
    }

    #[test]
    fn sorting_by_order_is_stable() {
        let mut comps: Vec<Box<dyn Component>> = vec![
            Box::new(Probe::new("c", 2)),
            Box::new(Probe::new("a", 1)),
            Box::new(Probe::new("b", 1)),
            Box::new(Probe::new("z", -1)),
        ];
        sort_by_order(&mut comps);
        let uids: Vec<&str> = comps.iter().map(|c| c.uid()).collect();
        assert_eq!(uids, vec!["z", "a", "b", "c"]);
        assert_eq!(
            order_cmp(comps[1].as_ref(), comps[2].as_ref()),
            Ordering::Equal
        );
    }

    #[test]
    fn javascript_config_rejects_duplicate_keys() {
        let mut p = Probe::new("p", 0);
        p.on_page_add(PageId(1), ComponentConfig::from_position(&Position::default()));

        let mut cfg = Map::new();
        cfg.insert("label".into(), Value::from("plot"));
        let text = p.javascript_config(cfg).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["width"], 100.0);
        assert_eq!(v["label"], "plot");

        let mut clash = Map::new();
        clash.insert("x".into(), Value::from(3));
        assert!(matches!(
            p.javascript_config(clash),
            Err(VizError::DuplicateConfigKey(k)) if k == "x"
        ));
    }

    #[test]
    fn create_and_delete_messages() {
        let mut p = Probe::new("p1", 0);
        p.on_page_add(PageId(1), ComponentConfig::new());
        assert_eq!(p.base().page(), Some(PageId(1)));

        let mut client = BufferedClient::new();
        p.create(&mut client).unwrap();
        p.delete(&mut client).unwrap();

        let msgs = client.json_messages();
        assert_eq!(msgs[0]["type"], "create");
        assert_eq!(msgs[0]["component"], "Probe");
        assert_eq!(msgs[0]["uid"], "p1");
        assert_eq!(msgs[1], serde_json::json!({"type": "delete", "uid": "p1"}));
    }

    #[test]
    fn plain_components_have_no_widget() {
        assert!(Probe::new("p", 0).widget_mut().is_none());
    }

    #[test]
    fn code_python_names_the_component_class() {
        let p = Probe::new("p", 0);
        assert_eq!(
            p.code_python(&NameTable::new()),
            "nengo_gui.components.Probe()"
        );
    }
}
