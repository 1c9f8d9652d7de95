//! Interactive network diagram.
//!
//! Each network starts collapsed. An `expand` action from the client queues
//! it; the next poll emits its children and connections and marks it
//! expanded in the shared layout config. `collapse` only clears the flag:
//! the client already holds the objects and nothing is un-emitted.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{send_json, Client};
use crate::component::{send_create, send_delete, Component, ComponentBase};
use crate::config::SharedGraphConfig;
use crate::error::{Result, VizError};
use crate::model::{GraphRef, Model, ModelId, ObjectId, ObjectKind};
use crate::prng::Prng;
use crate::session::Session;

pub const DEFAULT_OBJECT_SIZE: (f64, f64) = (0.1, 0.1);

// ═══════════════════════════════════════════════════════════════════════════
// Protocol Messages
// ═══════════════════════════════════════════════════════════════════════════

/// The fixed set of actions a graph client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Expand,
    Collapse,
    Pan,
    Zoom,
    Pos,
    Size,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        Self::Expand,
        Self::Collapse,
        Self::Pan,
        Self::Zoom,
        Self::Pos,
        Self::Size,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expand => "expand",
            Self::Collapse => "collapse",
            Self::Pan => "pan",
            Self::Zoom => "zoom",
            Self::Pos => "pos",
            Self::Size => "size",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "act", rename_all = "lowercase")]
pub enum NetGraphAction {
    Expand { uid: String },
    Collapse { uid: String },
    Pan { x: f64, y: f64 },
    Zoom { scale: f64, x: f64, y: f64 },
    Pos { uid: String, x: f64, y: f64 },
    Size { uid: String, width: f64, height: f64 },
}

impl NetGraphAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Expand { .. } => ActionKind::Expand,
            Self::Collapse { .. } => ActionKind::Collapse,
            Self::Pan { .. } => ActionKind::Pan,
            Self::Zoom { .. } => ActionKind::Zoom,
            Self::Pos { .. } => ActionKind::Pos,
            Self::Size { .. } => ActionKind::Size,
        }
    }

    /// Parse a raw client payload. `Ok(None)` means the payload carried no
    /// `act` field at all; an `act` outside [`ActionKind`] is an error.
    pub fn parse(msg: &str) -> Result<Option<Self>> {
        let value: Value = serde_json::from_str(msg)?;
        let Some(act) = value.get("act") else {
            return Ok(None);
        };
        let Some(name) = act.as_str() else {
            return Err(VizError::UnknownAction(act.to_string()));
        };
        if ActionKind::parse(name).is_none() {
            return Err(VizError::UnknownAction(name.to_string()));
        }
        Ok(Some(serde_json::from_value(value)?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectInfo {
    pub uid: String,
    pub label: String,
    pub pos: [f64; 2],
    pub size: [f64; 2],
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub uid: String,
    pub pre: String,
    pub post: String,
    pub parent: Option<String>,
}

/// Everything the graph sends to its client half.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GraphMessage {
    Ens(ObjectInfo),
    Node(ObjectInfo),
    Net(ObjectInfo),
    Conn(ConnectionInfo),
    Pan { pan: [f64; 2] },
    Zoom { zoom: f64 },
    Delete { uid: String },
}

impl GraphMessage {
    fn object(kind: ObjectKind, info: ObjectInfo) -> Self {
        match kind {
            ObjectKind::Ensemble => Self::Ens(info),
            ObjectKind::Node => Self::Node(info),
            ObjectKind::Network => Self::Net(info),
        }
    }
}

/// Structural connection uid: endpoints plus how many identical
/// connections precede it in the same network.
pub fn connection_uid(pre: &str, post: &str, ordinal: usize) -> String {
    format!("conn:{pre}->{post}:{ordinal}")
}

// ═══════════════════════════════════════════════════════════════════════════
// NetGraph
// ═══════════════════════════════════════════════════════════════════════════

pub struct NetGraph {
    base: ComponentBase,
    session: Arc<Session>,
    /// Model this graph was built against; object ids mean nothing in any other.
    model_id: ModelId,
    config: SharedGraphConfig,
    /// Networks awaiting expansion, oldest first.
    to_be_expanded: VecDeque<ObjectId>,
    /// Every uid handed to the client.
    uids: HashMap<String, GraphRef>,
    rng: Prng,
}

impl NetGraph {
    pub const DEFAULT_UID: &'static str = "netgraph";

    /// Graph view of the session's model. Without an explicit config the
    /// model's shared layout config is used.
    pub fn new(session: Arc<Session>, config: Option<SharedGraphConfig>) -> Self {
        let config = config.unwrap_or_else(|| session.graph_config());
        let root = session.root();
        let rng = session.rng();
        let model_id = session.model_id();
        Self {
            base: ComponentBase::new(Self::DEFAULT_UID),
            session,
            model_id,
            config,
            to_be_expanded: VecDeque::from([root]),
            uids: HashMap::new(),
            rng,
        }
    }

    pub fn with_base(mut self, base: ComponentBase) -> Self {
        self.base = base;
        self
    }

    pub fn config(&self) -> &SharedGraphConfig {
        &self.config
    }

    pub fn pending(&self) -> usize {
        self.to_be_expanded.len()
    }

    pub fn uids(&self) -> &HashMap<String, GraphRef> {
        &self.uids
    }

    pub fn lookup(&self, uid: &str) -> Option<GraphRef> {
        self.uids.get(uid).copied()
    }

    fn ensure_current(&self, current: ModelId) -> Result<()> {
        if current != self.model_id {
            return Err(VizError::ModelReplaced);
        }
        Ok(())
    }

    /// Record what `uid` points at. A uid already bound to something else
    /// would make later actions hit the wrong target.
    fn claim_uid(&mut self, uid: &str, target: GraphRef) -> Result<()> {
        match self.uids.get(uid) {
            Some(existing) if *existing != target => Err(VizError::DuplicateUid(uid.to_string())),
            Some(_) => Ok(()),
            None => {
                self.uids.insert(uid.to_string(), target);
                Ok(())
            }
        }
    }

    /// Dispatch one parsed client action.
    pub fn handle(&mut self, action: NetGraphAction) -> Result<()> {
        debug!(act = action.kind().as_str(), "netgraph action");
        match action {
            NetGraphAction::Expand { uid } => self.act_expand(&uid),
            NetGraphAction::Collapse { uid } => self.act_collapse(&uid),
            NetGraphAction::Pan { x, y } => self.act_pan(x, y),
            NetGraphAction::Zoom { scale, x, y } => self.act_zoom(scale, x, y),
            NetGraphAction::Pos { uid, x, y } => self.act_pos(&uid, x, y),
            NetGraphAction::Size { uid, width, height } => self.act_size(&uid, width, height),
        }
    }

    pub fn act_expand(&mut self, uid: &str) -> Result<()> {
        let net = self.network_for(uid)?;
        self.to_be_expanded.push_back(net);
        self.config.lock().set_expanded(net, true);
        Ok(())
    }

    pub fn act_collapse(&mut self, uid: &str) -> Result<()> {
        let net = self.network_for(uid)?;
        self.config.lock().set_expanded(net, false);
        Ok(())
    }

    pub fn act_pan(&mut self, x: f64, y: f64) -> Result<()> {
        info!("pan to {}, {}", x, y);
        let root = self.session.root();
        self.config.lock().set_pos(root, x, y);
        Ok(())
    }

    pub fn act_zoom(&mut self, scale: f64, x: f64, y: f64) -> Result<()> {
        info!("zoom to {}", scale);
        let root = self.session.root();
        let mut cfg = self.config.lock();
        cfg.set_size(root, scale, scale);
        cfg.set_pos(root, x, y);
        Ok(())
    }

    pub fn act_pos(&mut self, uid: &str, x: f64, y: f64) -> Result<()> {
        let obj = self.object_for(uid)?;
        self.config.lock().set_pos(obj, x, y);
        Ok(())
    }

    pub fn act_size(&mut self, uid: &str, width: f64, height: f64) -> Result<()> {
        let obj = self.object_for(uid)?;
        self.config.lock().set_size(obj, width, height);
        Ok(())
    }

    fn object_for(&self, uid: &str) -> Result<ObjectId> {
        match self.uids.get(uid) {
            Some(GraphRef::Object(id)) => Ok(*id),
            // Connections have no layout of their own.
            Some(GraphRef::Connection(_)) | None => Err(VizError::UnknownUid(uid.to_string())),
        }
    }

    fn network_for(&self, uid: &str) -> Result<ObjectId> {
        let id = match self.uids.get(uid) {
            Some(GraphRef::Object(id)) => *id,
            Some(GraphRef::Connection(_)) => return Err(VizError::NotANetwork(uid.to_string())),
            None => return Err(VizError::UnknownUid(uid.to_string())),
        };
        if self.session.lock().is_network(id) {
            Ok(id)
        } else {
            Err(VizError::NotANetwork(uid.to_string()))
        }
    }

    /// Emit every child of `network` and its connections, then mark it
    /// expanded. The caller holds the model lock.
    pub fn expand_network(
        &mut self,
        model: &Model,
        network: ObjectId,
        client: &mut dyn Client,
    ) -> Result<()> {
        let parent = if network == model.root() {
            None
        } else {
            Some(model.get_uid(network)?)
        };
        let contents = model.contents(network)?;

        for &ens in &contents.ensembles {
            self.create_object(model, client, ens, ObjectKind::Ensemble, parent.as_deref())?;
        }
        for &node in &contents.nodes {
            self.create_object(model, client, node, ObjectKind::Node, parent.as_deref())?;
        }
        for &net in &contents.networks {
            self.create_object(model, client, net, ObjectKind::Network, parent.as_deref())?;
        }

        let mut seen: HashMap<(ObjectId, ObjectId), usize> = HashMap::new();
        for &conn_id in &contents.connections {
            let conn = model
                .connection(conn_id)
                .ok_or(VizError::UnknownConnection(conn_id))?;
            let ordinal = seen.entry((conn.pre, conn.post)).or_insert(0);
            let pre = model.get_uid(conn.pre)?;
            let post = model.get_uid(conn.post)?;
            let uid = connection_uid(&pre, &post, *ordinal);
            *ordinal += 1;

            self.claim_uid(&uid, GraphRef::Connection(conn_id))?;
            let info = ConnectionInfo {
                uid,
                pre,
                post,
                parent: parent.clone(),
            };
            send_json(client, &GraphMessage::Conn(info))?;
        }

        self.config.lock().set_expanded(network, true);
        Ok(())
    }

    fn create_object(
        &mut self,
        model: &Model,
        client: &mut dyn Client,
        obj: ObjectId,
        kind: ObjectKind,
        parent: Option<&str>,
    ) -> Result<()> {
        let (pos, size, expanded) = {
            let mut cfg = self.config.lock();
            let entry = cfg.entry(obj);
            let pos = match entry.pos {
                Some(pos) => pos,
                None => {
                    let pos = (self.rng.uniform(0.0, 1.0), self.rng.uniform(0.0, 1.0));
                    entry.pos = Some(pos);
                    pos
                }
            };
            let size = *entry.size.get_or_insert(DEFAULT_OBJECT_SIZE);
            (pos, size, entry.expanded)
        };

        let label = model.get_label(obj)?;
        let uid = model.get_uid(obj)?;
        self.claim_uid(&uid, GraphRef::Object(obj))?;

        let info = ObjectInfo {
            uid,
            label,
            pos: [pos.0, pos.1],
            size: [size.0, size.1],
            parent: parent.map(str::to_string),
            expanded: (kind == ObjectKind::Network).then_some(expanded),
        };
        send_json(client, &GraphMessage::object(kind, info))
    }

    fn send_pan_and_zoom(&self, root: ObjectId, client: &mut dyn Client) -> Result<()> {
        let (pan, zoom) = {
            let cfg = self.config.lock();
            let pan = cfg.pos(root).unwrap_or((0.0, 0.0));
            let zoom = cfg.size(root).map(|s| s.0).unwrap_or(1.0);
            (pan, zoom)
        };
        send_json(client, &GraphMessage::Pan { pan: [pan.0, pan.1] })?;
        send_json(client, &GraphMessage::Zoom { zoom })
    }
}

/// Uids of every object and connection currently in `model`.
fn live_uids(model: &Model) -> Result<HashSet<String>> {
    let mut live = HashSet::new();
    let mut stack = vec![model.root()];
    while let Some(net) = stack.pop() {
        let contents = model.contents(net)?;
        for &obj in contents
            .ensembles
            .iter()
            .chain(&contents.nodes)
            .chain(&contents.networks)
        {
            live.insert(model.get_uid(obj)?);
        }
        stack.extend(contents.networks.iter().copied());

        let mut seen: HashMap<(ObjectId, ObjectId), usize> = HashMap::new();
        for &conn_id in &contents.connections {
            let Some(conn) = model.connection(conn_id) else {
                continue;
            };
            let ordinal = seen.entry((conn.pre, conn.post)).or_insert(0);
            live.insert(connection_uid(
                &model.get_uid(conn.pre)?,
                &model.get_uid(conn.post)?,
                *ordinal,
            ));
            *ordinal += 1;
        }
    }
    Ok(live)
}

impl Component for NetGraph {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn type_name(&self) -> &'static str {
        "NetGraph"
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

    /// Retract every uid the old graph showed that the current model no
    /// longer has. Survivors are re-sent by the normal expansion from root.
    fn update(&mut self, old: &dyn Component, client: &mut dyn Client) -> Result<()> {
        let Some(old) = old.as_any().downcast_ref::<NetGraph>() else {
            return Ok(());
        };
        let live = {
            let model = self.session.lock();
            live_uids(&model)?
        };
        let mut stale: Vec<&String> = old.uids.keys().filter(|u| !live.contains(*u)).collect();
        stale.sort();
        for uid in stale {
            send_json(client, &GraphMessage::Delete { uid: uid.clone() })?;
        }
        Ok(())
    }

    /// Expand at most one queued network per call.
    fn update_client(&mut self, client: &mut dyn Client) -> Result<()> {
        let Some(network) = self.to_be_expanded.pop_front() else {
            return Ok(());
        };
        let session = Arc::clone(&self.session);
        let model = session.lock();
        if let Err(e) = self.ensure_current(model.id()) {
            self.to_be_expanded.push_front(network);
            return Err(e);
        }
        self.expand_network(&model, network, client)?;
        if network == model.root() {
            self.send_pan_and_zoom(network, client)?;
        }
        Ok(())
    }

    fn message(&mut self, msg: &str) -> Result<()> {
        self.ensure_current(self.session.model_id())?;
        match NetGraphAction::parse(msg)? {
            Some(action) => self.handle(action),
            None => {
                info!("received message {}", msg);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BufferedClient;
    use serde_json::json;

    fn session() -> Arc<Session> {
        let mut m = Model::new(Some("demo"));
        let root = m.root();
        let ens = m.add_ensemble(root, Some("a")).unwrap();
        m.set_uid(ens, "ens1").unwrap();
        let node = m.add_node(root, None).unwrap();
        m.set_uid(node, "node1").unwrap();
        let sub = m.add_network(root, Some("sub")).unwrap();
        m.set_uid(sub, "sub").unwrap();
        let inner = m.add_ensemble(sub, None).unwrap();
        m.connect(root, node, ens).unwrap();
        m.connect(sub, inner, ens).unwrap();
        Arc::new(Session::new(m).with_seed(11))
    }

    #[test]
    fn first_poll_expands_root_and_sends_pan_zoom_once() {
        let mut g = NetGraph::new(session(), None);
        let client = BufferedClient::new();

        g.update_client(&mut client.clone()).unwrap();
        let msgs = client.json_messages();
        let types: Vec<&str> = msgs.iter().map(|m| m["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["ens", "node", "net", "conn", "pan", "zoom"]);
        assert_eq!(msgs[4], json!({"type": "pan", "pan": [0.0, 0.0]}));
        assert_eq!(msgs[5], json!({"type": "zoom", "zoom": 1.0}));
        assert_eq!(msgs[2]["expanded"], false);
        assert!(msgs[0]["parent"].is_null());
        assert!(msgs[0].get("expanded").is_none());

        // Queue is empty now; further polls emit nothing.
        client.drain();
        g.update_client(&mut client.clone()).unwrap();
        assert!(client.is_empty());
    }

    #[test]
    fn at_most_one_network_per_poll() {
        let mut g = NetGraph::new(session(), None);
        let mut client = BufferedClient::new();
        g.update_client(&mut client).unwrap();
        client.drain();

        g.act_expand("sub").unwrap();
        g.act_expand("sub").unwrap();
        assert_eq!(g.pending(), 2);

        g.update_client(&mut client).unwrap();
        assert_eq!(g.pending(), 1);
        let msgs = client.json_messages();
        // Inner ensemble plus its connection, and no pan/zoom.
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0]["parent"], "sub");
        assert_eq!(msgs[0]["uid"], "sub.ensembles[0]");
        assert_eq!(msgs[1]["pre"], "sub.ensembles[0]");
        assert_eq!(msgs[1]["post"], "ens1");
    }

    #[test]
    fn expand_then_collapse_only_flips_the_flag() {
        let s = session();
        let sub = s.lock().resolve_uid("sub").unwrap();
        let mut g = NetGraph::new(s, None);
        let mut client = BufferedClient::new();
        g.update_client(&mut client).unwrap();
        client.drain();

        g.message(r#"{"act": "expand", "uid": "sub"}"#).unwrap();
        assert!(g.config().lock().expanded(sub));
        g.update_client(&mut client).unwrap();
        assert!(!client.is_empty());
        assert!(g.config().lock().expanded(sub));

        client.drain();
        g.message(r#"{"act": "collapse", "uid": "sub"}"#).unwrap();
        g.update_client(&mut client).unwrap();
        assert!(!g.config().lock().expanded(sub));
        assert!(client.is_empty());
    }

    #[test]
    fn defaults_are_assigned_only_when_unset() {
        let s = session();
        let ens = s.lock().resolve_uid("ens1").unwrap();
        let node = s.lock().resolve_uid("node1").unwrap();
        let cfg = s.graph_config();
        cfg.lock().set_pos(ens, 0.25, 0.75);
        cfg.lock().set_size(ens, 2.0, 3.0);

        let mut g = NetGraph::new(s, None);
        let client = BufferedClient::new();
        g.update_client(&mut client.clone()).unwrap();

        let msgs = client.json_messages();
        assert_eq!(msgs[0]["pos"], json!([0.25, 0.75]));
        assert_eq!(msgs[0]["size"], json!([2.0, 3.0]));
        assert_eq!(cfg.lock().pos(ens), Some((0.25, 0.75)));

        let node_pos = cfg.lock().pos(node).unwrap();
        assert!((0.0..1.0).contains(&node_pos.0) && (0.0..1.0).contains(&node_pos.1));
        assert_eq!(cfg.lock().size(node), Some(DEFAULT_OBJECT_SIZE));

        // Re-expanding keeps the positions drawn the first time.
        let mut again = NetGraph::new(Arc::clone(&g.session), None);
        let second = BufferedClient::new();
        again.update_client(&mut second.clone()).unwrap();
        assert_eq!(second.json_messages()[1]["pos"], msgs[1]["pos"]);
        assert_eq!(cfg.lock().pos(node), Some(node_pos));
    }

    #[test]
    fn pan_and_zoom_reflect_root_config() {
        let mut g = NetGraph::new(session(), None);
        g.message(r#"{"act": "zoom", "scale": 2.5, "x": 4.0, "y": -1.0}"#)
            .unwrap();

        let client = BufferedClient::new();
        g.update_client(&mut client.clone()).unwrap();
        let msgs = client.json_messages();
        let n = msgs.len();
        assert_eq!(msgs[n - 2], json!({"type": "pan", "pan": [4.0, -1.0]}));
        assert_eq!(msgs[n - 1], json!({"type": "zoom", "zoom": 2.5}));

        g.message(r#"{"act": "pan", "x": 1.0, "y": 2.0}"#).unwrap();
        let root = g.session.root();
        assert_eq!(g.config().lock().pos(root), Some((1.0, 2.0)));
    }

    #[test]
    fn pos_and_size_update_known_objects() {
        let s = session();
        let ens = s.lock().resolve_uid("ens1").unwrap();
        let mut g = NetGraph::new(s, None);
        g.update_client(&mut BufferedClient::new()).unwrap();

        g.message(r#"{"act": "pos", "uid": "ens1", "x": 0.1, "y": 0.2}"#)
            .unwrap();
        g.message(r#"{"act": "size", "uid": "ens1", "width": 0.3, "height": 0.4}"#)
            .unwrap();
        assert_eq!(g.config().lock().pos(ens), Some((0.1, 0.2)));
        assert_eq!(g.config().lock().size(ens), Some((0.3, 0.4)));
    }

    #[test]
    fn bad_actions_are_typed_errors() {
        let mut g = NetGraph::new(session(), None);
        g.update_client(&mut BufferedClient::new()).unwrap();

        assert!(matches!(
            g.message(r#"{"act": "explode", "uid": "ens1"}"#),
            Err(VizError::UnknownAction(a)) if a == "explode"
        ));
        assert!(matches!(
            g.message(r#"{"act": "expand", "uid": "nope"}"#),
            Err(VizError::UnknownUid(_))
        ));
        assert!(matches!(
            g.message(r#"{"act": "expand", "uid": "ens1"}"#),
            Err(VizError::NotANetwork(_))
        ));
        assert!(matches!(
            g.message(r#"{"act": "pos", "uid": "ens1"}"#),
            Err(VizError::InvalidMessage(_))
        ));
        assert!(matches!(g.message("not json"), Err(VizError::InvalidMessage(_))));

        // No `act` at all is logged and ignored.
        g.message(r#"{"hello": 1}"#).unwrap();
    }

    #[test]
    fn duplicate_connections_get_distinct_uids() {
        let mut m = Model::new(None);
        let root = m.root();
        let a = m.add_ensemble(root, None).unwrap();
        let b = m.add_ensemble(root, None).unwrap();
        m.connect(root, a, b).unwrap();
        m.connect(root, a, b).unwrap();
        let mut g = NetGraph::new(Arc::new(Session::new(m)), None);

        let client = BufferedClient::new();
        g.update_client(&mut client.clone()).unwrap();
        let conns: Vec<String> = client
            .json_messages()
            .iter()
            .filter(|m| m["type"] == "conn")
            .map(|m| m["uid"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            conns,
            vec![
                "conn:model.ensembles[0]->model.ensembles[1]:0",
                "conn:model.ensembles[0]->model.ensembles[1]:1",
            ]
        );
        assert_eq!(g.uids().len(), 4);
    }

    #[test]
    fn update_retracts_uids_missing_from_the_new_model() {
        let s = session();
        let mut old = NetGraph::new(Arc::clone(&s), None);
        old.update_client(&mut BufferedClient::new()).unwrap();

        let node = s.lock().resolve_uid("node1").unwrap();
        s.lock().remove_object(node).unwrap();

        let mut new = NetGraph::new(Arc::clone(&s), None);
        let client = BufferedClient::new();
        new.update(&old, &mut client.clone()).unwrap();
        assert_eq!(
            client.json_messages(),
            vec![
                json!({"type": "delete", "uid": "conn:node1->ens1:0"}),
                json!({"type": "delete", "uid": "node1"}),
            ]
        );
    }

    #[test]
    fn graph_of_a_replaced_model_refuses_to_act() {
        let s = session();
        let mut g = NetGraph::new(Arc::clone(&s), None);
        s.replace_model(Model::new(Some("next")));

        let client = BufferedClient::new();
        assert!(matches!(
            g.update_client(&mut client.clone()),
            Err(VizError::ModelReplaced)
        ));
        assert_eq!(g.pending(), 1);
        assert!(client.is_empty());
        assert!(matches!(
            g.message(r#"{"act": "expand", "uid": "sub"}"#),
            Err(VizError::ModelReplaced)
        ));
    }

    #[test]
    fn a_uid_cannot_point_at_two_targets() {
        let mut g = NetGraph::new(session(), None);
        g.claim_uid("x", GraphRef::Object(ObjectId(1))).unwrap();
        g.claim_uid("x", GraphRef::Object(ObjectId(1))).unwrap();
        assert!(matches!(
            g.claim_uid("x", GraphRef::Object(ObjectId(2))),
            Err(VizError::DuplicateUid(uid)) if uid == "x"
        ));
        assert_eq!(g.lookup("x"), Some(GraphRef::Object(ObjectId(1))));
    }
}
