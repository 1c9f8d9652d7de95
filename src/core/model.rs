//! The simulation graph as the visualization sees it.
//!
//! The simulator itself lives elsewhere. This arena only records what the
//! views need: which networks contain which ensembles, nodes, sub-networks
//! and connections, plus labels. Components that probe the model during a
//! build add and remove objects here.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VizError};

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one loaded model; reloading a script yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Ensemble,
    Node,
    Network,
}

impl ObjectKind {
    /// Short name the graph view uses in its `type` field.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Ensemble => "ens",
            Self::Node => "node",
            Self::Network => "net",
        }
    }

    /// Collection name inside a parent network, as used in uids.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Ensemble => "ensembles",
            Self::Node => "nodes",
            Self::Network => "networks",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelObject {
    pub kind: ObjectKind,
    pub label: Option<String>,
    /// `None` only for the root network.
    pub parent: Option<ObjectId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkContents {
    pub ensembles: Vec<ObjectId>,
    pub nodes: Vec<ObjectId>,
    pub networks: Vec<ObjectId>,
    pub connections: Vec<ConnectionId>,
}

impl NetworkContents {
    fn list_mut(&mut self, kind: ObjectKind) -> &mut Vec<ObjectId> {
        match kind {
            ObjectKind::Ensemble => &mut self.ensembles,
            ObjectKind::Node => &mut self.nodes,
            ObjectKind::Network => &mut self.networks,
        }
    }

    fn list(&self, kind: ObjectKind) -> &[ObjectId] {
        match kind {
            ObjectKind::Ensemble => &self.ensembles,
            ObjectKind::Node => &self.nodes,
            ObjectKind::Network => &self.networks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub pre: ObjectId,
    pub post: ObjectId,
    /// Network the connection was declared in.
    pub parent: ObjectId,
}

/// What a client-visible uid points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphRef {
    Object(ObjectId),
    Connection(ConnectionId),
}

#[derive(Debug, Clone)]
pub struct Model {
    id: ModelId,
    root: ObjectId,
    objects: HashMap<ObjectId, ModelObject>,
    networks: HashMap<ObjectId, NetworkContents>,
    connections: HashMap<ConnectionId, Connection>,
    /// Names registered by the host (usually script variable names); these
    /// take precedence over path uids.
    named: HashMap<ObjectId, String>,
    next_object: u32,
    next_connection: u32,
}

impl Model {
    pub fn new(label: Option<&str>) -> Self {
        let root = ObjectId(0);
        let mut objects = HashMap::new();
        objects.insert(
            root,
            ModelObject {
                kind: ObjectKind::Network,
                label: label.map(str::to_string),
                parent: None,
            },
        );
        let mut networks = HashMap::new();
        networks.insert(root, NetworkContents::default());

        Self {
            id: ModelId(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed)),
            root,
            objects,
            networks,
            connections: HashMap::new(),
            named: HashMap::new(),
            next_object: 1,
            next_connection: 0,
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn object(&self, id: ObjectId) -> Option<&ModelObject> {
        self.objects.get(&id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn is_network(&self, id: ObjectId) -> bool {
        self.networks.contains_key(&id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Same objects, containment and connections, ignoring model identity
    /// and id allocation counters.
    pub fn same_structure(&self, other: &Model) -> bool {
        self.root == other.root
            && self.objects == other.objects
            && self.networks == other.networks
            && self.connections == other.connections
            && self.named == other.named
    }

    pub fn contents(&self, net: ObjectId) -> Result<&NetworkContents> {
        self.networks.get(&net).ok_or(VizError::UnknownObject(net))
    }

    pub fn add_ensemble(&mut self, net: ObjectId, label: Option<&str>) -> Result<ObjectId> {
        self.add_object(net, ObjectKind::Ensemble, label)
    }

    pub fn add_node(&mut self, net: ObjectId, label: Option<&str>) -> Result<ObjectId> {
        self.add_object(net, ObjectKind::Node, label)
    }

    pub fn add_network(&mut self, net: ObjectId, label: Option<&str>) -> Result<ObjectId> {
        self.add_object(net, ObjectKind::Network, label)
    }

    pub fn add_object(
        &mut self,
        net: ObjectId,
        kind: ObjectKind,
        label: Option<&str>,
    ) -> Result<ObjectId> {
        if !self.is_network(net) {
            return Err(VizError::UnknownObject(net));
        }
        let id = ObjectId(self.next_object);
        self.next_object += 1;

        self.objects.insert(
            id,
            ModelObject {
                kind,
                label: label.map(str::to_string),
                parent: Some(net),
            },
        );
        if kind == ObjectKind::Network {
            self.networks.insert(id, NetworkContents::default());
        }
        if let Some(contents) = self.networks.get_mut(&net) {
            contents.list_mut(kind).push(id);
        }
        Ok(id)
    }

    pub fn connect(&mut self, net: ObjectId, pre: ObjectId, post: ObjectId) -> Result<ConnectionId> {
        if !self.is_network(net) {
            return Err(VizError::UnknownObject(net));
        }
        for end in [pre, post] {
            if !self.contains(end) {
                return Err(VizError::UnknownObject(end));
            }
        }
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connections.insert(
            id,
            Connection {
                pre,
                post,
                parent: net,
            },
        );
        if let Some(contents) = self.networks.get_mut(&net) {
            contents.connections.push(id);
        }
        Ok(id)
    }

    pub fn remove_connection(&mut self, id: ConnectionId) -> Result<()> {
        let conn = self
            .connections
            .remove(&id)
            .ok_or(VizError::UnknownConnection(id))?;
        if let Some(contents) = self.networks.get_mut(&conn.parent) {
            contents.connections.retain(|c| *c != id);
        }
        Ok(())
    }

    /// Remove an object, its subtree if it is a network, and every
    /// connection touching a removed object. The root cannot be removed.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<()> {
        if id == self.root {
            return Err(VizError::UnknownObject(id));
        }
        let obj = self.objects.get(&id).ok_or(VizError::UnknownObject(id))?;
        let (kind, parent) = (obj.kind, obj.parent);

        let mut doomed = vec![id];
        let mut i = 0;
        while i < doomed.len() {
            if let Some(contents) = self.networks.get(&doomed[i]) {
                doomed.extend(contents.ensembles.iter().copied());
                doomed.extend(contents.nodes.iter().copied());
                doomed.extend(contents.networks.iter().copied());
            }
            i += 1;
        }

        let dead_conns: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, c)| doomed.contains(&c.pre) || doomed.contains(&c.post))
            .map(|(cid, _)| *cid)
            .collect();
        for cid in dead_conns {
            self.remove_connection(cid)?;
        }

        for d in &doomed {
            self.objects.remove(d);
            self.networks.remove(d);
            self.named.remove(d);
        }
        if let Some(contents) = parent.and_then(|p| self.networks.get_mut(&p)) {
            contents.list_mut(kind).retain(|o| *o != id);
        }
        Ok(())
    }

    /// Register a fixed uid for `id`. Uids must stay unique, so names shaped
    /// like a derived path (`model`, `x.nodes[0]`) or a connection uid are
    /// refused.
    pub fn set_uid(&mut self, id: ObjectId, uid: &str) -> Result<()> {
        if !self.contains(id) {
            return Err(VizError::UnknownObject(id));
        }
        if is_structural_uid(uid) {
            return Err(VizError::InvalidModel(format!(
                "uid {uid:?} collides with derived uids"
            )));
        }
        if self.resolve_uid(uid).is_some_and(|other| other != id) {
            return Err(VizError::InvalidModel(format!("uid {uid:?} already in use")));
        }
        self.named.insert(id, uid.to_string());
        Ok(())
    }

    /// Session-stable uid. A registered name wins; otherwise `model` for
    /// the root and the parent's uid followed by `.<collection>[<index>]`
    /// for everything else.
    pub fn get_uid(&self, id: ObjectId) -> Result<String> {
        if let Some(uid) = self.named.get(&id) {
            return Ok(uid.clone());
        }
        let obj = self.object(id).ok_or(VizError::UnknownObject(id))?;
        let Some(parent) = obj.parent else {
            return Ok("model".to_string());
        };
        let contents = self.contents(parent)?;
        let index = contents
            .list(obj.kind)
            .iter()
            .position(|o| *o == id)
            .ok_or(VizError::UnknownObject(id))?;
        Ok(format!(
            "{}.{}[{}]",
            self.get_uid(parent)?,
            obj.kind.collection(),
            index
        ))
    }

    /// Display label, falling back to the uid.
    pub fn get_label(&self, id: ObjectId) -> Result<String> {
        let obj = self.object(id).ok_or(VizError::UnknownObject(id))?;
        match &obj.label {
            Some(label) => Ok(label.clone()),
            None => self.get_uid(id),
        }
    }

    /// Reverse of [`Model::get_uid`]. Linear in the model size.
    pub fn resolve_uid(&self, uid: &str) -> Option<ObjectId> {
        self.objects
            .keys()
            .copied()
            .find(|id| self.get_uid(*id).map(|u| u == uid).unwrap_or(false))
    }

    /// Object id -> identifier table for config files. Labels that are
    /// valid identifiers are used as-is; everything else gets a name derived
    /// from its uid.
    pub fn names(&self) -> HashMap<ObjectId, String> {
        let mut out = HashMap::new();
        let mut taken: HashSet<String> = HashSet::new();
        let mut ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        ids.sort();
        for id in ids {
            let Ok(uid) = self.get_uid(id) else { continue };
            let label = self.objects[&id].label.as_deref();
            let base = match label {
                Some(l) if is_identifier(l) && !taken.contains(l) => l.to_string(),
                _ => uid
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                    .collect::<String>()
                    .trim_end_matches('_')
                    .to_string(),
            };
            let mut name = base.clone();
            let mut suffix = 1;
            while taken.contains(&name) {
                name = format!("{base}_{suffix}");
                suffix += 1;
            }
            taken.insert(name.clone());
            out.insert(id, name);
        }
        out
    }

    pub fn from_description(desc: &NetworkDescription) -> Result<Self> {
        let mut model = Model::new(desc.label.as_deref());
        let mut by_label = HashMap::new();
        let root = model.root;
        model.describe(root, &desc.uid, &None, &mut by_label)?;
        model.populate(root, desc, &mut by_label)?;
        model.wire(root, desc, &by_label)?;
        Ok(model)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let desc: NetworkDescription = serde_json::from_str(text)?;
        Self::from_description(&desc)
    }

    fn populate(
        &mut self,
        net: ObjectId,
        desc: &NetworkDescription,
        by_label: &mut HashMap<String, ObjectId>,
    ) -> Result<()> {
        for e in &desc.ensembles {
            let id = self.add_ensemble(net, e.label.as_deref())?;
            self.describe(id, &e.uid, &e.label, by_label)?;
        }
        for n in &desc.nodes {
            let id = self.add_node(net, n.label.as_deref())?;
            self.describe(id, &n.uid, &n.label, by_label)?;
        }
        for sub in &desc.networks {
            let id = self.add_network(net, sub.label.as_deref())?;
            self.describe(id, &sub.uid, &sub.label, by_label)?;
            self.populate(id, sub, by_label)?;
        }
        Ok(())
    }

    /// Apply a described uid and index the object for connection lookup,
    /// by uid and by label.
    fn describe(
        &mut self,
        id: ObjectId,
        uid: &Option<String>,
        label: &Option<String>,
        by_label: &mut HashMap<String, ObjectId>,
    ) -> Result<()> {
        if let Some(uid) = uid {
            self.set_uid(id, uid)?;
            by_label.insert(uid.clone(), id);
        }
        if let Some(label) = label {
            by_label.entry(label.clone()).or_insert(id);
        }
        Ok(())
    }

    fn wire(
        &mut self,
        net: ObjectId,
        desc: &NetworkDescription,
        by_label: &HashMap<String, ObjectId>,
    ) -> Result<()> {
        let lookup = |label: &str| {
            by_label
                .get(label)
                .copied()
                .ok_or_else(|| VizError::InvalidModel(format!("no object named {label:?}")))
        };
        for c in &desc.connections {
            let (pre, post) = (lookup(&c.pre)?, lookup(&c.post)?);
            self.connect(net, pre, post)?;
        }
        let subs = self.contents(net)?.networks.clone();
        for (sub, sub_desc) in subs.into_iter().zip(&desc.networks) {
            self.wire(sub, sub_desc, by_label)?;
        }
        Ok(())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_structural_uid(uid: &str) -> bool {
    uid == "model"
        || uid.starts_with("conn:")
        || [".ensembles[", ".nodes[", ".networks["]
            .iter()
            .any(|seg| uid.contains(seg))
}

// ─── JSON model description ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkDescription {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub ensembles: Vec<ObjectDescription>,
    #[serde(default)]
    pub nodes: Vec<ObjectDescription>,
    #[serde(default)]
    pub networks: Vec<NetworkDescription>,
    /// Endpoints are referenced by uid or label anywhere in the model.
    #[serde(default)]
    pub connections: Vec<ConnectionDescription>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectDescription {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescription {
    pub pre: String,
    pub post: String,
}
