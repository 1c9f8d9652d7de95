//! Time-series plot of one model object's output.
//!
//! During a build the plot splices a probe node into the root network, fed
//! by a connection from its target. Samples pushed by the host are streamed
//! out over the fast transport as little-endian `f32` frames: the time
//! first, then one value per dimension.

use std::any::Any;
use std::collections::VecDeque;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::client::Client;
use crate::component::{send_create, send_delete, Component, ComponentBase, NameTable};
use crate::error::{Result, VizError};
use crate::model::{ConnectionId, Model, ObjectId};
use crate::widget::{FastClient, Plot, Widget};

/// Oldest samples are dropped past this many unsent frames.
const MAX_PENDING_FRAMES: usize = 4096;

#[derive(Debug)]
pub struct ValuePlot {
    base: ComponentBase,
    plot: Plot,
    target: ObjectId,
    probe: Option<(ObjectId, ConnectionId)>,
    pending: VecDeque<Vec<f32>>,
}

impl ValuePlot {
    pub fn new(uid: impl Into<String>, target: ObjectId) -> Self {
        Self {
            base: ComponentBase::new(uid),
            plot: Plot::new(),
            target,
            probe: None,
            pending: VecDeque::new(),
        }
    }

    pub fn with_base(mut self, base: ComponentBase) -> Self {
        self.base = base;
        self
    }

    pub fn target(&self) -> ObjectId {
        self.target
    }

    pub fn attach(&mut self, fast_client: FastClient) {
        self.plot.attach(fast_client);
    }

    pub fn is_attached(&self) -> bool {
        self.plot.is_attached()
    }

    /// Probe node currently spliced into the model, if any.
    pub fn probe(&self) -> Option<ObjectId> {
        self.probe.map(|(node, _)| node)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn push_sample(&mut self, t: f32, values: &[f32]) {
        if self.pending.len() >= MAX_PENDING_FRAMES {
            self.pending.pop_front();
        }
        let mut frame = Vec::with_capacity(values.len() + 1);
        frame.push(t);
        frame.extend_from_slice(values);
        self.pending.push_back(frame);
    }
}

fn encode_frame(frame: &[f32]) -> Vec<u8> {
    frame.iter().flat_map(|v| v.to_le_bytes()).collect()
}

impl Component for ValuePlot {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn type_name(&self) -> &'static str {
        "Value"
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

    /// Re-send the client config when it changed across the reload.
    fn update(&mut self, old: &dyn Component, client: &mut dyn Client) -> Result<()> {
        if old.base().config() == self.base.config() {
            return Ok(());
        }
        let mut cfg = Map::new();
        cfg.insert("type".into(), Value::from("config"));
        cfg.insert("uid".into(), Value::from(self.uid()));
        let text = self.javascript_config(cfg)?;
        client.write(&text)
    }

    fn update_client(&mut self, _client: &mut dyn Client) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let fast = self.plot.fast_client()?;
        for frame in self.pending.drain(..) {
            fast.write_binary(&encode_frame(&frame))?;
        }
        Ok(())
    }

    fn widget_mut(&mut self) -> Option<&mut Widget> {
        Some(&mut *self.plot)
    }

    fn add_model_objects(&mut self, model: &mut Model) -> Result<()> {
        if let Some((node, _)) = self.probe {
            if model.contains(node) {
                return Ok(());
            }
            warn!(uid = self.uid(), "probe vanished from model; re-adding");
        }
        if !model.contains(self.target) {
            return Err(VizError::UnknownObject(self.target));
        }
        let root = model.root();
        let label = format!("{} probe", self.uid());
        let node = model.add_node(root, Some(&label))?;
        let conn = model.connect(root, self.target, node)?;
        debug!(uid = self.uid(), "added probe {:?}", node);
        self.probe = Some((node, conn));
        Ok(())
    }

    fn remove_model_objects(&mut self, model: &mut Model) -> Result<()> {
        let Some((node, conn)) = self.probe.take() else {
            return Ok(());
        };
        if model.connection(conn).is_some() {
            model.remove_connection(conn)?;
        }
        if model.contains(node) {
            model.remove_object(node)?;
        }
        Ok(())
    }

    fn code_python_args(&self, names: &NameTable) -> Vec<String> {
        let target = names
            .get(&self.target)
            .cloned()
            .unwrap_or_else(|| "None".to_string());
        vec![target]
    }
}
