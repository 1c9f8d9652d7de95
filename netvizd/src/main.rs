//! netviz daemon - serves visualization pages over TCP
//!
//! Each connection gets its own page built from the shared session:
//! - a network graph (uid `netgraph`)
//! - one value plot per entry in the config's `plots`
//!
//! The first line a client sends picks which component it talks to. After
//! that every line is routed to that component, apart from the control
//! requests (`Save`, `Build`, `Reload` and `Sample`). A reload swaps the
//! model under every open page, not only the one that asked.
//!
//! Storage locations:
//! - Linux: ~/.local/share/netviz/
//! - Windows: %APPDATA%\netviz\
//! - MacOS: ~/Library/Application Support/netviz/

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use netviz::client::Client;
use netviz::component::{Component, ComponentBase, ComponentKey, PageId};
use netviz::model::Model;
use netviz::netgraph::NetGraph;
use netviz::page::{Page, ReloadSummary};
use netviz::session::Session;
use netviz::value_plot::ValuePlot;
use netviz::VizError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod paths;

use config::{DaemonConfig, PlotConfig};
use paths::AppPaths;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("could not determine data directory")]
    NoDataDir,

    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no model file configured")]
    NoModelFile,

    #[error("client closed before connecting")]
    NoHandshake,

    #[error("already connected")]
    AlreadyConnected,

    #[error("unknown page {0:?}")]
    UnknownPage(PageId),

    #[error(transparent)]
    Viz(#[from] VizError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Lines(#[from] LinesCodecError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ═══════════════════════════════════════════════════════════════════════════
// Protocol
// ═══════════════════════════════════════════════════════════════════════════

/// Control requests. Any line that is not one of these goes to the
/// connected component.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Request {
    Connect {
        #[serde(default)]
        component: Option<String>,
    },
    Save,
    Build,
    Reload,
    /// A new value for every open plot with uid `component`.
    Sample {
        component: String,
        t: f32,
        #[serde(default)]
        values: Vec<f32>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Response {
    Success { message: String },
    Error { message: String },
    Binary { data: String },
}

/// Component transport backed by the connection's outbound queue.
#[derive(Debug, Clone)]
struct ChannelClient {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelClient {
    fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    fn send(&self, line: String) -> netviz::Result<()> {
        self.tx.send(line).map_err(|_| {
            VizError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "client disconnected",
            ))
        })
    }

    fn respond(&self, response: &Response) -> netviz::Result<()> {
        self.send(serde_json::to_string(response)?)
    }
}

impl Client for ChannelClient {
    fn write_text(&mut self, text: &str) -> netviz::Result<()> {
        self.send(text.to_string())
    }

    fn write_binary(&mut self, data: &[u8]) -> netviz::Result<()> {
        self.respond(&Response::Binary {
            data: hex::encode(data),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Daemon State
// ═══════════════════════════════════════════════════════════════════════════

/// One connection's page, the component it talks to and its transport.
struct OpenPage {
    page: Page,
    key: ComponentKey,
    client: ChannelClient,
}

struct DaemonState {
    session: Arc<Session>,
    paths: AppPaths,
    model_path: Option<PathBuf>,
    plots: Vec<PlotConfig>,
    pages: HashMap<PageId, OpenPage>,
    next_page: u64,
}

fn load_model(path: Option<&Path>) -> Result<Model, DaemonError> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            Ok(Model::from_json(&text)?)
        }
        None => Ok(Model::new(None)),
    }
}

/// Hand the connection's transport to the live successor of `key`, if that
/// component streams data.
fn attach_fast(page: &mut Page, key: ComponentKey, client: &ChannelClient) {
    let Some(live) = page.resolve(key) else {
        return;
    };
    if let Some(widget) = page.get_mut(live).and_then(|c| c.widget_mut()) {
        widget.attach(Box::new(client.clone()));
    }
}

impl DaemonState {
    fn new(session: Arc<Session>, paths: AppPaths, config: &DaemonConfig) -> Self {
        Self {
            session,
            paths,
            model_path: config.model.clone(),
            plots: config.plots.clone(),
            pages: HashMap::new(),
            next_page: 0,
        }
    }

    /// Fresh instances of every component a page shows.
    fn components(&self) -> Vec<Box<dyn Component>> {
        let mut out: Vec<Box<dyn Component>> =
            vec![Box::new(NetGraph::new(Arc::clone(&self.session), None))];
        let model = self.session.lock();
        for plot in &self.plots {
            let Some(target) = model.resolve_uid(&plot.target) else {
                warn!("Plot {}: no object with uid {}", plot.uid, plot.target);
                continue;
            };
            let base = ComponentBase::new(plot.uid.clone()).with_order(1);
            out.push(Box::new(ValuePlot::new(plot.uid.clone(), target).with_base(base)));
        }
        out
    }

    /// Build a page for a new connection and send the create message of the
    /// component it asked for (the graph by default).
    fn open_page(
        &mut self,
        component: Option<&str>,
        client: &ChannelClient,
    ) -> Result<PageId, DaemonError> {
        let id = PageId(self.next_page);
        self.next_page += 1;

        let mut page = Page::new(id);
        for c in self.components() {
            page.add(c);
        }
        let uid = component.unwrap_or(NetGraph::DEFAULT_UID);
        let key = page
            .find(uid)
            .ok_or_else(|| VizError::UnknownComponent(uid.to_string()))?;

        attach_fast(&mut page, key, client);
        if let Some(c) = page.get_mut(key) {
            c.create(&mut client.clone())?;
        }
        self.pages.insert(
            id,
            OpenPage {
                page,
                key,
                client: client.clone(),
            },
        );
        info!("Opened page {:?} for {}", id, uid);
        Ok(id)
    }

    fn close_page(&mut self, id: PageId) {
        if self.pages.remove(&id).is_some() {
            info!("Closed page {:?}", id);
        }
    }

    fn page_mut(&mut self, id: PageId) -> Result<&mut OpenPage, DaemonError> {
        self.pages.get_mut(&id).ok_or(DaemonError::UnknownPage(id))
    }

    fn poll(&mut self, id: PageId) -> Result<(), DaemonError> {
        let open = self.page_mut(id)?;
        let mut client = open.client.clone();
        Ok(open.page.poll(open.key, &mut client)?)
    }

    /// `.cfg` text for one page: component constructors and their client
    /// settings, then the graph layout.
    fn layout_text(&self, id: PageId) -> Result<String, DaemonError> {
        let open = self.pages.get(&id).ok_or(DaemonError::UnknownPage(id))?;
        let names = self.session.lock().names();
        let mut lines = vec![open.page.code_python(&names)];
        lines.extend(self.session.graph_config().lock().code_python(&names));
        Ok(lines.join("\n") + "\n")
    }

    fn save(&self, id: PageId) -> Result<PathBuf, DaemonError> {
        let path = self.paths.layout_file(self.model_path.as_deref());
        fs::write(&path, self.layout_text(id)?)?;
        info!("Saved layout to {}", path.display());
        Ok(path)
    }

    /// Run the page's build hooks around a builder that only reports what
    /// it was given.
    fn build(&mut self, id: PageId) -> Result<(), DaemonError> {
        let session = Arc::clone(&self.session);
        let mut builder = |model: &Model| -> netviz::Result<()> {
            info!(
                objects = model.object_count(),
                connections = model.connection_count(),
                "build"
            );
            Ok(())
        };
        self.page_mut(id)?.page.build(&session, &mut builder)?;
        Ok(())
    }

    /// Re-read the model file and hot-swap the components of every open
    /// page. The file is parsed before anything is replaced, so a bad file
    /// leaves the session and all pages untouched. Failures on pages other
    /// than `requester` are logged; the requester's outcome is returned.
    fn reload(&mut self, requester: PageId) -> Result<ReloadSummary, DaemonError> {
        let path = self.model_path.clone().ok_or(DaemonError::NoModelFile)?;
        if !self.pages.contains_key(&requester) {
            return Err(DaemonError::UnknownPage(requester));
        }
        let model = load_model(Some(&path))?;
        self.session.replace_model(model);

        let mut ids: Vec<PageId> = self.pages.keys().copied().collect();
        ids.sort_by_key(|id| id.0);
        let mut result = Err(DaemonError::UnknownPage(requester));
        for id in ids {
            let components = self.components();
            let Some(open) = self.pages.get_mut(&id) else {
                continue;
            };
            let mut client = open.client.clone();
            let outcome = open.page.reload(components, &mut client);
            open.page.prune();
            attach_fast(&mut open.page, open.key, &open.client);
            if id == requester {
                result = outcome.map_err(DaemonError::from);
            } else if let Err(e) = outcome {
                warn!("Reload of page {:?} failed: {}", id, e);
            }
        }
        result
    }

    /// Queue one sample on every open page's value plot `uid`. Returns how
    /// many plots took it.
    fn sample(&mut self, uid: &str, t: f32, values: &[f32]) -> Result<usize, DaemonError> {
        let mut fed = 0;
        for open in self.pages.values_mut() {
            let Some(key) = open.page.find(uid) else {
                continue;
            };
            let plot = open
                .page
                .get_mut(key)
                .and_then(|c| c.as_any_mut().downcast_mut::<ValuePlot>());
            if let Some(plot) = plot {
                plot.push_sample(t, values);
                fed += 1;
            }
        }
        if fed == 0 {
            return Err(VizError::UnknownComponent(uid.to_string()).into());
        }
        Ok(fed)
    }

    /// Handle one inbound line after the handshake.
    fn dispatch(&mut self, id: PageId, line: &str) -> Result<(), DaemonError> {
        let message = match serde_json::from_str::<Request>(line) {
            Ok(Request::Save) => {
                let path = self.save(id)?;
                format!("Saved {}", path.display())
            }
            Ok(Request::Build) => {
                self.build(id)?;
                "Build complete".to_string()
            }
            Ok(Request::Reload) => {
                let s = self.reload(id)?;
                format!(
                    "Reloaded: {} updated, {} replaced, {} created, {} removed",
                    s.updated, s.replaced, s.created, s.removed
                )
            }
            Ok(Request::Sample {
                component,
                t,
                values,
            }) => {
                let fed = self.sample(&component, t, &values)?;
                format!("Sample queued on {} page(s)", fed)
            }
            Ok(Request::Connect { .. }) => return Err(DaemonError::AlreadyConnected),
            Err(_) => {
                let open = self.page_mut(id)?;
                open.page.message(open.key, line)?;
                return Ok(());
            }
        };
        self.page_mut(id)?
            .client
            .respond(&Response::Success { message })?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Client Handler
// ═══════════════════════════════════════════════════════════════════════════

/// How long a closing connection gets to flush queued lines.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

async fn handle_client(
    stream: TcpStream,
    state: Arc<Mutex<DaemonState>>,
    poll_interval: Duration,
) -> Result<(), DaemonError> {
    let (mut sink, mut lines) = Framed::new(stream, LinesCodec::new()).split();

    let Some(first) = lines.next().await.transpose()? else {
        return Err(DaemonError::NoHandshake);
    };
    let component = match serde_json::from_str::<Request>(&first) {
        Ok(Request::Connect { component }) => component,
        _ => {
            let resp = Response::Error {
                message: format!("Expected Connect, got: {}", first),
            };
            sink.send(serde_json::to_string(&resp)?).await?;
            return Err(DaemonError::NoHandshake);
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let client = ChannelClient::new(tx);

    let opened = state.lock().await.open_page(component.as_deref(), &client);
    let page = match opened {
        Ok(page) => page,
        Err(e) => {
            let resp = Response::Error {
                message: e.to_string(),
            };
            sink.send(serde_json::to_string(&resp)?).await?;
            return Err(e);
        }
    };

    let mut writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if sink.send(line).await.is_err() {
                break;
            }
        }
    });

    // A failed poll is reported to the client and ends the connection.
    let mut poller = {
        let state = Arc::clone(&state);
        let client = client.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(poll_interval);
            loop {
                ticker.tick().await;
                let polled = state.lock().await.poll(page);
                if let Err(e) = polled {
                    error!("Poll failed for page {:?}: {}", page, e);
                    let _ = client.respond(&Response::Error {
                        message: e.to_string(),
                    });
                    return e;
                }
            }
        })
    };

    let mut result = Ok(());
    loop {
        tokio::select! {
            line = lines.next() => {
                let line = match line {
                    Some(Ok(line)) => line,
                    Some(Err(e)) => {
                        result = Err(e.into());
                        break;
                    }
                    None => break,
                };
                debug!("page {:?} <- {}", page, line);
                let handled = state.lock().await.dispatch(page, &line);
                if let Err(e) = handled {
                    let resp = Response::Error {
                        message: e.to_string(),
                    };
                    if client.respond(&resp).is_err() {
                        break;
                    }
                }
            }
            failed = &mut poller => {
                if let Ok(e) = failed {
                    result = Err(e);
                }
                break;
            }
        }
    }

    poller.abort();
    state.lock().await.close_page(page);
    drop(client);
    if time::timeout(FLUSH_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
    result
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup application paths and settings
    let paths = AppPaths::new()?;
    let mut config = DaemonConfig::load(&paths.config_file())?;
    if let Some(model) = std::env::args().nth(1) {
        config.model = Some(PathBuf::from(model));
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!("Data dir: {}", paths.data_dir().display());

    let model = match load_model(config.model.as_deref()) {
        Ok(model) => model,
        Err(e) => {
            warn!("Could not load model: {}", e);
            info!("Starting with an empty model");
            Model::new(None)
        }
    };
    let session = match config.seed {
        Some(seed) => Session::new(model).with_seed(seed),
        None => Session::new(model),
    };
    let state = Arc::new(Mutex::new(DaemonState::new(
        Arc::new(session),
        paths,
        &config,
    )));

    let listener = TcpListener::bind(&config.listen).await?;
    info!("netviz daemon listening on {}", config.listen);
    let poll_interval = config.poll_interval();

    // Accept client connections
    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Client connected: {}", addr);
        let state_clone = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, state_clone, poll_interval).await {
                error!("Client handler error: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn demo_model() -> Model {
        let mut m = Model::new(Some("demo"));
        let root = m.root();
        let a = m.add_ensemble(root, Some("a")).unwrap();
        let b = m.add_node(root, Some("b")).unwrap();
        m.connect(root, a, b).unwrap();
        m
    }

    fn state(dir: &Path, plots: Vec<PlotConfig>) -> DaemonState {
        let config = DaemonConfig {
            model: Some(dir.join("demo.json")),
            seed: Some(5),
            plots,
            ..DaemonConfig::default()
        };
        let session = Arc::new(Session::new(demo_model()).with_seed(5));
        let paths = AppPaths::at(dir.join("data")).unwrap();
        DaemonState::new(session, paths, &config)
    }

    fn plot_a() -> Vec<PlotConfig> {
        vec![PlotConfig {
            uid: "value_a".to_string(),
            target: "model.ensembles[0]".to_string(),
        }]
    }

    fn channel() -> (ChannelClient, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelClient::new(tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(line) = rx.try_recv() {
            out.push(serde_json::from_str(&line).unwrap());
        }
        out
    }

    #[test]
    fn open_page_creates_the_requested_component() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = state(dir.path(), plot_a());
        let (client, mut rx) = channel();

        s.open_page(None, &client).unwrap();
        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["component"], "NetGraph");

        s.open_page(Some("value_a"), &client).unwrap();
        assert_eq!(drain(&mut rx)[0]["component"], "Value");

        assert!(matches!(
            s.open_page(Some("nope"), &client),
            Err(DaemonError::Viz(VizError::UnknownComponent(_)))
        ));
    }

    #[test]
    fn control_requests_and_component_messages() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = state(dir.path(), plot_a());
        let (client, mut rx) = channel();
        let page = s.open_page(None, &client).unwrap();
        s.poll(page).unwrap();
        drain(&mut rx);

        let before = s.session.lock().clone();
        s.dispatch(page, r#"{"type":"Build"}"#).unwrap();
        assert!(s.session.lock().same_structure(&before));
        assert_eq!(drain(&mut rx)[0]["type"], "success");

        s.dispatch(page, r#"{"act":"pan","x":1.0,"y":2.0}"#).unwrap();
        assert!(drain(&mut rx).is_empty());

        assert!(matches!(
            s.dispatch(page, r#"{"act":"explode"}"#),
            Err(DaemonError::Viz(VizError::UnknownAction(_)))
        ));
        assert!(matches!(
            s.dispatch(page, r#"{"type":"Connect"}"#),
            Err(DaemonError::AlreadyConnected)
        ));
    }

    #[test]
    fn save_writes_components_and_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = state(dir.path(), plot_a());
        let (client, mut rx) = channel();
        let page = s.open_page(None, &client).unwrap();
        s.poll(page).unwrap();

        s.dispatch(page, r#"{"type":"Save"}"#).unwrap();
        let text = fs::read_to_string(dir.path().join("demo.cfg")).unwrap();
        assert!(text.contains("_viz_netgraph = nengo_gui.components.NetGraph()"));
        assert!(text.contains("_viz_value_a = nengo_gui.components.Value(a)"));
        assert!(text.contains("_viz_config[a].pos = "));
        assert!(text.contains("_viz_config[b].size = (0.1, 0.1)"));
        let msgs = drain(&mut rx);
        assert_eq!(msgs.last().unwrap()["type"], "success");
    }

    fn deleted_uids(msgs: &[Value]) -> Vec<&str> {
        msgs.iter()
            .filter(|m| m["type"] == "delete")
            .map(|m| m["uid"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn reload_swaps_in_the_new_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = state(dir.path(), Vec::new());
        let (client, mut rx) = channel();
        let page = s.open_page(None, &client).unwrap();
        s.poll(page).unwrap();
        drain(&mut rx);

        let model_id = s.session.model_id();
        assert!(matches!(
            s.dispatch(page, r#"{"type":"Reload"}"#),
            Err(DaemonError::Io(_))
        ));
        assert_eq!(s.session.model_id(), model_id);

        fs::write(
            dir.path().join("demo.json"),
            r#"{"label": "demo", "ensembles": [{"label": "a"}]}"#,
        )
        .unwrap();
        s.dispatch(page, r#"{"type":"Reload"}"#).unwrap();
        let msgs = drain(&mut rx);
        assert_eq!(
            deleted_uids(&msgs),
            vec!["conn:model.ensembles[0]->model.nodes[0]:0", "model.nodes[0]"]
        );
        assert_eq!(msgs.last().unwrap()["type"], "success");

        // The page's stored key still reaches the replacement graph.
        s.poll(page).unwrap();
        let msgs = drain(&mut rx);
        assert_eq!(msgs[0]["type"], "ens");
        assert_eq!(msgs.len(), 3);
    }

    #[test]
    fn reload_reaches_every_open_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = state(dir.path(), Vec::new());
        let (first, mut first_rx) = channel();
        let (second, mut second_rx) = channel();
        let p0 = s.open_page(None, &first).unwrap();
        let p1 = s.open_page(None, &second).unwrap();
        s.poll(p0).unwrap();
        s.poll(p1).unwrap();
        drain(&mut first_rx);
        drain(&mut second_rx);

        fs::write(
            dir.path().join("demo.json"),
            r#"{"label": "demo", "ensembles": [{"label": "a"}]}"#,
        )
        .unwrap();
        s.dispatch(p0, r#"{"type":"Reload"}"#).unwrap();

        let expected = vec!["conn:model.ensembles[0]->model.nodes[0]:0", "model.nodes[0]"];
        let msgs = drain(&mut first_rx);
        assert_eq!(deleted_uids(&msgs), expected);
        let msgs = drain(&mut second_rx);
        assert_eq!(deleted_uids(&msgs), expected);
        assert!(msgs.iter().all(|m| m["type"] != "success"));

        // The other page now shows and acts on the new model.
        s.poll(p1).unwrap();
        let msgs = drain(&mut second_rx);
        assert_eq!(msgs[0]["type"], "ens");
        assert_eq!(msgs.len(), 3);
        s.dispatch(p1, r#"{"act":"pos","uid":"model.ensembles[0]","x":0.5,"y":0.5}"#)
            .unwrap();
        assert!(matches!(
            s.dispatch(p1, r#"{"act":"pos","uid":"model.nodes[0]","x":0.5,"y":0.5}"#),
            Err(DaemonError::Viz(VizError::UnknownUid(_)))
        ));
    }

    #[test]
    fn samples_stream_to_the_plot_connection() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = state(dir.path(), plot_a());
        let (graph_client, mut graph_rx) = channel();
        let (plot_client, mut plot_rx) = channel();
        let graph_page = s.open_page(None, &graph_client).unwrap();
        let plot_page = s.open_page(Some("value_a"), &plot_client).unwrap();
        drain(&mut graph_rx);
        drain(&mut plot_rx);

        s.dispatch(
            graph_page,
            r#"{"type":"Sample","component":"value_a","t":0.5,"values":[1.0]}"#,
        )
        .unwrap();
        let msgs = drain(&mut graph_rx);
        assert_eq!(msgs[0]["message"], "Sample queued on 2 page(s)");

        s.poll(plot_page).unwrap();
        let mut bytes = 0.5f32.to_le_bytes().to_vec();
        bytes.extend(1.0f32.to_le_bytes());
        assert_eq!(
            drain(&mut plot_rx),
            vec![serde_json::json!({"type": "binary", "data": hex::encode(bytes)})]
        );

        assert!(matches!(
            s.dispatch(
                graph_page,
                r#"{"type":"Sample","component":"netgraph","t":0.0}"#
            ),
            Err(DaemonError::Viz(VizError::UnknownComponent(_)))
        ));
    }

    #[test]
    fn binary_frames_travel_as_hex() {
        let (mut client, mut rx) = channel();
        client.write_binary(&[0x00, 0xab]).unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![serde_json::json!({"type": "binary", "data": "00ab"})]
        );
    }

    #[tokio::test]
    async fn handshake_then_graph_stream() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(Mutex::new(state(dir.path(), Vec::new())));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_state = Arc::clone(&state);
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_client(stream, server_state, Duration::from_millis(1)).await
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut framed = Framed::new(stream, LinesCodec::new());
        framed
            .send(r#"{"type":"Connect","component":null}"#.to_string())
            .await
            .unwrap();

        let mut types = Vec::new();
        for _ in 0..6 {
            let line = framed.next().await.unwrap().unwrap();
            let v: Value = serde_json::from_str(&line).unwrap();
            types.push(v["type"].as_str().unwrap().to_string());
        }
        assert_eq!(types, vec!["create", "ens", "node", "conn", "pan", "zoom"]);

        framed
            .send(r#"{"act":"explode"}"#.to_string())
            .await
            .unwrap();
        let line = framed.next().await.unwrap().unwrap();
        let v: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["type"], "error");
        assert_eq!(v["message"], "Unknown action: explode");
    }

    #[tokio::test]
    async fn failed_poll_is_reported_and_closes_the_connection() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(Mutex::new(state(dir.path(), Vec::new())));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_state = Arc::clone(&state);
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_client(stream, server_state, Duration::from_millis(1)).await
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut framed = Framed::new(stream, LinesCodec::new());
        framed
            .send(r#"{"type":"Connect"}"#.to_string())
            .await
            .unwrap();
        for _ in 0..6 {
            framed.next().await.unwrap().unwrap();
        }

        state.lock().await.close_page(PageId(0));
        let line = framed.next().await.unwrap().unwrap();
        let v: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["type"], "error");
        assert_eq!(v["message"], "unknown page PageId(0)");
        assert!(framed.next().await.is_none());
        assert!(matches!(
            server.await.unwrap(),
            Err(DaemonError::UnknownPage(PageId(0)))
        ));
    }
}
