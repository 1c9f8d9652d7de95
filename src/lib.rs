//! # netviz
//!
//! Server-side components for a browser-based neural model visualizer.
//!
//! Every widget on the page has a JavaScript half and a server half. The
//! server half lives here: it mirrors widget state to its client over a
//! socket and may splice probes into the model graph around a build.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use netviz::prelude::*;
//!
//! let mut model = Model::new(Some("demo"));
//! let root = model.root();
//! let a = model.add_ensemble(root, Some("a")).unwrap();
//! let b = model.add_node(root, Some("b")).unwrap();
//! model.connect(root, a, b).unwrap();
//!
//! let session = Arc::new(Session::new(model).with_seed(7));
//! let mut page = Page::new(PageId(1));
//! let graph = page.add(Box::new(NetGraph::new(Arc::clone(&session), None)));
//!
//! let client = BufferedClient::new();
//! page.create_all(&mut client.clone()).unwrap();
//! page.poll(graph, &mut client.clone()).unwrap();
//! assert_eq!(client.json_messages().len(), 1 + 3 + 2);
//! ```
//!
//! ## Modules
//!
//! - [`component`]: the component trait and its lifecycle messages
//! - [`netgraph`]: the network graph view
//! - [`value_plot`]: a probe-backed time-series plot
//! - [`page`]: ordering, hot reload, build hooks and `.cfg` output
//! - [`model`]: the arena-backed model graph components inspect

#[path = "core/error.rs"]
pub mod error;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/position.rs"]
pub mod position;

#[path = "core/client.rs"]
pub mod client;

#[path = "core/model.rs"]
pub mod model;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/session.rs"]
pub mod session;

#[path = "core/component.rs"]
pub mod component;

#[path = "core/widget.rs"]
pub mod widget;

#[path = "core/netgraph.rs"]
pub mod netgraph;

#[path = "core/value_plot.rs"]
pub mod value_plot;

#[path = "core/page.rs"]
pub mod page;

pub use error::{Result, VizError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::{BufferedClient, Client, Frame};
    pub use crate::component::{Component, ComponentBase, ComponentKey, NameTable, PageId};
    pub use crate::config::{ComponentConfig, GraphConfig, SharedGraphConfig};
    pub use crate::error::{Result, VizError};
    pub use crate::model::{Model, ObjectId, ObjectKind};
    pub use crate::netgraph::{NetGraph, NetGraphAction};
    pub use crate::page::{Builder, Page, ReloadSummary};
    pub use crate::position::Position;
    pub use crate::session::Session;
    pub use crate::value_plot::ValuePlot;
    pub use crate::widget::{Plot, Widget};
}
