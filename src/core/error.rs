//! Error types for netviz

use thiserror::Error;

use crate::model::{ConnectionId, ObjectId};

/// Netviz error type
#[derive(Debug, Error)]
pub enum VizError {
    /// A widget's fast transport was used before `attach`
    #[error("This widget is not yet attached")]
    NotAttached,

    /// Client sent an `act` name outside the fixed action set
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// `javascript_config` was asked to overwrite a configured value
    #[error(
        "Value for {0} is already set in the config of this component; \
         modify the config directly instead"
    )]
    DuplicateConfigKey(String),

    /// Client referred to a uid this component never handed out
    #[error("Unknown uid: {0}")]
    UnknownUid(String),

    /// Expand/collapse targeted something that is not a network
    #[error("Not a network: {0}")]
    NotANetwork(String),

    /// Malformed client payload
    #[error("Invalid message: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    /// Model object id not present in the arena
    #[error("Unknown model object: {0:?}")]
    UnknownObject(ObjectId),

    /// Connection id not present in the arena
    #[error("Unknown connection: {0:?}")]
    UnknownConnection(ConnectionId),

    /// Two different objects or connections claimed the same client uid
    #[error("Duplicate uid: {0}")]
    DuplicateUid(String),

    /// The session swapped in a new model after this component was built
    #[error("Model was replaced; component is stale")]
    ModelReplaced,

    /// Model description could not be turned into a graph
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Page lookup by component uid or key failed
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// The external build step failed
    #[error("Build failed: {0}")]
    Build(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VizError>;
