//! Cross-platform application paths

use std::fs;
use std::path::{Path, PathBuf};

use crate::DaemonError;

#[derive(Debug, Clone)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self, DaemonError> {
        let base = dirs::data_dir().ok_or(DaemonError::NoDataDir)?;
        Self::at(base.join("netviz"))
    }

    /// Paths rooted at an explicit directory, created if missing.
    pub fn at(data_dir: PathBuf) -> Result<Self, DaemonError> {
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    /// Where saved layouts go: next to the model file when there is one,
    /// otherwise in the data dir.
    pub fn layout_file(&self, model: Option<&Path>) -> PathBuf {
        match model {
            Some(path) => path.with_extension("cfg"),
            None => self.data_dir.join("netviz.cfg"),
        }
    }
}
