//! Workspace settings.
//!
//! Stored as `hydromodel.json` in the workspace root. Every key is optional:
//!
//! ```json
//! {
//!   "templateDir": "/opt/hydromodel/template",
//!   "exportMode": "bundle",
//!   "logExports": true
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persistence::write_atomic;

pub const CONFIG_FILE_NAME: &str = "hydromodel.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid settings in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// How file references are written into the control files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Reference input files where they are.
    #[default]
    Reference,
    /// Copy input files into the model tree and reference the copies.
    Bundle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Directory copied into every new model output tree.
    #[serde(default)]
    pub template_dir: Option<PathBuf>,

    #[serde(default)]
    pub export_mode: ExportMode,

    /// Append each export report to `runs/Log/export.log`.
    #[serde(default = "default_log_exports")]
    pub log_exports: bool,
}

fn default_log_exports() -> bool {
    true
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            template_dir: None,
            export_mode: ExportMode::default(),
            log_exports: default_log_exports(),
        }
    }
}

/// Load the settings of the workspace at `root`.
///
/// A missing file yields the defaults.
pub fn load_config(root: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let path = root.join(CONFIG_FILE_NAME);

    if !path.exists() {
        return Ok(WorkspaceConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Json { path, source })
}

/// Save the settings of the workspace at `root`.
pub fn save_config(root: &Path, config: &WorkspaceConfig) -> Result<(), ConfigError> {
    let path = root.join(CONFIG_FILE_NAME);

    let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Json {
        path: path.clone(),
        source,
    })?;
    write_atomic(&path, &json).map_err(|source| ConfigError::Io { path, source })
}
