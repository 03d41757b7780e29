//! Persisted project context.
//!
//! The selected project (and optionally the last ticket and backend URL)
//! survives across invocations in a small JSON file under the user's config
//! directory. Load and save are explicit; there is no ambient global state.
//! Two concurrent processes writing the file race last-writer-wins — a known
//! gap, same as two dashboard tabs driving the same ticket.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub project_id: Option<String>,
    pub ticket_key: Option<String>,
    pub base_url: Option<String>,
}

impl ProjectContext {
    /// Default location: `<config-dir>/conveyor/context.json`.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not determine the user config directory")?
            .join("conveyor");
        Ok(dir.join("context.json"))
    }

    /// Load from `path`. A missing file is a fresh default context.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read context file at {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Context file at {} is malformed", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(self).context("Failed to serialize context")?;
        fs::write(path, raw)
            .with_context(|| format!("Failed to write context file at {}", path.display()))
    }
}
