//! Layered configuration.
//!
//! Settings merge in three layers, later layers winning:
//! 1. `conveyor.toml` in the project directory
//! 2. environment variables (`CONVEYOR_BASE_URL`, `CONVEYOR_POLL_INTERVAL_MS`,
//!    `CONVEYOR_POLL_STARTUP_DELAY_MS`, `CONVEYOR_STALENESS_TOLERANCE_MS`),
//!    with `.env` files honored via dotenvy
//! 3. CLI flags
//!
//! # Configuration File Format
//!
//! ```toml
//! [backend]
//! base_url = "http://localhost:3001"
//!
//! [polling]
//! interval_ms = 3000
//! startup_delay_ms = 500
//!
//! [staleness]
//! tolerance_ms = 1000
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::poll::PollConfig;
use crate::staleness::DEFAULT_TOLERANCE_MS;

const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
const DEFAULT_STARTUP_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConveyorToml {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub polling: PollingSection,
    #[serde(default)]
    pub staleness: StalenessSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendSection {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollingSection {
    pub interval_ms: Option<u64>,
    pub startup_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StalenessSection {
    pub tolerance_ms: Option<i64>,
}

impl ConveyorToml {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Config file at {} is malformed", path.display()))
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Option<String>,
    pub poll_interval_ms: u64,
    pub startup_delay_ms: u64,
    pub staleness_tolerance_ms: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            startup_delay_ms: DEFAULT_STARTUP_DELAY_MS,
            staleness_tolerance_ms: DEFAULT_TOLERANCE_MS,
        }
    }
}

impl Config {
    /// Resolve configuration for `project_dir`, applying the file → env →
    /// CLI layering. `cli_base_url` is the `--base-url` flag when given.
    pub fn resolve(project_dir: &Path, cli_base_url: Option<String>) -> Result<Self> {
        let file = {
            let path = project_dir.join("conveyor.toml");
            if path.exists() {
                ConveyorToml::load(&path)?
            } else {
                ConveyorToml::default()
            }
        };
        Ok(Self::merge(file, EnvOverrides::read(), cli_base_url))
    }

    fn merge(file: ConveyorToml, env: EnvOverrides, cli_base_url: Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            base_url: cli_base_url.or(env.base_url).or(file.backend.base_url),
            poll_interval_ms: env
                .poll_interval_ms
                .or(file.polling.interval_ms)
                .unwrap_or(defaults.poll_interval_ms),
            startup_delay_ms: env
                .startup_delay_ms
                .or(file.polling.startup_delay_ms)
                .unwrap_or(defaults.startup_delay_ms),
            staleness_tolerance_ms: env
                .tolerance_ms
                .or(file.staleness.tolerance_ms)
                .unwrap_or(defaults.staleness_tolerance_ms),
        }
    }

    /// The backend URL, required for any network command.
    pub fn require_base_url(&self) -> Result<&str> {
        self.base_url.as_deref().context(
            "No backend URL configured. Set [backend] base_url in conveyor.toml, \
             CONVEYOR_BASE_URL, or pass --base-url",
        )
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            startup_delay: Duration::from_millis(self.startup_delay_ms),
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn staleness_tolerance(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.staleness_tolerance_ms)
    }
}

#[derive(Debug, Default)]
struct EnvOverrides {
    base_url: Option<String>,
    poll_interval_ms: Option<u64>,
    startup_delay_ms: Option<u64>,
    tolerance_ms: Option<i64>,
}

impl EnvOverrides {
    fn read() -> Self {
        Self {
            base_url: std::env::var("CONVEYOR_BASE_URL").ok(),
            poll_interval_ms: parse_env("CONVEYOR_POLL_INTERVAL_MS"),
            startup_delay_ms: parse_env("CONVEYOR_POLL_STARTUP_DELAY_MS"),
            tolerance_ms: parse_env("CONVEYOR_STALENESS_TOLERANCE_MS"),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
