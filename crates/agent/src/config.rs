//! Agent configuration
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. the file named by `MEMWATCH_CONFIG` (any format the `config` crate reads)
//! 3. `MEMWATCH__*` environment variables, `__` separating nested keys
//!    (`MEMWATCH__ENGINE__SAMPLING__INTERVAL_MS=1000`)

use anyhow::{Context, Result};
use memwatch::EngineConfig;
use serde::Deserialize;
use std::path::PathBuf;

pub const CONFIG_FILE_ENV: &str = "MEMWATCH_CONFIG";

/// Where memory counters come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeSource {
    /// procfs of the agent's own process
    #[default]
    Procfs,
    /// Counters pushed by the host over `POST /api/v1/counters`
    Reported,
}

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Instance name used in logs and sync summaries
    #[serde(default = "default_instance")]
    pub instance: String,

    /// API server port for health, metrics and the engine API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub runtime: RuntimeSource,

    /// Alternate proc root for the procfs runtime
    #[serde(default)]
    pub proc_path: Option<PathBuf>,

    /// Log shutdown requests instead of exiting the process
    #[serde(default)]
    pub intercept_emergency_shutdown: bool,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "memwatch".to_string())
}

fn default_api_port() -> u16 {
    8080
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            api_port: default_api_port(),
            runtime: RuntimeSource::default(),
            proc_path: None,
            intercept_emergency_shutdown: false,
            engine: EngineConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the optional config file and environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
        Self::load_from(file)
    }

    pub fn load_from(file: Option<PathBuf>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(ref path) = file {
            builder = builder.add_source(config::File::from(path.as_path()));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix("MEMWATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration sources")?;

        let agent: AgentConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        agent.validate()?;
        Ok(agent)
    }

    pub fn validate(&self) -> Result<()> {
        if self.instance.trim().is_empty() {
            anyhow::bail!("instance name must not be empty");
        }
        self.engine
            .validate()
            .context("Invalid engine configuration")?;
        Ok(())
    }
}
