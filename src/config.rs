//! Orchestrator configuration.
//!
//! Loaded from `~/.intel-orchestrator/orchestrator.toml`. Every field has a
//! default, so a missing file or a partial file is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{olog_debug, Error, Result};

/// Decision-policy thresholds used by the plan builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Volume assumed when the request does not say.
    pub default_volume: u32,
    /// Volumes above this go to the comprehensive provider.
    pub volume_threshold: u32,
    /// Budgets below this (with small volume) go to the cost-effective provider.
    pub low_budget_limit: f64,
    /// Budget inferred from "enterprise"/"comprehensive".
    pub enterprise_budget: f64,
    /// Budget inferred from "budget"/"cost-effective".
    pub constrained_budget: f64,
    /// Budget when the context carries no hint.
    pub default_budget: f64,
    /// Substrings that trigger a compliance validation task.
    pub sensitive_keywords: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_volume: 10,
            volume_threshold: 350,
            low_budget_limit: 50.0,
            enterprise_budget: 200.0,
            constrained_budget: 25.0,
            default_budget: 100.0,
            sensitive_keywords: [
                "healthcare",
                "finance",
                "legal",
                "government",
                "gdpr",
                "hipaa",
                "sox",
                "pci",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Plan executor knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Dispatch members of a parallel group concurrently.
    pub parallel_dispatch: bool,
    /// Per-invocation timeout; unset means no timeout.
    pub invocation_timeout_ms: Option<u64>,
    /// Satisfy validation tasks with the local approval stub.
    pub local_validation: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            parallel_dispatch: false,
            invocation_timeout_ms: None,
            local_validation: true,
        }
    }
}

impl ExecutorConfig {
    pub fn invocation_timeout(&self) -> Option<Duration> {
        self.invocation_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl Config {
    pub fn home_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or(Error::NoHomeDir)?
            .join(".intel-orchestrator"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("orchestrator.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        olog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            olog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        olog_debug!(
            "Config loaded: volume_threshold={}, parallel_dispatch={}, timeout={:?}",
            config.policy.volume_threshold,
            config.executor.parallel_dispatch,
            config.executor.invocation_timeout_ms
        );
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        olog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }
}
