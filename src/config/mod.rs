// src/config/mod.rs
//! Service configuration: `config/dashboard.toml` plus environment overrides.

pub mod agent;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub use agent::AgentConfig;

use crate::validate::Thresholds;

pub const DEFAULT_CONFIG_PATH: &str = "config/dashboard.toml";
pub const ENV_CONFIG_PATH: &str = "DASHBOARD_CONFIG_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    /// Row-count thresholds for accepting the agent's tables.
    #[serde(default)]
    pub validation: Thresholds,
}

impl DashboardConfig {
    /// Parse TOML content; environment overrides are applied.
    pub fn parse(s: &str) -> Result<Self> {
        let mut cfg: DashboardConfig = toml::from_str(s)?;
        cfg.agent.resolve_env();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading dashboard config from {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Load config using env var + fallbacks:
    /// 1) $DASHBOARD_CONFIG_PATH (must exist)
    /// 2) config/dashboard.toml
    /// 3) built-in defaults (+ env overrides)
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        let mut cfg = DashboardConfig::default();
        cfg.agent.resolve_env();
        Ok(cfg)
    }
}
