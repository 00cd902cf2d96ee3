// src/config/agent.rs
use serde::Deserialize;
use std::env;

pub const ENV_AGENT_ENDPOINT: &str = "DO_AGENT_ENDPOINT";
pub const ENV_AGENT_API_KEY: &str = "DO_AGENT_API_KEY";
pub const ENV_AGENT_ID: &str = "AGENT_ID";

fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_timeout_secs() -> u64 {
    80
}
fn default_connect_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the agent deployment, without the `/api/v1/...` suffix.
    #[serde(default)]
    pub endpoint: String,
    /// "ENV" means: read from DO_AGENT_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Reserved for deployments that route by agent id.
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: default_api_key(),
            agent_id: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl AgentConfig {
    /// Apply environment overrides and resolve the "ENV" key placeholder.
    ///
    /// A missing key is not an error here; calls fail per request instead so the
    /// dashboard can still serve placeholder data.
    pub fn resolve_env(&mut self) {
        if let Some(ep) = non_empty_env(ENV_AGENT_ENDPOINT) {
            self.endpoint = ep;
        }
        self.endpoint = self.endpoint.trim().trim_end_matches('/').to_string();

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = non_empty_env(ENV_AGENT_API_KEY).unwrap_or_default();
        }
        if self.agent_id.is_none() {
            self.agent_id = non_empty_env(ENV_AGENT_ID);
        }

        // Sanitize timeouts
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        if self.connect_timeout_secs == 0 {
            self.connect_timeout_secs = default_connect_timeout_secs();
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
