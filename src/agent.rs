//! Agent client: provider abstraction over the IATI chat-completions endpoint.
//!
//! The dashboard core only needs "send a message, get text back or an error".
//! Everything about the wire format of the agent lives here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::AgentConfig;

pub const ENV_AGENT_TEST_MODE: &str = "AGENT_TEST_MODE";

/// Canned reply used by the mock client; a complete, well-formed dashboard answer.
pub const SAMPLE_DASHBOARD_REPLY: &str = include_str!("../fixtures/dashboard_reply.md");

const COMPLETIONS_PATH: &str = "/api/v1/chat/completions";
const ERROR_BODY_MAX_CHARS: usize = 1500;
const RETRIEVAL_ITEMS_MAX: usize = 8;
const RETRIEVAL_PREVIEW_CHARS: usize = 220;
const UNEXPECTED_FORMAT: &str = "The agent responded, but the format was unexpected. If this persists, try the Test API button for diagnostics.";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent endpoint is not configured")]
    MissingEndpoint,
    #[error("agent API key is not configured")]
    MissingApiKey,
    #[error("agent request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("agent returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("agent response could not be decoded: {0}")]
    Decode(String),
    #[error("agent unavailable: {0}")]
    Unavailable(String),
}

/// Trait object used by the orchestrator, the API handlers and tests.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Send one user message and return the agent's reply text.
    async fn complete(&self, message: &str) -> Result<String, AgentError>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynAgentClient = Arc<dyn AgentClient>;

/// Factory: build a client according to config and environment variables.
///
/// * `AGENT_TEST_MODE=mock` returns a client answering with [`SAMPLE_DASHBOARD_REPLY`].
/// * `AGENT_TEST_MODE=error` returns a client whose every call fails.
/// * Otherwise the real HTTP client.
pub fn build_agent_client(cfg: &AgentConfig) -> anyhow::Result<DynAgentClient> {
    match std::env::var(ENV_AGENT_TEST_MODE).as_deref() {
        Ok("mock") => return Ok(Arc::new(MockAgent::new(SAMPLE_DASHBOARD_REPLY))),
        Ok("error") => return Ok(Arc::new(FailingAgent::new("test mode"))),
        _ => {}
    }
    Ok(Arc::new(HttpAgentClient::new(cfg)?))
}

// ------------------------------------------------------------
// HTTP client
// ------------------------------------------------------------

pub struct HttpAgentClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<Msg<'a>>,
    stream: bool,
    include_functions_info: bool,
    include_retrieval_info: bool,
    include_guardrails_info: bool,
}

impl HttpAgentClient {
    pub fn new(cfg: &AgentConfig) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .user_agent("iati-dashboard/0.1")
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn complete(&self, message: &str) -> Result<String, AgentError> {
        if self.endpoint.is_empty() {
            return Err(AgentError::MissingEndpoint);
        }
        if self.api_key.is_empty() {
            return Err(AgentError::MissingApiKey);
        }

        let req = ChatRequest {
            messages: vec![Msg {
                role: "user",
                content: message,
            }],
            stream: false,
            include_functions_info: true,
            include_retrieval_info: true,
            include_guardrails_info: true,
        };

        let resp = self
            .http
            .post(format!("{}{}", self.endpoint, COMPLETIONS_PATH))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "agent returned non-success status");
            return Err(AgentError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_MAX_CHARS).collect(),
            });
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| AgentError::Decode(e.to_string()))?;
        Ok(reply_text(&data))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

// ------------------------------------------------------------
// Reply decoding
// ------------------------------------------------------------

/// Pull the displayable reply out of a chat-completions payload.
///
/// Tries `choices[0].message.content`, then `reasoning_content`, then the
/// top-level `message` / `content` / `response` fields, a bare string, and a
/// summary of retrieved KB items. Triggered guardrails are appended as notes.
pub fn reply_text(data: &Value) -> String {
    let mut out = if let Some(msg) = data
        .pointer("/choices/0/message")
        .filter(|m| !m.is_null())
    {
        non_blank(msg.get("content"))
            .or_else(|| non_blank(msg.get("reasoning_content")))
            .unwrap_or_default()
    } else if let Some(text) = ["message", "content", "response"]
        .iter()
        .find_map(|k| truthy_text(data.get(*k)))
    {
        text
    } else if let Some(s) = data.as_str() {
        s.to_string()
    } else if let Some(items) = data
        .pointer("/retrieval/retrieved_data")
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty())
    {
        retrieval_summary(items)
    } else {
        UNEXPECTED_FORMAT.to_string()
    };

    if let Some(triggered) = data
        .pointer("/guardrails/triggered_guardrails")
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty())
    {
        out.push_str("\n\n**Content Moderation Notes:**\n");
        for g in triggered {
            let rule = g.get("rule_name").and_then(Value::as_str).unwrap_or("");
            let message = g.get("message").and_then(Value::as_str).unwrap_or("");
            out.push_str(&format!("- {rule}: {message}\n"));
        }
    }
    out
}

fn non_blank(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn truthy_text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn retrieval_summary(items: &[Value]) -> String {
    let mut out = String::from("**Retrieved context from KB:**\n\n");
    for (idx, item) in items.iter().take(RETRIEVAL_ITEMS_MAX).enumerate() {
        let file = ["filename", "source"]
            .iter()
            .find_map(|k| {
                item.get(*k)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or("KB item");
        let score = item
            .get("score")
            .and_then(Value::as_f64)
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "—".to_string());
        let content = item
            .get("page_content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        let preview: String = content.chars().take(RETRIEVAL_PREVIEW_CHARS).collect();
        let ellipsis = if preview.chars().count() >= RETRIEVAL_PREVIEW_CHARS {
            "…"
        } else {
            ""
        };
        out.push_str(&format!(
            "{}. **{}** (relevance: {})\n   - {}{}\n",
            idx + 1,
            file,
            score,
            preview,
            ellipsis
        ));
    }
    out.push_str("\nIf you want, ask a specific question about these retrieved items.");
    out
}

// ------------------------------------------------------------
// Offline clients
// ------------------------------------------------------------

/// Answers every message with the same text.
#[derive(Debug, Clone)]
pub struct MockAgent {
    reply: String,
}

impl MockAgent {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl AgentClient for MockAgent {
    async fn complete(&self, _message: &str) -> Result<String, AgentError> {
        Ok(self.reply.clone())
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Fails every call as if the agent were unreachable.
#[derive(Debug, Clone)]
pub struct FailingAgent {
    reason: String,
}

impl FailingAgent {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl AgentClient for FailingAgent {
    async fn complete(&self, _message: &str) -> Result<String, AgentError> {
        Err(AgentError::Unavailable(self.reason.clone()))
    }
    fn name(&self) -> &'static str {
        "failing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_wins_then_reasoning_content() {
        let v = json!({"choices": [{"message": {"content": "hello"}}]});
        assert_eq!(reply_text(&v), "hello");
        let v = json!({"choices": [{"message": {"content": "  ", "reasoning_content": "thought"}}]});
        assert_eq!(reply_text(&v), "thought");
        let v = json!({"choices": [{"message": {"content": ""}}]});
        assert_eq!(reply_text(&v), "");
    }

    #[test]
    fn top_level_fields_and_bare_strings() {
        assert_eq!(reply_text(&json!({"response": "r"})), "r");
        assert_eq!(reply_text(&json!({"message": "", "content": "c"})), "c");
        assert_eq!(reply_text(&json!("plain")), "plain");
        assert_eq!(reply_text(&json!({"other": 1})), UNEXPECTED_FORMAT);
    }

    #[test]
    fn retrieval_items_are_summarized() {
        let long = "x".repeat(300);
        let v = json!({"retrieval": {"retrieved_data": [
            {"filename": "kenya.csv", "score": 0.876, "page_content": " short "},
            {"score": "high", "page_content": long},
        ]}});
        let out = reply_text(&v);
        assert!(out.starts_with("**Retrieved context from KB:**"));
        assert!(out.contains("1. **kenya.csv** (relevance: 0.9)\n   - short\n"));
        assert!(out.contains("2. **KB item** (relevance: —)"));
        assert!(out.contains(&format!("{}…", "x".repeat(220))));
    }

    #[test]
    fn guardrails_are_appended() {
        let v = json!({
            "choices": [{"message": {"content": "body"}}],
            "guardrails": {"triggered_guardrails": [{"rule_name": "pii", "message": "redacted"}]}
        });
        assert_eq!(
            reply_text(&v),
            "body\n\n**Content Moderation Notes:**\n- pii: redacted\n"
        );
    }

    #[tokio::test]
    async fn unconfigured_http_client_fails_without_network() {
        let client = HttpAgentClient::new(&AgentConfig::default()).unwrap();
        assert!(matches!(
            client.complete("hi").await,
            Err(AgentError::MissingEndpoint)
        ));

        let cfg = AgentConfig {
            endpoint: "http://127.0.0.1:9".into(),
            api_key: String::new(),
            ..AgentConfig::default()
        };
        let client = HttpAgentClient::new(&cfg).unwrap();
        assert!(matches!(
            client.complete("hi").await,
            Err(AgentError::MissingApiKey)
        ));
    }
}
