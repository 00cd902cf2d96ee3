//! # Dashboard orchestrator
//! One refresh = ask the agent, extract, validate, then publish either the
//! agent's numbers ("live") or placeholder numbers ("demo").
//!
//! The agent's narrative is forwarded untouched in both modes; only the chart
//! data falls back. At most one refresh runs per orchestrator; extra requests
//! are dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::agent::DynAgentClient;
use crate::dataset::{DataMode, Dataset, RequestContext};
use crate::extract::extract_tables;
use crate::metrics::{AGENT_ERRORS_TOTAL, AGENT_LATENCY_MS, REFRESH_DROPPED_TOTAL, REFRESH_TOTAL};
use crate::placeholder;
use crate::prompts::dashboard_prompt;
use crate::telemetry::anon_hash;
use crate::validate::{validate, ExtractionOutcome, Thresholds};

pub const INITIAL_REASON: &str = "Initial placeholder";
pub const TRANSPORT_REASON: &str = "Error fetching KB dashboard";
pub const MISSING_MARKER_REASON: &str = "KB did not return enough metrics";

/// Shown instead of the agent's prose when the agent could not be reached.
pub const TRANSPORT_NARRATIVE: &str = "## Dashboard Narrative\n\
- Unable to fetch KB dashboard data right now.\n\
\n\
## Caveats\n\
- Using demo data for charts.\n\
- Check agent endpoint/key and try again.\n";

/// Everything the presentation layer needs after one refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardUpdate {
    pub context: RequestContext,
    pub data: Dataset,
    pub mode: DataMode,
    pub narrative: String,
}

/// Publish decision for one agent reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    Live(Dataset),
    Demo(String),
}

/// Decide live vs demo for a reply. A missing-value marker anywhere in the
/// tables forces demo even when the numbers are otherwise complete.
pub fn assess(text: &str, thresholds: &Thresholds) -> Assessment {
    let tables = match extract_tables(text) {
        Ok(t) => t,
        Err(e) => {
            debug!(error = ?e, "extraction failed");
            return Assessment::Demo(e.to_string());
        }
    };
    match validate(&tables, thresholds) {
        ExtractionOutcome::Accepted(_) if tables.has_missing_marker => {
            Assessment::Demo(MISSING_MARKER_REASON.to_string())
        }
        ExtractionOutcome::Accepted(data) => Assessment::Live(data),
        ExtractionOutcome::Rejected(reason) => Assessment::Demo(reason),
    }
}

pub struct DashboardOrchestrator {
    agent: DynAgentClient,
    thresholds: Thresholds,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag on every exit path, unwinding included.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DashboardOrchestrator {
    pub fn new(agent: DynAgentClient, thresholds: Thresholds) -> Self {
        Self {
            agent,
            thresholds,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// What the dashboard shows before the first refresh.
    pub fn initial(&self, ctx: &RequestContext) -> DashboardUpdate {
        DashboardUpdate {
            context: ctx.clone(),
            data: placeholder::generate(ctx),
            mode: DataMode::demo(INITIAL_REASON),
            narrative: String::new(),
        }
    }

    fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(&self.in_flight))
    }

    /// Run one refresh. Returns `None` when another refresh is still in flight.
    pub async fn refresh(&self, ctx: &RequestContext) -> Option<DashboardUpdate> {
        let Some(_guard) = self.try_begin() else {
            counter!(REFRESH_DROPPED_TOTAL).increment(1);
            info!(scope = %ctx.label(), "refresh dropped: already in flight");
            return None;
        };

        let ctx = ctx.clone();
        info!(scope = %ctx.label(), agent = self.agent.name(), "refresh started");

        let started = Instant::now();
        let reply = self.agent.complete(&dashboard_prompt(&ctx)).await;
        histogram!(AGENT_LATENCY_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        let update = match reply {
            Err(e) => {
                counter!(AGENT_ERRORS_TOTAL).increment(1);
                warn!(error = %e, "agent call failed; publishing placeholder");
                DashboardUpdate {
                    data: placeholder::generate(&ctx),
                    mode: DataMode::demo(TRANSPORT_REASON),
                    narrative: TRANSPORT_NARRATIVE.to_string(),
                    context: ctx,
                }
            }
            Ok(text) => {
                let (data, mode) = match assess(&text, &self.thresholds) {
                    Assessment::Live(data) => (data, DataMode::live()),
                    Assessment::Demo(reason) => {
                        info!(reply = %anon_hash(&text), reason = %reason, "agent tables rejected");
                        (placeholder::generate(&ctx), DataMode::demo(reason))
                    }
                };
                DashboardUpdate {
                    context: ctx,
                    data,
                    mode,
                    narrative: text,
                }
            }
        };

        let mode = if update.mode.is_demo { "demo" } else { "live" };
        counter!(REFRESH_TOTAL, "mode" => mode).increment(1);
        info!(mode, reason = %update.mode.reason, "refresh published");
        Some(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{FailingAgent, MockAgent, SAMPLE_DASHBOARD_REPLY};
    use crate::validate::INCOMPLETE_REASON;
    use std::sync::Arc;

    fn orchestrator(agent: DynAgentClient) -> DashboardOrchestrator {
        DashboardOrchestrator::new(agent, Thresholds::default())
    }

    #[test]
    fn sample_reply_is_live() {
        match assess(SAMPLE_DASHBOARD_REPLY, &Thresholds::default()) {
            Assessment::Live(d) => {
                assert_eq!(d.kpi.commitments, 125_000_000.0);
                assert_eq!(d.kpi.projects, 31);
                assert_eq!(d.trend.len(), 8);
                assert_eq!(d.top.len(), 5);
            }
            other => panic!("expected live, got {other:?}"),
        }
    }

    #[test]
    fn missing_marker_forces_demo() {
        // Numbers stay complete; only a note cell carries the marker.
        let text = SAMPLE_DASHBOARD_REPLY.replace("| Projects | 31 | active |", "| Projects | 31 | na |");
        assert_ne!(text, SAMPLE_DASHBOARD_REPLY);
        assert_eq!(
            assess(&text, &Thresholds::default()),
            Assessment::Demo(MISSING_MARKER_REASON.into())
        );

        let text = SAMPLE_DASHBOARD_REPLY.replace("| Other | 7000000 |", "| Other | NA |");
        assert_eq!(
            assess(&text, &Thresholds::default()),
            Assessment::Demo(INCOMPLETE_REASON.into())
        );
    }

    #[test]
    fn prose_only_reply_reports_missing_tables() {
        assert_eq!(
            assess("No tables today.", &Thresholds::default()),
            Assessment::Demo("Missing required tables".into())
        );
    }

    #[test]
    fn stricter_thresholds_reject_sample() {
        let strict = Thresholds {
            min_trend_rows: 9,
            ..Thresholds::default()
        };
        assert_eq!(
            assess(SAMPLE_DASHBOARD_REPLY, &strict),
            Assessment::Demo(INCOMPLETE_REASON.into())
        );
    }

    #[test]
    fn initial_is_tagged_placeholder() {
        let o = orchestrator(Arc::new(MockAgent::new("")));
        let ctx = RequestContext::default();
        let u = o.initial(&ctx);
        assert_eq!(u.mode, DataMode::demo(INITIAL_REASON));
        assert_eq!(u.data, placeholder::generate(&ctx));
        assert!(u.narrative.is_empty());
    }

    #[tokio::test]
    async fn live_refresh_forwards_narrative() {
        let o = orchestrator(Arc::new(MockAgent::new(SAMPLE_DASHBOARD_REPLY)));
        let u = o.refresh(&RequestContext::default()).await.unwrap();
        assert_eq!(u.mode, DataMode::live());
        assert_eq!(u.narrative, SAMPLE_DASHBOARD_REPLY);
        assert!(!o.is_busy());
    }

    #[tokio::test]
    async fn transport_failure_uses_canned_narrative() {
        let o = orchestrator(Arc::new(FailingAgent::new("down")));
        let ctx = RequestContext::new("Kenya", "2021-2024", "Health");
        let u = o.refresh(&ctx).await.unwrap();
        assert_eq!(u.mode, DataMode::demo(TRANSPORT_REASON));
        assert_eq!(u.narrative, TRANSPORT_NARRATIVE);
        assert_eq!(u.data, placeholder::generate(&ctx));
        assert!(!o.is_busy());
    }

    #[tokio::test]
    async fn rejected_reply_keeps_agent_narrative() {
        let text = "## Dashboard Narrative\n- Nothing structured.\n";
        let o = orchestrator(Arc::new(MockAgent::new(text)));
        let u = o.refresh(&RequestContext::default()).await.unwrap();
        assert!(u.mode.is_demo);
        assert_eq!(u.mode.reason, "Missing required tables");
        assert_eq!(u.narrative, text);
    }
}
