//! One dashboard refresh against the configured agent; prints mode and KPI.
//!
//! Usage: `refresh-probe [COUNTRY] [YEARS] [SECTOR]`
//! (`AGENT_TEST_MODE=mock` runs without network.)

use iati_dashboard::agent::build_agent_client;
use iati_dashboard::config::DashboardConfig;
use iati_dashboard::dataset::{ALL_COUNTRIES, ALL_SECTORS, DEFAULT_YEARS};
use iati_dashboard::{DashboardOrchestrator, RequestContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    iati_dashboard::telemetry::init_tracing();

    let mut args = std::env::args().skip(1);
    let ctx = RequestContext::new(
        args.next().unwrap_or_else(|| ALL_COUNTRIES.to_string()),
        args.next().unwrap_or_else(|| DEFAULT_YEARS.to_string()),
        args.next().unwrap_or_else(|| ALL_SECTORS.to_string()),
    );

    let cfg = DashboardConfig::load_default()?;
    let agent = build_agent_client(&cfg.agent)?;
    let orchestrator = DashboardOrchestrator::new(agent, cfg.validation);

    let Some(update) = orchestrator.refresh(&ctx).await else {
        anyhow::bail!("refresh dropped: already in flight");
    };

    let kpi = &update.data.kpi;
    if update.mode.is_demo {
        println!("mode: demo ({})", update.mode.reason);
    } else {
        println!("mode: live");
    }
    println!("scope: {}", update.context.label());
    println!(
        "commitments={:.2} disbursements={:.2} ratio={:.3} projects={}",
        kpi.commitments,
        kpi.disbursements,
        kpi.disbursement_ratio(),
        kpi.projects
    );
    println!(
        "rows: trend={} sectors={} mix={}",
        update.data.trend.len(),
        update.data.sectors.len(),
        update.data.mix.len()
    );
    Ok(())
}
