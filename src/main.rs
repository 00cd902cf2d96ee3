//! IATI dashboard service: binary entrypoint.
//! Boots the Axum HTTP server through Shuttle.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    iati_dashboard::telemetry::init_tracing();

    let router = iati_dashboard::app().await?;
    Ok(router.into())
}
