//! REST API server exposing workflow submission, status, and cancel
//! endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use conductor::api::{router, ApiState};
use conductor::{telemetry, TelemetryConfig};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "conductor-api",
    version,
    about = "Serve the workflow orchestration REST API"
)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init_telemetry(&TelemetryConfig {
        service_name: "conductor-api".to_string(),
        log_level: args.log_level.clone(),
    })
    .map_err(anyhow::Error::from_boxed)?;

    let state = Arc::new(ApiState::new());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(addr = %args.bind, "API server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
