use anyhow::{Context, Result};
use clap::Parser;
use interview_api::{AppState, Config, router};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Real-time interview server")]
struct Cli {
    /// Address to listen on; overrides BIND_ADDRESS.
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Where interview records are written; overrides HISTORY_DIR.
    #[arg(long)]
    history_dir: Option<PathBuf>,
    /// Where reports are written; overrides REPORTS_DIR.
    #[arg(long)]
    reports_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut config = Config::from_env().context("Failed to load application configuration")?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(dir) = args.history_dir {
        config.history_dir = dir;
    }
    if let Some(dir) = args.reports_dir {
        config.reports_dir = dir;
    }

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    info!(
        "Configuration loaded (report policy: {}, history: {}, reports: {})",
        config.session.report_policy,
        config.history_dir.display(),
        config.reports_dir.display()
    );

    let state = AppState::from_config(&config)?;
    let app = router(state);

    info!("Starting interview server, listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    axum::serve(listener, app).await?;

    Ok(())
}
