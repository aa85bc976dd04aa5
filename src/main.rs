use axum::http::HeaderValue;
use clap::Parser;
use recirc::api::{self, AdminToken, AppState};
use recirc::config::AppConfig;
use recirc::refresh::{Scheduler, REFRESH_JOB};
use recirc::storage;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[derive(Parser)]
#[command(name = "recirc", about = "Read-more recirculation for news articles")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recirc=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(Some(&cli.config))?;

    if let Err(msg) = config.validate() {
        eprintln!("Configuration error: {msg}");
        return Err(msg.into());
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        db = %config.database.path.display(),
        "starting recirc"
    );

    // Setup SQLite pool
    let pool = storage::sqlite::create_pool(&config.database)?;
    storage::sqlite::init_pool(&pool).await?;
    tracing::info!("database initialized");

    let state = Arc::new(AppState::from_config(&config, pool)?);

    // Activation: the first refresh runs immediately, then every interval
    if config.refresh.enabled {
        state
            .scheduler
            .schedule(REFRESH_JOB, state.refresh_period, state.refresh.clone());
    } else {
        tracing::info!("scheduled refresh disabled, use POST /v1/scheduler/activate");
    }

    let site_origin = match &config.server.site_origin {
        Some(origin) => Some(HeaderValue::from_str(origin.trim_end_matches('/'))?),
        None => None,
    };
    let app = api::router(
        state.clone(),
        AdminToken::new(&config.admin.token),
        site_origin,
    );

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.scheduler.clone()))
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal(scheduler: Arc<Scheduler>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }

    tracing::info!("shutting down...");

    // Deactivation: stop the periodic refresh before the listener closes
    scheduler.shutdown();
}
