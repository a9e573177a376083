mod config;
mod telegram;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use herald_api::state::{AppState, AppStateInner};
use herald_core::auth::OperatorAllowList;
use herald_core::delivery::DeliveryClient;
use herald_core::directory::{RecipientDirectory, SqliteDirectory};
use herald_core::dispatcher::Dispatcher;
use herald_core::gateway::OperatorGateway;

use crate::config::Config;
use crate::telegram::TelegramClient;

const DEFAULT_LOG_FILTER: &str =
    "herald=debug,herald_core=debug,herald_api=debug,herald_db=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = Arc::new(herald_db::Database::open(&config.db_path)?);
    let directory: Arc<dyn RecipientDirectory> = Arc::new(SqliteDirectory::new(db));

    let delivery: Arc<dyn DeliveryClient> =
        Arc::new(TelegramClient::new(&config.api_base, &config.bot_token)?);

    let dispatcher = Dispatcher::new(directory.clone(), delivery.clone(), config.send_interval);
    let operators = OperatorAllowList::new(config.operator_ids.iter().copied());
    info!(
        "{} operators allowed, sending at most one message every {:?}",
        config.operator_ids.len(),
        config.send_interval
    );

    let gateway = OperatorGateway::new(
        operators,
        directory,
        delivery,
        dispatcher.clone(),
        config.export_dir.clone(),
    );
    let state: AppState = Arc::new(AppStateInner {
        gateway,
        api_secret: config.api_secret.clone(),
    });

    let app = herald_api::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Herald listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if dispatcher.is_busy() {
        warn!("Shutting down with a broadcast still running; it will not resume");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_every_crate() {
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
        for target in ["herald=", "herald_core=", "herald_api=", "herald_db=", "tower_http="] {
            assert!(DEFAULT_LOG_FILTER.contains(target), "missing {}", target);
        }
    }
}
