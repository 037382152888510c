use std::sync::Arc;

use anyhow::Context;
use bank_management::{
    account::{AccountService, controller::AccountController},
    config::Config,
    db::Database,
    server::Server,
};
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bank_management=info")),
        )
        .with_target(true)
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    let store = Database::connect(&config)
        .await
        .context("Failed to open account store")?;

    let service = AccountService::new(store);
    service.print_pool_stats();
    let controller = Arc::new(AccountController::new(service));
    let server = Server::new(controller, config.bind_addr.clone());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received");
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                // Dropping the sender would stop the server; keep it alive instead.
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    server.start(shutdown_rx).await
}
