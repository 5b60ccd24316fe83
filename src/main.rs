use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paystream_core::adapters::{InMemoryOrderStore, LogInventorySink, LogNotifier};
use paystream_core::config::Config;
use paystream_core::services::{OrderLedger, PostPaymentWorkflow, TransactionOrchestrator};
use paystream_core::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Arc::new(InMemoryOrderStore::new());
    let ledger = OrderLedger::new(store);
    let workflow = PostPaymentWorkflow::new(
        ledger.clone(),
        Arc::new(LogNotifier),
        Arc::new(LogInventorySink),
    );
    let orchestrator = Arc::new(TransactionOrchestrator::new(&config, ledger, workflow));

    let state = AppState {
        orchestrator,
        config: Arc::new(config.clone()),
    };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
