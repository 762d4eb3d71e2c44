// Agent Ledger - Web Server
// REST API with Axum

use agent_ledger::api::{create_app, AppState};
use agent_ledger::db::open_database;
use agent_ledger::{setup_logging, AppConfig, VERSION};
use anyhow::{Context, Result};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env();
    setup_logging(config.log_level);

    info!("🌐 Agent Ledger v{} - Web Server", VERSION);

    let conn = open_database(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    info!("✓ Database opened: {}", config.db_path.display());

    let app = create_app(AppState::new(conn));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!("✓ Server running on http://{}", addr);
    info!("  GET    /agents, /agents/:id");
    info!("  POST   /agents    PATCH/DELETE /agents/:id");
    info!("  GET    /transactions/transaction-data");
    info!("  POST   /transactions/transaction    PUT /transactions/transaction/:id");
    info!("  GET    /reports/report-data?startDate=&endDate=");
    info!("  GET    /reports/charts?startDate=&endDate=");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
