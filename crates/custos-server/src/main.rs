//! CUSTOS Server — application entry point.

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("custos=info".parse().unwrap()),
        )
        .json()
        .init();

    tracing::info!("Starting CUSTOS server...");

    // TODO: Load catalog configuration and build the handler registries
    // TODO: Initialize the SurrealDB connection (custos_db::DbManager)
    // TODO: Mount the HTTP transport over the governance services

    tracing::info!("CUSTOS server stopped.");
}
