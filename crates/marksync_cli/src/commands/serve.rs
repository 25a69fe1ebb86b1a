use console::Term;

use crate::commands::shared::build_service;
use crate::config::Config;
use crate::server::{AppState, router};
use crate::shutdown::shutdown_signal;

/// Run the dashboard server until Ctrl+C.
pub(crate) async fn handle_serve(
    bind: Option<String>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(config)?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    if config.server.password.as_deref().is_none_or(str::is_empty) {
        tracing::warn!("No server password configured, the dashboard API is open to anyone who can reach it");
    }

    let app = router(AppState::new(service, config.server.password.clone()));
    let listener = tokio::net::TcpListener::bind(bind.as_str()).await?;
    let addr = listener.local_addr()?;

    if Term::stdout().is_term() {
        println!("Dashboard API listening on http://{}", addr);
    }
    tracing::info!(%addr, "Server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
