use axum_helpers::{create_router, serve_with_cleanup};
use core_config::tracing::{init_tracing, install_color_eyre, install_panic_hook};
use domain_suppression::{MongoFeedbackStore, SesProvider};
use eyre::WrapErr;
use std::sync::Arc;
use tracing::{info, warn};

mod config;
mod shutdown;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output
    install_color_eyre();

    // Load configuration from environment variables
    let config = Config::from_env()?;

    init_tracing(&config.environment);
    install_panic_hook();

    info!(
        mongodb = %config.mongodb.url(),
        database = %config.mongodb.database(),
        "Starting {} v{}",
        config.app.name,
        config.app.version
    );

    let store = Arc::new(MongoFeedbackStore::new(config.mongodb.clone()));
    let provider = Arc::new(SesProvider::from_config(&config.ses).await);
    let state = AppState::new(config.app, store, provider, config.template.clone());

    state
        .lifecycle
        .start()
        .await
        .wrap_err("Failed to start collaborators")?;

    match state.suppression.load().await {
        Ok(size) => info!(size, "Suppression set loaded"),
        Err(e) => warn!(error = %e, "Starting with an empty suppression set"),
    }

    let app = create_router(state.routes());

    let lifecycle = Arc::clone(&state.lifecycle);
    let served = serve_with_cleanup(app, &config.server, move |signal| async move {
        info!(%signal, "Shutting down: closing collaborators");
        lifecycle.stop().await
    })
    .await;

    let exit_code = shutdown::exit_code(served, config.server.shutdown_timeout);
    std::process::exit(exit_code);
}
