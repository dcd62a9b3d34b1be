//! Server infrastructure module.
//!
//! This module provides:
//! - Router setup with request tracing and a JSON 404 fallback
//! - Liveness endpoints
//! - Graceful shutdown coordination with a bounded cleanup step
//!
//! # Example
//!
//! ```ignore
//! use axum_helpers::server::{create_router, health_router, serve_with_cleanup};
//! use core_config::app_info;
//!
//! let app = create_router(api_routes.merge(health_router(app_info!())));
//! let report = serve_with_cleanup(app, &config.server, |_signal| async move {
//!     lifecycle.stop().await
//! })
//! .await?;
//! ```

pub mod app;
pub mod health;
pub mod shutdown;

pub use app::{create_router, serve_listener, serve_with_cleanup};
pub use health::{HealthResponse, health_router};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
