//! # Axum Helpers
//!
//! Shared HTTP plumbing for the relay services.
//!
//! ## Modules
//!
//! - **[`server`]**: Router setup, health endpoints, graceful shutdown
//! - **[`errors`]**: Structured error responses with error codes

pub mod errors;
pub mod server;

pub use server::{
    HealthResponse, ShutdownCoordinator, ShutdownSignal, create_router, health_router,
    serve_listener, serve_with_cleanup,
};

pub use errors::{AppError, ErrorCode, ErrorResponse};
