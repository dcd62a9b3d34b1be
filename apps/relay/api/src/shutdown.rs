//! Maps the outcome of serving into the process exit code.

use domain_suppression::ShutdownReport;
use std::io;
use std::time::Duration;
use tracing::{error, info};

/// 0 only when the server stopped cleanly and every collaborator closed.
pub fn exit_code(served: io::Result<Option<ShutdownReport>>, shutdown_timeout: Duration) -> i32 {
    match served {
        Ok(Some(report)) => {
            info!(exit_code = report.exit_code(), "Relay shutdown complete");
            report.exit_code()
        }
        Ok(None) => {
            error!(
                timeout_secs = shutdown_timeout.as_secs(),
                "Shutdown did not finish in time"
            );
            1
        }
        Err(e) => {
            error!(error = %e, "Server error");
            1
        }
    }
}
