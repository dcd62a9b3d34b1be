//! Mail provider implementations

pub mod mock;
pub mod ses;

pub use mock::RecordingMailProvider;
pub use ses::SesProvider;

use async_trait::async_trait;
use eyre::Result;

use crate::models::{MailEnvelope, SendReceipt};

/// Outbound mail API consumed by the relay.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Start verification of a sender identity.
    async fn verify_address(&self, address: &str) -> Result<()>;

    async fn list_verified_addresses(&self) -> Result<Vec<String>>;

    async fn delete_verified_address(&self, address: &str) -> Result<()>;

    /// Send one message. Called once per request; failures are not retried.
    async fn send_mail(&self, envelope: &MailEnvelope) -> Result<SendReceipt>;

    /// Get provider name
    fn name(&self) -> &'static str;
}
