//! Recording mail provider for tests

use super::MailProvider;
use crate::models::{MailEnvelope, SendReceipt};
use async_trait::async_trait;
use eyre::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Provider that captures envelopes instead of sending them.
///
/// Verified identities are kept in memory so the verify/list/delete
/// passthroughs behave like the real API.
pub struct RecordingMailProvider {
    sent: Arc<Mutex<Vec<MailEnvelope>>>,
    verified: Arc<Mutex<Vec<String>>>,
    failure_message: Option<String>,
}

impl RecordingMailProvider {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            verified: Arc::new(Mutex::new(Vec::new())),
            failure_message: None,
        }
    }

    /// Create a provider whose every call fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure_message: Some(message.into()),
            ..Self::new()
        }
    }

    /// Get all envelopes handed to `send_mail`
    pub async fn sent(&self) -> Vec<MailEnvelope> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    fn check(&self) -> Result<()> {
        match &self.failure_message {
            Some(message) => Err(eyre::eyre!(message.clone())),
            None => Ok(()),
        }
    }
}

impl Default for RecordingMailProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailProvider for RecordingMailProvider {
    async fn verify_address(&self, address: &str) -> Result<()> {
        self.check()?;
        let mut verified = self.verified.lock().await;
        if !verified.iter().any(|a| a == address) {
            verified.push(address.to_string());
        }
        Ok(())
    }

    async fn list_verified_addresses(&self) -> Result<Vec<String>> {
        self.check()?;
        Ok(self.verified.lock().await.clone())
    }

    async fn delete_verified_address(&self, address: &str) -> Result<()> {
        self.check()?;
        self.verified.lock().await.retain(|a| a != address);
        Ok(())
    }

    async fn send_mail(&self, envelope: &MailEnvelope) -> Result<SendReceipt> {
        self.check()?;
        let mut sent = self.sent.lock().await;
        sent.push(envelope.clone());

        Ok(SendReceipt {
            message_id: format!("recorded-{}", sent.len()),
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
