//! Builds outbound envelopes, strips suppressed recipients and hands the
//! result to the mail provider.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::error::{SuppressionError, SuppressionResult};
use crate::models::{Destination, MailEnvelope, MailTemplate, SendReceipt};
use crate::provider::MailProvider;
use crate::suppression::SuppressionSet;

/// How many addresses were dropped from each recipient list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovedCounts {
    pub to: usize,
    pub cc: usize,
    pub bcc: usize,
}

impl RemovedCounts {
    pub fn total(&self) -> usize {
        self.to + self.cc + self.bcc
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredDestination {
    pub destination: Destination,
    pub removed: RemovedCounts,
}

pub struct MailDispatcher {
    provider: Arc<dyn MailProvider>,
    suppression: Arc<SuppressionSet>,
    template: MailTemplate,
}

impl MailDispatcher {
    pub fn new(
        provider: Arc<dyn MailProvider>,
        suppression: Arc<SuppressionSet>,
        template: MailTemplate,
    ) -> Self {
        Self {
            provider,
            suppression,
            template,
        }
    }

    pub fn template(&self) -> &MailTemplate {
        &self.template
    }

    /// Use `body` as-is when it names at least one recipient, otherwise fall
    /// back to the default template.
    pub fn build_envelope(&self, body: Option<MailEnvelope>) -> MailEnvelope {
        match body {
            Some(envelope) if envelope.has_recipients() => envelope,
            _ => self.template.envelope(),
        }
    }

    /// Drop every suppressed address from the to, cc and bcc lists.
    ///
    /// All three lists are checked against one snapshot. Returns `None` for
    /// an absent destination. The suppression set is only read.
    pub fn filter_destination(&self, destination: Option<Destination>) -> Option<FilteredDestination> {
        let destination = destination?;
        let snapshot = self.suppression.snapshot();

        let (to_addresses, to) = retain_allowed(destination.to_addresses, &snapshot, "to");
        let (cc_addresses, cc) = retain_allowed(destination.cc_addresses, &snapshot, "cc");
        let (bcc_addresses, bcc) = retain_allowed(destination.bcc_addresses, &snapshot, "bcc");

        Some(FilteredDestination {
            destination: Destination {
                to_addresses,
                cc_addresses,
                bcc_addresses,
            },
            removed: RemovedCounts { to, cc, bcc },
        })
    }

    /// One provider call, no retry. Failures are logged with the envelope.
    #[instrument(skip_all, fields(provider = self.provider.name()))]
    pub async fn send(&self, envelope: &MailEnvelope) -> SuppressionResult<SendReceipt> {
        match self.provider.send_mail(envelope).await {
            Ok(receipt) => {
                info!(message_id = %receipt.message_id, "Mail sent");
                Ok(receipt)
            }
            Err(e) => {
                error!(
                    error = ?e,
                    mail = %serde_json::to_string(envelope).unwrap_or_default(),
                    "Error occurred while sending mail"
                );
                Err(SuppressionError::Provider(e.to_string()))
            }
        }
    }

    /// Build, filter and send. Skips the provider when nobody is left.
    #[instrument(skip_all)]
    pub async fn dispatch(&self, body: Option<MailEnvelope>) -> SuppressionResult<SendReceipt> {
        let mut envelope = self.build_envelope(body);

        let filtered = self.filter_destination(envelope.destination.take());
        envelope.destination = filtered.map(|f| f.destination);

        if !envelope.has_recipients() {
            warn!("Every recipient is suppressed, mail not sent");
            return Err(SuppressionError::NoRecipients);
        }

        self.send(&envelope).await
    }

    /// Start verification of the configured sender.
    #[instrument(skip(self))]
    pub async fn verify_sender(&self) -> SuppressionResult<String> {
        let address = self.template.from.clone();
        self.provider
            .verify_address(&address)
            .await
            .map_err(|e| provider_error("verify", e))?;
        Ok(address)
    }

    #[instrument(skip(self))]
    pub async fn list_verified(&self) -> SuppressionResult<Vec<String>> {
        self.provider
            .list_verified_addresses()
            .await
            .map_err(|e| provider_error("list", e))
    }

    /// Remove the configured sender from the provider's verified identities.
    #[instrument(skip(self))]
    pub async fn delete_sender(&self) -> SuppressionResult<String> {
        let address = self.template.from.clone();
        self.provider
            .delete_verified_address(&address)
            .await
            .map_err(|e| provider_error("delete", e))?;
        Ok(address)
    }
}

fn retain_allowed(
    addresses: Vec<String>,
    suppressed: &HashSet<String>,
    list: &'static str,
) -> (Vec<String>, usize) {
    let before = addresses.len();
    let kept: Vec<String> = addresses
        .into_iter()
        .filter(|address| !suppressed.contains(address))
        .collect();
    let removed = before - kept.len();

    if removed > 0 {
        info!(list, removed, "Restricted mails found in {} were removed", list);
    }
    (kept, removed)
}

fn provider_error(operation: &str, err: eyre::Report) -> SuppressionError {
    warn!(operation, error = ?err, "Mail provider call failed");
    SuppressionError::Provider(err.to_string())
}
