//! AWS SES provider
//!
//! Talks to the SES v2 API. Sender identities are managed through the
//! email-identity endpoints; messages go out through `SendEmail` with simple
//! content.
//!
//! Credentials follow the AWS SDK default chain:
//! - Environment variables: `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`
//! - IAM roles (EKS IRSA, EC2 instance profile)
//! - Shared credentials file

use crate::models::{Content as EnvelopeContent, MailEnvelope, SendReceipt, SesConfig};
use crate::provider::MailProvider;
use async_trait::async_trait;
use aws_sdk_sesv2::Client;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, IdentityType, Message};
use eyre::{Result, eyre};
use tracing::{debug, error, instrument};

/// AWS SES mail provider
pub struct SesProvider {
    client: Client,
    from_email: String,
}

impl SesProvider {
    pub fn new(client: Client, from_email: impl Into<String>) -> Self {
        Self {
            client,
            from_email: from_email.into(),
        }
    }

    /// Build a client from the default AWS config, overriding the region
    /// when `config.region` is set.
    pub async fn from_config(config: &SesConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config), &config.from_email)
    }

    /// Sender the envelope asks for, or the configured default.
    fn source<'a>(&'a self, envelope: &'a MailEnvelope) -> &'a str {
        envelope
            .source
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(self.from_email.as_str())
    }
}

fn content(value: &EnvelopeContent) -> Result<Content> {
    Content::builder()
        .data(&value.data)
        .charset(&value.charset)
        .build()
        .map_err(|e| eyre!("invalid message content: {}", e))
}

fn categorize(operation: &str, err: impl std::fmt::Display) -> eyre::Report {
    let err_str = err.to_string();
    if err_str.contains("Throttling") || err_str.contains("rate") {
        eyre!("{}: rate limit exceeded: {}", operation, err_str)
    } else if err_str.contains("AccessDenied") || err_str.contains("credentials") {
        eyre!("{}: authentication failed: {}", operation, err_str)
    } else if err_str.contains("MessageRejected") || err_str.contains("BadRequest") {
        eyre!("{}: rejected: {}", operation, err_str)
    } else {
        eyre!("{}: SES error: {}", operation, err_str)
    }
}

#[async_trait]
impl MailProvider for SesProvider {
    #[instrument(skip(self))]
    async fn verify_address(&self, address: &str) -> Result<()> {
        self.client
            .create_email_identity()
            .email_identity(address)
            .send()
            .await
            .map_err(|e| categorize("CreateEmailIdentity", aws_sdk_sesv2::error::DisplayErrorContext(e)))?;

        debug!("Verification started");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_verified_addresses(&self) -> Result<Vec<String>> {
        let mut addresses = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_email_identities()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| categorize("ListEmailIdentities", aws_sdk_sesv2::error::DisplayErrorContext(e)))?;

            addresses.extend(
                response
                    .email_identities()
                    .iter()
                    .filter(|identity| identity.identity_type() == Some(&IdentityType::EmailAddress))
                    .filter_map(|identity| identity.identity_name().map(str::to_string)),
            );

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(addresses)
    }

    #[instrument(skip(self))]
    async fn delete_verified_address(&self, address: &str) -> Result<()> {
        self.client
            .delete_email_identity()
            .email_identity(address)
            .send()
            .await
            .map_err(|e| categorize("DeleteEmailIdentity", aws_sdk_sesv2::error::DisplayErrorContext(e)))?;

        Ok(())
    }

    async fn send_mail(&self, envelope: &MailEnvelope) -> Result<SendReceipt> {
        let recipients = envelope.destination.clone().unwrap_or_default();
        let destination = Destination::builder()
            .set_to_addresses(Some(recipients.to_addresses))
            .set_cc_addresses(Some(recipients.cc_addresses))
            .set_bcc_addresses(Some(recipients.bcc_addresses))
            .build();

        let mut body = Body::builder();
        if let Some(text) = &envelope.message.body.text {
            body = body.text(content(text)?);
        }
        if let Some(html) = &envelope.message.body.html {
            body = body.html(content(html)?);
        }

        let message = Message::builder()
            .subject(content(&envelope.message.subject)?)
            .body(body.build())
            .build();

        let from = self.source(envelope);
        debug!(from = %from, subject = %envelope.message.subject.data, "Sending mail via AWS SES");

        let mut request = self
            .client
            .send_email()
            .from_email_address(from)
            .destination(destination)
            .content(EmailContent::builder().simple(message).build());

        if !envelope.reply_to_addresses.is_empty() {
            request = request.set_reply_to_addresses(Some(envelope.reply_to_addresses.clone()));
        }

        let response = request.send().await.map_err(|e| {
            let e = aws_sdk_sesv2::error::DisplayErrorContext(e);
            error!(error = %e, "AWS SES send failed");
            categorize("SendEmail", e)
        })?;

        Ok(SendReceipt {
            message_id: response.message_id().unwrap_or_default().to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "aws-ses"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_sesv2::config::{BehaviorVersion, Credentials, Region};

    fn offline_provider() -> SesProvider {
        let config = aws_sdk_sesv2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "static"))
            .build();
        SesProvider::new(Client::from_conf(config), "relay@x.com")
    }

    #[tokio::test]
    async fn test_source_falls_back_to_configured_sender() {
        let provider = offline_provider();

        let mut envelope = MailEnvelope::default();
        assert_eq!(provider.source(&envelope), "relay@x.com");

        envelope.source = Some(String::new());
        assert_eq!(provider.source(&envelope), "relay@x.com");

        envelope.source = Some("other@x.com".into());
        assert_eq!(provider.source(&envelope), "other@x.com");
    }

    #[test]
    fn test_categorize_errors() {
        let err = categorize("SendEmail", "ThrottlingException: slow down");
        assert!(err.to_string().contains("rate limit exceeded"));

        let err = categorize("SendEmail", "MessageRejected: Email address is not verified");
        assert!(err.to_string().contains("rejected"));
    }

    #[test]
    fn test_content_keeps_charset() {
        let built = content(&EnvelopeContent {
            data: "hello".into(),
            charset: "ISO-8859-1".into(),
        })
        .unwrap();
        assert_eq!(built.data(), "hello");
        assert_eq!(built.charset(), Some("ISO-8859-1"));
    }
}
