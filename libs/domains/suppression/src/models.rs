use chrono::{DateTime, Utc};
use core_config::{ConfigError, FromEnv, env_list, env_required};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHARSET: &str = "UTF-8";

fn default_charset() -> String {
    DEFAULT_CHARSET.to_string()
}

/// Recipient lists of an outbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Destination {
    pub to_addresses: Vec<String>,
    pub cc_addresses: Vec<String>,
    pub bcc_addresses: Vec<String>,
}

impl Destination {
    pub fn is_empty(&self) -> bool {
        self.to_addresses.is_empty() && self.cc_addresses.is_empty() && self.bcc_addresses.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Content {
    #[serde(default)]
    pub data: String,
    #[serde(default = "default_charset")]
    pub charset: String,
}

impl Content {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            charset: default_charset(),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::new("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Body {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Content>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Message {
    pub subject: Content,
    pub body: Body,
}

/// A fully specified outbound message, in the provider's classic JSON layout.
///
/// ```json
/// {
///   "Source": "relay@example.com",
///   "Destination": { "ToAddresses": ["a@example.com"] },
///   "Message": { "Subject": { "Data": "Hi" }, "Body": { "Text": { "Data": "..." } } },
///   "ReplyToAddresses": []
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MailEnvelope {
    /// Sender; the provider's configured sender is used when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
    pub message: Message,
    pub reply_to_addresses: Vec<String>,
}

impl MailEnvelope {
    /// True when the envelope names at least one recipient.
    pub fn has_recipients(&self) -> bool {
        self.destination.as_ref().is_some_and(|d| !d.is_empty())
    }
}

/// Why an address was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Bounced,
    Complained,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bounced => "bounced",
            Self::Complained => "complained",
        }
    }

    /// The persisted list this kind of feedback lands in.
    pub fn list(&self) -> SuppressionList {
        match self {
            Self::Bounced => SuppressionList::Bounced,
            Self::Complained => SuppressionList::Complained,
        }
    }
}

/// Append-only record of a feedback event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub mail_id: String,
    pub kind: FeedbackKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complaint: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn complaint(mail_id: impl Into<String>, complaint: serde_json::Value) -> Self {
        Self {
            mail_id: mail_id.into(),
            kind: FeedbackKind::Complained,
            complaint: Some(complaint),
            timestamp: Utc::now(),
        }
    }
}

/// The single persisted document holding both suppression lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuppressionDocument {
    pub bounced_mails: Vec<String>,
    pub complained_mails: Vec<String>,
}

impl SuppressionDocument {
    pub fn list(&self, list: SuppressionList) -> &[String] {
        match list {
            SuppressionList::Bounced => &self.bounced_mails,
            SuppressionList::Complained => &self.complained_mails,
        }
    }

    pub fn list_mut(&mut self, list: SuppressionList) -> &mut Vec<String> {
        match list {
            SuppressionList::Bounced => &mut self.bounced_mails,
            SuppressionList::Complained => &mut self.complained_mails,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppressionList {
    Bounced,
    Complained,
}

impl SuppressionList {
    /// Field name inside [`SuppressionDocument`].
    pub fn field(&self) -> &'static str {
        match self {
            Self::Bounced => "bounced_mails",
            Self::Complained => "complained_mails",
        }
    }
}

/// Result of an add-to-set mutation.
///
/// `modified_count == 0` with `matched_count == 1` means the address was
/// already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
}

impl UpdateOutcome {
    pub fn added(&self) -> bool {
        self.modified_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    pub inserted_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintOutcome {
    pub config: UpdateOutcome,
    pub complaint: InsertOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub message_id: String,
}

/// Default envelope used when `/send` carries no recipients.
///
/// Environment variables:
/// - `MAIL_FROM` (required)
/// - `MAIL_TO` (required, comma-separated)
/// - `MAIL_CC`, `MAIL_BCC` (comma-separated)
/// - `MAIL_SUBJECT`, `MAIL_HTML`, `MAIL_TEXT`
/// - `MAIL_REPLY_TO` (comma-separated, defaults to `MAIL_FROM`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailTemplate {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
    pub reply_to: Vec<String>,
}

impl MailTemplate {
    pub fn envelope(&self) -> MailEnvelope {
        MailEnvelope {
            source: Some(self.from.clone()),
            destination: Some(Destination {
                to_addresses: self.to.clone(),
                cc_addresses: self.cc.clone(),
                bcc_addresses: self.bcc.clone(),
            }),
            message: Message {
                subject: Content::new(&self.subject),
                body: Body {
                    html: self.html.as_deref().map(Content::new),
                    text: self.text.as_deref().map(Content::new),
                },
            },
            reply_to_addresses: self.reply_to.clone(),
        }
    }
}

impl FromEnv for MailTemplate {
    fn from_env() -> Result<Self, ConfigError> {
        let from = env_required("MAIL_FROM")?;
        let to = env_list("MAIL_TO");
        if to.is_empty() {
            return Err(ConfigError::MissingEnvVar("MAIL_TO".to_string()));
        }

        let mut reply_to = env_list("MAIL_REPLY_TO");
        if reply_to.is_empty() {
            reply_to.push(from.clone());
        }

        Ok(Self {
            from,
            to,
            cc: env_list("MAIL_CC"),
            bcc: env_list("MAIL_BCC"),
            subject: std::env::var("MAIL_SUBJECT").unwrap_or_default(),
            html: std::env::var("MAIL_HTML").ok(),
            text: std::env::var("MAIL_TEXT").ok(),
            reply_to,
        })
    }
}

/// SES client settings.
///
/// - `AWS_SES_REGION` or `AWS_REGION` (optional, SDK default chain otherwise)
/// - `MAIL_FROM` (required): default sender and the identity managed by the
///   verify/delete endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SesConfig {
    pub region: Option<String>,
    pub from_email: String,
}

impl FromEnv for SesConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let region = std::env::var("AWS_SES_REGION")
            .or_else(|_| std::env::var("AWS_REGION"))
            .ok();

        Ok(Self {
            region,
            from_email: env_required("MAIL_FROM")?,
        })
    }
}
