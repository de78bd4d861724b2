use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub template: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone)]
pub struct EmailReceipt {
    pub id: String,
}

/// Typed failure classification on the sender seam. Permanent failures are
/// never retried; transient ones feed the queue's backoff.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("permanent send failure: {0}")]
    Permanent(String),
    #[error("transient send failure: {0}")]
    Transient(String),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, msg: &EmailMessage) -> Result<EmailReceipt, EmailError>;
}

/// Maps provider message strings to the typed classification, for adapters
/// whose SDK only exposes an error string.
pub fn classify_provider_message(message: &str) -> EmailError {
    const PERMANENT_MARKERS: [&str; 3] = ["invalid email", "domain not found", "blocked"];

    let lower = message.to_lowercase();
    if PERMANENT_MARKERS.iter().any(|m| lower.contains(m)) {
        EmailError::Permanent(message.to_string())
    } else {
        EmailError::Transient(message.to_string())
    }
}

/// Logging stand-in used when no provider is wired up.
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, msg: &EmailMessage) -> Result<EmailReceipt, EmailError> {
        info!(to = %msg.to, template = %msg.template, "email send (log only)");
        Ok(EmailReceipt {
            id: uuid::Uuid::new_v4().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_strings_classify_as_permanent() {
        for msg in [
            "Invalid email address",
            "recipient domain not found",
            "address is blocked by provider",
        ] {
            assert!(matches!(
                classify_provider_message(msg),
                EmailError::Permanent(_)
            ));
        }
    }

    #[test]
    fn other_strings_classify_as_transient() {
        for msg in ["connection reset", "rate limited", "HTTP 503"] {
            assert!(matches!(
                classify_provider_message(msg),
                EmailError::Transient(_)
            ));
        }
    }
}
