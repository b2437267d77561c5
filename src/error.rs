//! Error types for outbound.

use thiserror::Error;

/// Errors that can occur while queueing or delivering email.
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// No email provider is configured.
    #[error("Email provider not configured")]
    NotConfigured,

    /// Configuration error (missing env var, invalid value, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing required field (e.g., to address, subject).
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid email address format.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Error reading or processing an attachment.
    #[error("Attachment error: {0}")]
    AttachmentError(String),

    /// Attachment has no content.
    #[error("Attachment has no content: {0}")]
    AttachmentMissingContent(String),

    /// Queue item, wave, campaign, or recipient not found in the store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A status transition the state machine does not allow.
    #[error("Invalid transition: {entity} cannot go from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Retry rejected because the cooldown window has not elapsed.
    #[error("Retry rejected: {0}")]
    RetryCooldown(String),

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Object storage error (source documents, watermarked copies).
    #[error("Object storage error: {0}")]
    ObjectStorage(String),

    /// Watermark generation failed.
    #[error("Watermark error: {0}")]
    Watermark(String),

    /// Error sending the email.
    #[error("Send error: {0}")]
    SendError(String),

    /// Provider-specific error with details.
    #[error("Provider error ({provider}): {message}")]
    ProviderError {
        provider: &'static str,
        message: String,
        /// Optional HTTP status code
        status: Option<u16>,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MailError {
    /// Create a provider-specific error.
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider,
            message: message.into(),
            status: None,
        }
    }

    /// Create a provider error with HTTP status.
    pub fn provider_with_status(
        provider: &'static str,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::ProviderError {
            provider,
            message: message.into(),
            status: Some(status),
        }
    }

    /// True for errors the retry ladder should re-attempt (provider and
    /// transport failures). Validation and configuration errors are not
    /// retryable: re-sending the same input cannot succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderError { .. } | Self::HttpError(_) | Self::SendError(_)
        )
    }
}

#[cfg(feature = "_http")]
impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_are_retryable() {
        assert!(MailError::provider("resend", "timeout").is_retryable());
        assert!(MailError::HttpError("connection reset".into()).is_retryable());
        assert!(!MailError::MissingField("to").is_retryable());
        assert!(!MailError::Configuration("RESEND_API_KEY not set".into()).is_retryable());
    }
}
