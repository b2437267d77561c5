//! Message struct with builder pattern.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::address::{Address, ToAddress};
use crate::attachment::Attachment;
use crate::error::MailError;

/// A single outbound email message.
///
/// One message addresses exactly one primary recipient; mass sends fan out
/// one message per recipient (see [`campaign`](crate::campaign)).
///
/// Use the builder pattern to construct messages:
///
/// ```
/// use outbound::Message;
///
/// let message = Message::new()
///     .from("deals@example.com")
///     .to("recipient@example.com")
///     .subject("Teaser: Project Andes")
///     .html_body("<p>Please find attached.</p>");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    /// Sender address
    pub from: Option<Address>,
    /// Primary recipient
    pub to: Option<Address>,
    /// Reply-to address
    pub reply_to: Option<Address>,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html_body: Option<String>,
    /// Plain text body
    pub text_body: Option<String>,
    /// File attachments
    pub attachments: Vec<Attachment>,
    /// Custom email headers
    pub headers: HashMap<String, String>,
    /// Free-form metadata, stored opaquely alongside the message.
    /// No shape is assumed beyond what the write path produces.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    /// Create a new empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender address.
    ///
    /// Accepts anything that implements `ToAddress`:
    /// - `"email@example.com"` - just email
    /// - `("Name", "email@example.com")` - name and email
    pub fn from(mut self, addr: impl ToAddress) -> Self {
        self.from = Some(addr.to_address());
        self
    }

    /// Set the recipient.
    pub fn to(mut self, addr: impl ToAddress) -> Self {
        self.to = Some(addr.to_address());
        self
    }

    /// Set the reply-to address.
    pub fn reply_to(mut self, addr: impl ToAddress) -> Self {
        self.reply_to = Some(addr.to_address());
        self
    }

    /// Set the subject line.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the HTML body.
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    /// Set the plain text body.
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    /// Add an attachment.
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Add a custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attach a metadata value.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Validate the fields a send requires: recipient, subject, and at
    /// least one body. Rejected messages cause no side effects.
    pub fn validate(&self) -> Result<(), MailError> {
        let to = self.to.as_ref().ok_or(MailError::MissingField("to"))?;
        to.validate()?;
        if self.subject.trim().is_empty() {
            return Err(MailError::MissingField("subject"));
        }
        if self.html_body.is_none() && self.text_body.is_none() {
            return Err(MailError::MissingField("body"));
        }
        Ok(())
    }

    /// Check whether the message has all required fields for sending.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Check whether the message has any attachments.
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let message = Message::new()
            .from("deals@example.com")
            .to("recipient@example.com")
            .subject("Test")
            .text_body("Hello");

        assert_eq!(message.from.unwrap().email, "deals@example.com");
        assert_eq!(message.to.unwrap().email, "recipient@example.com");
        assert_eq!(message.subject, "Test");
        assert_eq!(message.text_body, Some("Hello".to_string()));
    }

    #[test]
    fn with_name() {
        let message = Message::new().to(("Ana Ruiz", "ana@example.com"));

        let to = message.to.unwrap();
        assert_eq!(to.email, "ana@example.com");
        assert_eq!(to.name, Some("Ana Ruiz".to_string()));
    }

    #[test]
    fn validate_requires_to_subject_and_body() {
        let no_to = Message::new().subject("Hi").text_body("x");
        assert!(matches!(
            no_to.validate(),
            Err(MailError::MissingField("to"))
        ));

        let no_subject = Message::new().to("a@b.com").text_body("x");
        assert!(matches!(
            no_subject.validate(),
            Err(MailError::MissingField("subject"))
        ));

        let no_body = Message::new().to("a@b.com").subject("Hi");
        assert!(matches!(
            no_body.validate(),
            Err(MailError::MissingField("body"))
        ));

        let ok = Message::new().to("a@b.com").subject("Hi").html_body("<p>x</p>");
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn headers() {
        let message = Message::new()
            .header("X-Custom", "value")
            .header("X-Priority", "1");

        assert_eq!(message.headers.get("X-Custom"), Some(&"value".to_string()));
        assert_eq!(message.headers.get("X-Priority"), Some(&"1".to_string()));
    }

    #[test]
    fn metadata_is_opaque_json() {
        let message = Message::new().metadata("mandate_id", serde_json::json!({"id": 7}));
        assert_eq!(
            message.metadata.get("mandate_id"),
            Some(&serde_json::json!({"id": 7}))
        );
    }
}
