//! Email attachments.
//!
//! Attachments are carried inline on the queue row (raw bytes, serialized
//! with the item) and base64-encoded when handed to a provider.

use serde::{Deserialize, Serialize};

use crate::error::MailError;

/// An email attachment.
///
/// ```
/// use outbound::Attachment;
///
/// let attachment = Attachment::from_bytes("teaser.pdf", b"PDF content".to_vec());
/// assert_eq!(attachment.content_type, "application/pdf");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Filename for the attachment
    pub filename: String,
    /// MIME content type (e.g., "application/pdf")
    pub content_type: String,
    /// Raw attachment data
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl Attachment {
    /// Create a new attachment from raw bytes.
    ///
    /// Content type is guessed from the filename extension.
    pub fn from_bytes(filename: impl Into<String>, data: Vec<u8>) -> Self {
        let filename = filename.into();
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string();

        Self {
            filename,
            content_type,
            data,
        }
    }

    /// Set the content type explicitly.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Get the attachment data as a base64-encoded string.
    pub fn base64_data(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Reject empty attachments before they reach a provider.
    pub fn validate(&self) -> Result<(), MailError> {
        if self.data.is_empty() {
            return Err(MailError::AttachmentMissingContent(self.filename.clone()));
        }
        Ok(())
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Serialize attachment bytes as base64 so queue rows stay JSON-safe and
/// round-trip byte-for-byte.
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_guesses_mime() {
        let pdf = Attachment::from_bytes("doc.pdf", vec![1]);
        assert_eq!(pdf.content_type, "application/pdf");

        let unknown = Attachment::from_bytes("file.unknown_ext_12345", vec![1]);
        assert_eq!(unknown.content_type, "application/octet-stream");
    }

    #[test]
    fn base64_encoding() {
        let attachment = Attachment::from_bytes("test.txt", b"Hello".to_vec());
        assert_eq!(attachment.base64_data(), "SGVsbG8=");
    }

    #[test]
    fn empty_attachment_is_invalid() {
        let attachment = Attachment::from_bytes("empty.txt", Vec::new());
        assert!(attachment.validate().is_err());
    }

    #[test]
    fn json_round_trip_preserves_bytes() {
        let attachment = Attachment::from_bytes("blob.bin", vec![0, 159, 146, 150, 255]);
        let json = serde_json::to_string(&attachment).unwrap();
        let back: Attachment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, attachment);
    }
}
