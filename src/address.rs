//! Email addresses with optional display names.

use serde::{Deserialize, Serialize};

use crate::error::MailError;

/// An email address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// The email address itself.
    pub email: String,
    /// Optional display name.
    pub name: Option<String>,
}

impl Address {
    /// Create an address without a display name.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    /// Create an address with a display name.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }

    /// Format for use in provider payloads: `Name <email>` or bare email.
    pub fn formatted(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }

    /// Validate the address syntax.
    pub fn validate(&self) -> Result<(), MailError> {
        if email_address::EmailAddress::is_valid(&self.email) {
            Ok(())
        } else {
            Err(MailError::InvalidAddress(self.email.clone()))
        }
    }
}

/// Conversion into an [`Address`].
///
/// Implemented for `&str`/`String` (bare email) and `(name, email)` pairs,
/// so call sites can pass either directly.
pub trait ToAddress {
    fn to_address(&self) -> Address;
}

impl ToAddress for Address {
    fn to_address(&self) -> Address {
        self.clone()
    }
}

impl ToAddress for &Address {
    fn to_address(&self) -> Address {
        (*self).clone()
    }
}

impl ToAddress for &str {
    fn to_address(&self) -> Address {
        Address::new(*self)
    }
}

impl ToAddress for String {
    fn to_address(&self) -> Address {
        Address::new(self.clone())
    }
}

impl<N: AsRef<str>, E: AsRef<str>> ToAddress for (N, E) {
    fn to_address(&self) -> Address {
        Address::with_name(self.0.as_ref(), self.1.as_ref())
    }
}

impl From<&str> for Address {
    fn from(email: &str) -> Self {
        Address::new(email)
    }
}

impl From<String> for Address {
    fn from(email: String) -> Self {
        Address::new(email)
    }
}
