//! Email provider implementations.
//!
//! Each provider implements the [`Provider`](crate::Provider) trait.
//!
//! | Provider | Feature Flag | Description |
//! |----------|-------------|-------------|
//! | [`ResendProvider`] | `resend` | Resend API |
//! | [`SendGridProvider`] | `sendgrid` | SendGrid API |
//! | [`LocalProvider`] | (none) | In-memory capture for dev/testing |
//! | [`LoggerProvider`] | (none) | Logs messages without sending |

#[cfg(feature = "resend")]
mod resend;
#[cfg(feature = "resend")]
pub use resend::ResendProvider;

#[cfg(feature = "sendgrid")]
mod sendgrid;
#[cfg(feature = "sendgrid")]
pub use sendgrid::SendGridProvider;

mod local;
pub use local::{CapturedMessage, LocalProvider};

mod logger;
pub use logger::LoggerProvider;
