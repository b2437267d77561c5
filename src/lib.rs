//! # Outbound
//!
//! Queue, deliver, and track outbound email in Rust.
//!
//! The crate implements the delivery slice of a deal-advisory CRM:
//!
//! - a persisted **queue** of transactional emails with a retry/backoff
//!   ladder ([`queue`]),
//! - a batch **processor** that drains due items, idempotently and safely
//!   under concurrent triggers ([`queue::QueueProcessor`]),
//! - swappable **providers** behind one trait ([`Provider`]), resolved from
//!   configuration at call time,
//! - a wave-based **campaign dispatcher** with per-recipient template
//!   rendering, open/click tracking, and lazily watermarked attachments
//!   ([`campaign`]).
//!
//! ## Quick Start
//!
//! Set environment variables:
//! ```bash
//! OUTBOUND_PROVIDER=resend
//! RESEND_API_KEY=re_xxxxx
//! OUTBOUND_FROM=deals@example.com
//! OUTBOUND_FROM_NAME=Deal Desk
//! ```
//!
//! Enqueue and process:
//! ```rust,ignore
//! use outbound::queue::{MemoryQueueStore, QueueProcessor};
//! use outbound::{provider_from_env, Enqueue, Message};
//!
//! let store = MemoryQueueStore::new();
//! let provider = provider_from_env()?;
//!
//! store.enqueue(Enqueue::new(
//!     Message::new()
//!         .to("target@example.com")
//!         .subject("Teaser: Project Andes")
//!         .html_body("<p>Please find attached.</p>"),
//! )).await?;
//!
//! let outcome = QueueProcessor::new(&store, provider.as_ref())
//!     .default_from(outbound::default_from().unwrap())
//!     .process_due()
//!     .await?;
//! println!("sent {} of {}", outcome.sent, outcome.processed);
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `OUTBOUND_PROVIDER` | `resend`, `sendgrid`, `local`, `logger`, `logger_full` |
//! | `OUTBOUND_FROM` | Default sender email |
//! | `OUTBOUND_FROM_NAME` | Default sender name |
//! | `OUTBOUND_TRACKING_BASE_URL` | Base URL of the open/click tracking endpoints |
//! | `RESEND_API_KEY` | Resend API key |
//! | `SENDGRID_API_KEY` | SendGrid API key |
//!
//! ## Feature Flags
//!
//! - `resend` - Resend API provider (default)
//! - `sendgrid` - SendGrid API provider (default)
//! - `metrics` - Prometheus-style metrics (counters/histograms)
//!
//! There is no process-global mailer: the provider is resolved from a
//! read-only configuration snapshot whenever [`provider_from_env`] is
//! called, and callers hold the resulting `Arc<dyn Provider>` for as long
//! as they need it.

/// The version of the outbound crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod address;
mod attachment;
mod error;
mod message;
mod provider;

pub mod campaign;
pub mod providers;
pub mod queue;
pub mod testing;

use std::env;
use std::sync::Arc;

// Re-exports
pub use address::{Address, ToAddress};
pub use attachment::Attachment;
pub use campaign::TrackingConfig;
pub use error::MailError;
pub use message::Message;
pub use provider::{Delivery, Provider};
pub use queue::{Enqueue, QueueItem, QueueStatus, RetryPolicy};

// ============================================================================
// Configuration
// ============================================================================

/// Get the default from address from environment.
pub fn default_from() -> Option<Address> {
    let email = env::var("OUTBOUND_FROM").ok()?;
    match env::var("OUTBOUND_FROM_NAME").ok() {
        Some(name) => Some(Address::with_name(name, email)),
        None => Some(Address::new(email)),
    }
}

/// Tracking endpoints for campaign sends, from `OUTBOUND_TRACKING_BASE_URL`.
pub fn tracking_from_env() -> Result<TrackingConfig, MailError> {
    env::var("OUTBOUND_TRACKING_BASE_URL")
        .map(TrackingConfig::new)
        .map_err(|_| MailError::Configuration("OUTBOUND_TRACKING_BASE_URL not set".into()))
}

/// Auto-detect provider based on enabled features and available API keys.
fn detect_provider() -> Option<&'static str> {
    #[cfg(feature = "resend")]
    if env::var("RESEND_API_KEY").is_ok() {
        return Some("resend");
    }
    #[cfg(feature = "sendgrid")]
    if env::var("SENDGRID_API_KEY").is_ok() {
        return Some("sendgrid");
    }
    None
}

/// Resolve a provider from environment variables.
///
/// Selection is by `OUTBOUND_PROVIDER`, or by presence of a configured API
/// key when unset. Fails fast with a descriptive error when nothing is
/// configured; no send is attempted. Each call returns a fresh adapter
/// built from the current environment - there is no mutable global.
pub fn provider_from_env() -> Result<Arc<dyn Provider>, MailError> {
    let provider = match env::var("OUTBOUND_PROVIDER") {
        Ok(p) => p.to_lowercase(),
        Err(_) => match detect_provider() {
            Some(p) => {
                tracing::debug!(provider = p, "Auto-detected email provider");
                p.to_string()
            }
            None => {
                return Err(MailError::Configuration(
                    "OUTBOUND_PROVIDER not set and could not auto-detect. \
                    Set OUTBOUND_PROVIDER or ensure an API key is configured."
                        .into(),
                ));
            }
        },
    };

    match provider.as_str() {
        #[cfg(feature = "resend")]
        "resend" => {
            let key = env::var("RESEND_API_KEY")
                .map_err(|_| MailError::Configuration("RESEND_API_KEY not set".into()))?;
            Ok(Arc::new(providers::ResendProvider::new(&key)))
        }
        #[cfg(not(feature = "resend"))]
        "resend" => Err(MailError::Configuration(
            "OUTBOUND_PROVIDER=resend but 'resend' feature is not enabled. \
            Add `features = [\"resend\"]` to Cargo.toml"
                .into(),
        )),

        #[cfg(feature = "sendgrid")]
        "sendgrid" => {
            let key = env::var("SENDGRID_API_KEY")
                .map_err(|_| MailError::Configuration("SENDGRID_API_KEY not set".into()))?;
            Ok(Arc::new(providers::SendGridProvider::new(&key)))
        }
        #[cfg(not(feature = "sendgrid"))]
        "sendgrid" => Err(MailError::Configuration(
            "OUTBOUND_PROVIDER=sendgrid but 'sendgrid' feature is not enabled. \
            Add `features = [\"sendgrid\"]` to Cargo.toml"
                .into(),
        )),

        "local" => Ok(Arc::new(providers::LocalProvider::new())),

        "logger" => Ok(Arc::new(providers::LoggerProvider::new())),
        "logger_full" => Ok(Arc::new(providers::LoggerProvider::full())),

        _ => Err(MailError::Configuration(format!(
            "Unknown OUTBOUND_PROVIDER: {}. Valid providers are: resend, sendgrid, local, logger, logger_full",
            provider
        ))),
    }
}

/// Check if email delivery is configured (env vars set and feature enabled).
pub fn is_configured() -> bool {
    let provider = match env::var("OUTBOUND_PROVIDER") {
        Ok(p) => p,
        Err(_) => match detect_provider() {
            Some(p) => p.to_string(),
            None => return false,
        },
    };
    match provider.to_lowercase().as_str() {
        #[cfg(feature = "resend")]
        "resend" => env::var("RESEND_API_KEY").is_ok(),
        #[cfg(not(feature = "resend"))]
        "resend" => {
            tracing::warn!(
                "OUTBOUND_PROVIDER=resend but 'resend' feature is not enabled. \
                Add `features = [\"resend\"]` to Cargo.toml"
            );
            false
        }

        #[cfg(feature = "sendgrid")]
        "sendgrid" => env::var("SENDGRID_API_KEY").is_ok(),
        #[cfg(not(feature = "sendgrid"))]
        "sendgrid" => {
            tracing::warn!(
                "OUTBOUND_PROVIDER=sendgrid but 'sendgrid' feature is not enabled. \
                Add `features = [\"sendgrid\"]` to Cargo.toml"
            );
            false
        }

        "local" | "logger" | "logger_full" => true,

        _ => false,
    }
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::campaign::{
        CampaignStore, MemoryCampaignStore, TrackingConfig, WaveDispatcher, WaveOutcome,
    };
    pub use crate::queue::{
        Enqueue, MemoryQueueStore, QueueProcessor, QueueSender, QueueStore, RetryPolicy,
    };
    pub use crate::Address;
    pub use crate::Attachment;
    pub use crate::Delivery;
    pub use crate::MailError;
    pub use crate::Message;
    pub use crate::Provider;
    pub use crate::ToAddress;
    pub use crate::{default_from, is_configured, provider_from_env};
}
