//! Campaign, wave, and recipient models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Campaign lifecycle.
///
/// `Paused` and `Cancelled` are set externally (an operator action) and are
/// honored at wave boundaries only: an in-flight batch is never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Scheduled,
    InProgress,
    Completed,
    Paused,
    Cancelled,
}

impl CampaignStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether wave processing must stop before doing anything.
    pub fn blocks_dispatch(self) -> bool {
        matches!(self, Self::Paused | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        match (self, next) {
            (Scheduled, InProgress | Paused | Cancelled) => true,
            (InProgress, Completed | Paused | Cancelled) => true,
            (Paused, InProgress | Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wave lifecycle: `Scheduled -> Sending -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveStatus {
    Scheduled,
    Sending,
    Completed,
    Failed,
}

impl WaveStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(self, next: WaveStatus) -> bool {
        use WaveStatus::*;
        matches!(
            (self, next),
            (Scheduled, Sending) | (Sending, Completed) | (Sending, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Sending => "sending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for WaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-recipient delivery state within a wave.
///
/// A recipient stuck in `Queued` past a timeout indicates an interrupted
/// run: batches are bulk-marked `Queued` before any of them is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    Pending,
    Queued,
    Sent,
    Failed,
}

impl RecipientStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-recipient watermark overlay applied to the campaign's source
/// document. Both texts are templates rendered with the recipient's
/// variables (e.g. `"Confidencial - {{email}}"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkSpec {
    /// Diagonal overlay text, applied on every page.
    pub diagonal_text: String,
    /// Footer overlay text, applied on every page.
    pub footer_text: String,
}

/// Message content shared by every recipient of a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignContent {
    pub from: Address,
    pub reply_to: Option<Address>,
    /// Subject template, `{{key}}` substitution only.
    pub subject_template: String,
    /// HTML body template, `{{key}}` substitution only.
    pub html_template: String,
    /// Object-storage path of the document to attach, if any.
    pub source_document_path: Option<String>,
    /// When set, each recipient gets a watermarked copy of the source
    /// document instead of the original.
    pub watermark: Option<WatermarkSpec>,
}

/// A mass email campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub content: CampaignContent,

    // Aggregates, recomputed from recipient rows (eventually consistent).
    pub total_recipients: usize,
    pub sent_count: usize,
    pub failed_count: usize,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input to [`CampaignStore::create_campaign`](super::CampaignStore::create_campaign).
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub content: CampaignContent,
}

/// One scheduled slice of a campaign's recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wave {
    pub id: String,
    pub campaign_id: String,
    pub status: WaveStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Recipients per concurrent batch. Wave-level, not global.
    pub batch_size: usize,
    /// Sleep between consecutive batches.
    pub delay_between_batches_ms: u64,

    // Aggregates, recomputed from recipient rows.
    pub sent_count: usize,
    pub failed_count: usize,

    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Wave settings supplied at creation; omitted fields get the defaults
/// (batch size 10, one second between batches).
#[derive(Debug, Clone, Default)]
pub struct WaveConfig {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub batch_size: Option<usize>,
    pub delay_between_batches_ms: Option<u64>,
}

pub(crate) const DEFAULT_BATCH_SIZE: usize = 10;
pub(crate) const DEFAULT_DELAY_BETWEEN_BATCHES_MS: u64 = 1000;

/// One addressee of a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRecipient {
    pub id: String,
    pub campaign_id: String,
    pub wave_id: Option<String>,
    pub email: String,
    pub nombre: Option<String>,
    pub empresa_nombre: Option<String>,
    pub status: RecipientStatus,
    /// Opaque correlation key for open/click tracking.
    pub tracking_id: String,
    /// Storage path of this recipient's watermarked attachment. Created
    /// lazily; once set, never regenerated.
    pub watermarked_path: Option<String>,
    pub last_error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub queued_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub watermarked_at: Option<DateTime<Utc>>,
}

/// Input to [`CampaignStore::add_recipient`](super::CampaignStore::add_recipient).
#[derive(Debug, Clone, Default)]
pub struct NewRecipient {
    pub email: String,
    pub nombre: Option<String>,
    pub empresa_nombre: Option<String>,
}

impl NewRecipient {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn nombre(mut self, nombre: impl Into<String>) -> Self {
        self.nombre = Some(nombre.into());
        self
    }

    pub fn empresa(mut self, empresa: impl Into<String>) -> Self {
        self.empresa_nombre = Some(empresa.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_absorbing_states() {
        use CampaignStatus::*;
        assert!(Paused.blocks_dispatch());
        assert!(Cancelled.blocks_dispatch());
        assert!(!Scheduled.blocks_dispatch());
        assert!(!InProgress.blocks_dispatch());

        assert!(Scheduled.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Paused));
        assert!(Paused.can_transition_to(InProgress));
        assert!(!Cancelled.can_transition_to(InProgress));
        assert!(!Completed.can_transition_to(InProgress));
    }

    #[test]
    fn wave_transitions() {
        use WaveStatus::*;
        assert!(Scheduled.can_transition_to(Sending));
        assert!(Sending.can_transition_to(Completed));
        assert!(Sending.can_transition_to(Failed));
        assert!(!Scheduled.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Sending));
        assert!(!Failed.can_transition_to(Sending));
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&CampaignStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&WaveStatus::Sending).unwrap(),
            "\"sending\""
        );
    }
}
