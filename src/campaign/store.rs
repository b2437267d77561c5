//! Campaign store trait and the in-memory implementation.
//!
//! Same ownership rule as the queue store: rows are authoritative, every
//! mutation is a conditional field-scoped update, and aggregates are
//! recomputed from recipient rows rather than incremented. No transaction
//! spans multiple rows; brief staleness of aggregates under concurrent
//! writers is expected.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::MailError;

use super::model::{
    Campaign, CampaignRecipient, CampaignStatus, NewCampaign, NewRecipient, RecipientStatus, Wave,
    WaveConfig, WaveStatus, DEFAULT_BATCH_SIZE, DEFAULT_DELAY_BETWEEN_BATCHES_MS,
};

/// Persistence contract for campaigns, waves, and recipients.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn create_campaign(&self, new: NewCampaign) -> Result<Campaign, MailError>;
    async fn campaign(&self, id: &str) -> Result<Campaign, MailError>;

    /// Move a campaign along its state machine. Rejects disallowed
    /// transitions (e.g. out of `Cancelled`).
    async fn set_campaign_status(
        &self,
        id: &str,
        status: CampaignStatus,
    ) -> Result<Campaign, MailError>;

    async fn add_wave(&self, campaign_id: &str, config: WaveConfig) -> Result<Wave, MailError>;
    async fn wave(&self, id: &str) -> Result<Wave, MailError>;
    async fn waves_for_campaign(&self, campaign_id: &str) -> Result<Vec<Wave>, MailError>;

    /// Move a wave along its state machine, stamping `started_at` /
    /// `completed_at` as appropriate.
    async fn set_wave_status(&self, id: &str, status: WaveStatus) -> Result<Wave, MailError>;

    async fn add_recipient(
        &self,
        campaign_id: &str,
        wave_id: &str,
        new: NewRecipient,
    ) -> Result<CampaignRecipient, MailError>;

    /// Pending recipients of a wave, FIFO by creation order.
    async fn pending_recipients(&self, wave_id: &str)
        -> Result<Vec<CampaignRecipient>, MailError>;

    /// Bulk-mark a batch `Queued` before any of it is sent, so an
    /// interrupted run is detectable. Recipients no longer pending are
    /// skipped.
    async fn mark_recipients_queued(&self, ids: &[String]) -> Result<(), MailError>;

    async fn mark_recipient_sent(&self, id: &str) -> Result<(), MailError>;
    async fn mark_recipient_failed(&self, id: &str, error: &str) -> Result<(), MailError>;

    /// Cache a recipient's watermarked attachment path. First write wins;
    /// the copy is never regenerated.
    async fn set_watermarked_path(&self, id: &str, path: &str) -> Result<(), MailError>;

    /// Read-recompute-write of a wave's sent/failed counts from its
    /// recipient rows. Idempotent, safe to run concurrently with itself.
    async fn recompute_wave_metrics(&self, wave_id: &str) -> Result<Wave, MailError>;

    /// Read-recompute-write of a campaign's aggregate counts.
    async fn recompute_campaign_metrics(&self, campaign_id: &str) -> Result<Campaign, MailError>;
}

/// Thread-safe in-memory campaign store.
#[derive(Default)]
pub struct MemoryCampaignStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    campaigns: HashMap<String, Campaign>,
    waves: HashMap<String, Wave>,
    recipients: HashMap<String, CampaignRecipient>,
    /// Insertion order of recipient ids, for FIFO dispatch.
    recipient_order: Vec<String>,
}

impl MemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::new())
    }

    /// All recipients of a wave regardless of status (test inspection).
    pub fn recipients_for_wave(&self, wave_id: &str) -> Vec<CampaignRecipient> {
        let inner = self.inner.read();
        inner
            .recipient_order
            .iter()
            .filter_map(|id| inner.recipients.get(id))
            .filter(|r| r.wave_id.as_deref() == Some(wave_id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CampaignStore for MemoryCampaignStore {
    async fn create_campaign(&self, new: NewCampaign) -> Result<Campaign, MailError> {
        let campaign = Campaign {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name,
            status: CampaignStatus::Scheduled,
            content: new.content,
            total_recipients: 0,
            sent_count: 0,
            failed_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        self.inner
            .write()
            .campaigns
            .insert(campaign.id.clone(), campaign.clone());
        Ok(campaign)
    }

    async fn campaign(&self, id: &str) -> Result<Campaign, MailError> {
        self.inner
            .read()
            .campaigns
            .get(id)
            .cloned()
            .ok_or_else(|| MailError::NotFound(format!("campaign {id}")))
    }

    async fn set_campaign_status(
        &self,
        id: &str,
        status: CampaignStatus,
    ) -> Result<Campaign, MailError> {
        let mut inner = self.inner.write();
        let campaign = inner
            .campaigns
            .get_mut(id)
            .ok_or_else(|| MailError::NotFound(format!("campaign {id}")))?;

        if !campaign.status.can_transition_to(status) {
            return Err(MailError::InvalidTransition {
                entity: "campaign",
                from: campaign.status.to_string(),
                to: status.to_string(),
            });
        }
        campaign.status = status;
        match status {
            CampaignStatus::InProgress => {
                campaign.started_at.get_or_insert_with(Utc::now);
            }
            CampaignStatus::Completed => {
                campaign.completed_at = Some(Utc::now());
            }
            _ => {}
        }
        Ok(campaign.clone())
    }

    async fn add_wave(&self, campaign_id: &str, config: WaveConfig) -> Result<Wave, MailError> {
        let mut inner = self.inner.write();
        if !inner.campaigns.contains_key(campaign_id) {
            return Err(MailError::NotFound(format!("campaign {campaign_id}")));
        }
        let wave = Wave {
            id: uuid::Uuid::new_v4().to_string(),
            campaign_id: campaign_id.to_string(),
            status: WaveStatus::Scheduled,
            scheduled_at: config.scheduled_at,
            batch_size: config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
            delay_between_batches_ms: config
                .delay_between_batches_ms
                .unwrap_or(DEFAULT_DELAY_BETWEEN_BATCHES_MS),
            sent_count: 0,
            failed_count: 0,
            started_at: None,
            completed_at: None,
        };
        inner.waves.insert(wave.id.clone(), wave.clone());
        Ok(wave)
    }

    async fn wave(&self, id: &str) -> Result<Wave, MailError> {
        self.inner
            .read()
            .waves
            .get(id)
            .cloned()
            .ok_or_else(|| MailError::NotFound(format!("wave {id}")))
    }

    async fn waves_for_campaign(&self, campaign_id: &str) -> Result<Vec<Wave>, MailError> {
        Ok(self
            .inner
            .read()
            .waves
            .values()
            .filter(|w| w.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn set_wave_status(&self, id: &str, status: WaveStatus) -> Result<Wave, MailError> {
        let mut inner = self.inner.write();
        let wave = inner
            .waves
            .get_mut(id)
            .ok_or_else(|| MailError::NotFound(format!("wave {id}")))?;

        if !wave.status.can_transition_to(status) {
            return Err(MailError::InvalidTransition {
                entity: "wave",
                from: wave.status.to_string(),
                to: status.to_string(),
            });
        }
        wave.status = status;
        match status {
            WaveStatus::Sending => {
                wave.started_at.get_or_insert_with(Utc::now);
            }
            WaveStatus::Completed | WaveStatus::Failed => {
                wave.completed_at = Some(Utc::now());
            }
            _ => {}
        }
        Ok(wave.clone())
    }

    async fn add_recipient(
        &self,
        campaign_id: &str,
        wave_id: &str,
        new: NewRecipient,
    ) -> Result<CampaignRecipient, MailError> {
        let mut inner = self.inner.write();
        if !inner.waves.contains_key(wave_id) {
            return Err(MailError::NotFound(format!("wave {wave_id}")));
        }
        let recipient = CampaignRecipient {
            id: uuid::Uuid::new_v4().to_string(),
            campaign_id: campaign_id.to_string(),
            wave_id: Some(wave_id.to_string()),
            email: new.email,
            nombre: new.nombre,
            empresa_nombre: new.empresa_nombre,
            status: RecipientStatus::Pending,
            tracking_id: uuid::Uuid::new_v4().to_string(),
            watermarked_path: None,
            last_error: None,
            created_at: Utc::now(),
            queued_at: None,
            sent_at: None,
            failed_at: None,
            watermarked_at: None,
        };
        inner.recipient_order.push(recipient.id.clone());
        inner
            .recipients
            .insert(recipient.id.clone(), recipient.clone());
        if let Some(campaign) = inner.campaigns.get_mut(campaign_id) {
            campaign.total_recipients += 1;
        }
        Ok(recipient)
    }

    async fn pending_recipients(
        &self,
        wave_id: &str,
    ) -> Result<Vec<CampaignRecipient>, MailError> {
        let inner = self.inner.read();
        Ok(inner
            .recipient_order
            .iter()
            .filter_map(|id| inner.recipients.get(id))
            .filter(|r| {
                r.wave_id.as_deref() == Some(wave_id) && r.status == RecipientStatus::Pending
            })
            .cloned()
            .collect())
    }

    async fn mark_recipients_queued(&self, ids: &[String]) -> Result<(), MailError> {
        let now = Utc::now();
        let mut inner = self.inner.write();
        for id in ids {
            if let Some(recipient) = inner.recipients.get_mut(id) {
                if recipient.status == RecipientStatus::Pending {
                    recipient.status = RecipientStatus::Queued;
                    recipient.queued_at = Some(now);
                }
            }
        }
        Ok(())
    }

    async fn mark_recipient_sent(&self, id: &str) -> Result<(), MailError> {
        let mut inner = self.inner.write();
        let recipient = inner
            .recipients
            .get_mut(id)
            .ok_or_else(|| MailError::NotFound(format!("recipient {id}")))?;
        recipient.status = RecipientStatus::Sent;
        recipient.sent_at = Some(Utc::now());
        recipient.last_error = None;
        Ok(())
    }

    async fn mark_recipient_failed(&self, id: &str, error: &str) -> Result<(), MailError> {
        let mut inner = self.inner.write();
        let recipient = inner
            .recipients
            .get_mut(id)
            .ok_or_else(|| MailError::NotFound(format!("recipient {id}")))?;
        recipient.status = RecipientStatus::Failed;
        recipient.failed_at = Some(Utc::now());
        recipient.last_error = Some(error.to_string());
        Ok(())
    }

    async fn set_watermarked_path(&self, id: &str, path: &str) -> Result<(), MailError> {
        let mut inner = self.inner.write();
        let recipient = inner
            .recipients
            .get_mut(id)
            .ok_or_else(|| MailError::NotFound(format!("recipient {id}")))?;
        if recipient.watermarked_path.is_none() {
            recipient.watermarked_path = Some(path.to_string());
            recipient.watermarked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn recompute_wave_metrics(&self, wave_id: &str) -> Result<Wave, MailError> {
        let mut inner = self.inner.write();
        let (sent, failed) = inner
            .recipients
            .values()
            .filter(|r| r.wave_id.as_deref() == Some(wave_id))
            .fold((0, 0), |(sent, failed), r| match r.status {
                RecipientStatus::Sent => (sent + 1, failed),
                RecipientStatus::Failed => (sent, failed + 1),
                _ => (sent, failed),
            });
        let wave = inner
            .waves
            .get_mut(wave_id)
            .ok_or_else(|| MailError::NotFound(format!("wave {wave_id}")))?;
        wave.sent_count = sent;
        wave.failed_count = failed;
        Ok(wave.clone())
    }

    async fn recompute_campaign_metrics(
        &self,
        campaign_id: &str,
    ) -> Result<Campaign, MailError> {
        let mut inner = self.inner.write();
        let (total, sent, failed) = inner
            .recipients
            .values()
            .filter(|r| r.campaign_id == campaign_id)
            .fold((0, 0, 0), |(total, sent, failed), r| match r.status {
                RecipientStatus::Sent => (total + 1, sent + 1, failed),
                RecipientStatus::Failed => (total + 1, sent, failed + 1),
                _ => (total + 1, sent, failed),
            });
        let campaign = inner
            .campaigns
            .get_mut(campaign_id)
            .ok_or_else(|| MailError::NotFound(format!("campaign {campaign_id}")))?;
        campaign.total_recipients = total;
        campaign.sent_count = sent;
        campaign.failed_count = failed;
        Ok(campaign.clone())
    }
}
