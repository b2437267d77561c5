//! Wave dispatcher: sends one wave of a campaign in rate-limited batches.
//!
//! Batches of `batch_size` recipients fan out concurrently; batches run
//! strictly sequentially with `delay_between_batches_ms` between them, the
//! only throttle against provider rate limits. A paused or cancelled
//! campaign is honored at the start of a wave only; an in-flight batch is
//! never interrupted.

use std::sync::Arc;

use futures::future::join_all;

use crate::address::Address;
use crate::attachment::Attachment;
use crate::error::MailError;
use crate::message::Message;
use crate::provider::Provider;

use super::assets::{ObjectStore, Watermarker};
use super::model::{Campaign, CampaignRecipient, CampaignStatus, WaveStatus};
use super::render::{
    inject_tracking_pixel, recipient_vars, render_template, rewrite_links, TrackingConfig,
};
use super::store::CampaignStore;

/// Result of dispatching one wave.
#[derive(Debug, Clone)]
pub enum WaveOutcome {
    /// Nothing was sent: the campaign is paused/cancelled, or the wave was
    /// not in a dispatchable state. The wave row is unchanged.
    Skipped { reason: String },
    /// The wave ran to a terminal state.
    Finished {
        status: WaveStatus,
        sent: usize,
        failed: usize,
    },
}

/// Sends campaign waves through a provider, one batch at a time.
pub struct WaveDispatcher {
    store: Arc<dyn CampaignStore>,
    provider: Arc<dyn Provider>,
    objects: Arc<dyn ObjectStore>,
    watermarker: Option<Arc<dyn Watermarker>>,
    tracking: TrackingConfig,
}

/// A campaign's source document, fetched from object storage once per wave
/// run and shared across all recipient sends.
struct SourceDoc {
    filename: String,
    bytes: Vec<u8>,
}

impl WaveDispatcher {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        provider: Arc<dyn Provider>,
        objects: Arc<dyn ObjectStore>,
        tracking: TrackingConfig,
    ) -> Self {
        Self {
            store,
            provider,
            objects,
            watermarker: None,
            tracking,
        }
    }

    /// Wire a watermarker for campaigns that configure per-recipient
    /// watermarked attachments.
    pub fn watermarker(mut self, watermarker: Arc<dyn Watermarker>) -> Self {
        self.watermarker = Some(watermarker);
        self
    }

    /// Process several waves in order. A wave that errors is marked
    /// `Failed` and does not stop the remaining waves.
    pub async fn dispatch_waves(
        &self,
        wave_ids: &[String],
    ) -> Vec<(String, Result<WaveOutcome, MailError>)> {
        let mut results = Vec::with_capacity(wave_ids.len());
        for wave_id in wave_ids {
            let result = self.dispatch_wave(wave_id).await;
            if let Err(ref err) = result {
                tracing::error!(wave_id = %wave_id, error = %err, "Wave processing failed");
                // Best effort; the wave may not have reached Sending.
                if let Err(mark_err) = self.store.set_wave_status(wave_id, WaveStatus::Failed).await
                {
                    tracing::debug!(
                        wave_id = %wave_id,
                        error = %mark_err,
                        "Could not mark wave failed"
                    );
                }
            }
            results.push((wave_id.clone(), result));
        }
        results
    }

    /// Process one wave to a terminal state.
    pub async fn dispatch_wave(&self, wave_id: &str) -> Result<WaveOutcome, MailError> {
        let wave = self.store.wave(wave_id).await?;
        let campaign = self.store.campaign(&wave.campaign_id).await?;

        let span = tracing::info_span!(
            "outbound.dispatch_wave",
            wave_id = %wave.id,
            campaign_id = %campaign.id,
            batch_size = wave.batch_size,
        );
        let _guard = span.enter();

        // Absorbing campaign states win before anything is attempted.
        if campaign.status.blocks_dispatch() {
            let reason = format!("campaign {} is {}", campaign.id, campaign.status);
            tracing::info!(%reason, "Wave skipped");
            return Ok(WaveOutcome::Skipped { reason });
        }
        if wave.status != WaveStatus::Scheduled {
            let reason = format!("wave {} is already {}", wave.id, wave.status);
            tracing::info!(%reason, "Wave skipped");
            return Ok(WaveOutcome::Skipped { reason });
        }
        // Configuration problems are fatal for the invocation: nothing is
        // attempted with a watermark configured and no watermarker wired.
        if campaign.content.watermark.is_some() && self.watermarker.is_none() {
            return Err(MailError::Configuration(
                "campaign configures a watermark but no watermarker is wired".into(),
            ));
        }

        let wave = self.store.set_wave_status(wave_id, WaveStatus::Sending).await?;
        if campaign.status == CampaignStatus::Scheduled {
            self.store
                .set_campaign_status(&campaign.id, CampaignStatus::InProgress)
                .await?;
        }

        let pending = self.store.pending_recipients(wave_id).await?;
        if pending.is_empty() {
            // An empty wave is a success, not an error.
            let wave = self.store.set_wave_status(wave_id, WaveStatus::Completed).await?;
            self.complete_campaign_if_done(&campaign.id).await;
            return Ok(WaveOutcome::Finished {
                status: wave.status,
                sent: 0,
                failed: 0,
            });
        }

        let source = match campaign.content.source_document_path {
            Some(ref path) => {
                let bytes = self.objects.get(path).await?;
                Some(Arc::new(SourceDoc {
                    filename: path.rsplit('/').next().unwrap_or("document.pdf").to_string(),
                    bytes,
                }))
            }
            None => None,
        };

        let batches: Vec<&[CampaignRecipient]> = pending.chunks(wave.batch_size.max(1)).collect();
        let batch_count = batches.len();
        tracing::info!(recipients = pending.len(), batches = batch_count, "Wave sending");

        for (index, batch) in batches.into_iter().enumerate() {
            // Mark the whole batch queued before sending any of it, so a
            // crash mid-batch leaves a detectable trace.
            let ids: Vec<String> = batch.iter().map(|r| r.id.clone()).collect();
            self.store.mark_recipients_queued(&ids).await?;

            join_all(
                batch
                    .iter()
                    .map(|recipient| self.send_recipient(&campaign, recipient, source.clone())),
            )
            .await;

            self.store.recompute_wave_metrics(wave_id).await?;

            if index + 1 < batch_count && wave.delay_between_batches_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(
                    wave.delay_between_batches_ms,
                ))
                .await;
            }
        }

        let wave = self.store.recompute_wave_metrics(wave_id).await?;
        let status = if wave.sent_count > 0 {
            WaveStatus::Completed
        } else {
            WaveStatus::Failed
        };
        let wave = self.store.set_wave_status(wave_id, status).await?;
        self.store.recompute_campaign_metrics(&campaign.id).await?;
        self.complete_campaign_if_done(&campaign.id).await;

        tracing::info!(
            status = %wave.status,
            sent = wave.sent_count,
            failed = wave.failed_count,
            "Wave finished"
        );
        Ok(WaveOutcome::Finished {
            status: wave.status,
            sent: wave.sent_count,
            failed: wave.failed_count,
        })
    }

    /// Mark the campaign completed once no sibling wave remains
    /// non-terminal. Best effort: a pause that raced in keeps the campaign
    /// where the operator put it.
    async fn complete_campaign_if_done(&self, campaign_id: &str) {
        let all_terminal = match self.store.waves_for_campaign(campaign_id).await {
            Ok(waves) => waves.iter().all(|w| w.status.is_terminal()),
            Err(err) => {
                tracing::warn!(campaign_id = %campaign_id, error = %err, "Could not read waves");
                return;
            }
        };
        if !all_terminal {
            return;
        }
        if let Err(err) = self
            .store
            .set_campaign_status(campaign_id, CampaignStatus::Completed)
            .await
        {
            tracing::debug!(campaign_id = %campaign_id, error = %err, "Campaign not completed");
        }
    }

    /// Send to one recipient, recording the outcome on the recipient row.
    /// Errors never escape: a failed recipient must not abort its batch.
    async fn send_recipient(
        &self,
        campaign: &Campaign,
        recipient: &CampaignRecipient,
        source: Option<Arc<SourceDoc>>,
    ) {
        match self.try_send_recipient(campaign, recipient, source).await {
            Ok(()) => {
                if let Err(err) = self.store.mark_recipient_sent(&recipient.id).await {
                    tracing::warn!(
                        recipient_id = %recipient.id,
                        error = %err,
                        "Could not record sent status"
                    );
                }
            }
            Err(err) => {
                tracing::warn!(
                    recipient_id = %recipient.id,
                    email = %recipient.email,
                    error = %err,
                    "Campaign send failed"
                );
                if let Err(mark_err) = self
                    .store
                    .mark_recipient_failed(&recipient.id, &err.to_string())
                    .await
                {
                    tracing::warn!(
                        recipient_id = %recipient.id,
                        error = %mark_err,
                        "Could not record failed status"
                    );
                }
            }
        }
    }

    async fn try_send_recipient(
        &self,
        campaign: &Campaign,
        recipient: &CampaignRecipient,
        source: Option<Arc<SourceDoc>>,
    ) -> Result<(), MailError> {
        let vars = recipient_vars(recipient);
        let subject = render_template(&campaign.content.subject_template, &vars);
        let html = render_template(&campaign.content.html_template, &vars);
        let html = rewrite_links(&html, &self.tracking, &recipient.tracking_id);
        let html = inject_tracking_pixel(&html, &self.tracking.open_url(&recipient.tracking_id));

        let to = match recipient.nombre {
            Some(ref nombre) => Address::with_name(nombre, &recipient.email),
            None => Address::new(&recipient.email),
        };
        let mut message = Message::new()
            .from(campaign.content.from.clone())
            .to(to)
            .subject(subject)
            .html_body(html);
        if let Some(ref reply_to) = campaign.content.reply_to {
            message = message.reply_to(reply_to.clone());
        }

        if let Some(source) = source {
            let bytes = self.attachment_bytes_for(campaign, recipient, &source).await?;
            message = message.attachment(Attachment::from_bytes(source.filename.clone(), bytes));
        }

        self.provider.send(&message).await?;
        Ok(())
    }

    /// Resolve the bytes to attach for one recipient: the source document,
    /// or a per-recipient watermarked copy, generated lazily and cached on
    /// the recipient row so it is never regenerated.
    async fn attachment_bytes_for(
        &self,
        campaign: &Campaign,
        recipient: &CampaignRecipient,
        source: &SourceDoc,
    ) -> Result<Vec<u8>, MailError> {
        let Some(ref spec) = campaign.content.watermark else {
            return Ok(source.bytes.clone());
        };
        let Some(ref watermarker) = self.watermarker else {
            return Ok(source.bytes.clone());
        };

        if let Some(ref path) = recipient.watermarked_path {
            return self.objects.get(path).await;
        }

        let vars = recipient_vars(recipient);
        let watermarked = watermarker
            .watermark(
                &source.bytes,
                &render_template(&spec.diagonal_text, &vars),
                &render_template(&spec.footer_text, &vars),
            )
            .await?;

        let path = format!("watermarked/{}/{}.pdf", campaign.id, recipient.id);
        self.objects.put(&path, watermarked.clone()).await?;
        self.store.set_watermarked_path(&recipient.id, &path).await?;
        Ok(watermarked)
    }
}
