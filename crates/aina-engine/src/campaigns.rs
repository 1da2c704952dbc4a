// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broadcast campaigns: one template message to every contact in an audience.
//!
//! Each recipient goes through [`SendService`] like any other template send,
//! so every message is charged, dispatched and compensated individually.
//! Running out of credit or a tenant suspension stops the run and fails the
//! recipients not reached yet; any other per-recipient failure is recorded
//! and the run moves on.

use std::collections::HashSet;
use std::sync::Arc;

use aina_core::{
    AinaError, AuthContext, Campaign, CampaignId, CampaignStats, CampaignStatus, Clock,
    MessageStatus, Platform,
};
use aina_storage::Database;
use aina_storage::queries::{campaigns, conversations};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::send::{SendRequest, SendService};

/// Largest audience a single campaign may target.
pub const MAX_AUDIENCE: usize = 10_000;

/// Longest accepted campaign name.
pub const MAX_NAME_CHARS: usize = 120;

/// What a tenant submits to create a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignDraft {
    pub name: String,
    #[serde(default = "default_platform")]
    pub platform: Platform,
    pub template_name: String,
    #[serde(default)]
    pub template_language: Option<String>,
    /// Contact identifiers (phone numbers or platform user ids), in send order.
    pub audience: Vec<String>,
}

fn default_platform() -> Platform {
    Platform::WhatsApp
}

impl CampaignDraft {
    /// Check the draft and return its audience trimmed and deduplicated,
    /// first occurrence kept.
    fn validated_audience(&self) -> Result<Vec<String>, AinaError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AinaError::Validation("campaign name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(AinaError::Validation(format!(
                "campaign name exceeds {MAX_NAME_CHARS} characters"
            )));
        }
        if self.template_name.trim().is_empty() {
            return Err(AinaError::Validation(
                "campaign template name is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let audience: Vec<String> = self
            .audience
            .iter()
            .map(|contact| contact.trim())
            .filter(|contact| !contact.is_empty())
            .filter(|contact| seen.insert(contact.to_string()))
            .map(str::to_string)
            .collect();
        if audience.is_empty() {
            return Err(AinaError::Validation("campaign audience is empty".to_string()));
        }
        if audience.len() > MAX_AUDIENCE {
            return Err(AinaError::Validation(format!(
                "campaign audience exceeds {MAX_AUDIENCE} contacts"
            )));
        }
        Ok(audience)
    }
}

/// A campaign with its statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignReport {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub stats: CampaignStats,
}

/// A launched campaign and the task sending it.
#[derive(Debug)]
pub struct Launch {
    pub campaign: Campaign,
    pub run: JoinHandle<()>,
}

#[derive(Clone)]
pub struct CampaignService {
    db: Database,
    send: SendService,
    clock: Arc<dyn Clock>,
}

impl CampaignService {
    pub fn new(db: Database, send: SendService, clock: Arc<dyn Clock>) -> Self {
        Self { db, send, clock }
    }

    /// Store a DRAFT campaign for the caller's tenant.
    pub async fn create(
        &self,
        ctx: &AuthContext,
        draft: CampaignDraft,
    ) -> Result<CampaignReport, AinaError> {
        let audience = draft.validated_audience()?;
        // Fail now rather than per recipient when the platform is not served.
        self.send.providers().get(draft.platform)?;

        let campaign = Campaign {
            id: CampaignId::generate(),
            tenant_id: ctx.tenant_id.clone(),
            name: draft.name.trim().to_string(),
            platform: draft.platform,
            template_name: draft.template_name.trim().to_string(),
            template_language: draft.template_language,
            status: CampaignStatus::Draft,
            created_at: self.clock.now(),
            started_at: None,
            finished_at: None,
        };
        campaigns::create_campaign(&self.db, &campaign, &audience).await?;
        info!(
            tenant_id = %campaign.tenant_id,
            campaign_id = %campaign.id,
            recipients = audience.len(),
            template = campaign.template_name.as_str(),
            "campaign created"
        );
        self.report(campaign).await
    }

    pub async fn list(&self, ctx: &AuthContext) -> Result<Vec<CampaignReport>, AinaError> {
        let mut reports = Vec::new();
        for campaign in campaigns::list_campaigns(&self.db, &ctx.tenant_id).await? {
            reports.push(self.report(campaign).await?);
        }
        Ok(reports)
    }

    pub async fn get(&self, ctx: &AuthContext, id: &CampaignId) -> Result<CampaignReport, AinaError> {
        let campaign = self.owned(ctx, id).await?;
        self.report(campaign).await
    }

    /// Start sending a DRAFT campaign in the background.
    pub async fn launch(&self, ctx: &AuthContext, id: &CampaignId) -> Result<Launch, AinaError> {
        let mut campaign = self.owned(ctx, id).await?;
        let now = self.clock.now();
        if !campaigns::begin_sending(&self.db, id, now).await? {
            return Err(AinaError::Validation(format!(
                "campaign {id} is {} and cannot be launched",
                campaign.status
            )));
        }
        campaign.status = CampaignStatus::Sending;
        campaign.started_at = Some(now);
        info!(
            tenant_id = %campaign.tenant_id,
            campaign_id = %campaign.id,
            actor_id = ctx.actor_id.as_deref().unwrap_or("-"),
            "campaign launched"
        );

        let service = self.clone();
        let running = campaign.clone();
        let run = tokio::spawn(async move { service.run(running).await });
        Ok(Launch { campaign, run })
    }

    /// Delete a campaign's history. Refused while it is sending.
    pub async fn delete(&self, ctx: &AuthContext, id: &CampaignId) -> Result<(), AinaError> {
        let campaign = self.owned(ctx, id).await?;
        if !campaigns::delete_campaign(&self.db, id).await? {
            return Err(AinaError::Validation(format!(
                "campaign {id} is {} and cannot be deleted",
                campaign.status
            )));
        }
        info!(tenant_id = %campaign.tenant_id, campaign_id = %id, "campaign deleted");
        Ok(())
    }

    /// Fail campaigns a previous process left SENDING. Their unreached
    /// recipients are marked failed; nothing is re-sent.
    pub async fn recover_interrupted(&self) -> Result<usize, AinaError> {
        let interrupted = campaigns::list_sending(&self.db).await?;
        for campaign in &interrupted {
            let abandoned =
                campaigns::fail_remaining(&self.db, &campaign.id, "interrupted before sending")
                    .await?;
            campaigns::finish(&self.db, &campaign.id, CampaignStatus::Failed, self.clock.now())
                .await?;
            warn!(
                tenant_id = %campaign.tenant_id,
                campaign_id = %campaign.id,
                abandoned,
                "interrupted campaign marked failed"
            );
        }
        Ok(interrupted.len())
    }

    async fn run(&self, campaign: Campaign) {
        let status = match self.send_all(&campaign).await {
            Ok(status) => status,
            Err(e) => {
                warn!(campaign_id = %campaign.id, error = %e, "campaign run aborted");
                if let Err(e) =
                    campaigns::fail_remaining(&self.db, &campaign.id, "campaign run aborted").await
                {
                    warn!(campaign_id = %campaign.id, error = %e, "could not close out recipients");
                }
                CampaignStatus::Failed
            }
        };
        match campaigns::finish(&self.db, &campaign.id, status, self.clock.now()).await {
            Ok(_) => info!(
                tenant_id = %campaign.tenant_id,
                campaign_id = %campaign.id,
                status = %status,
                "campaign finished"
            ),
            Err(e) => warn!(campaign_id = %campaign.id, error = %e, "could not record campaign result"),
        }
    }

    /// Send to every pending recipient in order. Storage errors abort the run.
    async fn send_all(&self, campaign: &Campaign) -> Result<CampaignStatus, AinaError> {
        let ctx = AuthContext::system(campaign.tenant_id.clone());
        for recipient in campaigns::pending_recipients(&self.db, &campaign.id).await? {
            let conversation = conversations::upsert_conversation(
                &self.db,
                &campaign.tenant_id,
                campaign.platform,
                &recipient.contact_id,
                None,
                self.clock.now(),
            )
            .await?;
            let request = SendRequest {
                template_language: campaign.template_language.clone(),
                ..SendRequest::template(conversation.id, campaign.template_name.clone())
            };

            match self.send.send(&ctx, request).await {
                Ok(message) => {
                    let error = (message.status == MessageStatus::Failed)
                        .then(|| message.error.as_deref().unwrap_or("dispatch failed"));
                    campaigns::record_attempt(
                        &self.db,
                        &campaign.id,
                        recipient.position,
                        Some(&message.id),
                        error,
                    )
                    .await?;
                }
                Err(e @ (AinaError::InsufficientCredit { .. } | AinaError::TenantSuspended { .. })) => {
                    let reason = e.to_string();
                    campaigns::record_attempt(
                        &self.db,
                        &campaign.id,
                        recipient.position,
                        None,
                        Some(&reason),
                    )
                    .await?;
                    let abandoned = campaigns::fail_remaining(&self.db, &campaign.id, &reason).await?;
                    warn!(
                        tenant_id = %campaign.tenant_id,
                        campaign_id = %campaign.id,
                        abandoned,
                        error = %e,
                        "campaign stopped"
                    );
                    return Ok(CampaignStatus::Failed);
                }
                Err(e) => {
                    debug!(
                        campaign_id = %campaign.id,
                        contact_id = recipient.contact_id.as_str(),
                        error = %e,
                        "campaign recipient skipped"
                    );
                    campaigns::record_attempt(
                        &self.db,
                        &campaign.id,
                        recipient.position,
                        None,
                        Some(&e.to_string()),
                    )
                    .await?;
                }
            }
        }
        Ok(CampaignStatus::Completed)
    }

    async fn report(&self, campaign: Campaign) -> Result<CampaignReport, AinaError> {
        let stats = campaigns::campaign_stats(&self.db, &campaign.id).await?;
        Ok(CampaignReport { campaign, stats })
    }

    async fn owned(&self, ctx: &AuthContext, id: &CampaignId) -> Result<Campaign, AinaError> {
        let campaign = campaigns::get_campaign(&self.db, id)
            .await?
            .ok_or_else(|| AinaError::not_found("campaign", id.as_str()))?;
        ctx.authorize_tenant(&campaign.tenant_id)?;
        Ok(campaign)
    }
}
