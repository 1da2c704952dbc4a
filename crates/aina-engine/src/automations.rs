// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant management of automation rules.

use std::sync::Arc;

use aina_automation::{RuleDraft, validate_rule};
use aina_core::{AinaError, AuthContext, AutomationRule, Clock, RuleId};
use aina_storage::Database;
use aina_storage::queries::automations;
use tracing::info;

#[derive(Clone)]
pub struct AutomationService {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl AutomationService {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn list(&self, ctx: &AuthContext) -> Result<Vec<AutomationRule>, AinaError> {
        automations::list_rules(&self.db, &ctx.tenant_id, false).await
    }

    pub async fn create(
        &self,
        ctx: &AuthContext,
        draft: RuleDraft,
    ) -> Result<AutomationRule, AinaError> {
        validate_rule(&draft)?;
        let rule = draft.into_rule(ctx.tenant_id.clone(), self.clock.now());
        let stored = automations::create_rule(&self.db, &rule).await?;
        info!(tenant_id = %stored.tenant_id, rule_id = %stored.id, "automation rule created");
        Ok(stored)
    }

    pub async fn update(
        &self,
        ctx: &AuthContext,
        id: &RuleId,
        draft: RuleDraft,
    ) -> Result<AutomationRule, AinaError> {
        validate_rule(&draft)?;
        let mut rule = self.owned(ctx, id).await?;
        draft.apply_to(&mut rule);
        if !automations::update_rule(&self.db, &rule).await? {
            return Err(AinaError::not_found("automation rule", id.as_str()));
        }
        info!(tenant_id = %rule.tenant_id, rule_id = %id, "automation rule updated");
        Ok(rule)
    }

    pub async fn delete(&self, ctx: &AuthContext, id: &RuleId) -> Result<(), AinaError> {
        let rule = self.owned(ctx, id).await?;
        automations::delete_rule(&self.db, id).await?;
        info!(tenant_id = %rule.tenant_id, rule_id = %id, "automation rule deleted");
        Ok(())
    }

    async fn owned(&self, ctx: &AuthContext, id: &RuleId) -> Result<AutomationRule, AinaError> {
        let rule = automations::get_rule(&self.db, id)
            .await?
            .ok_or_else(|| AinaError::not_found("automation rule", id.as_str()))?;
        ctx.authorize_tenant(&rule.tenant_id)?;
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aina_core::{
        Credits, ProviderCredentials, SystemClock, Tenant, TenantId, TenantStatus, TriggerType,
    };
    use aina_storage::queries::tenants;
    use chrono::Utc;

    fn draft(keywords: &[&str]) -> RuleDraft {
        RuleDraft {
            name: "Pricing".into(),
            trigger: TriggerType::KeywordMatch,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            response: "Plans start at 499".into(),
            active: true,
        }
    }

    async fn setup() -> AutomationService {
        let db = Database::open_in_memory().await.unwrap();
        for id in ["acme", "globex"] {
            tenants::create_tenant(
                &db,
                &Tenant {
                    id: TenantId::from(id),
                    name: id.into(),
                    status: TenantStatus::Active,
                    balance: Credits::ZERO,
                    plan: None,
                    credentials: ProviderCredentials::default(),
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        }
        AutomationService::new(db, Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn create_update_delete() {
        let service = setup().await;
        let ctx = AuthContext::agent(TenantId::from("acme"), "priya");

        let rule = service.create(&ctx, draft(&["price", " cost "])).await.unwrap();
        assert_eq!(rule.keywords, vec!["price", "cost"]);
        assert_eq!(rule.position, 1);

        let updated = service
            .update(&ctx, &rule.id, RuleDraft { active: false, ..draft(&["pricing"]) })
            .await
            .unwrap();
        assert!(!updated.active);
        assert_eq!(service.list(&ctx).await.unwrap().len(), 1);

        service.delete(&ctx, &rule.id).await.unwrap();
        assert!(service.list(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_drafts_are_rejected() {
        let service = setup().await;
        let ctx = AuthContext::agent(TenantId::from("acme"), "priya");
        let err = service.create(&ctx, draft(&["  "])).await.unwrap_err();
        assert!(matches!(err, AinaError::InvalidAutomationRule(_)));
    }

    #[tokio::test]
    async fn rules_are_tenant_scoped() {
        let service = setup().await;
        let acme = AuthContext::agent(TenantId::from("acme"), "priya");
        let globex = AuthContext::agent(TenantId::from("globex"), "mallory");
        let rule = service.create(&acme, draft(&["price"])).await.unwrap();

        assert!(service.list(&globex).await.unwrap().is_empty());
        assert!(matches!(
            service.delete(&globex, &rule.id).await,
            Err(AinaError::TenantMismatch { .. })
        ));
    }
}
