// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform administration: tenant lifecycle and balance adjustments.

use std::sync::Arc;

use aina_bus::{EventBus, RealtimeEvent};
use aina_core::{
    AinaError, AuthContext, Clock, Credits, LedgerEntry, ProviderCredentials, Tenant, TenantId,
    TenantStatus,
};
use aina_ledger::{CreditLedger, Reconciliation};
use aina_storage::queries::tenants;
use serde::Deserialize;
use tracing::info;

/// A new tenant as submitted by an administrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTenant {
    pub id: TenantId,
    pub name: String,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default = "default_status")]
    pub status: TenantStatus,
    #[serde(default)]
    pub credentials: ProviderCredentials,
}

fn default_status() -> TenantStatus {
    TenantStatus::PendingVerification
}

#[derive(Clone)]
pub struct TenantAdmin {
    ledger: CreditLedger,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
}

impl TenantAdmin {
    pub fn new(ledger: CreditLedger, bus: Arc<EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, bus, clock }
    }

    pub async fn create_tenant(&self, ctx: &AuthContext, new: NewTenant) -> Result<Tenant, AinaError> {
        ctx.require_admin()?;
        let id = TenantId::from(new.id.as_str().trim());
        if id.as_str().is_empty() || new.name.trim().is_empty() {
            return Err(AinaError::Validation(
                "tenant id and name must not be empty".to_string(),
            ));
        }
        let db = self.ledger.database();
        if tenants::get_tenant(db, &id).await?.is_some() {
            return Err(AinaError::Validation(format!("tenant {id} already exists")));
        }
        let tenant = Tenant {
            id,
            name: new.name.trim().to_string(),
            status: new.status,
            balance: Credits::ZERO,
            plan: new.plan,
            credentials: new.credentials,
            created_at: self.clock.now(),
        };
        tenants::create_tenant(db, &tenant).await?;
        info!(
            tenant_id = %tenant.id,
            status = %tenant.status,
            actor_id = ctx.actor_id.as_deref().unwrap_or("-"),
            "tenant created"
        );
        Ok(tenant)
    }

    pub async fn list_tenants(&self, ctx: &AuthContext) -> Result<Vec<Tenant>, AinaError> {
        ctx.require_admin()?;
        tenants::list_tenants(self.ledger.database()).await
    }

    pub async fn set_status(
        &self,
        ctx: &AuthContext,
        tenant_id: &TenantId,
        status: TenantStatus,
    ) -> Result<(), AinaError> {
        ctx.require_admin()?;
        if !tenants::set_status(self.ledger.database(), tenant_id, status).await? {
            return Err(AinaError::not_found("tenant", tenant_id.as_str()));
        }
        info!(tenant_id = %tenant_id, status = %status, "tenant status changed");
        Ok(())
    }

    pub async fn set_credentials(
        &self,
        ctx: &AuthContext,
        tenant_id: &TenantId,
        credentials: &ProviderCredentials,
    ) -> Result<(), AinaError> {
        ctx.require_admin()?;
        if !tenants::set_credentials(self.ledger.database(), tenant_id, credentials).await? {
            return Err(AinaError::not_found("tenant", tenant_id.as_str()));
        }
        info!(tenant_id = %tenant_id, ?credentials, "tenant credentials updated");
        Ok(())
    }

    pub async fn adjust_balance(
        &self,
        ctx: &AuthContext,
        tenant_id: &TenantId,
        amount: Credits,
        reason: &str,
    ) -> Result<LedgerEntry, AinaError> {
        if reason.trim().is_empty() {
            return Err(AinaError::Validation(
                "an adjustment needs a reason".to_string(),
            ));
        }
        let entry = self
            .ledger
            .adjust_balance(ctx, tenant_id, amount, reason)
            .await?;
        self.bus
            .publish(tenant_id, RealtimeEvent::balance_changed(&entry));
        Ok(entry)
    }

    pub async fn verify(
        &self,
        ctx: &AuthContext,
        tenant_id: &TenantId,
    ) -> Result<Reconciliation, AinaError> {
        ctx.require_admin()?;
        self.ledger.verify(tenant_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aina_core::SystemClock;
    use aina_storage::Database;

    async fn setup() -> TenantAdmin {
        let db = Database::open_in_memory().await.unwrap();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        TenantAdmin::new(
            CreditLedger::new(db, clock.clone()),
            Arc::new(EventBus::new(16)),
            clock,
        )
    }

    fn admin() -> AuthContext {
        AuthContext::admin(TenantId::from("ops"), "root")
    }

    fn new_tenant(id: &str) -> NewTenant {
        NewTenant {
            id: TenantId::from(id),
            name: "Acme Retail".into(),
            plan: None,
            status: TenantStatus::Active,
            credentials: ProviderCredentials::default(),
        }
    }

    #[tokio::test]
    async fn admin_creates_and_funds_tenant() {
        let admin_svc = setup().await;
        let tenant = admin_svc.create_tenant(&admin(), new_tenant("acme")).await.unwrap();
        assert_eq!(tenant.balance, Credits::ZERO);

        let entry = admin_svc
            .adjust_balance(&admin(), &tenant.id, Credits::whole(50), "welcome credit")
            .await
            .unwrap();
        assert_eq!(entry.balance_after, Credits::whole(50));
        assert_eq!(entry.actor_id.as_deref(), Some("root"));

        let report = admin_svc.verify(&admin(), &tenant.id).await.unwrap();
        assert!(report.consistent);

        assert!(matches!(
            admin_svc.create_tenant(&admin(), new_tenant("acme")).await,
            Err(AinaError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn agents_cannot_administer() {
        let admin_svc = setup().await;
        let agent = AuthContext::agent(TenantId::from("acme"), "priya");
        assert!(matches!(
            admin_svc.create_tenant(&agent, new_tenant("acme")).await,
            Err(AinaError::Forbidden(_))
        ));
        assert!(matches!(
            admin_svc.list_tenants(&agent).await,
            Err(AinaError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn status_change_on_missing_tenant() {
        let admin_svc = setup().await;
        assert!(matches!(
            admin_svc
                .set_status(&admin(), &TenantId::from("ghost"), TenantStatus::Suspended)
                .await,
            Err(AinaError::NotFound { .. })
        ));
    }
}
