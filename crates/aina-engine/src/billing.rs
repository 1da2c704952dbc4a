// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit-pack purchases.
//!
//! A tenant creates a pending order for a pack; the payment gateway later
//! confirms or fails it through a signed webhook. Confirmation credits the
//! pack exactly once per order.

use std::sync::Arc;

use aina_bus::{EventBus, RealtimeEvent};
use aina_config::model::CreditPackConfig;
use aina_core::{
    AinaError, AuthContext, Clock, Credits, LedgerEntry, OrderStatus, PaymentOrder,
};
use aina_ledger::CreditLedger;
use aina_storage::queries::orders;
use serde::Deserialize;
use tracing::{info, warn};

/// Gateway notification for one order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentNotification {
    pub order_id: String,
    pub status: PaymentOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Paid,
    Failed,
}

#[derive(Clone)]
pub struct BillingService {
    ledger: CreditLedger,
    packs: Arc<Vec<CreditPackConfig>>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
}

impl BillingService {
    pub fn new(
        ledger: CreditLedger,
        packs: Vec<CreditPackConfig>,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            packs: Arc::new(packs),
            bus,
            clock,
        }
    }

    pub fn packs(&self) -> &[CreditPackConfig] {
        &self.packs
    }

    /// Open a pending order for `pack_id` on the caller's tenant.
    pub async fn create_order(
        &self,
        ctx: &AuthContext,
        pack_id: &str,
    ) -> Result<PaymentOrder, AinaError> {
        let pack = self
            .packs
            .iter()
            .find(|p| p.id == pack_id)
            .ok_or_else(|| AinaError::not_found("credit pack", pack_id))?;
        let order = PaymentOrder {
            id: format!("order_{}", uuid::Uuid::new_v4().simple()),
            tenant_id: ctx.tenant_id.clone(),
            pack_id: pack.id.clone(),
            credits: Credits::whole(pack.credits),
            price_minor: pack.price_inr.saturating_mul(100),
            status: OrderStatus::Pending,
            created_at: self.clock.now(),
        };
        orders::create_order(self.ledger.database(), &order).await?;
        info!(
            tenant_id = %order.tenant_id,
            order_id = order.id,
            pack_id = order.pack_id,
            "payment order created"
        );
        Ok(order)
    }

    pub async fn orders(&self, ctx: &AuthContext) -> Result<Vec<PaymentOrder>, AinaError> {
        orders::list_orders(self.ledger.database(), &ctx.tenant_id).await
    }

    /// Apply a gateway notification. Returns the purchase entry for a paid order.
    pub async fn handle_notification(
        &self,
        notification: PaymentNotification,
    ) -> Result<Option<LedgerEntry>, AinaError> {
        match notification.status {
            PaymentOutcome::Paid => {
                let entry = self.ledger.confirm_order(&notification.order_id).await?;
                self.bus
                    .publish(&entry.tenant_id, RealtimeEvent::balance_changed(&entry));
                Ok(Some(entry))
            }
            PaymentOutcome::Failed => {
                if orders::mark_failed(self.ledger.database(), &notification.order_id).await? {
                    info!(order_id = notification.order_id, "payment order failed");
                } else {
                    warn!(
                        order_id = notification.order_id,
                        "failure notice for unknown or settled order ignored"
                    );
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aina_config::model::BillingConfig;
    use aina_core::{ProviderCredentials, SystemClock, Tenant, TenantId, TenantStatus};
    use aina_storage::Database;
    use aina_storage::queries::tenants;
    use chrono::Utc;

    async fn setup() -> BillingService {
        let db = Database::open_in_memory().await.unwrap();
        tenants::create_tenant(
            &db,
            &Tenant {
                id: TenantId::from("acme"),
                name: "Acme".into(),
                status: TenantStatus::Active,
                balance: Credits::ZERO,
                plan: None,
                credentials: ProviderCredentials::default(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        BillingService::new(
            CreditLedger::new(db, clock.clone()),
            BillingConfig::default().packs,
            Arc::new(EventBus::new(16)),
            clock,
        )
    }

    fn ctx() -> AuthContext {
        AuthContext::agent(TenantId::from("acme"), "priya")
    }

    #[tokio::test]
    async fn paid_order_credits_pack_once() {
        let billing = setup().await;
        let order = billing.create_order(&ctx(), "growth").await.unwrap();
        assert_eq!(order.credits, Credits::whole(5000));
        assert_eq!(order.price_minor, 200_000);

        let paid = PaymentNotification {
            order_id: order.id.clone(),
            status: PaymentOutcome::Paid,
        };
        let first = billing.handle_notification(paid.clone()).await.unwrap().unwrap();
        let second = billing.handle_notification(paid).await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.balance_after, Credits::whole(5000));

        let orders = billing.orders(&ctx()).await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn failed_order_cannot_be_confirmed() {
        let billing = setup().await;
        let order = billing.create_order(&ctx(), "starter").await.unwrap();
        billing
            .handle_notification(PaymentNotification {
                order_id: order.id.clone(),
                status: PaymentOutcome::Failed,
            })
            .await
            .unwrap();
        let err = billing
            .handle_notification(PaymentNotification {
                order_id: order.id,
                status: PaymentOutcome::Paid,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AinaError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_pack_is_not_found() {
        let billing = setup().await;
        assert!(matches!(
            billing.create_order(&ctx(), "platinum").await,
            Err(AinaError::NotFound { .. })
        ));
    }
}
