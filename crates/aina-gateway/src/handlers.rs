// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the `/v1` API and public endpoints.
//!
//! Handlers are thin: they pull the caller's [`AuthContext`] from the request
//! extensions, call the matching engine service, and let [`ApiError`] turn
//! domain errors into status codes.

use aina_automation::RuleDraft;
use aina_config::model::CreditPackConfig;
use aina_core::{
    AuthContext, AutomationRule, Campaign, CampaignId, Conversation, ConversationId, Credits,
    LedgerEntry, Message, MessageId, PaymentOrder, ProviderCredentials, RuleId, Tenant, TenantId, TenantStatus,
};
use aina_engine::{
    CampaignDraft, CampaignReport, NewTenant, ReconcileOutcome, SendRequest, SessionView,
};
use aina_ledger::{Reconciliation, UsageSummary};
use aina_storage::queries::conversations::ConversationFilter;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::server::GatewayState;

/// Page size when `limit` is omitted.
const DEFAULT_PAGE: usize = 100;
const MAX_PAGE: usize = 500;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

impl PageQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
    }
}

/// `GET /health` response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub providers: Vec<ProviderHealth>,
}

#[derive(Debug, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// GET /health -- unauthenticated liveness plus provider health.
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let providers: Vec<ProviderHealth> = state
        .engine
        .send
        .providers()
        .health()
        .await
        .into_iter()
        .map(|(name, health)| {
            let (status, detail) = match health {
                aina_core::HealthStatus::Healthy => ("healthy", None),
                aina_core::HealthStatus::Degraded(d) => ("degraded", Some(d)),
                aina_core::HealthStatus::Unhealthy(d) => ("unhealthy", Some(d)),
            };
            ProviderHealth {
                name,
                status,
                detail,
            }
        })
        .collect();
    let status = if providers.iter().all(|p| p.status == "healthy") {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status,
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        providers,
    })
}

/// GET /metrics -- Prometheus text exposition, or 404 when disabled.
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// POST /v1/messages
///
/// A charged send that the provider then refused still returns 200 with the
/// FAILED message; the charge has already been refunded.
pub async fn post_message(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<SendRequest>,
) -> ApiResult<Json<Message>> {
    let message = state.engine.send.send(&ctx, request).await?;
    Ok(Json(message))
}

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    /// `mine` or `unassigned`; omitted lists all.
    #[serde(default)]
    pub assigned: Option<String>,
}

pub async fn list_conversations(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<ConversationQuery>,
) -> ApiResult<Json<Vec<Conversation>>> {
    let filter = match query.assigned.as_deref() {
        None => ConversationFilter::All,
        Some("unassigned") => ConversationFilter::Unassigned,
        Some("mine") => {
            let actor = ctx.actor_id.clone().ok_or_else(|| {
                aina_core::AinaError::Validation("caller has no actor id".to_string())
            })?;
            ConversationFilter::AssignedTo(actor)
        }
        Some(other) => {
            return Err(ApiError(aina_core::AinaError::Validation(format!(
                "unknown assigned filter '{other}'; expected mine or unassigned"
            ))));
        }
    };
    Ok(Json(state.engine.conversations.list(&ctx, filter).await?))
}

pub async fn conversation_messages(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let messages = state
        .engine
        .conversations
        .messages(&ctx, &ConversationId::from(id), page.limit())
        .await?;
    Ok(Json(messages))
}

/// GET /v1/conversations/{id}/session -- whether free-form sends are allowed.
pub async fn session_state(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    let view = state
        .engine
        .conversations
        .session_state(&ctx, &ConversationId::from(id))
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignRequest {
    /// Agent to assign; `null` unassigns.
    pub agent: Option<String>,
}

pub async fn assign_conversation(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<AssignRequest>,
) -> ApiResult<Json<Conversation>> {
    let conversation = state
        .engine
        .conversations
        .assign(&ctx, &ConversationId::from(id), body.agent)
        .await?;
    Ok(Json(conversation))
}

pub async fn delete_conversation(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .conversations
        .delete(&ctx, &ConversationId::from(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn ledger_entries(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<LedgerEntry>>> {
    let entries = state
        .engine
        .ledger
        .entries(&ctx.tenant_id, page.limit())
        .await?;
    Ok(Json(entries))
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub tenant_id: TenantId,
    pub balance: Credits,
}

pub async fn ledger_balance(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<BalanceResponse>> {
    let balance = state.engine.ledger.balance(&ctx.tenant_id).await?;
    Ok(Json(BalanceResponse {
        tenant_id: ctx.tenant_id,
        balance,
    }))
}

pub async fn ledger_summary(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<UsageSummary>> {
    Ok(Json(
        state.engine.ledger.usage_summary(&ctx.tenant_id).await?,
    ))
}

pub async fn list_automations(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<AutomationRule>>> {
    Ok(Json(state.engine.automations.list(&ctx).await?))
}

pub async fn create_automation(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Json(draft): Json<RuleDraft>,
) -> ApiResult<(StatusCode, Json<AutomationRule>)> {
    let rule = state.engine.automations.create(&ctx, draft).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn update_automation(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(draft): Json<RuleDraft>,
) -> ApiResult<Json<AutomationRule>> {
    let rule = state
        .engine
        .automations
        .update(&ctx, &RuleId::from(id), draft)
        .await?;
    Ok(Json(rule))
}

pub async fn delete_automation(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .automations
        .delete(&ctx, &RuleId::from(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_campaigns(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<CampaignReport>>> {
    Ok(Json(state.engine.campaigns.list(&ctx).await?))
}

pub async fn create_campaign(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Json(draft): Json<CampaignDraft>,
) -> ApiResult<(StatusCode, Json<CampaignReport>)> {
    let report = state.engine.campaigns.create(&ctx, draft).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn get_campaign(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<CampaignReport>> {
    Ok(Json(
        state.engine.campaigns.get(&ctx, &CampaignId::from(id)).await?,
    ))
}

/// Starts the run and answers before any recipient is messaged.
pub async fn launch_campaign(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    let launch = state
        .engine
        .campaigns
        .launch(&ctx, &CampaignId::from(id))
        .await?;
    Ok((StatusCode::ACCEPTED, Json(launch.campaign)))
}

pub async fn delete_campaign(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .campaigns
        .delete(&ctx, &CampaignId::from(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn credit_packs(State(state): State<GatewayState>) -> Json<Vec<CreditPackConfig>> {
    Json(state.engine.billing.packs().to_vec())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderRequest {
    pub pack_id: String,
}

pub async fn create_order(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<OrderRequest>,
) -> ApiResult<(StatusCode, Json<PaymentOrder>)> {
    let order = state.engine.billing.create_order(&ctx, &body.pack_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<PaymentOrder>>> {
    Ok(Json(state.engine.billing.orders(&ctx).await?))
}

// --- admin ---

pub async fn admin_create_tenant(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Json(new): Json<NewTenant>,
) -> ApiResult<(StatusCode, Json<Tenant>)> {
    let tenant = state.engine.admin.create_tenant(&ctx, new).await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

pub async fn admin_list_tenants(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Tenant>>> {
    Ok(Json(state.engine.admin.list_tenants(&ctx).await?))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusRequest {
    pub status: TenantStatus,
}

pub async fn admin_set_status(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .admin
        .set_status(&ctx, &TenantId::from(id), body.status)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn admin_set_credentials(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(credentials): Json<ProviderCredentials>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .admin
        .set_credentials(&ctx, &TenantId::from(id), &credentials)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdjustRequest {
    /// Signed amount; negative debits.
    pub amount: Credits,
    pub reason: String,
}

pub async fn admin_adjust_balance(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<AdjustRequest>,
) -> ApiResult<Json<LedgerEntry>> {
    let entry = state
        .engine
        .admin
        .adjust_balance(&ctx, &TenantId::from(id), body.amount, &body.reason)
        .await?;
    Ok(Json(entry))
}

pub async fn admin_verify_ledger(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Reconciliation>> {
    Ok(Json(
        state.engine.admin.verify(&ctx, &TenantId::from(id)).await?,
    ))
}

pub async fn admin_reconcile_message(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(outcome): Json<ReconcileOutcome>,
) -> ApiResult<Json<Message>> {
    let message = state
        .engine
        .send
        .reconcile(&ctx, &MessageId::from(id), outcome)
        .await?;
    Ok(Json(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_limit_defaults_and_clamps() {
        assert_eq!(PageQuery { limit: None }.limit(), DEFAULT_PAGE);
        assert_eq!(PageQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(PageQuery { limit: Some(10_000) }.limit(), MAX_PAGE);
    }

    #[test]
    fn assign_request_accepts_null() {
        let body: AssignRequest = serde_json::from_str(r#"{"agent": null}"#).unwrap();
        assert!(body.agent.is_none());
        let body: AssignRequest = serde_json::from_str(r#"{"agent": "priya"}"#).unwrap();
        assert_eq!(body.agent.as_deref(), Some("priya"));
    }

    #[test]
    fn adjust_request_parses_decimal_credits() {
        let body: AdjustRequest =
            serde_json::from_str(r#"{"amount": "-2.50", "reason": "goodwill reversal"}"#).unwrap();
        assert_eq!(body.amount, Credits::from_minor(-250));
    }
}
