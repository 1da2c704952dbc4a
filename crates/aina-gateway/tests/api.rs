// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router-level tests: auth, error mapping, webhooks and billing callbacks.

use std::time::Duration;

use aina_config::model::{ApiTokenConfig, TokenRole, WebhookConfig};
use aina_core::{AuthContext, Clock, Credits, TenantId};
use aina_engine::Ingestor;
use aina_gateway::{GatewayState, HealthState, TokenTable, router};
use aina_provider::{SIGNATURE_HEADER, sign};
use aina_test_utils::{TestHarness, payloads};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const APP_SECRET: &str = "meta-app-secret";
const BILLING_SECRET: &str = "billing-key";

struct Api {
    harness: TestHarness,
    app: Router,
    cancel: CancellationToken,
}

impl Drop for Api {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn token(token: &str, tenant: &str, role: TokenRole) -> ApiTokenConfig {
    ApiTokenConfig {
        token: token.into(),
        tenant_id: tenant.into(),
        role,
        actor_id: format!("{tenant}-actor"),
    }
}

async fn setup() -> Api {
    setup_with_billing_secret(Some(BILLING_SECRET)).await
}

async fn setup_with_billing_secret(billing_secret: Option<&str>) -> Api {
    let harness = TestHarness::new().await.unwrap();
    harness
        .create_tenant("acme", "1001", Credits::whole(5))
        .await
        .unwrap();
    harness
        .create_tenant("broke", "2002", Credits::ZERO)
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let (ingestor, _worker) = Ingestor::spawn(harness.engine.ingest.clone(), 16, cancel.clone());
    let state = GatewayState {
        engine: harness.engine.clone(),
        ingestor,
        webhook: WebhookConfig {
            verify_token: Some("verify-me".into()),
            app_secret: Some(APP_SECRET.into()),
        },
        billing_secret: billing_secret.map(str::to_string),
        health: HealthState::new(None),
        shutdown: cancel.clone(),
    };
    let tokens = TokenTable::from_config(&[
        token("acme-token", "acme", TokenRole::Agent),
        token("broke-token", "broke", TokenRole::Agent),
        token("admin-token", "platform", TokenRole::Admin),
    ]);
    Api {
        app: router(state, tokens),
        harness,
        cancel,
    }
}

impl Api {
    async fn call(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.call(request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).unwrap()
        };
        (status, value)
    }

    /// Open a WhatsApp conversation for `tenant` with one inbound message.
    async fn conversation_id(&self, tenant: &str, phone: &str, from: &str) -> String {
        self.harness
            .receive_whatsapp_text(phone, from, &format!("wamid.{from}"), "hello")
            .await;
        self.harness
            .conversation(&TenantId::from(tenant), from)
            .await
            .unwrap()
            .unwrap()
            .id
            .0
    }
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn send_json(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let api = setup().await;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = api.json(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["providers"].as_array().unwrap().len(), 2);

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    assert_eq!(api.call(request).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_requires_known_token() {
    let api = setup().await;
    let anonymous = Request::builder()
        .uri("/v1/ledger/balance")
        .body(Body::empty())
        .unwrap();
    assert_eq!(api.call(anonymous).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(
        api.call(get("/v1/ledger/balance", "nope")).await.0,
        StatusCode::UNAUTHORIZED
    );

    let (status, body) = api.json(get("/v1/ledger/balance", "acme-token")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant_id"], "acme");
    assert_eq!(body["balance"], "5.00");

    // An explicit header wins over the query parameter, even when it is wrong.
    let (status, _) = api
        .json(get("/v1/ledger/balance?access_token=acme-token", "ignored"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let query_only = Request::builder()
        .uri("/v1/ledger/balance?access_token=acme-token")
        .body(Body::empty())
        .unwrap();
    assert_eq!(api.call(query_only).await.0, StatusCode::OK);
}

#[tokio::test]
async fn webhook_handshake_checks_verify_token() {
    let api = setup().await;
    let handshake = |token: &str| {
        Request::builder()
            .uri(format!(
                "/webhooks/whatsapp?hub.mode=subscribe&hub.verify_token={token}&hub.challenge=1158201444"
            ))
            .body(Body::empty())
            .unwrap()
    };
    let (status, body) = api.call(handshake("verify-me")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "1158201444");

    assert_eq!(api.call(handshake("wrong")).await.0, StatusCode::FORBIDDEN);

    let unknown = Request::builder()
        .uri("/webhooks/telegram?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1")
        .body(Body::empty())
        .unwrap();
    assert_eq!(api.call(unknown).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unsigned_webhook_is_acknowledged_but_dropped() {
    let api = setup().await;
    let now = api.harness.clock.now();
    let forged = payloads::whatsapp_text("1001", "919800000001", "wamid.forged", "hi", now);
    let genuine = payloads::whatsapp_text("1001", "919800000001", "wamid.genuine", "hi", now);

    let post = |body: Vec<u8>, signature: String| {
        Request::builder()
            .method("POST")
            .uri("/webhooks/whatsapp")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .unwrap()
    };
    let (status, _) = api
        .call(post(forged, "sha256=00".to_string()))
        .await;
    assert_eq!(status, StatusCode::OK);
    let signature = sign(APP_SECRET, &genuine);
    let (status, _) = api.call(post(genuine, signature)).await;
    assert_eq!(status, StatusCode::OK);

    // One worker processes payloads in order, so once the genuine message is
    // stored the forged one would have been too.
    let tenant = TenantId::from("acme");
    let agent = AuthContext::agent(tenant.clone(), "acme-actor");
    let mut stored = Vec::new();
    for _ in 0..100 {
        if let Some(conversation) = api
            .harness
            .conversation(&tenant, "919800000001")
            .await
            .unwrap()
        {
            stored = api
                .harness
                .engine
                .conversations
                .messages(&agent, &conversation.id, 10)
                .await
                .unwrap();
            if !stored.is_empty() {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let ids: Vec<_> = stored
        .iter()
        .filter_map(|m| m.provider_message_id.as_deref())
        .collect();
    assert_eq!(ids, vec!["wamid.genuine"]);
}

#[tokio::test]
async fn closed_window_maps_to_conflict() {
    let api = setup().await;
    let conversation_id = api.conversation_id("acme", "1001", "919800000002").await;

    let (status, body) = api
        .json(send_json(
            "POST",
            "/v1/messages",
            "acme-token",
            json!({ "conversation_id": conversation_id, "kind": "text", "body": "on time" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SENT");

    api.harness.clock.advance(chrono::Duration::hours(25));
    let (status, session) = api
        .json(get(
            &format!("/v1/conversations/{conversation_id}/session"),
            "acme-token",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["open"], false);

    let before = api.harness.balance(&TenantId::from("acme")).await.unwrap();
    let (status, body) = api
        .json(send_json(
            "POST",
            "/v1/messages",
            "acme-token",
            json!({ "conversation_id": conversation_id, "kind": "text", "body": "too late" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "session_window_closed");
    assert_eq!(
        api.harness.balance(&TenantId::from("acme")).await.unwrap(),
        before
    );

    let (status, body) = api
        .json(send_json(
            "POST",
            "/v1/messages",
            "acme-token",
            json!({
                "conversation_id": conversation_id,
                "kind": "template",
                "template_name": "follow_up"
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "template");
}

#[tokio::test]
async fn empty_balance_maps_to_payment_required() {
    let api = setup().await;
    let conversation_id = api.conversation_id("broke", "2002", "919800000003").await;
    let (status, body) = api
        .json(send_json(
            "POST",
            "/v1/messages",
            "broke-token",
            json!({ "conversation_id": conversation_id, "kind": "text", "body": "hi" }),
        ))
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "insufficient_credit");
    assert!(api.harness.whatsapp.sent().await.is_empty());
}

#[tokio::test]
async fn other_tenants_conversations_are_forbidden() {
    let api = setup().await;
    let conversation_id = api.conversation_id("acme", "1001", "919800000004").await;
    let (status, body) = api
        .json(get(
            &format!("/v1/conversations/{conversation_id}/messages"),
            "broke-token",
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "tenant_mismatch");

    let (status, body) = api
        .json(get("/v1/conversations?assigned=everyone", "acme-token"))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn admin_routes_require_admin() {
    let api = setup().await;
    let (status, body) = api.json(get("/v1/admin/tenants", "acme-token")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, body) = api
        .json(send_json(
            "POST",
            "/v1/admin/tenants/acme/balance",
            "admin-token",
            json!({ "amount": "2.50", "reason": "goodwill" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance_after"], "7.50");

    let (status, body) = api
        .json(get("/v1/admin/tenants/acme/ledger/verify", "admin-token"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consistent"], true);

    let (status, _) = api
        .json(send_json(
            "PUT",
            "/v1/admin/tenants/acme/status",
            "admin-token",
            json!({ "status": "SUSPENDED" }),
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn signed_payment_notification_credits_the_tenant() {
    let api = setup().await;
    let (status, order) = api
        .json(send_json(
            "POST",
            "/v1/billing/orders",
            "acme-token",
            json!({ "pack_id": "starter" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = order["id"].as_str().unwrap().to_string();

    let body = json!({ "order_id": order_id, "status": "paid" }).to_string();
    let notify = |signature: String| {
        Request::builder()
            .method("POST")
            .uri("/webhooks/payments")
            .header("x-payment-signature", signature)
            .body(Body::from(body.clone()))
            .unwrap()
    };
    assert_eq!(
        api.call(notify("sha256=00".into())).await.0,
        StatusCode::UNAUTHORIZED
    );
    let (status, _) = api
        .call(notify(sign(BILLING_SECRET, body.as_bytes())))
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        api.harness.balance(&TenantId::from("acme")).await.unwrap(),
        Credits::whole(1005)
    );
}

#[tokio::test]
async fn payment_notification_needs_a_configured_secret() {
    let api = setup_with_billing_secret(None).await;
    let (status, order) = api
        .json(send_json(
            "POST",
            "/v1/billing/orders",
            "broke-token",
            json!({ "pack_id": "starter" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let body = json!({ "order_id": order["id"], "status": "paid" }).to_string();
    let forged = Request::builder()
        .method("POST")
        .uri("/webhooks/payments")
        .body(Body::from(body))
        .unwrap();
    assert_eq!(api.call(forged).await.0, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        api.harness.balance(&TenantId::from("broke")).await.unwrap(),
        Credits::ZERO
    );
}

#[tokio::test]
async fn campaign_lifecycle_over_http() {
    let api = setup().await;
    let (status, created) = api
        .json(send_json(
            "POST",
            "/v1/campaigns",
            "acme-token",
            json!({
                "name": "Restock alert",
                "template_name": "restock",
                "audience": ["919800000010", "919800000011", "919800000010"]
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "DRAFT");
    assert_eq!(created["stats"]["total"], 2);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = api.json(get(&format!("/v1/campaigns/{id}"), "broke-token")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, launched) = api
        .json(send_json(
            "POST",
            &format!("/v1/campaigns/{id}/launch"),
            "acme-token",
            json!({}),
        ))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(launched["status"], "SENDING");

    let mut report = Value::Null;
    for _ in 0..100 {
        let (_, current) = api.json(get(&format!("/v1/campaigns/{id}"), "acme-token")).await;
        if current["status"] != "SENDING" {
            report = current;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(report["status"], "COMPLETED");
    assert_eq!(report["stats"]["sent"], 2);
    assert_eq!(api.harness.whatsapp.sent().await.len(), 2);
    // 5 credits less two templates at 1.50.
    assert_eq!(
        api.harness.balance(&TenantId::from("acme")).await.unwrap(),
        Credits::whole(2)
    );

    let (status, body) = api
        .json(send_json(
            "POST",
            &format!("/v1/campaigns/{id}/launch"),
            "acme-token",
            json!({}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation");

    let (status, _) = api
        .call(send_json("DELETE", &format!("/v1/campaigns/{id}"), "acme-token", json!({})))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, listed) = api.json(get("/v1/campaigns", "acme-token")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!([]));
}
