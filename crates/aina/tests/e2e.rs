// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end integration tests for the complete Aina pipeline.
//!
//! Each test creates an isolated TestHarness with temp SQLite, mock
//! providers and a manual clock. Tests are independent and order-insensitive.

use aina_automation::RuleDraft;
use aina_core::{
    AinaError, CampaignStatus, Clock, Conversation, Credits, LedgerKind, MessageStatus, Platform, TenantId, TriggerType,
};
use aina_engine::{CampaignDraft, SendRequest};
use aina_storage::queries::conversations;
use aina_test_utils::{MockOutcome, TestHarness};
use chrono::Duration;

const PHONE: &str = "1001";

async fn funded(balance: Credits) -> (TestHarness, TenantId) {
    let harness = TestHarness::new().await.unwrap();
    let tenant = harness.create_tenant("acme", PHONE, balance).await.unwrap();
    (harness, tenant)
}

/// A conversation with one inbound message from `contact` at the current time.
async fn open_conversation(harness: &TestHarness, tenant: &TenantId, contact: &str) -> Conversation {
    harness
        .receive_whatsapp_text(PHONE, contact, &format!("wamid.in.{contact}"), "hello")
        .await;
    harness.conversation(tenant, contact).await.unwrap().unwrap()
}

async fn ledger_sum(harness: &TestHarness, tenant: &TenantId) -> Credits {
    harness
        .engine
        .ledger
        .entries(tenant, 1000)
        .await
        .unwrap()
        .iter()
        .fold(Credits::ZERO, |sum, e| sum.checked_add(e.amount).unwrap())
}

// ---- Balance always equals the ledger sum ----

#[tokio::test]
async fn balance_matches_ledger_after_mixed_activity() {
    let (harness, tenant) = funded(Credits::whole(10)).await;
    let agent = harness.agent("acme");
    let admin = harness.admin();
    let conversation = open_conversation(&harness, &tenant, "919800000001").await;

    harness
        .engine
        .send
        .send(&agent, SendRequest::text(conversation.id.clone(), "one"))
        .await
        .unwrap();
    harness
        .whatsapp
        .push_outcome(MockOutcome::Reject("recipient blocked".into()))
        .await;
    harness
        .engine
        .send
        .send(&agent, SendRequest::text(conversation.id.clone(), "two"))
        .await
        .unwrap();
    harness
        .engine
        .admin
        .adjust_balance(&admin, &tenant, Credits::from_minor(-250), "reversal")
        .await
        .unwrap();

    let balance = harness.balance(&tenant).await.unwrap();
    assert_eq!(balance, Credits::from_minor(650));
    assert_eq!(ledger_sum(&harness, &tenant).await, balance);
    assert!(
        harness
            .engine
            .admin
            .verify(&admin, &tenant)
            .await
            .unwrap()
            .consistent
    );
}

// ---- Debits above the balance never touch the ledger or provider ----

#[tokio::test]
async fn unaffordable_send_creates_no_entry_and_no_dispatch() {
    let (harness, tenant) = funded(Credits::from_minor(50)).await;
    let conversation = open_conversation(&harness, &tenant, "919800000002").await;
    let entries_before = harness.engine.ledger.entries(&tenant, 100).await.unwrap();

    let err = harness
        .engine
        .send
        .send(
            &harness.agent("acme"),
            SendRequest::text(conversation.id, "costs one credit"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AinaError::InsufficientCredit { .. }));
    assert_eq!(
        harness.engine.ledger.entries(&tenant, 100).await.unwrap(),
        entries_before
    );
    assert_eq!(harness.whatsapp.calls(), 0);
    assert_eq!(harness.balance(&tenant).await.unwrap(), Credits::from_minor(50));
}

// ---- Concurrent sends racing for the last credit ----

#[tokio::test]
async fn concurrent_sends_for_last_credit_succeed_once() {
    let (harness, tenant) = funded(Credits::whole(1)).await;
    let conversation = open_conversation(&harness, &tenant, "919800000003").await;
    let agent = harness.agent("acme");
    let send = &harness.engine.send;

    let (a, b) = tokio::join!(
        send.send(&agent, SendRequest::text(conversation.id.clone(), "a")),
        send.send(&agent, SendRequest::text(conversation.id.clone(), "b")),
    );

    let outcomes = [a, b];
    let sent = outcomes.iter().filter(|r| r.is_ok()).count();
    let refused = outcomes
        .iter()
        .filter(|r| matches!(r, Err(AinaError::InsufficientCredit { .. })))
        .count();
    assert_eq!((sent, refused), (1, 1));
    assert_eq!(harness.balance(&tenant).await.unwrap(), Credits::ZERO);
    assert_eq!(harness.whatsapp.calls(), 1);
}

// ---- 24-hour session window ----

#[tokio::test]
async fn never_messaged_conversation_is_closed() {
    let (harness, tenant) = funded(Credits::whole(5)).await;
    let conversation = conversations::upsert_conversation(
        harness.engine.ledger.database(),
        &tenant,
        Platform::WhatsApp,
        "919800000004",
        None,
        harness.clock.now(),
    )
    .await
    .unwrap();
    let agent = harness.agent("acme");

    let view = harness
        .engine
        .conversations
        .session_state(&agent, &conversation.id)
        .await
        .unwrap();
    assert!(!view.open);

    let err = harness
        .engine
        .send
        .send(&agent, SendRequest::text(conversation.id, "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, AinaError::SessionWindowClosed { .. }));
    assert_eq!(harness.balance(&tenant).await.unwrap(), Credits::whole(5));
}

#[tokio::test]
async fn window_open_for_24_hours_after_inbound() {
    let (harness, tenant) = funded(Credits::whole(5)).await;
    let conversation = open_conversation(&harness, &tenant, "919800000005").await;
    let agent = harness.agent("acme");

    harness.clock.advance(Duration::hours(23) + Duration::minutes(59));
    let sent = harness
        .engine
        .send
        .send(&agent, SendRequest::text(conversation.id.clone(), "still open"))
        .await
        .unwrap();
    assert_eq!(sent.status, MessageStatus::Sent);

    harness.clock.advance(Duration::minutes(1) + Duration::seconds(1));
    let err = harness
        .engine
        .send
        .send(&agent, SendRequest::text(conversation.id.clone(), "too late"))
        .await
        .unwrap_err();
    assert!(matches!(err, AinaError::SessionWindowClosed { .. }));

    // A template is allowed outside the window.
    let template = harness
        .engine
        .send
        .send(&agent, SendRequest::template(conversation.id, "follow_up"))
        .await
        .unwrap();
    assert_eq!(template.status, MessageStatus::Sent);
}

// ---- Idempotent ingestion ----

#[tokio::test]
async fn redelivered_message_is_stored_once() {
    let (harness, tenant) = funded(Credits::whole(5)).await;
    let first = harness
        .receive_whatsapp_text(PHONE, "919800000006", "wamid.dup", "hello")
        .await;
    let second = harness
        .receive_whatsapp_text(PHONE, "919800000006", "wamid.dup", "hello")
        .await;
    assert_eq!((first.inbound, first.duplicates), (1, 0));
    assert_eq!((second.inbound, second.duplicates), (0, 1));

    let conversation = harness
        .conversation(&tenant, "919800000006")
        .await
        .unwrap()
        .unwrap();
    let messages = harness
        .engine
        .conversations
        .messages(&harness.agent("acme"), &conversation.id, 50)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
}

// ---- Automation matching ----

#[tokio::test]
async fn first_matching_rule_replies() {
    let (harness, _tenant) = funded(Credits::whole(10)).await;
    let agent = harness.agent("acme");
    for (name, trigger, keyword, response) in [
        ("greeting", TriggerType::ExactMatch, "hi", "Hello!"),
        ("pricing", TriggerType::KeywordMatch, "price", "See pricing page"),
    ] {
        harness
            .engine
            .automations
            .create(
                &agent,
                RuleDraft {
                    name: name.into(),
                    trigger,
                    keywords: vec![keyword.into()],
                    response: response.into(),
                    active: true,
                },
            )
            .await
            .unwrap();
    }

    let inbound = [
        ("wamid.a1", "hi"),
        ("wamid.a2", "what's the price?"),
        ("wamid.a3", "bye"),
    ];
    let mut replies = Vec::new();
    for (wamid, text) in inbound {
        let report = harness
            .receive_whatsapp_text(PHONE, "919800000007", wamid, text)
            .await;
        replies.push(report.auto_replies);
    }
    assert_eq!(replies, vec![1, 1, 0]);

    let bodies: Vec<String> = harness
        .whatsapp
        .sent()
        .await
        .into_iter()
        .map(|r| r.body)
        .collect();
    assert_eq!(bodies, vec!["Hello!", "See pricing page"]);
}

// ---- Balance scenarios ----

#[tokio::test]
async fn last_credit_then_insufficient() {
    let (harness, tenant) = funded(Credits::whole(1)).await;
    let conversation = open_conversation(&harness, &tenant, "919800000008").await;
    let agent = harness.agent("acme");

    let first = harness
        .engine
        .send
        .send(&agent, SendRequest::text(conversation.id.clone(), "first"))
        .await
        .unwrap();
    assert_eq!(first.status, MessageStatus::Sent);
    assert_eq!(harness.balance(&tenant).await.unwrap(), Credits::ZERO);

    let err = harness
        .engine
        .send
        .send(&agent, SendRequest::text(conversation.id, "second"))
        .await
        .unwrap_err();
    assert!(matches!(err, AinaError::InsufficientCredit { .. }));
    assert_eq!(harness.balance(&tenant).await.unwrap(), Credits::ZERO);
}

#[tokio::test]
async fn failed_dispatch_is_refunded() {
    let (harness, tenant) = funded(Credits::whole(3)).await;
    let conversation = open_conversation(&harness, &tenant, "919800000009").await;
    harness
        .whatsapp
        .push_outcome(MockOutcome::Reject("(#131026) Message undeliverable".into()))
        .await;

    let message = harness
        .engine
        .send
        .send(
            &harness.agent("acme"),
            SendRequest::text(conversation.id, "will fail"),
        )
        .await
        .unwrap();

    assert_eq!(message.status, MessageStatus::Failed);
    assert!(message.error.as_deref().unwrap().contains("131026"));
    assert_eq!(harness.balance(&tenant).await.unwrap(), Credits::whole(3));

    let kinds: Vec<LedgerKind> = harness
        .engine
        .ledger
        .entries(&tenant, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![LedgerKind::Refund, LedgerKind::MessageCharge, LedgerKind::AdminCredit]
    );
}

// ---- Delivery status callbacks ----

#[tokio::test]
async fn status_callbacks_advance_forward_only() {
    let (harness, tenant) = funded(Credits::whole(3)).await;
    let conversation = open_conversation(&harness, &tenant, "919800000010").await;
    harness
        .whatsapp
        .push_outcome(MockOutcome::AcceptAs("wamid.out.1".into()))
        .await;
    harness
        .engine
        .send
        .send(
            &harness.agent("acme"),
            SendRequest::text(conversation.id.clone(), "tracked"),
        )
        .await
        .unwrap();

    harness.whatsapp_status(PHONE, "wamid.out.1", "read").await;
    harness.whatsapp_status(PHONE, "wamid.out.1", "delivered").await;

    let messages = harness
        .engine
        .conversations
        .messages(&harness.agent("acme"), &conversation.id, 10)
        .await
        .unwrap();
    let outbound = messages
        .iter()
        .find(|m| m.provider_message_id.as_deref() == Some("wamid.out.1"))
        .unwrap();
    assert_eq!(outbound.status, MessageStatus::Read);
}

// ---- Campaigns charge per recipient and stop when credit runs out ----

#[tokio::test]
async fn campaign_stops_when_credit_runs_out() {
    let (harness, tenant) = funded(Credits::from_minor(400)).await;
    let agent = harness.agent("acme");
    let created = harness
        .engine
        .campaigns
        .create(
            &agent,
            CampaignDraft {
                name: "Spring sale".into(),
                platform: Platform::WhatsApp,
                template_name: "spring_sale".into(),
                template_language: None,
                audience: vec!["+1".into(), "+2".into(), "+3".into(), "+4".into()],
            },
        )
        .await
        .unwrap();

    let launch = harness
        .engine
        .campaigns
        .launch(&agent, &created.campaign.id)
        .await
        .unwrap();
    launch.run.await.unwrap();

    let report = harness
        .engine
        .campaigns
        .get(&agent, &created.campaign.id)
        .await
        .unwrap();
    assert_eq!(report.campaign.status, CampaignStatus::Failed);
    assert!(report.campaign.finished_at.is_some());
    assert_eq!((report.stats.sent, report.stats.failed), (2, 2));
    assert_eq!(harness.whatsapp.sent().await.len(), 2);
    assert_eq!(harness.balance(&tenant).await.unwrap(), Credits::from_minor(100));
    assert_eq!(ledger_sum(&harness, &tenant).await, Credits::from_minor(100));
}
