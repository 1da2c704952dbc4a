// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider webhook payloads normalized into [`WebhookEvent`]s.
//!
//! One payload can carry several entries and changes; events come back in
//! delivery order. Anything this system does not act on becomes
//! [`WebhookEvent::Unrecognized`] so the caller can log it and move on.

use aina_core::{MessageKind, MessageStatus, Platform};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// A contact's message received by a tenant's account.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub platform: Platform,
    /// Receiving account: WhatsApp `phone_number_id` or Messenger page id.
    pub account_id: String,
    pub contact_id: String,
    pub contact_name: Option<String>,
    pub provider_message_id: String,
    pub kind: MessageKind,
    pub body: String,
    pub media_ref: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Delivery progress of a message the tenant sent.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub platform: Platform,
    pub account_id: String,
    pub provider_message_id: String,
    pub status: MessageStatus,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One normalized webhook event.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    InboundMessage(InboundMessage),
    StatusUpdate(StatusUpdate),
    Unrecognized { reason: String },
}

impl WebhookEvent {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InboundMessage(_) => "inbound_message",
            Self::StatusUpdate(_) => "status_update",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }

    fn unrecognized(reason: impl Into<String>) -> Self {
        Self::Unrecognized {
            reason: reason.into(),
        }
    }
}

/// Parse a raw webhook body from `platform`.
pub fn parse_payload(platform: Platform, body: &[u8]) -> Vec<WebhookEvent> {
    match platform {
        Platform::WhatsApp => match serde_json::from_slice::<WaPayload>(body) {
            Ok(payload) => parse_whatsapp(payload),
            Err(e) => vec![WebhookEvent::unrecognized(format!(
                "malformed whatsapp payload: {e}"
            ))],
        },
        Platform::Messenger => match serde_json::from_slice::<MsPayload>(body) {
            Ok(payload) => parse_messenger(payload),
            Err(e) => vec![WebhookEvent::unrecognized(format!(
                "malformed messenger payload: {e}"
            ))],
        },
    }
}

// --- WhatsApp Cloud API ---

#[derive(Debug, Deserialize)]
struct WaPayload {
    object: String,
    #[serde(default)]
    entry: Vec<WaEntry>,
}

#[derive(Debug, Deserialize)]
struct WaEntry {
    #[serde(default)]
    changes: Vec<WaChange>,
}

#[derive(Debug, Deserialize)]
struct WaChange {
    #[serde(default)]
    field: String,
    value: WaValue,
}

#[derive(Debug, Deserialize)]
struct WaValue {
    metadata: Option<WaMetadata>,
    #[serde(default)]
    contacts: Vec<WaContact>,
    #[serde(default)]
    messages: Vec<WaMessage>,
    #[serde(default)]
    statuses: Vec<WaStatus>,
}

#[derive(Debug, Deserialize)]
struct WaMetadata {
    phone_number_id: String,
}

#[derive(Debug, Deserialize)]
struct WaContact {
    wa_id: String,
    profile: Option<WaProfile>,
}

#[derive(Debug, Deserialize)]
struct WaProfile {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaMessage {
    from: String,
    id: String,
    timestamp: String,
    #[serde(rename = "type")]
    msg_type: String,
    text: Option<WaText>,
    image: Option<WaMedia>,
    video: Option<WaMedia>,
    audio: Option<WaMedia>,
    document: Option<WaMedia>,
    sticker: Option<WaMedia>,
    interactive: Option<WaInteractive>,
    button: Option<WaButton>,
}

#[derive(Debug, Deserialize)]
struct WaText {
    body: String,
}

#[derive(Debug, Deserialize)]
struct WaMedia {
    id: String,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaInteractive {
    button_reply: Option<WaReply>,
    list_reply: Option<WaReply>,
}

#[derive(Debug, Deserialize)]
struct WaReply {
    title: String,
}

#[derive(Debug, Deserialize)]
struct WaButton {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaStatus {
    id: String,
    status: String,
    timestamp: String,
    #[serde(default)]
    errors: Vec<WaError>,
}

#[derive(Debug, Deserialize)]
struct WaError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn parse_whatsapp(payload: WaPayload) -> Vec<WebhookEvent> {
    if payload.object != "whatsapp_business_account" {
        return vec![WebhookEvent::unrecognized(format!(
            "unexpected webhook object `{}`",
            payload.object
        ))];
    }
    let mut events = Vec::new();
    for change in payload.entry.into_iter().flat_map(|e| e.changes) {
        if change.field != "messages" {
            events.push(WebhookEvent::unrecognized(format!(
                "unsupported change field `{}`",
                change.field
            )));
            continue;
        }
        let value = change.value;
        let Some(metadata) = value.metadata else {
            events.push(WebhookEvent::unrecognized("change without metadata"));
            continue;
        };
        let account_id = metadata.phone_number_id;

        for message in value.messages {
            let contact_name = value
                .contacts
                .iter()
                .find(|c| c.wa_id == message.from)
                .or(value.contacts.first())
                .and_then(|c| c.profile.as_ref())
                .and_then(|p| p.name.clone());
            events.push(whatsapp_message(&account_id, contact_name, message));
        }
        for status in value.statuses {
            events.push(whatsapp_status(&account_id, status));
        }
    }
    events
}

fn whatsapp_message(
    account_id: &str,
    contact_name: Option<String>,
    message: WaMessage,
) -> WebhookEvent {
    let media = |m: &Option<WaMedia>| {
        m.as_ref()
            .map(|m| (m.id.clone(), m.caption.clone().unwrap_or_default()))
    };
    let (kind, body, media_ref) = match message.msg_type.as_str() {
        "text" => match message.text {
            Some(text) => (MessageKind::Text, text.body, None),
            None => return WebhookEvent::unrecognized("text message without body"),
        },
        "image" | "video" | "audio" | "document" | "sticker" => {
            let found = media(&message.image)
                .or_else(|| media(&message.video))
                .or_else(|| media(&message.audio))
                .or_else(|| media(&message.document))
                .or_else(|| media(&message.sticker));
            match found {
                Some((id, caption)) => (MessageKind::Media, caption, Some(id)),
                None => return WebhookEvent::unrecognized("media message without media"),
            }
        }
        "interactive" => {
            let title = message
                .interactive
                .and_then(|i| i.button_reply.or(i.list_reply))
                .map(|r| r.title);
            match title {
                Some(title) => (MessageKind::Interactive, title, None),
                None => return WebhookEvent::unrecognized("interactive reply without title"),
            }
        }
        // Quick-reply button on a template message.
        "button" => match message.button {
            Some(button) => (MessageKind::Text, button.text, None),
            None => return WebhookEvent::unrecognized("button message without text"),
        },
        other => {
            return WebhookEvent::unrecognized(format!("unsupported message type `{other}`"));
        }
    };
    WebhookEvent::InboundMessage(InboundMessage {
        platform: Platform::WhatsApp,
        account_id: account_id.to_string(),
        contact_id: message.from,
        contact_name,
        provider_message_id: message.id,
        kind,
        body,
        media_ref,
        timestamp: epoch_seconds(&message.timestamp),
    })
}

fn whatsapp_status(account_id: &str, status: WaStatus) -> WebhookEvent {
    let next = match status.status.as_str() {
        "sent" => MessageStatus::Sent,
        "delivered" => MessageStatus::Delivered,
        "read" => MessageStatus::Read,
        "failed" => MessageStatus::Failed,
        other => {
            return WebhookEvent::unrecognized(format!("unsupported status `{other}`"));
        }
    };
    let error = status.errors.first().map(|e| {
        let text = e
            .message
            .clone()
            .or_else(|| e.title.clone())
            .unwrap_or_else(|| "provider reported failure".to_string());
        match e.code {
            Some(code) => format!("{code}: {text}"),
            None => text,
        }
    });
    WebhookEvent::StatusUpdate(StatusUpdate {
        platform: Platform::WhatsApp,
        account_id: account_id.to_string(),
        provider_message_id: status.id,
        status: next,
        error,
        timestamp: epoch_seconds(&status.timestamp),
    })
}

// --- Messenger ---

#[derive(Debug, Deserialize)]
struct MsPayload {
    object: String,
    #[serde(default)]
    entry: Vec<MsEntry>,
}

#[derive(Debug, Deserialize)]
struct MsEntry {
    id: String,
    #[serde(default)]
    messaging: Vec<MsMessaging>,
}

#[derive(Debug, Deserialize)]
struct MsMessaging {
    sender: MsParty,
    #[serde(default)]
    timestamp: Option<i64>,
    message: Option<MsMessage>,
    delivery: Option<MsDelivery>,
    read: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MsParty {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MsMessage {
    mid: String,
    text: Option<String>,
    #[serde(default)]
    attachments: Vec<MsAttachment>,
    #[serde(default)]
    is_echo: bool,
    quick_reply: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MsAttachment {
    #[serde(rename = "type")]
    kind: String,
    payload: Option<MsAttachmentPayload>,
}

#[derive(Debug, Deserialize)]
struct MsAttachmentPayload {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MsDelivery {
    #[serde(default)]
    mids: Vec<String>,
    #[serde(default)]
    watermark: Option<i64>,
}

fn parse_messenger(payload: MsPayload) -> Vec<WebhookEvent> {
    if payload.object != "page" {
        return vec![WebhookEvent::unrecognized(format!(
            "unexpected webhook object `{}`",
            payload.object
        ))];
    }
    let mut events = Vec::new();
    for entry in payload.entry {
        let page_id = entry.id;
        for item in entry.messaging {
            let timestamp = item.timestamp.map(epoch_millis).unwrap_or_else(Utc::now);
            if let Some(message) = item.message {
                events.push(messenger_message(&page_id, item.sender.id, timestamp, message));
            } else if let Some(delivery) = item.delivery {
                let at = delivery.watermark.map(epoch_millis).unwrap_or(timestamp);
                if delivery.mids.is_empty() {
                    events.push(WebhookEvent::unrecognized("delivery receipt without message ids"));
                }
                for mid in delivery.mids {
                    events.push(WebhookEvent::StatusUpdate(StatusUpdate {
                        platform: Platform::Messenger,
                        account_id: page_id.clone(),
                        provider_message_id: mid,
                        status: MessageStatus::Delivered,
                        error: None,
                        timestamp: at,
                    }));
                }
            } else if item.read.is_some() {
                events.push(WebhookEvent::unrecognized(
                    "read watermark without message ids",
                ));
            } else {
                events.push(WebhookEvent::unrecognized("unsupported messaging event"));
            }
        }
    }
    events
}

fn messenger_message(
    page_id: &str,
    sender: String,
    timestamp: DateTime<Utc>,
    message: MsMessage,
) -> WebhookEvent {
    if message.is_echo {
        return WebhookEvent::unrecognized("echo of a page-sent message");
    }
    let (kind, body, media_ref) = if let Some(attachment) = message.attachments.first() {
        let url = attachment.payload.as_ref().and_then(|p| p.url.clone());
        match (attachment.kind.as_str(), url) {
            ("image" | "video" | "audio" | "file", Some(url)) => (
                MessageKind::Media,
                message.text.clone().unwrap_or_default(),
                Some(url),
            ),
            (other, _) => {
                return WebhookEvent::unrecognized(format!(
                    "unsupported attachment type `{other}`"
                ));
            }
        }
    } else if let Some(text) = message.text.clone() {
        let kind = if message.quick_reply.is_some() {
            MessageKind::Interactive
        } else {
            MessageKind::Text
        };
        (kind, text, None)
    } else {
        return WebhookEvent::unrecognized("message without text or attachments");
    };
    WebhookEvent::InboundMessage(InboundMessage {
        platform: Platform::Messenger,
        account_id: page_id.to_string(),
        contact_id: sender,
        contact_name: None,
        provider_message_id: message.mid,
        kind,
        body,
        media_ref,
        timestamp,
    })
}

fn epoch_seconds(raw: &str) -> DateTime<Utc> {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now)
}

fn epoch_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}
