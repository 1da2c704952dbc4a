// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook payloads shaped like the ones Meta delivers.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

fn whatsapp_envelope(phone_number_id: &str, value: Value) -> Vec<u8> {
    let mut value = value;
    value["messaging_product"] = json!("whatsapp");
    value["metadata"] = json!({
        "display_phone_number": "15550000000",
        "phone_number_id": phone_number_id,
    });
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "waba-test",
            "changes": [{ "field": "messages", "value": value }]
        }]
    })
    .to_string()
    .into_bytes()
}

/// A WhatsApp Cloud API inbound text message.
pub fn whatsapp_text(
    phone_number_id: &str,
    from: &str,
    wamid: &str,
    text: &str,
    at: DateTime<Utc>,
) -> Vec<u8> {
    whatsapp_envelope(
        phone_number_id,
        json!({
            "contacts": [{ "profile": { "name": "Test Contact" }, "wa_id": from }],
            "messages": [{
                "from": from,
                "id": wamid,
                "timestamp": at.timestamp().to_string(),
                "type": "text",
                "text": { "body": text }
            }]
        }),
    )
}

/// A WhatsApp Cloud API status callback for an outbound message.
pub fn whatsapp_status(
    phone_number_id: &str,
    wamid: &str,
    status: &str,
    at: DateTime<Utc>,
) -> Vec<u8> {
    let mut entry = json!({
        "id": wamid,
        "status": status,
        "timestamp": at.timestamp().to_string(),
        "recipient_id": "0"
    });
    if status == "failed" {
        entry["errors"] = json!([{ "code": 131026, "title": "Message undeliverable" }]);
    }
    whatsapp_envelope(phone_number_id, json!({ "statuses": [entry] }))
}

/// A Messenger Platform inbound text message.
pub fn messenger_text(page_id: &str, psid: &str, mid: &str, text: &str, at: DateTime<Utc>) -> Vec<u8> {
    json!({
        "object": "page",
        "entry": [{
            "id": page_id,
            "time": at.timestamp_millis(),
            "messaging": [{
                "sender": { "id": psid },
                "recipient": { "id": page_id },
                "timestamp": at.timestamp_millis(),
                "message": { "mid": mid, "text": text }
            }]
        }]
    })
    .to_string()
    .into_bytes()
}
