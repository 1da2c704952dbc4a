// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `X-Hub-Signature-256` verification: HMAC-SHA256 of the raw request body,
//! hex-encoded, prefixed with `sha256=`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Check a signature header against the raw body. Comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(hex_sig) = header.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Produce the header value for `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map(|mut mac| {
            mac.update(body);
            format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_signature() {
        let body = br#"{"object":"whatsapp_business_account"}"#;
        let header = sign("app-secret", body);
        assert!(verify_signature("app-secret", body, &header));
    }

    #[test]
    fn rejects_tampered_body() {
        let header = sign("app-secret", b"original");
        assert!(!verify_signature("app-secret", b"tampered", &header));
    }

    #[test]
    fn rejects_wrong_secret_and_malformed_headers() {
        let body = b"payload";
        let header = sign("app-secret", body);
        assert!(!verify_signature("other-secret", body, &header));
        assert!(!verify_signature("app-secret", body, "sha1=abcdef"));
        assert!(!verify_signature("app-secret", body, "sha256=not-hex"));
        assert!(!verify_signature("app-secret", body, ""));
    }
}
