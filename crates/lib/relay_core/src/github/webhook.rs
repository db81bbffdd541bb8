//! Webhook delivery signatures.
//!
//! GitHub signs each delivery body with HMAC-SHA256 using the app's webhook
//! secret and sends it as `X-Hub-Signature-256: sha256=<hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "sha256=";

/// Whether `signature_header` is a valid signature of `body` under `secret`.
pub fn verify_signature(secret: &str, signature_header: &str, body: &[u8]) -> bool {
    let Some(expected_hex) = signature_header.strip_prefix(PREFIX) else {
        warn!("webhook signature without sha256= prefix");
        return false;
    };
    let Ok(expected) = hex::decode(expected_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// `sha256=<hex>` signature for `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length.
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("{PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}
