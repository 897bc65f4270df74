// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Webhook signature verification and event decoding.
//!
//! The gateway signs every webhook delivery with HMAC-SHA512 over the raw
//! request body, keyed by the account secret, and sends the hex digest in
//! the `X-Gateway-Signature` header. Verification must run against the raw
//! bytes before any JSON parsing, and a failed signature rejects the
//! delivery before any side effect.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the hex HMAC-SHA512 digest of the raw body.
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// A charge settled successfully at the gateway.
pub const EVENT_CHARGE_SUCCESS: &str = "charge.success";
/// A charge terminally failed at the gateway.
pub const EVENT_CHARGE_FAILED: &str = "charge.failed";
/// A recurring subscription was created. Logged only, no reconciliation.
pub const EVENT_SUBSCRIPTION_CREATE: &str = "subscription.create";
/// A recurring subscription was disabled. Logged only, no reconciliation.
pub const EVENT_SUBSCRIPTION_DISABLE: &str = "subscription.disable";

/// Decoded webhook envelope. `data` stays untyped here; charge events are
/// mapped into a [`super::GatewayOutcome`] by the client module.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: Value,
}

impl WebhookEvent {
    pub fn reference(&self) -> Option<&str> {
        self.data.get("reference").and_then(Value::as_str)
    }
}

/// Verify a webhook signature header against the raw request body.
///
/// The digest comparison is constant-time (`Mac::verify_slice`); a header
/// that is not valid hex fails verification rather than erroring.
pub fn verify_signature(secret: &str, raw_body: &[u8], signature_header: &str) -> bool {
    let Some(signature) = decode_hex(signature_header.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&signature).is_ok()
}

/// Compute the hex signature the gateway would send for a payload.
///
/// Used by webhook simulation in local development and by tests.
pub fn sign_payload(secret: &str, raw_body: &[u8]) -> String {
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(raw_body);
    encode_hex(&mac.finalize().into_bytes())
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if !input.is_ascii() || input.len() % 2 != 0 || input.is_empty() {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&input[i..i + 2], 16).ok())
        .collect()
}

fn encode_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
