// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! HTTP client for the external card/mobile-money payment gateway.
//!
//! The gateway's REST API wraps every response in a
//! `{"status": bool, "message": string, "data": {...}}` envelope and speaks
//! amounts in minor units. This module owns the only conversion across that
//! boundary. All requests carry a bounded timeout; a timed-out charge stays
//! `pending` in the ledger and is reconciled later by verify or webhook.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;
use url::Url;

use crate::config;

use super::fees;
use super::webhook;

pub const DEFAULT_CURRENCY: &str = "KES";

const INITIALIZE_PATH: &str = "/transaction/initialize";
const VERIFY_PATH: &str = "/transaction/verify";

/// Charge state as reported by the gateway.
///
/// `Pending` means the gateway has not resolved the charge yet (payer still
/// in checkout, or the charge is queued); it is not an outcome and must not
/// finalize a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeStatus {
    Pending,
    Success,
    Failed,
}

/// Parameters for initializing a hosted checkout charge.
pub struct InitializeChargeRequest<'a> {
    /// Ledger payment reference, the idempotency key for the whole flow.
    pub reference: &'a str,
    pub payer_email: &'a str,
    /// Charged total in major units (amount + platform fee).
    pub charge_major: u64,
    pub currency: &'a str,
    /// Counterpart identifiers forwarded to the gateway for audit.
    pub metadata: Value,
}

/// Successful charge initialization: where to send the payer.
#[derive(Debug, Clone)]
pub struct ChargeAuthorization {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// A charge outcome as reported by the gateway, from either the verify API
/// or a webhook delivery. Amounts are minor units as received; conversion
/// to major units happens at the reconciliation boundary.
#[derive(Debug, Clone)]
pub struct GatewayOutcome {
    pub status: ChargeStatus,
    pub raw_status: String,
    pub amount_minor: u64,
    pub currency: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub channel: Option<String>,
    /// Human-readable card/account descriptor, e.g. `visa ****4081`.
    pub instrument: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway configuration missing: {0}")]
    MissingConfig(&'static str),

    #[error("gateway configuration invalid: {0}")]
    InvalidConfig(String),

    #[error("gateway request failed: {0}")]
    Request(String),

    #[error("gateway returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("gateway response was invalid: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    secret_key: String,
    callback_url: String,
    http: Client,
}

impl GatewayClient {
    /// Whether the environment carries enough configuration to talk to the
    /// gateway. Payment endpoints degrade to 503 when this is false.
    pub fn is_configured() -> bool {
        required_env_present(config::GATEWAY_SECRET_KEY_ENV)
            && required_env_present(config::GATEWAY_BASE_URL_ENV)
    }

    pub fn from_env() -> Result<Self, GatewayError> {
        let secret_key = env_required(config::GATEWAY_SECRET_KEY_ENV)?;
        let base_url = env_required(config::GATEWAY_BASE_URL_ENV)?;
        let callback_url = env_or_default(
            config::GATEWAY_CALLBACK_URL_ENV,
            config::DEFAULT_GATEWAY_CALLBACK_URL,
        );
        Self::new(base_url, secret_key, callback_url)
    }

    pub fn new(
        base_url: String,
        secret_key: String,
        callback_url: String,
    ) -> Result<Self, GatewayError> {
        Url::parse(&callback_url).map_err(|e| {
            GatewayError::InvalidConfig(format!("callback URL {callback_url:?} is invalid: {e}"))
        })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| GatewayError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            secret_key,
            callback_url,
            http,
        })
    }

    /// Initialize a hosted checkout charge and return the redirect target.
    ///
    /// A failure here is non-retryable with the same reference; the caller
    /// rolls back the pending ledger rows and starts over with a fresh one.
    pub async fn initialize_charge(
        &self,
        request: InitializeChargeRequest<'_>,
    ) -> Result<ChargeAuthorization, GatewayError> {
        let payload = json!({
            "email": request.payer_email,
            "amount": fees::to_minor_units(request.charge_major),
            "currency": request.currency,
            "reference": request.reference,
            "callback_url": self.callback_url,
            "metadata": request.metadata,
        });

        info!(
            reference = %request.reference,
            charge_major = request.charge_major,
            "gateway initialize_charge"
        );

        let response = self.post_json(INITIALIZE_PATH, &payload).await?;
        let data = envelope_data(&response)?;

        let authorization_url = data
            .get("authorization_url")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::InvalidResponse("missing authorization_url in response".to_string())
            })?
            .to_string();

        let access_code = data
            .get("access_code")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::InvalidResponse("missing access_code in response".to_string())
            })?
            .to_string();

        let reference = data
            .get("reference")
            .and_then(Value::as_str)
            .unwrap_or(request.reference)
            .to_string();

        Ok(ChargeAuthorization {
            authorization_url,
            access_code,
            reference,
        })
    }

    /// Query the gateway for a charge's current state. Pure read, safe to
    /// call repeatedly for the same reference.
    pub async fn verify_charge(&self, reference: &str) -> Result<GatewayOutcome, GatewayError> {
        let response = self
            .get_json(&format!("{VERIFY_PATH}/{reference}"))
            .await?;
        let data = envelope_data(&response)?;
        parse_outcome(data)
    }

    /// Check a webhook delivery's HMAC-SHA512 signature against the raw
    /// body. Constant-time; must pass before any side effect runs.
    pub fn verify_webhook_signature(&self, raw_body: &[u8], signature_header: &str) -> bool {
        webhook::verify_signature(&self.secret_key, raw_body, signature_header)
    }

    async fn get_json(&self, path: &str) -> Result<Value, GatewayError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url.trim_end_matches('/'), path))
            .header("Authorization", format!("Bearer {}", self.secret_key))
            .send()
            .await
            .map_err(|e| GatewayError::Request(format!("GET {path} failed: {e}")))?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status { code, body });
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("GET {path} invalid JSON: {e}")))
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, GatewayError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url.trim_end_matches('/'), path))
            .header("Authorization", format!("Bearer {}", self.secret_key))
            .json(payload)
            .send()
            .await
            .map_err(|e| GatewayError::Request(format!("POST {path} failed: {e}")))?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status { code, body });
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("POST {path} invalid JSON: {e}")))
    }
}

/// Unwrap the gateway's `{status, message, data}` envelope.
fn envelope_data(response: &Value) -> Result<&Value, GatewayError> {
    let ok = response
        .get("status")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !ok {
        let message = response
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(GatewayError::InvalidResponse(format!(
            "gateway reported failure: {message}"
        )));
    }
    response
        .get("data")
        .ok_or_else(|| GatewayError::InvalidResponse("missing data in response".to_string()))
}

/// Map a charge data object into a [`GatewayOutcome`].
pub fn parse_outcome(data: &Value) -> Result<GatewayOutcome, GatewayError> {
    let raw_status = data
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            GatewayError::InvalidResponse("missing charge status in response".to_string())
        })?
        .to_string();

    let amount_minor = data.get("amount").and_then(Value::as_u64).ok_or_else(|| {
        GatewayError::InvalidResponse("missing charge amount in response".to_string())
    })?;

    let currency = data
        .get("currency")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_CURRENCY)
        .to_ascii_uppercase();

    let paid_at = data
        .get("paid_at")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let channel = data
        .get("channel")
        .and_then(Value::as_str)
        .map(str::to_string);

    let failure_reason = data
        .get("gateway_response")
        .and_then(Value::as_str)
        .map(str::to_string);

    let status = map_charge_status(&raw_status);

    Ok(GatewayOutcome {
        status,
        raw_status,
        amount_minor,
        currency,
        paid_at,
        channel,
        instrument: describe_instrument(data),
        failure_reason: match status {
            ChargeStatus::Failed => failure_reason,
            _ => None,
        },
    })
}

/// Map the gateway's raw status string onto the charge state machine.
///
/// `success` is the gateway's sole success sentinel. Statuses the gateway
/// documents as terminal failures map to `Failed`; anything else is still
/// in flight.
pub fn map_charge_status(raw_status: &str) -> ChargeStatus {
    let status = raw_status.trim().to_ascii_lowercase();
    match status.as_str() {
        "success" => ChargeStatus::Success,
        "failed" | "abandoned" | "reversed" => ChargeStatus::Failed,
        _ => ChargeStatus::Pending,
    }
}

/// Summarize the paying instrument from the authorization object, when the
/// gateway included one.
fn describe_instrument(data: &Value) -> Option<String> {
    let authorization = data.get("authorization")?;

    if let (Some(brand), Some(last4)) = (
        authorization.get("brand").and_then(Value::as_str),
        authorization.get("last4").and_then(Value::as_str),
    ) {
        return Some(format!("{brand} ****{last4}"));
    }

    authorization
        .get("mobile_money_number")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn required_env_present(name: &str) -> bool {
    env_optional(name).is_some()
}

fn env_required(name: &'static str) -> Result<String, GatewayError> {
    env_optional(name).ok_or(GatewayError::MissingConfig(name))
}

fn env_optional(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }
        Err(_) => None,
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
