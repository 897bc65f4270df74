// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for ledger + profile storage | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `GATEWAY_SECRET_KEY` | Payment gateway secret (charges + webhook HMAC) | Required for payments |
//! | `GATEWAY_BASE_URL` | Payment gateway API base URL | Required for payments |
//! | `GATEWAY_CALLBACK_URL` | Browser return URL after checkout | `http://localhost:8080/payments/callback` |
//! | `SWEEP_INTERVAL_SECS` | Seconds between reconciliation sweeps | `300` |
//! | `SWEEP_MIN_AGE_SECS` | Minimum age before a pending payment is swept | `600` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

/// Environment variable name for the data directory path.
///
/// The ledger database (`ledger.redb`) and the farmer/adopter profile
/// documents all live under this directory.
///
/// # Default
/// `/data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the gateway secret key.
///
/// Used both as the bearer credential for gateway API calls and as the
/// HMAC-SHA512 key for webhook signature verification. When unset, payment
/// initialization and verification endpoints respond `503`; the rest of the
/// service stays up.
pub const GATEWAY_SECRET_KEY_ENV: &str = "GATEWAY_SECRET_KEY";

/// Environment variable name for the gateway API base URL.
pub const GATEWAY_BASE_URL_ENV: &str = "GATEWAY_BASE_URL";

/// Environment variable name for the checkout callback URL.
///
/// The gateway redirects the payer's browser here after checkout, appending
/// the payment reference as a query parameter.
pub const GATEWAY_CALLBACK_URL_ENV: &str = "GATEWAY_CALLBACK_URL";

/// Environment variable name for the reconciliation sweep interval.
pub const SWEEP_INTERVAL_SECS_ENV: &str = "SWEEP_INTERVAL_SECS";

/// Environment variable name for the minimum pending age before sweeping.
pub const SWEEP_MIN_AGE_SECS_ENV: &str = "SWEEP_MIN_AGE_SECS";

/// Default checkout callback URL for local development.
pub const DEFAULT_GATEWAY_CALLBACK_URL: &str = "http://localhost:8080/payments/callback";

/// Default seconds between reconciliation sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Default minimum age (seconds) before a pending payment is re-verified.
pub const DEFAULT_SWEEP_MIN_AGE_SECS: u64 = 600;
