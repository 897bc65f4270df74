// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

use std::env;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shambalink_core::{
    api::router,
    gateway::{GatewayClient, GatewayError},
    ledger::LedgerDb,
    state::AppState,
    storage::{FileStore, StoragePaths},
    sweeper::ReconcileSweeper,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let paths = StoragePaths::from_env();
    let mut store = FileStore::new(paths.clone());
    store
        .initialize()
        .expect("profile store initialization failed");
    let ledger = LedgerDb::open(&paths.ledger_file()).expect("ledger database failed to open");

    // Payments need the gateway; everything else works without it, so a
    // missing configuration only degrades the payment endpoints to 503.
    let gateway = match GatewayClient::from_env() {
        Ok(client) => Some(client),
        Err(GatewayError::MissingConfig(var)) => {
            warn!(
                missing = var,
                "gateway not configured; payment endpoints will answer 503"
            );
            None
        }
        Err(err) => panic!("gateway configuration invalid: {err}"),
    };

    let state = AppState::new(ledger, store, gateway);
    let app = router(state.clone());

    let shutdown = CancellationToken::new();
    if let Some(gateway) = state.gateway.clone() {
        let sweeper = ReconcileSweeper::from_env(state.ledger.clone(), gateway);
        tokio::spawn(sweeper.run(shutdown.clone()));
    } else {
        info!("reconciliation sweeper disabled (no gateway configured)");
    }

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    info!(%addr, "ShambaLink core listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("Server failed");
}

/// Resolve on SIGINT or SIGTERM and cancel the background-task token so
/// the sweeper stops at a clean point.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
    token.cancel();
}
