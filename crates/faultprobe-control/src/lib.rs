//! faultprobe control surface.
//!
//! Exposes every registered probe point's policy as a tree of named
//! attributes (`/v1/probes/<probe>/<attribute>`), accepts the compact setup
//! string, loads initial policies from YAML, and serves Prometheus-style
//! counters. The decision engine never depends on this crate: if the control
//! plane cannot be created, probes keep evaluating with whatever policy they
//! were built with.

pub mod api;
pub mod app_state;
pub mod attrs;
pub mod config;
pub mod obs;
pub mod ops;
pub mod registry;
pub mod router;

use std::net::SocketAddr;

use faultprobe_core::error::{FaultError, Result};

/// Bind `listen` and serve the control API until the server stops.
pub async fn serve(state: app_state::AppState, listen: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| FaultError::Unavailable(format!("bind {listen} failed: {e}")))?;

    tracing::info!(%listen, probes = state.registry().len(), "faultprobe-control listening");
    axum::serve(listener, router::build_router(state))
        .await
        .map_err(|e| FaultError::Internal(format!("control server failed: {e}")))
}
