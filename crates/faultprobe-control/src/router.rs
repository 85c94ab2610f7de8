//! Axum router wiring.

use axum::{routing::get, Router};

use crate::{api, app_state::AppState, ops};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/probes", get(api::list_probes))
        .route("/v1/probes/:name", get(api::get_probe).put(api::setup_probe))
        .route("/v1/probes/:name/:attr", get(api::get_attr).put(api::put_attr))
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
