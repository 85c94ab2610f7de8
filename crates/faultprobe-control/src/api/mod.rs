//! Probe API handlers.
//!
//! - `GET  /v1/probes`              : names and counters of every probe
//! - `GET  /v1/probes/:name`        : full policy snapshot
//! - `PUT  /v1/probes/:name`        : apply a setup string (request body)
//! - `GET  /v1/probes/:name/:attr`  : one attribute as text
//! - `PUT  /v1/probes/:name/:attr`  : write one attribute (request body)
//!
//! Errors are returned as `{"code": "...", "msg": "..."}`.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use faultprobe_core::error::{ErrorCode, FaultError};
use faultprobe_core::{PolicyConfig, PolicyState};

use crate::app_state::AppState;
use crate::attrs::{self, Attr};

/// Attribute values and setup strings are short; anything larger is a mistake.
pub const MAX_BODY_BYTES: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Fault(#[from] FaultError),

    #[error("request body too large: {0} bytes (max {max})", max = MAX_BODY_BYTES)]
    BodyTooLarge(usize),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::Fault(e) => e.code(),
            ApiError::BodyTooLarge(_) => ErrorCode::OutOfRange,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code() {
            ErrorCode::Parse | ErrorCode::OutOfRange => StatusCode::BAD_REQUEST,
            ErrorCode::UnknownAttribute | ErrorCode::UnknownProbe => StatusCode::NOT_FOUND,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "code": self.code().as_str(), "msg": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ProbeSummary {
    pub name: String,
    pub attempts: u64,
    pub injected: u64,
    pub times: i64,
}

#[derive(Debug, Serialize)]
pub struct ProbeView {
    pub name: String,
    pub policy: PolicyConfig,
    pub attempts: u64,
    pub injected: u64,
    pub countdown: u64,
    pub reports_suppressed: u64,
    pub attributes: BTreeMap<&'static str, String>,
}

impl ProbeView {
    fn of(policy: &PolicyState) -> Self {
        Self {
            name: policy.name().to_string(),
            policy: policy.snapshot(),
            attempts: policy.attempts(),
            injected: policy.injected(),
            countdown: policy.countdown(),
            reports_suppressed: policy.ratelimit().missed(),
            attributes: attrs::dump(policy)
                .into_iter()
                .map(|(a, v)| (a.as_str(), v))
                .collect(),
        }
    }
}

pub async fn list_probes(State(state): State<AppState>) -> Json<Vec<ProbeSummary>> {
    let out = state
        .registry()
        .probes()
        .iter()
        .map(|p| ProbeSummary {
            name: p.name().to_string(),
            attempts: p.attempts(),
            injected: p.injected(),
            times: p.times(),
        })
        .collect();
    Json(out)
}

pub async fn get_probe(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ProbeView>, ApiError> {
    let policy = state.registry().get(&name)?;
    Ok(Json(ProbeView::of(&policy)))
}

pub async fn setup_probe(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: String,
) -> Result<Json<ProbeView>, ApiError> {
    let res = apply_setup(&state, &name, &body);
    match &res {
        Ok(_) => state.metrics().setup_requests.inc(&[("result", "ok")]),
        Err(e) => state
            .metrics()
            .setup_requests
            .inc(&[("result", e.code().as_str())]),
    }
    res
}

fn apply_setup(state: &AppState, name: &str, body: &str) -> Result<Json<ProbeView>, ApiError> {
    check_body(body)?;
    let policy = state.registry().get(name)?;
    policy.setup(body)?;
    Ok(Json(ProbeView::of(&policy)))
}

pub async fn get_attr(
    State(state): State<AppState>,
    Path((name, attr)): Path<(String, String)>,
) -> Result<String, ApiError> {
    let policy = state.registry().get(&name)?;
    let attr: Attr = attr.parse()?;
    Ok(format!("{}\n", attrs::read(&policy, attr)))
}

pub async fn put_attr(
    State(state): State<AppState>,
    Path((name, attr)): Path<(String, String)>,
    body: String,
) -> Result<String, ApiError> {
    match write_attr(&state, &name, &attr, &body) {
        Ok((attr, value)) => {
            state
                .metrics()
                .attr_writes
                .inc(&[("probe", name.as_str()), ("attr", attr.as_str())]);
            tracing::info!(probe = %name, %attr, %value, "attribute updated");
            Ok(format!("{value}\n"))
        }
        Err(e) => {
            state
                .metrics()
                .attr_write_errors
                .inc(&[("code", e.code().as_str())]);
            tracing::warn!(probe = %name, %attr, error = %e, "attribute write rejected");
            Err(e)
        }
    }
}

fn write_attr(
    state: &AppState,
    name: &str,
    attr: &str,
    body: &str,
) -> Result<(Attr, String), ApiError> {
    check_body(body)?;
    let policy = state.registry().get(name)?;
    let attr: Attr = attr.parse()?;
    attrs::write(&policy, attr, body)?;
    Ok((attr, attrs::read(&policy, attr)))
}

fn check_body(body: &str) -> Result<(), ApiError> {
    if body.len() > MAX_BODY_BYTES {
        return Err(ApiError::BodyTooLarge(body.len()));
    }
    Ok(())
}
