//! Session gateway and status endpoints

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::error::ApiError;
use super::ServerState;
use crate::discovery::{ObservableKind, ObservedValue};
use crate::engine::{Command, InstanceId, Jid};
use crate::error::Error;
use crate::session::{qr, LoginState, SessionClient};

type ApiResult<T> = std::result::Result<T, ApiError>;

pub async fn health() -> &'static str {
    "OK"
}

fn session_of(state: &ServerState) -> ApiResult<&Arc<SessionClient>> {
    state
        .backend
        .session()
        .ok_or_else(|| ApiError(Error::NotFound("browser session is not enabled".to_string())))
}

/// Initialize the browser and resolve the login state
pub async fn start_session(State(state): State<ServerState>) -> ApiResult<Response> {
    let session = session_of(&state)?;
    let response = match session.start().await? {
        LoginState::LoggedIn => Json(json!({ "status": "logged_in" })).into_response(),
        LoginState::AwaitingQr(png) => Json(json!({
            "status": "awaiting_qr",
            "qr": qr::encode_base64(&png),
        }))
        .into_response(),
        LoginState::Error(failure) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": failure.to_string() })),
        )
            .into_response(),
    };
    Ok(response)
}

pub async fn session_status(State(state): State<ServerState>) -> ApiResult<Json<Value>> {
    let session = session_of(&state)?;
    let phase = session.refresh_status().await;
    let logged_in = session.is_logged_in().await;
    Ok(Json(json!({
        "account": session.account(),
        "status": phase,
        "logged_in": logged_in,
    })))
}

/// Last QR code as a PNG image
pub async fn session_qr(State(state): State<ServerState>) -> ApiResult<Response> {
    let session = session_of(&state)?;
    match session.last_qr().await {
        Some(png) => Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response()),
        None => Err(ApiError(Error::NotFound("no QR code is pending".to_string()))),
    }
}

#[derive(Serialize)]
struct AccountStatus {
    id: InstanceId,
    account: String,
    status: String,
    presence: String,
    last_seen: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn account_status(State(state): State<ServerState>) -> Json<Value> {
    let snapshot = state.coordinator.snapshot();
    let accounts: Vec<AccountStatus> = snapshot
        .instances()
        .iter()
        .map(|i| AccountStatus {
            id: i.id,
            account: i.name.clone(),
            status: i.status.clone(),
            presence: i.presence.clone().unwrap_or_else(|| "unknown".to_string()),
            last_seen: i.last_seen,
        })
        .collect();
    Json(json!(accounts))
}

#[derive(Serialize)]
struct ObservableView {
    unique_id: String,
    name: String,
    kind: ObservableKind,
    instance_id: InstanceId,
    jid: Option<Jid>,
    value: ObservedValue,
    attributes: Map<String, Value>,
}

/// Every discovered observable with its current value
pub async fn observables(State(state): State<ServerState>) -> Json<Value> {
    let snapshot = state.coordinator.snapshot();
    let views: Vec<ObservableView> = state
        .discovery
        .read_all(&snapshot)
        .into_iter()
        .map(|(observable, value)| ObservableView {
            attributes: observable.attributes(&snapshot),
            unique_id: observable.unique_id,
            name: observable.name,
            kind: observable.key.kind,
            instance_id: observable.key.instance_id,
            jid: observable.key.jid,
            value,
        })
        .collect();
    Json(json!({
        "fetched_at": snapshot.fetched_at(),
        "observables": views,
    }))
}

/// Run a host service call (`{"service": "send_message", ...}`)
pub async fn call_service(
    State(state): State<ServerState>,
    Json(command): Json<Command>,
) -> ApiResult<Json<Value>> {
    tracing::info!(service = command.service_name(), backend = %state.backend.kind(), "Service call");
    let service = command.service_name();
    let reply = state.backend.call_service(command).await?;
    Ok(Json(json!({
        "service": service,
        "result": reply,
    })))
}
