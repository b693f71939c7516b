//! REST API handlers.
//!
//! Each handler goes through the `AppController` and returns JSON responses.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::warn;

use dockyard_core::{DefinitionError, Fingerprint};
use dockyard_reconcile::{
    Action, AppView, ContainerStatus, DefinitionDiff, ReconcileError, UpdateReport,
};
use dockyard_state::{AppId, AppRecord, StateError};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// HTTP status for a controller error.
pub fn status_for(err: &ReconcileError) -> StatusCode {
    match err {
        ReconcileError::Definition(DefinitionError::Fingerprint(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ReconcileError::Definition(_) => StatusCode::BAD_REQUEST,
        ReconcileError::NotFound(_) => StatusCode::NOT_FOUND,
        ReconcileError::Conflict(_) | ReconcileError::State(StateError::Conflict(_)) => {
            StatusCode::CONFLICT
        }
        ReconcileError::Probe { .. } | ReconcileError::Action { .. } => StatusCode::BAD_GATEWAY,
        ReconcileError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reconcile_error(err: ReconcileError) -> axum::response::Response {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!(error = %err, %status, "request failed");
    }
    error_response(&err.to_string(), status).into_response()
}

// ── Views ──────────────────────────────────────────────────────

/// One row of the application list.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppSummary {
    pub id: AppId,
    pub name: String,
    pub fingerprint: Fingerprint,
    pub created_at: u64,
    pub updated_at: u64,
}

impl From<AppRecord> for AppSummary {
    fn from(r: AppRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            fingerprint: r.fingerprint,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// A service and the container currently backing it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub image: String,
    /// Mounts rendered as `source:target`.
    pub volumes: Vec<String>,
    pub status: ContainerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppDetail {
    #[serde(flatten)]
    pub app: AppSummary,
    pub services: Vec<ServiceStatus>,
}

impl From<AppView> for AppDetail {
    fn from(view: AppView) -> Self {
        let services = view
            .services
            .into_iter()
            .map(|link| ServiceStatus {
                volumes: link.service.volumes.iter().map(ToString::to_string).collect(),
                name: link.service.name,
                image: link.service.image,
                status: link.status,
                container_id: link.container.map(|c| c.id),
            })
            .collect();
        Self {
            app: view.record.into(),
            services,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FingerprintChange {
    pub old: Fingerprint,
    pub new: Fingerprint,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub fingerprint: FingerprintChange,
    pub did_update: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<DefinitionDiff>,
    pub actions: Vec<Action>,
}

impl From<UpdateReport> for UpdateResponse {
    fn from(r: UpdateReport) -> Self {
        Self {
            fingerprint: FingerprintChange {
                old: r.old_fingerprint,
                new: r.new_fingerprint,
            },
            did_update: r.did_update,
            diff: r.diff,
            actions: r.actions,
        }
    }
}

// ── Applications ───────────────────────────────────────────────

/// GET /api/v1/apps
pub async fn list_apps(State(state): State<ApiState>) -> impl IntoResponse {
    match state.controller.list() {
        Ok(records) => {
            let apps: Vec<AppSummary> = records.into_iter().map(Into::into).collect();
            ApiResponse::ok(apps).into_response()
        }
        Err(e) => reconcile_error(e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterParams {
    pub name: Option<String>,
}

/// POST /api/v1/apps
pub async fn register_app(
    State(state): State<ApiState>,
    Query(params): Query<RegisterParams>,
    body: String,
) -> impl IntoResponse {
    match state.controller.register(&body, params.name.as_deref()) {
        Ok(record) => {
            (StatusCode::CREATED, ApiResponse::ok(AppSummary::from(record))).into_response()
        }
        Err(e) => reconcile_error(e),
    }
}

/// GET /api/v1/apps/{id}
pub async fn get_app(State(state): State<ApiState>, Path(id): Path<AppId>) -> impl IntoResponse {
    match state.controller.inspect(id).await {
        Ok(view) => ApiResponse::ok(AppDetail::from(view)).into_response(),
        Err(e) => reconcile_error(e),
    }
}

/// DELETE /api/v1/apps/{id}
pub async fn delete_app(
    State(state): State<ApiState>,
    Path(id): Path<AppId>,
) -> impl IntoResponse {
    match state.controller.delete(id).await {
        Ok(report) => ApiResponse::ok(report).into_response(),
        Err(e) => reconcile_error(e),
    }
}

// ── Lifecycle ──────────────────────────────────────────────────

/// POST /api/v1/apps/{id}/start
pub async fn start_app(State(state): State<ApiState>, Path(id): Path<AppId>) -> impl IntoResponse {
    match state.controller.start(id).await {
        Ok(report) => ApiResponse::ok(report).into_response(),
        Err(e) => reconcile_error(e),
    }
}

/// POST /api/v1/apps/{id}/stop
pub async fn stop_app(State(state): State<ApiState>, Path(id): Path<AppId>) -> impl IntoResponse {
    match state.controller.stop(id).await {
        Ok(report) => ApiResponse::ok(report).into_response(),
        Err(e) => reconcile_error(e),
    }
}

/// POST /api/v1/apps/{id}/update
pub async fn update_app(
    State(state): State<ApiState>,
    Path(id): Path<AppId>,
    body: String,
) -> impl IntoResponse {
    match state.controller.update(id, &body).await {
        Ok(report) => ApiResponse::ok(UpdateResponse::from(report)).into_response(),
        Err(e) => reconcile_error(e),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({ "status": "ok" }))
}
