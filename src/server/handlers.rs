//! Request handlers for the export API.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::AppState;
use crate::{
    export::{ExportError, ExportRequest},
    kmz::archive::KMZ_MEDIA_TYPE,
};

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// List the configured service profiles.
pub async fn services(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.profiles.as_ref().clone())
}

impl IntoResponse for ExportError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status.is_server_error() {
            log::error!("{}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for ExportError {
    fn from(rejection: JsonRejection) -> Self {
        ExportError::InvalidRequest(rejection.body_text())
    }
}

/// Export the requested lot/plans as a KMZ download.
///
/// The request is validated before anything is queried. The export itself makes blocking
/// feature service calls, so it runs on the blocking thread pool.
pub async fn export_kmz(
    State(state): State<AppState>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Response, ExportError> {
    let Json(request) = payload?;
    let plan = request.validate(&state.profiles)?;
    let source = state.source.clone();
    let kmz = tokio::task::spawn_blocking(move || plan.run(source.as_ref()))
        .await
        .map_err(|err| ExportError::Upstream(anyhow::anyhow!("Export task failed: {}", err)))??;

    Ok((
        [
            (header::CONTENT_TYPE, KMZ_MEDIA_TYPE),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"export.kmz\""),
        ],
        kmz,
    )
        .into_response())
}
