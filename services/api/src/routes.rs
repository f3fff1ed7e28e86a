//! Read-only REST endpoints over stored interviews and reports.

use crate::state::AppState;
use anyhow::Context;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use interview_core::storage::valid_session_id;
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid session id '{0}'")]
    InvalidId(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidId(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(e) => {
                tracing::error!("request failed: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match &self {
            Self::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn checked(id: String) -> Result<String, ApiError> {
    if valid_session_id(&id) {
        Ok(id)
    } else {
        Err(ApiError::InvalidId(id))
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "running",
        "service": "interview-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Capture settings the browser client uses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    /// Seconds.
    pub max_duration: u32,
    /// Milliseconds between screen captures.
    pub frame_interval: u32,
    pub audio_format: &'static str,
    pub sample_rate: u32,
}

pub async fn client_config() -> Json<ClientSettings> {
    Json(ClientSettings {
        max_duration: 30 * 60,
        frame_interval: 2000,
        audio_format: "webm/opus",
        sample_rate: 16_000,
    })
}

pub async fn list_interviews(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let interviews = state.store.list().await?;
    Ok(Json(json!({
        "total": interviews.len(),
        "interviews": interviews,
    })))
}

pub async fn get_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = checked(id)?;
    let record = state
        .store
        .load(&id)
        .await?
        .ok_or(ApiError::NotFound("interview"))?;
    Ok(Json(serde_json::to_value(record).context("serializing interview")?))
}

pub async fn list_reports(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let reports = state.renderer.list().await?;
    Ok(Json(json!({
        "total": reports.len(),
        "reports": reports,
    })))
}

/// Serves a rendered report, rendering it from the stored summary if the
/// file is gone.
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = checked(id)?;
    let path = match state.renderer.find(&id).await? {
        Some(path) => path,
        None => {
            let record = state.store.load(&id).await?;
            let Some((summary, history)) = record.and_then(|r| r.summary.map(|s| (s, r.history)))
            else {
                return Err(ApiError::NotFound("report"));
            };
            tracing::info!("rendering missing report for {}", id);
            state.renderer.render(&summary, &id, &history).await?
        }
    };

    let body = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"interview_report_{id}.md\""),
            ),
        ],
        body,
    )
        .into_response())
}
