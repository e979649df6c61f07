use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use vidlink_core::{AddOutcome, ListEntry, RecheckSummary};

use super::UrlRequest;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct VideosResponse {
    pub id: Uuid,
    pub state: String,
    pub last_recheck: Option<String>,
    pub recheck_interval_ms: u64,
    pub entries: Vec<ListEntry>,
}

#[derive(Serialize)]
pub struct AddVideoResponse {
    #[serde(flatten)]
    pub outcome: AddOutcome,
    pub message: String,
    pub entries: Vec<ListEntry>,
}

#[derive(Serialize)]
pub struct RecheckResponse {
    #[serde(flatten)]
    pub summary: RecheckSummary,
    pub entries: Vec<ListEntry>,
}

#[derive(Serialize)]
pub struct LifecycleResponse {
    pub message: String,
    pub state: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/videos", post(add_video).get(list_videos))
        .route("/videos/recheck", post(recheck_videos))
        .route("/videos/start", post(start_recheck))
        .route("/videos/stop", post(stop_recheck))
}

/// GET /api/v1/videos
async fn list_videos(State(state): State<AppState>) -> Json<VideosResponse> {
    let list = &state.list;
    Json(VideosResponse {
        id: list.id(),
        state: list.state().await.to_string(),
        last_recheck: list.last_recheck().await.map(|t| t.to_rfc3339()),
        recheck_interval_ms: list.config().recheck_interval.as_millis() as u64,
        entries: list.entries().await,
    })
}

/// POST /api/v1/videos
async fn add_video(
    State(state): State<AppState>,
    Json(body): Json<UrlRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.list.add(&body.url).await;

    let (status, message) = match &outcome {
        AddOutcome::Rejected { result } => {
            return Err(ApiError::BadRequest(result.message().to_string()));
        }
        AddOutcome::Added { result } => (StatusCode::CREATED, result.message().to_string()),
        AddOutcome::Rechecked { result } => (StatusCode::OK, result.message().to_string()),
        AddOutcome::AlreadyChecking => (StatusCode::OK, "Link is already being checked".into()),
    };

    let resp = AddVideoResponse {
        outcome,
        message,
        entries: state.list.entries().await,
    };
    Ok((status, Json(resp)))
}

/// POST /api/v1/videos/recheck
async fn recheck_videos(State(state): State<AppState>) -> Json<RecheckResponse> {
    let summary = state.list.recheck_all().await;
    Json(RecheckResponse {
        summary,
        entries: state.list.entries().await,
    })
}

/// POST /api/v1/videos/start
async fn start_recheck(State(state): State<AppState>) -> Result<Json<LifecycleResponse>, ApiError> {
    state.list.start().await?;
    Ok(Json(LifecycleResponse {
        message: "Periodic recheck started".into(),
        state: state.list.state().await.to_string(),
    }))
}

/// POST /api/v1/videos/stop
async fn stop_recheck(State(state): State<AppState>) -> Json<LifecycleResponse> {
    state.list.stop().await;
    Json(LifecycleResponse {
        message: "Periodic recheck stopping".into(),
        state: state.list.state().await.to_string(),
    })
}
