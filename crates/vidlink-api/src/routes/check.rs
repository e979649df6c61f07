use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use vidlink_core::{CheckReport, IndicatorSnapshot, PreviewSnapshot};

use super::UrlRequest;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CheckResponse {
    #[serde(flatten)]
    pub report: CheckReport,
    pub live: bool,
    pub indicator: IndicatorSnapshot,
    pub preview: PreviewSnapshot,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/check", post(check_link))
        .route("/indicator", get(get_indicator))
        .route("/preview", get(get_preview))
}

/// POST /api/v1/check
///
/// Invalid input is still a completed check, so it answers 200 with
/// `result: "invalid"` rather than an error status.
async fn check_link(
    State(state): State<AppState>,
    Json(body): Json<UrlRequest>,
) -> Json<CheckResponse> {
    let report = state.checker.check(&body.url).await;
    let live = report.result.is_live();

    Json(CheckResponse {
        report,
        live,
        indicator: state.checker.indicator().snapshot(),
        preview: state.checker.preview().snapshot().await,
    })
}

/// GET /api/v1/indicator
async fn get_indicator(State(state): State<AppState>) -> Json<IndicatorSnapshot> {
    Json(state.checker.indicator().snapshot())
}

/// GET /api/v1/preview
async fn get_preview(State(state): State<AppState>) -> Json<PreviewSnapshot> {
    Json(state.checker.preview().snapshot().await)
}
