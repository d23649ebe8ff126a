use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use roiwatch_core::FeedSummary;
use serde::Deserialize;
use serde_json::json;

use crate::tail;
use crate::AppState;

const DEFAULT_LOG_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
}

pub async fn healthz() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

pub async fn state_summary(State(state): State<AppState>) -> Json<FeedSummary> {
    Json(state.feed.lock().await.summary())
}

/// Detection log rows, newest first.
pub async fn state_log(State(state): State<AppState>, Query(q): Query<LogQuery>) -> Response {
    let read = match tail::read_log(&state.log_path, 0).await {
        Ok(read) => read,
        Err(err) => {
            tracing::error!("reading detection log failed: {err:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "type": "about:blank",
                    "title": "Internal Server Error",
                    "status": 500,
                    "detail": "detection log unavailable"
                })),
            )
                .into_response();
        }
    };
    let mut rows = read.rows;
    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    rows.truncate(q.limit.unwrap_or(DEFAULT_LOG_LIMIT));
    Json(json!({ "data": rows })).into_response()
}
