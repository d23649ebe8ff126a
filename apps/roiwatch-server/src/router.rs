use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{api_events, api_state, AppState};

pub(crate) mod paths {
    pub const EVENTS: &str = "/events";
    pub const HEALTHZ: &str = "/healthz";
    pub const STATE_LOG: &str = "/state/log";
    pub const STATE_SUMMARY: &str = "/state/summary";
}

pub(crate) fn build(state: AppState) -> Router {
    Router::new()
        .route(paths::EVENTS, get(api_events::events_sse))
        .route(paths::HEALTHZ, get(api_state::healthz))
        .route(paths::STATE_LOG, get(api_state::state_log))
        .route(paths::STATE_SUMMARY, get(api_state::state_summary))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
