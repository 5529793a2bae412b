use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::artifact::loader::LoadState;

pub(crate) mod predict;
pub(crate) mod status;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) load_state: Arc<LoadState>,
}

impl AppState {
    pub(crate) fn new(load_state: LoadState) -> Self {
        AppState {
            load_state: Arc::new(load_state),
        }
    }
}

pub(crate) fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(status::handle_status_request))
        .route(
            "/predict",
            post(predict::handle_predict_request).layer(DefaultBodyLimit::max(body_limit)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
