use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::artifact::loader::LoadState;
use crate::bail_service;
use crate::error::ServiceResult;

pub(crate) const STATUS_OK_MESSAGE: &str = "API is running and model loaded successfully.";

#[derive(Serialize, Debug)]
pub(crate) struct StatusResponse {
    pub(crate) status: String,
}

#[axum_macros::debug_handler]
pub(crate) async fn handle_status_request(
    State(state): State<AppState>,
) -> ServiceResult<(StatusCode, Json<StatusResponse>)> {
    match state.load_state.as_ref() {
        LoadState::Loaded(_) => Ok((
            StatusCode::OK,
            Json(StatusResponse {
                status: STATUS_OK_MESSAGE.to_string(),
            }),
        )),
        LoadState::Failed(error) => bail_service!(
            StatusCode::INTERNAL_SERVER_ERROR,
            "API is running, but model failed to load: {}",
            error
        ),
    }
}
