use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

// Taken from https://github.com/tokio-rs/axum/blob/main/examples/anyhow-error-response/src/main.rs
#[derive(Debug)]
pub struct DosageServiceError {
    pub status: StatusCode,
    pub message: HttpErrorResponse,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HttpErrorResponse {
    pub(crate) detail: String,
}

impl DosageServiceError {
    pub fn new(status: StatusCode, message: impl Into<HttpErrorResponse>) -> Self {
        DosageServiceError {
            status,
            message: message.into(),
        }
    }
}

impl From<String> for HttpErrorResponse {
    fn from(message: String) -> Self {
        HttpErrorResponse { detail: message }
    }
}

impl From<&str> for HttpErrorResponse {
    fn from(message: &str) -> Self {
        HttpErrorResponse {
            detail: message.to_string(),
        }
    }
}

impl IntoResponse for DosageServiceError {
    fn into_response(self) -> Response {
        let mut res = Json(self.message).into_response();
        *res.status_mut() = self.status;
        res
    }
}

impl<E> From<E> for DosageServiceError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        DosageServiceError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: HttpErrorResponse::from(err.into().to_string()),
        }
    }
}

pub type ServiceResult<T, E = DosageServiceError> = Result<T, E>;

#[macro_export]
macro_rules! bail_service {
    ($status:expr, $message:literal) => {
        return Err($crate::error::DosageServiceError::new($status, $message))
    };
    ($status:expr, $fmt:literal $(, $arg:expr)+ $(,)?) => {
        return Err($crate::error::DosageServiceError::new(
            $status,
            format!($fmt $(, $arg)+),
        ))
    };
}
