use anyhow::Result;
use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::DosageServiceError;

/// Shape checks that serde alone cannot express.
pub(crate) trait Validate {
    fn validate(&self) -> Result<()>;
}

/// JSON body that has been deserialized and validated. Any mismatch is
/// rejected with 422 before the handler runs.
pub(crate) struct ValidatedJson<T>(pub(crate) T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = DosageServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_to_error)?;
        value.validate().map_err(|err| {
            DosageServiceError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        })?;
        Ok(ValidatedJson(value))
    }
}

fn rejection_to_error(rejection: JsonRejection) -> DosageServiceError {
    let status = match &rejection {
        JsonRejection::JsonDataError(_)
        | JsonRejection::JsonSyntaxError(_)
        | JsonRejection::MissingJsonContentType(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => rejection.status(),
    };
    DosageServiceError::new(status, rejection.body_text())
}
