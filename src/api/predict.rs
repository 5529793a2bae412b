use std::sync::Arc;

use anyhow::{ensure, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::api::AppState;
use crate::artifact::loader::LoadState;
use crate::artifact::{predict_one, FeatureRow};
use crate::bail_service;
use crate::error::{DosageServiceError, ServiceResult};
use crate::extractors::{Validate, ValidatedJson};

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DosageRequest {
    pub(crate) medicine_name: String,
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub(crate) weight: f64,
    /// Accepted for forward compatibility, the current model is not trained on it.
    #[allow(dead_code)]
    #[serde(default, deserialize_with = "optional_number_or_numeric_string")]
    pub(crate) age: Option<f64>,
}

/// Numeric fields may arrive as JSON numbers or as strings holding a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum LaxNumber {
    Number(f64),
    Text(String),
}

impl LaxNumber {
    fn into_f64(self) -> Result<f64, String> {
        match self {
            LaxNumber::Number(value) => Ok(value),
            LaxNumber::Text(text) => match text.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(format!(
                    "invalid number: expected a finite number, got \"{}\"",
                    text
                )),
            },
        }
    }
}

fn number_or_numeric_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<f64, D::Error> {
    LaxNumber::deserialize(deserializer)?
        .into_f64()
        .map_err(serde::de::Error::custom)
}

fn optional_number_or_numeric_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    Option::<LaxNumber>::deserialize(deserializer)?
        .map(LaxNumber::into_f64)
        .transpose()
        .map_err(serde::de::Error::custom)
}

#[derive(Serialize, Debug)]
pub(crate) struct DosagePrediction {
    pub(crate) predicted_dosage_mg: f64,
}

impl Validate for DosageRequest {
    fn validate(&self) -> Result<()> {
        ensure!(
            !self.medicine_name.is_empty(),
            "medicineName must not be empty"
        );
        Ok(())
    }
}

impl From<&DosageRequest> for FeatureRow {
    fn from(request: &DosageRequest) -> Self {
        FeatureRow::new(request.weight, request.medicine_name.as_str())
    }
}

#[axum_macros::debug_handler]
pub(crate) async fn handle_predict_request(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<DosageRequest>,
) -> ServiceResult<(StatusCode, Json<DosagePrediction>)> {
    let predictor = match state.load_state.as_ref() {
        LoadState::Loaded(predictor) => Arc::clone(predictor),
        LoadState::Failed(error) => bail_service!(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Model is not loaded. See server logs for details. Error: {}",
            error
        ),
    };

    let row = FeatureRow::from(&req);
    let prediction = tokio::task::spawn_blocking(move || predict_one(predictor.as_ref(), row))
        .await?
        .map_err(|err| {
            DosageServiceError::new(
                StatusCode::BAD_REQUEST,
                format!("Error during prediction: {}", err),
            )
        })?;

    info!(monotonic_counter.dosage_predictions = 1_u64, "Served dosage prediction");
    Ok((
        StatusCode::OK,
        Json(DosagePrediction {
            predicted_dosage_mg: prediction,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::api::router;
    use crate::api::testing::{post_json, send, RecordingPredictor};
    use crate::artifact::regression::DosageModel;
    use crate::artifact::{InferenceError, Predictor};

    fn loaded(predictor: Arc<RecordingPredictor>) -> AppState {
        AppState::new(LoadState::Loaded(predictor))
    }

    #[tokio::test]
    async fn builds_single_feature_row_and_returns_first_output() {
        let predictor = Arc::new(RecordingPredictor::new(0.375, &["Adrenaline IV"]));
        let app = router(loaded(predictor.clone()), 1024);

        let (status, body) = send(
            app,
            post_json("/predict", r#"{"medicineName": "Adrenaline IV", "weight": 12.5}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "predicted_dosage_mg": 0.375 }));
        assert_eq!(
            predictor.calls(),
            vec![vec![FeatureRow::new(12.5, "Adrenaline IV")]]
        );
    }

    #[tokio::test]
    async fn age_is_accepted_and_ignored() {
        let predictor = Arc::new(RecordingPredictor::new(2.5, &["Atropine"]));
        let state = loaded(predictor.clone());

        let (_, without_age) = send(
            router(state.clone(), 1024),
            post_json("/predict", r#"{"medicineName": "Atropine", "weight": 20}"#),
        )
        .await;
        let (status, with_age) = send(
            router(state.clone(), 1024),
            post_json("/predict", r#"{"medicineName": "Atropine", "weight": 20, "age": 4}"#),
        )
        .await;
        let (_, null_age) = send(
            router(state, 1024),
            post_json(
                "/predict",
                r#"{"medicineName": "Atropine", "weight": 20, "age": null}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(without_age, with_age);
        assert_eq!(without_age, null_age);
        let calls = predictor.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|rows| rows == &calls[0]));
    }

    #[tokio::test]
    async fn schema_mismatches_never_reach_the_model() {
        let predictor = Arc::new(RecordingPredictor::new(1.0, &["Adrenaline IV"]));
        let state = loaded(predictor.clone());

        let bodies = [
            r#"{"medicineName": "Adrenaline IV"}"#,
            r#"{"weight": 12.5}"#,
            r#"{"medicineName": "Adrenaline IV", "weight": "heavy"}"#,
            r#"{"medicineName": "Adrenaline IV", "weight": 12.5, "age": "four"}"#,
            r#"{"medicineName": "", "weight": 12.5}"#,
            r#"{"medicineName": "Adrenaline IV", "weight": "NaN"}"#,
            r#"{"medicineName": "Adrenaline IV", "weight": true}"#,
            r#"{"medicineName": 5, "weight": 12.5}"#,
            r#"{"medicineName": "Adrenaline IV", "weight": "#,
        ];
        for body in bodies {
            let (status, response) =
                send(router(state.clone(), 1024), post_json("/predict", body)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "body: {}", body);
            assert!(response["detail"].is_string(), "body: {}", body);
        }
        assert!(predictor.calls().is_empty());
    }

    #[tokio::test]
    async fn inference_failure_is_a_client_error() {
        let predictor = Arc::new(RecordingPredictor::new(1.0, &["Adrenaline IV"]));
        let app = router(loaded(predictor), 1024);

        let (status, body) = send(
            app,
            post_json("/predict", r#"{"medicineName": "Paracetamol", "weight": 12.5}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({
                "detail": "Error during prediction: Found unknown category 'Paracetamol' in column 'medicine' during transform"
            })
        );
    }

    #[tokio::test]
    async fn unloaded_model_is_a_server_error() {
        let state = AppState::new(LoadState::Failed(
            "artifact is not a valid dosage model".into(),
        ));

        let (status, body) = send(
            router(state, 1024),
            post_json("/predict", r#"{"medicineName": "Adrenaline IV", "weight": 12.5}"#),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["detail"],
            "Model is not loaded. See server logs for details. Error: artifact is not a valid dosage model"
        );
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let predictor = Arc::new(RecordingPredictor::new(1.0, &["Adrenaline IV"]));
        let app = router(loaded(predictor.clone()), 64);
        let body = format!(r#"{{"medicineName": "{}", "weight": 12.5}}"#, "A".repeat(256));

        let response = tower::ServiceExt::oneshot(app, post_json("/predict", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(predictor.calls().is_empty());
    }

    #[tokio::test]
    async fn serves_predictions_from_regression_artifact() {
        let model = DosageModel::from_slice(
            json!({
                "format_version": 1,
                "feature_names": ["weight_kg", "medicine"],
                "intercept": 0.0,
                "weight_coefficient": 0.5,
                "medicine_coefficients": { "Adrenaline IV": 1.0 }
            })
            .to_string()
            .as_bytes(),
        )
        .unwrap();
        let state = AppState::new(LoadState::Loaded(Arc::new(model)));

        let (status, body) = send(
            router(state, 1024),
            post_json("/predict", r#"{"medicineName": "Adrenaline IV", "weight": 12.5}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["predicted_dosage_mg"], json!(7.25));
    }

    #[tokio::test]
    async fn numeric_strings_are_coerced() {
        let predictor = Arc::new(RecordingPredictor::new(0.5, &["Adrenaline IV"]));
        let state = loaded(predictor.clone());

        let (status, from_string) = send(
            router(state.clone(), 1024),
            post_json(
                "/predict",
                r#"{"medicineName": "Adrenaline IV", "weight": "12.5", "age": "4"}"#,
            ),
        )
        .await;
        let (_, from_number) = send(
            router(state, 1024),
            post_json("/predict", r#"{"medicineName": "Adrenaline IV", "weight": 12.5}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(from_string, from_number);
        assert_eq!(
            predictor.calls(),
            vec![
                vec![FeatureRow::new(12.5, "Adrenaline IV")],
                vec![FeatureRow::new(12.5, "Adrenaline IV")],
            ]
        );
    }

    #[tokio::test]
    async fn whitespace_only_medicine_reaches_the_model() {
        let predictor = Arc::new(RecordingPredictor::new(1.0, &["Adrenaline IV"]));
        let app = router(loaded(predictor.clone()), 1024);

        let (status, body) = send(
            app,
            post_json("/predict", r#"{"medicineName": "   ", "weight": 12.5}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Error during prediction: Found unknown category"));
        assert_eq!(predictor.calls(), vec![vec![FeatureRow::new(12.5, "   ")]]);
    }

    /// Panics for one medicine, answers normally for every other.
    struct PanickingPredictor;

    impl Predictor for PanickingPredictor {
        fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, InferenceError> {
            if rows.iter().any(|row| row.medicine == "Crash") {
                panic!("numerical kernel blew up");
            }
            Ok(vec![4.0; rows.len()])
        }

        fn describe(&self) -> String {
            "panicking".into()
        }
    }

    #[tokio::test]
    async fn model_panic_is_a_server_error_and_service_keeps_serving() {
        let state = AppState::new(LoadState::Loaded(Arc::new(PanickingPredictor)));

        let (status, body) = send(
            router(state.clone(), 1024),
            post_json("/predict", r#"{"medicineName": "Crash", "weight": 12.5}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].is_string());

        let (status, body) = send(
            router(state, 1024),
            post_json("/predict", r#"{"medicineName": "Atropine", "weight": 12.5}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "predicted_dosage_mg": 4.0 }));
    }
}
