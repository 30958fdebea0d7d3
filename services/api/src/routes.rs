use crate::infra::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use perm_tracker::processing::{
    current_data, estimate_approval, refresh_processing_data, EstimateError,
};
use serde::Deserialize;
use serde_json::json;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/calculate", post(calculate_endpoint))
        .route("/api/v1/current-data", get(current_data_endpoint))
        .route("/api/v1/update-data", post(update_data_endpoint))
        .with_state(state)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "timestamp": Utc::now().to_rfc3339() }))
}

pub(crate) async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CalculateRequest {
    pub(crate) filing_date: String,
}

async fn calculate_endpoint(
    State(state): State<AppState>,
    Json(request): Json<CalculateRequest>,
) -> Response {
    match estimate_approval(&request.filing_date, state.store.as_ref()).await {
        Ok(estimate) => (StatusCode::OK, Json(estimate)).into_response(),
        Err(err @ EstimateError::InvalidDateFormat) => {
            error_response(StatusCode::BAD_REQUEST, &err)
        }
        Err(err @ EstimateError::NoDataAvailable) => error_response(StatusCode::NOT_FOUND, &err),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err),
    }
}

async fn current_data_endpoint(State(state): State<AppState>) -> Response {
    match current_data(state.store.as_ref()).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(err @ EstimateError::NoDataAvailable) => error_response(StatusCode::NOT_FOUND, &err),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err),
    }
}

async fn update_data_endpoint(State(state): State<AppState>) -> Response {
    match refresh_processing_data(
        state.source.as_ref(),
        state.store.as_ref(),
        &state.source_url,
    )
    .await
    {
        Ok(record) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": "Data updated successfully",
                "data_source": record.data_source.as_str(),
            })),
        )
            .into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err),
    }
}

fn error_response(status: StatusCode, err: &dyn std::fmt::Display) -> Response {
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
