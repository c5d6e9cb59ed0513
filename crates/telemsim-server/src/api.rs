//! REST API endpoints for telemsim
//!
//! Paths are served at the root and under `/api/`. All bodies are JSON.
//! `GET /status` and `GET /measurements` drive the simulation: the first
//! advances the readiness gate, the second generates a sample when ready.

use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use telemsim_core::{ConfigPatch, Configuration, Measurement, Status};

/// Measurements response
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementsResponse {
    /// Buffered measurements, oldest first
    pub measured_storage: Vec<Measurement>,
}

/// Clear response
#[derive(Serialize, Deserialize, Debug)]
pub struct ClearResponse {
    pub message: String,
}

fn internal_error(e: anyhow::Error) -> (StatusCode, String) {
    tracing::error!(error = %e, "Request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// GET /configuration
pub async fn get_configuration(
    State(state): State<AppState>,
) -> Result<Json<Configuration>, (StatusCode, String)> {
    let config = state
        .engine
        .configuration()
        .await
        .map_err(internal_error)?;
    Ok(Json(config))
}

/// PUT /configuration
///
/// Only `Polarity` and `MeasurementValues` are applied; unknown fields and
/// unrecognized values are ignored.
pub async fn update_configuration(
    State(state): State<AppState>,
    Json(patch): Json<ConfigPatch>,
) -> Result<Json<Configuration>, (StatusCode, String)> {
    let config = state
        .engine
        .update_configuration(patch)
        .await
        .map_err(internal_error)?;
    Ok(Json(config))
}

/// GET /status
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<Status>, (StatusCode, String)> {
    let status = state.engine.tick().await.map_err(internal_error)?;
    Ok(Json(status))
}

/// GET /measurements
pub async fn get_measurements(
    State(state): State<AppState>,
) -> Result<Json<MeasurementsResponse>, (StatusCode, String)> {
    let poll = state
        .engine
        .poll_measurements()
        .await
        .map_err(internal_error)?;

    if let Some(ref measurement) = poll.generated {
        crate::ws::broadcast_measurement(&state, measurement);
    }

    Ok(Json(MeasurementsResponse {
        measured_storage: poll.measurements,
    }))
}

/// DELETE /measurements
///
/// Empties the buffer and the store and restarts identifiers at 0.
pub async fn clear_measurements(
    State(state): State<AppState>,
) -> Result<Json<ClearResponse>, (StatusCode, String)> {
    state
        .engine
        .clear_measurements()
        .await
        .map_err(internal_error)?;

    Ok(Json(ClearResponse {
        message: "Measurements cleared".to_string(),
    }))
}
