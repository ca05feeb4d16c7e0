//! Camera control route

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::AppState;

/// Camera control request
#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    /// "start" or "stop"
    pub action: String,
}

/// Camera control response
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub status: &'static str,
    pub message: String,
}

/// Start or stop the camera stream
pub async fn control(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ControlRequest>,
) -> (StatusCode, Json<ControlResponse>) {
    match req.action.as_str() {
        "start" => {
            info!("Camera control: start requested");
            match state.camera.start().await {
                Ok(()) => (
                    StatusCode::OK,
                    Json(ControlResponse {
                        status: "success",
                        message: "Camera stream started.".to_string(),
                    }),
                ),
                Err(e) => (
                    StatusCode::BAD_REQUEST,
                    Json(ControlResponse {
                        status: "failed",
                        message: format!("Failed to start camera: {e}"),
                    }),
                ),
            }
        }
        "stop" => {
            info!("Camera control: stop requested");
            match state.camera.stop().await {
                Ok(()) => {
                    // Detection state resets with the camera.
                    state.pipeline.reset();
                    (
                        StatusCode::OK,
                        Json(ControlResponse {
                            status: "success",
                            message: "Camera stream stopped and state reset.".to_string(),
                        }),
                    )
                }
                Err(_) => (
                    StatusCode::BAD_REQUEST,
                    Json(ControlResponse {
                        status: "failed",
                        message: "Camera is not streaming or already stopped.".to_string(),
                    }),
                ),
            }
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(ControlResponse {
                status: "error",
                message: "Invalid action. Use 'start' or 'stop'.".to_string(),
            }),
        ),
    }
}
