//! Drowsiness status route

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::AppState;
use drowsiness::DrowsinessSnapshot;

/// Read the last drowsiness snapshot
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<DrowsinessSnapshot> {
    Json(state.pipeline.snapshot())
}
