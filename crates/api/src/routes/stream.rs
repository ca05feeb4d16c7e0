//! MJPEG video feed route

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::AppState;

const BOUNDARY: &str = "frame";

/// Long-lived multipart JPEG stream of annotated frames.
///
/// 503 when the camera is inactive; otherwise streams until the camera
/// stops, a read fails, or the client disconnects.
pub async fn video_feed(State(state): State<Arc<AppState>>) -> Response {
    if !state.camera.is_active().await {
        debug!("Video feed requested while camera inactive");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Camera not active or unavailable. Please ensure camera is turned on.",
        )
            .into_response();
    }

    let (tx, rx) = mpsc::channel::<Result<Vec<u8>, Infallible>>(2);
    tokio::spawn(stream_frames(state, tx));

    (
        [(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
        )],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}

/// Producer loop: read, process, encode, send, paced by a minimum
/// frame interval.
async fn stream_frames(state: Arc<AppState>, tx: mpsc::Sender<Result<Vec<u8>, Infallible>>) {
    let mut ticker =
        tokio::time::interval(Duration::from_millis(state.config.stream_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if !state.camera.is_active().await {
            break;
        }
        let Some(frame) = state.camera.read_frame().await else {
            debug!("No frame from camera manager, ending video stream");
            break;
        };

        let annotated = match state.pipeline.process_frame(&frame) {
            Ok((annotated, _snapshot)) => annotated,
            Err(e) => {
                warn!("Frame processing failed: {e}");
                continue;
            }
        };
        let jpeg = match annotated.encode_jpeg(state.config.jpeg_quality) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!("JPEG encoding failed: {e}");
                continue;
            }
        };

        let mut part = Vec::with_capacity(jpeg.len() + 64);
        part.extend_from_slice(format!("--{BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n").as_bytes());
        part.extend_from_slice(&jpeg);
        part.extend_from_slice(b"\r\n");

        // Send failure means the client went away.
        if tx.send(Ok(part)).await.is_err() {
            break;
        }
    }

    debug!("Video stream producer finished");
}
