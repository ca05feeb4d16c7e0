//! DrowsyGuard API Server
//!
//! REST server wiring the camera resource manager and frame pipeline to
//! HTTP: camera start/stop control, drowsiness status, the MJPEG video
//! feed, and a health endpoint.

use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use camera_capture::{CameraManager, Lifecycle};
use drowsiness::FramePipeline;

mod routes;
mod server_config;

pub use server_config::ServerConfig;

/// Application state shared across handlers: the composition root owns
/// the single camera manager and pipeline.
pub struct AppState {
    /// Exclusive camera resource manager
    pub camera: Arc<CameraManager>,
    /// Per-frame drowsiness pipeline
    pub pipeline: Arc<FramePipeline>,
    /// Server configuration
    pub config: ServerConfig,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        camera: Arc<CameraManager>,
        pipeline: Arc<FramePipeline>,
        config: ServerConfig,
    ) -> Self {
        Self {
            camera,
            pipeline,
            config,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub camera: ComponentHealth,
    pub face_model: ComponentHealth,
    pub classifier: ComponentHealth,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/camera/control", post(routes::camera::control))
        .route(
            "/api/v1/drowsiness/status",
            get(routes::status::get_status),
        )
        .route("/api/v1/video/feed", get(routes::stream::video_feed))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let camera_status = match state.camera.lifecycle() {
        Lifecycle::Active => "active",
        Lifecycle::Releasing => "releasing",
        Lifecycle::Idle => "idle",
    };
    let model_status = |loaded: bool| ComponentHealth {
        status: if loaded { "loaded" } else { "not_configured" }.to_string(),
    };

    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            camera: ComponentHealth {
                status: camera_status.to_string(),
            },
            face_model: model_status(state.pipeline.face_model_loaded()),
            classifier: model_status(state.pipeline.classifier_loaded()),
        },
    };

    Json(response)
}

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Run the server
pub async fn run_server(
    addr: &str,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use camera_capture::SyntheticFactory;
    use drowsiness::DrowsinessConfig;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let camera = Arc::new(CameraManager::new(Box::new(SyntheticFactory::default())));
        let pipeline =
            Arc::new(FramePipeline::from_config(&DrowsinessConfig::default()).unwrap());
        Arc::new(AppState::new(camera, pipeline, ServerConfig::default()))
    }

    fn control_request(action: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/camera/control")
            .header("content-type", "application/json")
            .body(Body::from(format!(r#"{{"action":"{action}"}}"#)))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_idle_camera() {
        let state = test_state();
        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["components"]["camera"]["status"], "idle");
        assert_eq!(json["components"]["classifier"]["status"], "not_configured");
    }

    #[tokio::test]
    async fn test_invalid_control_action_rejected() {
        let response = create_router(test_state())
            .oneshot(control_request("pause"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
    }

    #[tokio::test]
    async fn test_stop_while_idle_fails() {
        let response = create_router(test_state())
            .oneshot(control_request("stop"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["status"], "failed");
    }

    #[tokio::test]
    async fn test_start_then_stop_resets_status() {
        let state = test_state();

        let response = create_router(Arc::clone(&state))
            .oneshot(control_request("start"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.camera.is_active().await);

        let response = create_router(Arc::clone(&state))
            .oneshot(control_request("stop"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!state.camera.is_active().await);

        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/drowsiness/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "Video Off");
        assert_eq!(json["alarm_on"], false);
    }

    #[tokio::test]
    async fn test_video_feed_unavailable_when_inactive() {
        let response = create_router(test_state())
            .oneshot(
                Request::builder()
                    .uri("/api/v1/video/feed")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_video_feed_streams_multipart_while_active() {
        let state = test_state();
        state.camera.start().await.unwrap();

        let response = create_router(Arc::clone(&state))
            .oneshot(
                Request::builder()
                    .uri("/api/v1/video/feed")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("multipart/x-mixed-replace"));

        // Dropping the response hangs up the client; the producer loop
        // should observe that and stop without tearing down the camera.
        drop(response);
        assert!(state.camera.is_active().await);
    }
}
