//! DrowsyGuard - Main Entry Point

use std::sync::Arc;

use api::{init_logging, run_server, AppState, ServerConfig};
use camera_capture::{CameraManager, DeviceFactory};
use drowsiness::FramePipeline;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("=== DrowsyGuard v{} ===", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load()?;

    #[cfg(feature = "camera")]
    let factory: Box<dyn DeviceFactory> = Box::new(camera_capture::NokhwaFactory::new());
    #[cfg(not(feature = "camera"))]
    let factory: Box<dyn DeviceFactory> = {
        info!("Built without the `camera` feature; using the synthetic capture device");
        Box::new(camera_capture::SyntheticFactory::default())
    };

    let camera = Arc::new(CameraManager::new(factory));
    let pipeline = Arc::new(FramePipeline::from_config(&config.drowsiness)?);

    let addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(camera, pipeline, config));
    run_server(&addr, state).await
}
