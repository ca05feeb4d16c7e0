//! Server configuration loading.

use drowsiness::DrowsinessConfig;
use serde::{Deserialize, Serialize};

/// Server configuration, loaded from `drowsyguard.toml` (optional) with
/// `DROWSYGUARD_*` environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// JPEG quality for the video feed (1-100)
    pub jpeg_quality: u8,

    /// Minimum interval between streamed frames (milliseconds)
    pub stream_interval_ms: u64,

    /// Drowsiness detection settings
    pub drowsiness: DrowsinessConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            jpeg_quality: 80,
            stream_interval_ms: 10,
            drowsiness: DrowsinessConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("drowsyguard").required(false))
            .add_source(
                config::Environment::with_prefix("DROWSYGUARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file_or_env() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.stream_interval_ms, 10);
        assert_eq!(config.drowsiness.consecutive_drowsy_frames, 10);
    }

    #[test]
    fn test_load_tolerates_missing_file() {
        // No drowsyguard.toml in the test working directory; load must
        // still succeed with defaults.
        let config = ServerConfig::load().unwrap();
        assert_eq!(config.jpeg_quality, 80);
    }
}
