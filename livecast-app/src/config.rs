//! Application configuration.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use livecast_ipc::SessionConfig;
use livecast_permissions::Permission;

/// Default publishing endpoint.
pub const DEFAULT_ENDPOINT: &str = "rtmp://my.server.url:1935/app/streamKey";

/// Settings for one run of the demo client. Nothing is written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the live toggle publishes to.
    pub endpoint: String,

    /// Encoder settings handed to the engine.
    pub session: SessionConfig,

    /// Camera used as video source.
    pub camera_id: String,

    /// Runtime permissions needed before capture.
    pub permissions: Vec<Permission>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            session: SessionConfig::default(),
            camera_id: "0".to_string(),
            permissions: vec![Permission::camera(), Permission::record_audio()],
        }
    }
}

impl AppConfig {
    /// Load from a JSON file, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            info!("No config file given, using defaults");
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }
}
