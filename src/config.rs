//! Runtime configuration, loaded from an optional TOML file with
//! compiled-in defaults for every field.

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// REST base URL for call origination.
    pub api_base: String,
    /// WebSocket base URL for both channels.
    pub ws_base: String,
    /// Stable operator identity; generated at startup when empty.
    pub operator_id: String,
    /// Capture and outbound-metadata sample rate.
    pub capture_sample_rate: u32,
    /// Samples per outbound frame (one fixed frame size per session).
    pub capture_frame_samples: usize,
    /// Rate assumed for inbound payloads that fail container decode.
    pub fallback_sample_rate: u32,
    /// Rate requested from the output device.
    pub playback_sample_rate: u32,
    pub capture_device: String,
    pub playback_device: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            ws_base: "ws://localhost:8000".to_string(),
            operator_id: String::new(),
            capture_sample_rate: 16_000,
            capture_frame_samples: 2048,
            fallback_sample_rate: 16_000,
            playback_sample_rate: 16_000,
            capture_device: "default".to_string(),
            playback_device: "default".to_string(),
        }
    }
}

impl Config {
    /// Load from `path` when it exists, defaults otherwise. Environment
    /// variables override the file for the connection fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            log::info!("no config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VOICELINK_API_BASE") {
            self.api_base = v;
        }
        if let Ok(v) = std::env::var("VOICELINK_WS_BASE") {
            self.ws_base = v;
        }
        if let Ok(v) = std::env::var("VOICELINK_OPERATOR_ID") {
            self.operator_id = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/voicelink.toml")).unwrap();
        assert_eq!(config.capture_sample_rate, 16_000);
        assert_eq!(config.capture_frame_samples, 2048);
        assert!(config.operator_id.is_empty());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ws_base = \"ws://example.com:9000\"").unwrap();
        writeln!(file, "capture_frame_samples = 1024").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.ws_base, "ws://example.com:9000");
        assert_eq!(config.capture_frame_samples, 1024);
        // Untouched fields keep their defaults.
        assert_eq!(config.api_base, "http://localhost:8000");
    }

    #[test]
    fn env_overrides_connection_fields() {
        // set_var is unsafe in edition 2024; this test is the only writer
        // of these variables.
        unsafe {
            std::env::set_var("VOICELINK_WS_BASE", "wss://override:7443");
        }
        let mut config = Config::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("VOICELINK_WS_BASE");
        }
        assert_eq!(config.ws_base, "wss://override:7443");
        assert_eq!(config.api_base, "http://localhost:8000");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "capture_sample_rate = \"not a number\"").unwrap();
        assert!(Config::load(file.path()).is_err());
    }
}
