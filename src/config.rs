//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_RECOGNITION_MODEL_PATH, ...)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub recognition: RecognitionConfig,
    pub performance: PerformanceConfig,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Speech-recognition engine settings.
///
/// ## Fields:
/// - `engine`: which engine backend to use ("vosk" when compiled with the
///   `vosk` feature, "null" for a transcript-free protocol backend)
/// - `model_path`: filesystem path of the recognition model directory,
///   loaded once per process and shared by every session
/// - `sample_rate`: PCM sample rate every session is expected to send,
///   in Hz (the offline models are trained for 16 kHz mono)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    pub engine: String,
    pub model_path: String,
    pub sample_rate: u32,
}

/// Performance tuning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum number of concurrent voice sessions accepted on /ws/voice
    pub max_concurrent_sessions: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            recognition: RecognitionConfig {
                engine: default_engine().to_string(),
                model_path: "models/vosk-model-small-es-0.42".to_string(),
                sample_rate: 16000,
            },
            performance: PerformanceConfig {
                max_concurrent_sessions: 10,
            },
        }
    }
}

/// Pick the best engine the binary was compiled with.
fn default_engine() -> &'static str {
    if cfg!(feature = "vosk") {
        "vosk"
    } else {
        "null"
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml and APP_* environment
    /// variables, in that priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_PORT=3000`: override server port
    /// - `APP_RECOGNITION_MODEL_PATH=/opt/models/es`: override model path
    /// - `HOST` / `PORT`: special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly inject these without the APP_ prefix
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.recognition.model_path.is_empty() {
            return Err(anyhow::anyhow!("Recognition model path cannot be empty"));
        }

        // Offline models are trained for telephone/wideband rates; anything
        // outside this range is a configuration mistake, not a client error.
        if self.recognition.sample_rate < 8000 || self.recognition.sample_rate > 48000 {
            return Err(anyhow::anyhow!(
                "Sample rate {} Hz is outside the supported 8000-48000 Hz range",
                self.recognition.sample_rate
            ));
        }

        if self.performance.max_concurrent_sessions == 0 {
            return Err(anyhow::anyhow!("Max concurrent sessions must be greater than 0"));
        }

        Ok(())
    }

    /// Update configuration from a JSON string (used for runtime config
    /// updates via PUT /api/v1/config).
    ///
    /// Only the fields present in the JSON are touched. Note that
    /// `recognition.model_path` changes take effect for the model registry
    /// on the next process start, since the shared model is never unloaded.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(recognition) = partial_config.get("recognition") {
            if let Some(engine) = recognition.get("engine").and_then(|v| v.as_str()) {
                self.recognition.engine = engine.to_string();
            }
            if let Some(path) = recognition.get("model_path").and_then(|v| v.as_str()) {
                self.recognition.model_path = path.to_string();
            }
            if let Some(rate) = recognition.get("sample_rate").and_then(|v| v.as_u64()) {
                self.recognition.sample_rate = rate as u32;
            }
        }

        if let Some(performance) = partial_config.get("performance") {
            if let Some(sessions) = performance
                .get("max_concurrent_sessions")
                .and_then(|v| v.as_u64())
            {
                self.performance.max_concurrent_sessions = sessions as usize;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.recognition.sample_rate, 16000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.recognition.sample_rate = 4000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.recognition.model_path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"recognition": {"sample_rate": 8000}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.recognition.sample_rate, 8000);
        // Other fields should remain unchanged
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_config_update_rejects_invalid() {
        let mut config = AppConfig::default();
        let json = r#"{"recognition": {"sample_rate": 96000}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}
