use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Development => write!(f, "development"),
            Mode::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            enable_logging: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    pub enabled: bool,
    pub html_content_type_prefix: String,
    /// Producers still running after this long fail their boundary. 0 disables.
    pub boundary_timeout_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            html_content_type_prefix: "text/html".to_string(),
            boundary_timeout_ms: 8000,
        }
    }
}

impl StreamingConfig {
    pub fn boundary_timeout(&self) -> Option<Duration> {
        (self.boundary_timeout_ms > 0).then(|| Duration::from_millis(self.boundary_timeout_ms))
    }

    pub fn is_rewritable(&self, content_type: Option<&str>) -> bool {
        self.enabled
            && content_type.is_some_and(|value| value.starts_with(&self.html_content_type_prefix))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    pub server: ServerConfig,
    pub streaming: StreamingConfig,
}

impl Config {
    pub fn new(mode: Mode) -> Self {
        Self { mode, ..Self::default() }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlays `SUSPENSE_*` environment variables on top of `self`.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(mode_str) = std::env::var("SUSPENSE_MODE") {
            self.mode = parse_mode(&mode_str)?;
        }

        if let Ok(host) = std::env::var("SUSPENSE_HOST") {
            self.server.host = host;
        }

        if let Ok(port_str) = std::env::var("SUSPENSE_PORT") {
            self.server.port = port_str.parse().map_err(|_| ConfigError::InvalidPort(port_str))?;
        }

        if let Ok(enabled) = std::env::var("SUSPENSE_STREAMING_ENABLED") {
            self.streaming.enabled = parse_flag(&enabled);
        }

        if let Ok(timeout_str) = std::env::var("SUSPENSE_BOUNDARY_TIMEOUT_MS") {
            self.streaming.boundary_timeout_ms = timeout_str
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(timeout_str.clone()))?;
        }

        Ok(())
    }

    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::FileRead)?;

        toml::from_str(&contents).map_err(ConfigError::TomlParse)
    }

    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self).map_err(ConfigError::TomlSerialize)?;

        std::fs::write(path, contents).map_err(ConfigError::FileWrite)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn is_development(&self) -> bool {
        self.mode == Mode::Development
    }

    pub fn is_production(&self) -> bool {
        self.mode == Mode::Production
    }
}

pub fn parse_mode(value: &str) -> Result<Mode, ConfigError> {
    match value.to_lowercase().as_str() {
        "development" | "dev" => Ok(Mode::Development),
        "production" | "prod" => Ok(Mode::Production),
        _ => Err(ConfigError::InvalidMode(value.to_string())),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Failed to read config file: {0}")]
    FileRead(std::io::Error),

    #[error("Failed to write config file: {0}")]
    FileWrite(std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(toml::ser::Error),
}
