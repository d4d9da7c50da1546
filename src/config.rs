//! Configuration for the GaitVision agent.
//!
//! Values come from `config.json` in the user config directory, then the
//! `ARDUINO_PORT` and `DATABASE_URL` environment variables, then CLI flags.

use crate::collector::SerialSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the serial endpoint.
pub const SERIAL_PORT_ENV: &str = "ARDUINO_PORT";

/// Environment variable holding the store connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial device the insole is attached to
    pub serial_port: String,

    /// Serial line speed
    pub baud_rate: u32,

    /// Per-read timeout on the serial port
    #[serde(with = "duration_ms_serde")]
    pub read_timeout: Duration,

    /// Wait between failed attempts to open the port
    #[serde(with = "duration_ms_serde")]
    pub reconnect_backoff: Duration,

    /// Wait after opening the port before reading
    #[serde(with = "duration_ms_serde")]
    pub settle_delay: Duration,

    /// How long `/pressure` waits for a fresh frame
    #[serde(with = "duration_ms_serde")]
    pub sample_timeout: Duration,

    /// Whether `/pressure` may answer with simulated data
    pub allow_simulated: bool,

    /// HTTP bind address
    pub host: String,

    /// HTTP port (0 for random)
    pub port: u16,

    /// Store connection string (`sqlite://path`, a plain path or `:memory:`)
    pub database_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: default_serial_port(),
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(200),
            reconnect_backoff: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
            sample_timeout: Duration::from_secs(1),
            allow_simulated: true,
            host: "127.0.0.1".to_string(),
            port: 8000,
            database_url: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gaitvision")
            .join("config.json")
    }

    /// Apply `ARDUINO_PORT` and `DATABASE_URL` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(SERIAL_PORT_ENV).ok(),
            std::env::var(DATABASE_URL_ENV).ok(),
        );
    }

    /// Override the serial port and database url when values are given.
    /// Blank values are ignored.
    pub fn apply_overrides(&mut self, serial_port: Option<String>, database_url: Option<String>) {
        if let Some(port) = serial_port.filter(|p| !p.trim().is_empty()) {
            self.serial_port = port.trim().to_string();
        }
        if let Some(url) = database_url.filter(|u| !u.trim().is_empty()) {
            self.database_url = Some(url.trim().to_string());
        }
    }

    /// The store connection string; its absence is fatal for `serve`.
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingDatabaseUrl)
    }

    /// Serial settings for the bridge.
    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            port: self.serial_port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: self.read_timeout,
            settle_delay: self.settle_delay,
        }
    }
}

/// Platform default for the serial device.
pub fn default_serial_port() -> String {
    if cfg!(target_os = "windows") {
        "COM3".to_string()
    } else if cfg!(target_os = "macos") {
        "/dev/cu.usbmodem1101".to_string()
    } else {
        "/dev/ttyACM0".to_string()
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    MissingDatabaseUrl,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::MissingDatabaseUrl => write!(
                f,
                "No database configured: set {DATABASE_URL_ENV} or pass --database-url"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole milliseconds.
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
