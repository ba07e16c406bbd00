//! TOML configuration for the agent.
//!
//! Read from `config.toml` (path set on the command line).  Every field has
//! a default, so a missing file or a file with only a few keys works:
//!
//! ```toml
//! [general]
//! journal_dir = 'C:\Users\me\Saved Games\Frontier Developments\Elite Dangerous'
//! base_topic = "elite"
//!
//! [mqtt]
//! broker = "192.168.1.10"
//!
//! [safety]
//! rate_limit_hz = 5.0
//!
//! [safety.topic_rate_limit_hz]
//! "elite/cmd/boost" = 1.0
//! ```
//!
//! # Environment overrides
//!
//! `ELITE_MQTT_HOST`, `ELITE_MQTT_PORT`, `ELITE_MQTT_USER`, `ELITE_MQTT_PASS`
//! and `ELITE_BASE_TOPIC` replace the corresponding file values, so broker
//! credentials need not live in the file.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::application::route_command::{
    RouterSettings, DEFAULT_KEY_HOLD, DEFAULT_PROCESS_NAME, DEFAULT_RATE_LIMIT_HZ,
};

/// Poll intervals below this are raised to it.
pub const MIN_POLL_INTERVAL_MS: u64 = 50;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override holds an unusable value.
    #[error("environment variable {var} has invalid value '{value}'")]
    Env { var: &'static str, value: String },

    /// A value is outside its allowed range.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    /// Inline topic → key entries; the keymap file overrides them.
    #[serde(default)]
    pub keymap: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Folder holding the journal and snapshot files.
    #[serde(default = "default_journal_dir")]
    pub journal_dir: PathBuf,
    /// Executable that must own the foreground window for commands to run.
    #[serde(default = "default_process_name")]
    pub process_name: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Prefix for every topic, e.g. `elite` → `elite/events/FSDJump`.
    #[serde(default = "default_base_topic")]
    pub base_topic: String,
    /// Relative paths are resolved against the config file's directory.
    #[serde(default = "default_keymap_file")]
    pub keymap_file: PathBuf,
    /// Publish `ReceiveText` chat lines (otherwise they are only logged).
    #[serde(default)]
    pub publish_chat: bool,
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttConfig {
    #[serde(default = "default_broker")]
    pub broker: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Empty means anonymous.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// A random suffix is appended per process.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub qos: u8,
    #[serde(default)]
    pub retain: bool,
    /// Extra command subscription; `<base_topic>/cmd/#` is always subscribed.
    #[serde(default)]
    pub cmd_topic: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SafetyConfig {
    /// Commands per second per topic; 0 disables the limit.
    #[serde(default = "default_rate_limit_hz")]
    pub rate_limit_hz: f64,
    #[serde(default = "default_key_hold_ms")]
    pub key_hold_ms: u64,
    #[serde(default)]
    pub topic_rate_limit_hz: HashMap<String, f64>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_journal_dir() -> PathBuf {
    PathBuf::from(r"C:\Users\Public\Saved Games\Frontier Developments\Elite Dangerous")
}
fn default_process_name() -> String {
    DEFAULT_PROCESS_NAME.to_string()
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_base_topic() -> String {
    "elite".to_string()
}
fn default_keymap_file() -> PathBuf {
    PathBuf::from("keymap.toml")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_broker() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    1883
}
fn default_client_id() -> String {
    "elite-parser".to_string()
}
fn default_keep_alive_secs() -> u64 {
    30
}
fn default_queue_capacity() -> usize {
    1000
}
fn default_rate_limit_hz() -> f64 {
    DEFAULT_RATE_LIMIT_HZ
}
fn default_key_hold_ms() -> u64 {
    DEFAULT_KEY_HOLD.as_millis() as u64
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            journal_dir: default_journal_dir(),
            process_name: default_process_name(),
            poll_interval_ms: default_poll_interval_ms(),
            base_topic: default_base_topic(),
            keymap_file: default_keymap_file(),
            publish_chat: false,
            log_level: default_log_level(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: default_broker(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            client_id: default_client_id(),
            qos: 0,
            retain: false,
            cmd_topic: String::new(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            rate_limit_hz: default_rate_limit_hz(),
            key_hold_ms: default_key_hold_ms(),
            topic_rate_limit_hz: HashMap::new(),
        }
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

impl AppConfig {
    /// Journal poll cadence, never below [`MIN_POLL_INTERVAL_MS`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.general.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    /// Base topic without trailing slashes.
    pub fn base_topic(&self) -> &str {
        self.general.base_topic.trim_end_matches('/')
    }

    /// Topics to subscribe to on every (re)connect.
    pub fn command_subscriptions(&self) -> Vec<String> {
        let mut topics = vec![format!("{}/cmd/#", self.base_topic())];
        let extra = self.mqtt.cmd_topic.trim();
        if !extra.is_empty() && !topics.iter().any(|t| t == extra) {
            topics.push(extra.to_string());
        }
        topics
    }

    /// `client_id` with a per-process random suffix, so two agents never
    /// kick each other off the broker.
    pub fn session_client_id(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}-{}", self.mqtt.client_id, &suffix[..8])
    }

    /// Keymap file path, resolved against `config_dir` when relative.
    pub fn keymap_path(&self, config_dir: &Path) -> PathBuf {
        if self.general.keymap_file.is_absolute() {
            self.general.keymap_file.clone()
        } else {
            config_dir.join(&self.general.keymap_file)
        }
    }

    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings {
            process_name: self.general.process_name.clone(),
            default_rate_hz: self.safety.rate_limit_hz,
            topic_rate_hz: self.safety.topic_rate_limit_hz.clone(),
            key_hold: Duration::from_millis(self.safety.key_hold_ms),
        }
    }

    /// Applies environment overrides through `lookup` (normally
    /// `std::env::var`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if `ELITE_MQTT_PORT` is not a port number.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("ELITE_MQTT_HOST") {
            self.mqtt.broker = host;
        }
        if let Some(port) = lookup("ELITE_MQTT_PORT") {
            self.mqtt.port = port.trim().parse().map_err(|_| ConfigError::Env {
                var: "ELITE_MQTT_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(user) = lookup("ELITE_MQTT_USER") {
            self.mqtt.username = user;
        }
        if let Some(pass) = lookup("ELITE_MQTT_PASS") {
            self.mqtt.password = pass;
        }
        if let Some(base) = lookup("ELITE_BASE_TOPIC") {
            self.general.base_topic = base;
        }
        Ok(())
    }

    /// Checks ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.qos > 2 {
            return Err(ConfigError::Invalid(format!(
                "mqtt.qos must be 0, 1 or 2 (got {})",
                self.mqtt.qos
            )));
        }
        if self.base_topic().is_empty() {
            return Err(ConfigError::Invalid("general.base_topic is empty".into()));
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid("queue.capacity must be at least 1".into()));
        }
        if !self.safety.rate_limit_hz.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "safety.rate_limit_hz must be a finite number (got {})",
                self.safety.rate_limit_hz
            )));
        }
        if let Some((topic, rate)) = self
            .safety
            .topic_rate_limit_hz
            .iter()
            .find(|(_, rate)| !rate.is_finite())
        {
            return Err(ConfigError::Invalid(format!(
                "safety.topic_rate_limit_hz.\"{topic}\" must be a finite number (got {rate})"
            )));
        }
        if self.mqtt.keep_alive_secs < 5 {
            return Err(ConfigError::Invalid(
                "mqtt.keep_alive_secs must be at least 5".into(),
            ));
        }
        Ok(())
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses configuration text, tolerating a leading UTF-8 BOM.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    Ok(toml::from_str(content.trim_start_matches('\u{feff}'))?)
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
