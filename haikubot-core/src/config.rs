//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/haikubot/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/haikubot/` (~/.config/haikubot/)
//! - Data: `$XDG_DATA_HOME/haikubot/` (~/.local/share/haikubot/)
//! - State/Logs: `$XDG_STATE_HOME/haikubot/` (~/.local/state/haikubot/)
//!
//! The secret key and heartbeat URL can come from the environment
//! (`HAIKUBOT_NSEC`, `HEARTBEAT_URL`) so they stay out of the file.

use crate::error::{Error, Result};
use crate::relay::is_relay_url;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the bot's secret key
pub const SECRET_KEY_ENV: &str = "HAIKUBOT_NSEC";

/// Environment variable holding the heartbeat URL
pub const HEARTBEAT_URL_ENV: &str = "HEARTBEAT_URL";

const APP_DIR: &str = "haikubot";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Inbound relay subscription
    #[serde(default)]
    pub feed: FeedConfig,

    /// Outbound relays and identity
    #[serde(default)]
    pub publish: PublishConfig,

    /// Ingestion engine tunables
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Dictionary and substitution overrides
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Inbound relay subscription
#[derive(Debug, Deserialize)]
pub struct FeedConfig {
    /// Relay the bot listens to
    #[serde(default = "default_feed_relay")]
    pub relay: String,

    /// Event kinds to subscribe to
    #[serde(default = "default_feed_kinds")]
    pub kinds: Vec<u16>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            relay: default_feed_relay(),
            kinds: default_feed_kinds(),
        }
    }
}

fn default_feed_relay() -> String {
    "wss://relay-jp.nostr.wirednet.jp".to_string()
}

fn default_feed_kinds() -> Vec<u16> {
    vec![1, 42]
}

/// Outbound relays and identity
#[derive(Debug, Deserialize)]
pub struct PublishConfig {
    /// Relays replies are sent to
    #[serde(default = "default_publish_relays")]
    pub relays: Vec<String>,

    /// `nsec1…` or hex secret key. `HAIKUBOT_NSEC` takes precedence.
    pub secret_key: Option<String>,

    /// Per-relay publish timeout in seconds
    #[serde(default = "default_publish_timeout")]
    pub timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            relays: default_publish_relays(),
            secret_key: None,
            timeout_secs: default_publish_timeout(),
        }
    }
}

fn default_publish_relays() -> Vec<String> {
    [
        "wss://nostr-relay.nokotaro.com",
        "wss://relay-jp.nostr.wirednet.jp",
        "wss://nostr.holybea.com",
        "wss://relay.snort.social",
        "wss://relay.damus.io",
        "wss://relay.nostrich.land",
        "wss://nostr.h3z.jp",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_publish_timeout() -> u64 {
    10
}

/// Ingestion engine tunables
#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    /// Bounded queue between the receive loop and the worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Length of one idle check in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Consecutive idle checks tolerated before reconnecting
    #[serde(default = "default_max_idle_checks")]
    pub max_idle_checks: u32,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Upper bound for the doubling reconnect delay
    #[serde(default = "default_reconnect_delay")]
    pub max_reconnect_delay_secs: u64,

    /// Added to the watermark when resubscribing
    #[serde(default)]
    pub resume_slack_secs: i64,

    /// How far back a restart may resume from the stored watermark
    #[serde(default = "default_max_catchup")]
    pub max_catchup_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            idle_timeout_secs: default_idle_timeout(),
            max_idle_checks: default_max_idle_checks(),
            reconnect_delay_secs: default_reconnect_delay(),
            max_reconnect_delay_secs: default_reconnect_delay(),
            resume_slack_secs: 0,
            max_catchup_secs: default_max_catchup(),
        }
    }
}

fn default_queue_capacity() -> usize {
    100
}

fn default_idle_timeout() -> u64 {
    10
}

fn default_max_idle_checks() -> u32 {
    60
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_max_catchup() -> u64 {
    3600
}

/// Liveness pings
#[derive(Debug, Deserialize, Clone)]
pub struct HeartbeatConfig {
    /// URL to `GET`. Falls back to `HEARTBEAT_URL`.
    pub url: Option<String>,

    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_heartbeat_timeout")]
    pub timeout_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            url: None,
            interval_secs: default_heartbeat_interval(),
            timeout_secs: default_heartbeat_timeout(),
        }
    }
}

impl HeartbeatConfig {
    /// Configured URL, or the environment fallback. Empty values count as unset.
    pub fn resolved_url(&self) -> Option<String> {
        self.url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| std::env::var(HEARTBEAT_URL_ENV).ok())
            .filter(|u| !u.trim().is_empty())
    }
}

fn default_heartbeat_interval() -> u64 {
    300
}

fn default_heartbeat_timeout() -> u64 {
    10
}

/// Dictionary and substitution overrides
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ClassifierConfig {
    /// User dictionary CSV (`surface,segmentation,reading,pos`)
    pub user_dictionary: Option<PathBuf>,

    /// TOML file replacing the bundled substitution variants
    pub substitutions: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Reject configurations the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !is_relay_url(&self.feed.relay) {
            return Err(Error::Config(format!(
                "feed.relay is not a ws:// or wss:// URL: {}",
                self.feed.relay
            )));
        }
        if self.feed.kinds.is_empty() {
            return Err(Error::Config("feed.kinds must not be empty".to_string()));
        }
        if self.publish.relays.is_empty() {
            return Err(Error::Config(
                "publish.relays must list at least one relay".to_string(),
            ));
        }
        if let Some(bad) = self.publish.relays.iter().find(|r| !is_relay_url(r)) {
            return Err(Error::Config(format!(
                "publish.relays contains a non-relay URL: {}",
                bad
            )));
        }
        if self.engine.queue_capacity == 0 {
            return Err(Error::Config(
                "engine.queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.engine.max_idle_checks == 0 {
            return Err(Error::Config(
                "engine.max_idle_checks must be greater than 0".to_string(),
            ));
        }
        if self.engine.idle_timeout_secs == 0 {
            return Err(Error::Config(
                "engine.idle_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.engine.reconnect_delay_secs == 0 {
            return Err(Error::Config(
                "engine.reconnect_delay_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Secret key from `HAIKUBOT_NSEC`, else from `publish.secret_key`.
    pub fn secret_key(&self) -> Result<String> {
        std::env::var(SECRET_KEY_ENV)
            .ok()
            .or_else(|| self.publish.secret_key.clone())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "no secret key: set {} or publish.secret_key",
                    SECRET_KEY_ENV
                ))
            })
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/haikubot/config.toml` (~/.config/haikubot/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join(APP_DIR).join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/haikubot/` (~/.local/share/haikubot/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join(APP_DIR)
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/haikubot/` (~/.local/state/haikubot/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join(APP_DIR)
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/haikubot/data.db` (~/.local/share/haikubot/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/haikubot/haikubot.log` (~/.local/state/haikubot/haikubot.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("haikubot.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// Called by the binary before anything reads these variables.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
