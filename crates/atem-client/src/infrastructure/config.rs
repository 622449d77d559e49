//! TOML-based configuration for the monitor binary.
//!
//! Example file:
//!
//! ```toml
//! [switcher]
//! address = "192.168.10.240"
//! port = 9910
//! bind_address = "0.0.0.0:0"
//!
//! [session]
//! retransmit_timeout_ms = 500
//! max_retransmits = 10
//!
//! [logging]
//! log_level = "debug"
//! ```
//!
//! # Serde default values
//!
//! Every field has a `#[serde(default = "...")]` fallback, so a partial file
//! only overrides what it names and a missing file yields
//! [`ClientConfig::default()`].  Durations are written in milliseconds to
//! keep the file readable.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use atem_core::SessionConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::connection::ConnectionConfig;

/// Default UDP port of ATEM switchers.
pub const DEFAULT_SWITCHER_PORT: u16 = 9910;

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

    /// A value parsed but cannot be used.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub switcher: SwitcherConfig,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the switcher lives and where we listen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwitcherConfig {
    /// IP address of the switcher.
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Local socket address.  Port 0 picks an ephemeral port.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Session timers and budgets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    #[serde(default = "default_retransmit_timeout_ms")]
    pub retransmit_timeout_ms: u64,
    #[serde(default = "default_max_retransmits")]
    pub max_retransmits: u32,
    #[serde(default = "default_handshake_interval_ms")]
    pub handshake_interval_ms: u64,
    #[serde(default = "default_handshake_attempts")]
    pub handshake_attempts: u32,
    /// How many recent inbound sequence numbers are remembered for
    /// duplicate detection.
    #[serde(default = "default_duplicate_window")]
    pub duplicate_window: usize,
    #[serde(default = "default_ack_delay_ms")]
    pub ack_delay_ms: u64,
    #[serde(default = "default_peer_timeout_ms")]
    pub peer_timeout_ms: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"atem_core=debug"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_address() -> String {
    "192.168.10.240".to_string()
}
fn default_port() -> u16 {
    DEFAULT_SWITCHER_PORT
}
fn default_bind_address() -> String {
    "0.0.0.0:0".to_string()
}
fn default_retransmit_timeout_ms() -> u64 {
    500
}
fn default_max_retransmits() -> u32 {
    10
}
fn default_handshake_interval_ms() -> u64 {
    1000
}
fn default_handshake_attempts() -> u32 {
    5
}
fn default_duplicate_window() -> usize {
    64
}
fn default_ack_delay_ms() -> u64 {
    10
}
fn default_peer_timeout_ms() -> u64 {
    10_000
}
fn default_tick_interval_ms() -> u64 {
    20
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SwitcherConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            bind_address: default_bind_address(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            retransmit_timeout_ms: default_retransmit_timeout_ms(),
            max_retransmits: default_max_retransmits(),
            handshake_interval_ms: default_handshake_interval_ms(),
            handshake_attempts: default_handshake_attempts(),
            duplicate_window: default_duplicate_window(),
            ack_delay_ms: default_ack_delay_ms(),
            peer_timeout_ms: default_peer_timeout_ms(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ── Validation and conversion ─────────────────────────────────────────────────

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl ClientConfig {
    /// Rejects values the session cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.switcher_addr()?;
        self.bind_addr()?;

        let s = &self.session;
        let positive: [(&'static str, u64); 6] = [
            ("session.retransmit_timeout_ms", s.retransmit_timeout_ms),
            ("session.handshake_interval_ms", s.handshake_interval_ms),
            ("session.handshake_attempts", u64::from(s.handshake_attempts)),
            ("session.duplicate_window", s.duplicate_window as u64),
            ("session.peer_timeout_ms", s.peer_timeout_ms),
            ("session.tick_interval_ms", s.tick_interval_ms),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(invalid(*field, "must be greater than zero"));
        }
        let retry_budget = s
            .retransmit_timeout_ms
            .saturating_mul(u64::from(s.max_retransmits) + 1);
        if s.peer_timeout_ms <= retry_budget {
            return Err(invalid(
                "session.peer_timeout_ms",
                format!("must be longer than the retry budget of {retry_budget} ms"),
            ));
        }
        Ok(())
    }

    /// Address of the switcher's control port.
    pub fn switcher_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .switcher
            .address
            .parse()
            .map_err(|_| invalid("switcher.address", format!("{:?} is not an IP address", self.switcher.address)))?;
        if self.switcher.port == 0 {
            return Err(invalid("switcher.port", "must not be zero"));
        }
        Ok(SocketAddr::new(ip, self.switcher.port))
    }

    /// Local address to bind the UDP socket to.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.switcher.bind_address.parse().map_err(|_| {
            invalid(
                "switcher.bind_address",
                format!("{:?} is not a socket address", self.switcher.bind_address),
            )
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        let s = &self.session;
        SessionConfig {
            retransmit_timeout: Duration::from_millis(s.retransmit_timeout_ms),
            max_retransmits: s.max_retransmits,
            handshake_interval: Duration::from_millis(s.handshake_interval_ms),
            handshake_attempts: s.handshake_attempts,
            duplicate_window: s.duplicate_window,
            ack_delay: Duration::from_millis(s.ack_delay_ms),
            peer_timeout: Duration::from_millis(s.peer_timeout_ms),
        }
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            session: self.session_config(),
            tick_interval: Duration::from_millis(self.session.tick_interval_ms),
            client_session_id: None,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses and validates configuration text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML and
/// [`ConfigError::Invalid`] for unusable values.
pub fn parse_config(content: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from `path`, returning `ClientConfig::default()` if
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and the errors of [`parse_config`] otherwise.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
