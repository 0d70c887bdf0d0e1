//! Bridge configuration
//!
//! Settings come from built-in defaults, an optional TOML file, the
//! environment (for the broker password) and finally command-line flags, in
//! increasing order of precedence.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Main bridge configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub broker: BrokerSection,
    #[serde(default)]
    pub notify: NotifySection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
}

/// Broker section: where to connect and what to consume
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_guest")]
    pub user: String,
    #[serde(default = "default_guest")]
    pub password: String,
    /// Environment variable containing the password, overrides `password`
    pub password_env: Option<String>,
    #[serde(default = "default_vhost")]
    pub vhost: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_queue")]
    pub queue: String,
    /// Declare the exchange and queue as durable
    #[serde(default)]
    pub durable: bool,
    #[serde(default = "default_consumer_tag_prefix")]
    pub consumer_tag_prefix: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5672
}

fn default_guest() -> String {
    "guest".to_string()
}

fn default_vhost() -> String {
    "/".to_string()
}

fn default_exchange() -> String {
    "chat-notify".to_string()
}

fn default_queue() -> String {
    "irc-notify-queue".to_string()
}

fn default_consumer_tag_prefix() -> String {
    "irc-notify".to_string()
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_guest(),
            password: default_guest(),
            password_env: None,
            vhost: default_vhost(),
            exchange: default_exchange(),
            queue: default_queue(),
            durable: false,
            consumer_tag_prefix: default_consumer_tag_prefix(),
        }
    }
}

/// Which desktop notification backend to use
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NotifierBackend {
    /// Pick by runtime platform
    #[default]
    Auto,
    NotifySend,
    TerminalNotifier,
    /// Only write notifications to the log
    Log,
}

/// notify-send urgency levels
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Normal,
    #[default]
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

/// Notification section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifySection {
    #[serde(default)]
    pub backend: NotifierBackend,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default = "default_icon")]
    pub icon: String,
}

fn default_icon() -> String {
    "notification-message-im".to_string()
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            backend: NotifierBackend::Auto,
            urgency: Urgency::Critical,
            icon: default_icon(),
        }
    }
}

/// Reconnect section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectSection {
    /// Fixed delay before reconnecting (default: 30)
    #[serde(default = "default_reconnect_delay")]
    pub delay_secs: u64,
}

fn default_reconnect_delay() -> u64 {
    30
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            delay_secs: default_reconnect_delay(),
        }
    }
}

impl ReconnectSection {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Command-line overrides applied on top of the file configuration
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub exchange: Option<String>,
    pub queue: Option<String>,
    pub notifier: Option<NotifierBackend>,
}

impl BridgeConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        let broker = &mut self.broker;
        if let Some(host) = overrides.host {
            broker.host = host;
        }
        if let Some(port) = overrides.port {
            broker.port = port;
        }
        if let Some(user) = overrides.user {
            broker.user = user;
        }
        if let Some(password) = overrides.password {
            broker.password = password;
            // An explicit password wins over the environment lookup
            broker.password_env = None;
        }
        if let Some(exchange) = overrides.exchange {
            broker.exchange = exchange;
        }
        if let Some(queue) = overrides.queue {
            broker.queue = queue;
        }
        if let Some(notifier) = overrides.notifier {
            self.notify.backend = notifier;
        }
    }

    /// Check field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let broker = &self.broker;
        for (name, value) in [
            ("broker.host", &broker.host),
            ("broker.exchange", &broker.exchange),
            ("broker.queue", &broker.queue),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(format!("{name} must not be empty")));
            }
        }

        if broker.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "broker.port must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.delay_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "reconnect.delay_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve the effective connection descriptor
    pub fn connection_descriptor(&self) -> Result<ConnectionDescriptor, ConfigError> {
        let broker = &self.broker;
        let password = match &broker.password_env {
            Some(name) => Self::get_env_var_required(name)?,
            None => broker.password.clone(),
        };

        Ok(ConnectionDescriptor {
            host: broker.host.clone(),
            port: broker.port,
            user: broker.user.clone(),
            password,
            vhost: broker.vhost.clone(),
            exchange: broker.exchange.clone(),
            queue: broker.queue.clone(),
            durable: broker.durable,
            consumer_tag_prefix: broker.consumer_tag_prefix.clone(),
        })
    }

    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }
}

/// Everything needed to open a broker connection and subscribe
#[derive(Clone, PartialEq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub exchange: String,
    pub queue: String,
    pub durable: bool,
    pub consumer_tag_prefix: String,
}

impl Default for ConnectionDescriptor {
    fn default() -> Self {
        let broker = BrokerSection::default();
        Self {
            host: broker.host,
            port: broker.port,
            user: broker.user,
            password: broker.password,
            vhost: broker.vhost,
            exchange: broker.exchange,
            queue: broker.queue,
            durable: broker.durable,
            consumer_tag_prefix: broker.consumer_tag_prefix,
        }
    }
}

impl ConnectionDescriptor {
    /// Build the AMQP URI, percent-encoding credentials and vhost
    pub fn amqp_uri(&self) -> Result<String, ConfigError> {
        let mut url = Url::parse(&format!("amqp://{}:{}", self.host, self.port))
            .map_err(|e| ConfigError::InvalidConfig(format!("invalid broker address: {e}")))?;

        url.set_username(&self.user)
            .and_then(|_| url.set_password(Some(&self.password)))
            .map_err(|_| {
                ConfigError::InvalidConfig(format!(
                    "broker host '{}' cannot carry credentials",
                    self.host
                ))
            })?;

        // The default vhost "/" has to be sent encoded as "%2f"
        let vhost: String = url::form_urlencoded::byte_serialize(self.vhost.as_bytes()).collect();
        url.set_path(&vhost);

        Ok(url.to_string())
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "amqp://{}:***@{}:{} (exchange '{}', queue '{}')",
            self.user, self.host, self.port, self.exchange, self.queue
        )
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("vhost", &self.vhost)
            .field("exchange", &self.exchange)
            .field("queue", &self.queue)
            .field("durable", &self.durable)
            .finish()
    }
}
