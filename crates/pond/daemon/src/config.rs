//! Configuration for pond-daemon

use chrono::Duration;
use pond_engine::PondPolicy;
use pond_types::{DEFAULT_STALE_AFTER_SECS, DEFAULT_WINDOW_SIZE};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Pond tunables and bootstrap members
    #[serde(default)]
    pub pond: PondConfig,

    /// Outbound SMS configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Upper bound on handling one webhook request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    #[default]
    Memory,

    /// PostgreSQL storage
    Postgres {
        /// Connection URL
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,

        /// Connection and statement timeout in seconds
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

/// Pond configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PondConfig {
    /// Invitations in the recency window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Seconds without a message after which a conversation is stale
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: i64,

    /// Region for numbers written without a country code
    #[serde(default = "default_region")]
    pub default_region: String,

    /// Numbers invited by the pond itself at startup
    #[serde(default)]
    pub seed_phones: Vec<String>,
}

impl Default for PondConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            stale_after_secs: default_stale_after(),
            default_region: default_region(),
            seed_phones: Vec::new(),
        }
    }
}

impl PondConfig {
    pub fn policy(&self) -> PondPolicy {
        PondPolicy {
            window_size: self.window_size,
            stale_after: Duration::seconds(self.stale_after_secs),
            default_region: self.default_region.clone(),
        }
    }
}

/// Outbound SMS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Log outbound messages instead of sending them
    #[default]
    Log,

    /// Send through the Twilio Messages API
    Twilio {
        account_sid: String,
        auth_token: String,

        /// Messaging service used as the sender when set
        #[serde(default)]
        messaging_service_sid: Option<String>,

        /// Sender number when no messaging service is configured
        #[serde(default)]
        from_number: Option<String>,

        #[serde(default = "default_twilio_api_base")]
        api_base: String,
    },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

fn default_request_timeout() -> u64 {
    30
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_stale_after() -> i64 {
    DEFAULT_STALE_AFTER_SECS
}

fn default_region() -> String {
    "US".to_string()
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration from defaults, an optional file and `POND_*`
    /// environment variables, in that order.
    ///
    /// Nested keys use a double underscore, e.g. `POND_SERVER__LISTEN_ADDR`;
    /// `POND_POND__SEED_PHONES` takes a comma-separated list.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("POND")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("pond.seed_phones")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
