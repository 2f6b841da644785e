//! Live configuration: the value every pass reads, how it is built from
//! layers, and how it is replaced at runtime.

pub mod coordinator;
pub mod delta;
pub mod nacos;
pub mod settings;
pub mod source;

use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::Result;
use crate::validation::clean_domain_list;
use settings::{parse_mode, Concurrency, EngineSettings, NamedMode};

pub use coordinator::ConfigCoordinator;
pub use delta::ConfigDelta;
pub use nacos::NacosSource;
pub use settings::{ConfigLayers, FileConfig};
pub use source::{poll_once, watch_source, ConfigSource};

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_RETRY_ATTEMPTS: usize = 3;
pub const DEFAULT_SERIAL_PAUSE_MS: u64 = 1000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// How a pass spreads its resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    Concurrent {
        limit: usize,
    },
    Serial {
        #[serde(serialize_with = "serialize_millis")]
        pause: Duration,
    },
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Concurrent { limit } => write!(f, "concurrent({})", limit),
            ExecutionMode::Serial { pause } => write!(f, "serial({}ms pause)", pause.as_millis()),
        }
    }
}

/// Connection settings for the external configuration source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub url: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub namespace_id: String,
    pub data_id: String,
    pub group: String,
    pub poll_interval_secs: u64,
    pub skip_ssl_verify: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            namespace_id: "public".to_string(),
            data_id: "domain-exporter".to_string(),
            group: "DEFAULT_GROUP".to_string(),
            poll_interval_secs: 10,
            skip_ssl_verify: false,
        }
    }
}

impl SourceSettings {
    pub fn is_enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// `NACOS_*` variables override the file's `[source]` table.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = non_empty("NACOS_URL") {
            self.url = Some(url);
        }
        if let Some(username) = non_empty("NACOS_USERNAME") {
            self.username = Some(username);
        }
        if let Some(password) = lookup("NACOS_PASSWORD").filter(|v| !v.is_empty()) {
            self.password = Some(password);
        }
        if let Some(namespace) = non_empty("NACOS_NAMESPACE_ID") {
            self.namespace_id = namespace;
        }
        if let Some(data_id) = non_empty("NACOS_DATA_ID") {
            self.data_id = data_id;
        }
        if let Some(group) = non_empty("NACOS_GROUP") {
            self.group = group;
        }
        if let Some(skip) = non_empty("NACOS_SKIP_SSL_VERIFY") {
            self.skip_ssl_verify = matches!(skip.to_lowercase().as_str(), "true" | "1" | "yes");
        }
    }
}

/// The configuration a pass runs with. Never mutated in place; the
/// coordinator swaps whole values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveConfig {
    pub domains: Vec<String>,
    #[serde(serialize_with = "serialize_secs")]
    pub check_interval: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub timeout: Duration,
    pub execution: ExecutionMode,
    pub backup_whois_servers: Vec<String>,
    pub retry_attempts: usize,
    pub log_level: String,
    pub source: SourceSettings,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            execution: ExecutionMode::Concurrent {
                limit: DEFAULT_CONCURRENCY,
            },
            backup_whois_servers: Vec::new(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            source: SourceSettings::default(),
        }
    }
}

impl LiveConfig {
    /// Resolve merged settings against the defaults.
    pub fn from_settings(settings: &EngineSettings, source: SourceSettings) -> Result<Self> {
        let defaults = LiveConfig::default();
        let pause = Duration::from_millis(settings.serial_pause_ms.unwrap_or(DEFAULT_SERIAL_PAUSE_MS));

        let execution = match &settings.concurrency {
            None => defaults.execution,
            Some(Concurrency::Limit(limit)) => ExecutionMode::Concurrent {
                limit: (*limit).max(1),
            },
            Some(Concurrency::Named(mode)) => match parse_mode(mode)? {
                NamedMode::Serial => ExecutionMode::Serial { pause },
                NamedMode::Concurrent => defaults.execution,
            },
        };

        Ok(Self {
            domains: clean_domain_list(settings.domains.iter().flatten()),
            check_interval: settings
                .check_interval
                .map(Duration::from_secs)
                .unwrap_or(defaults.check_interval),
            timeout: settings
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            execution,
            backup_whois_servers: clean_domain_list(settings.whois_servers.iter().flatten()),
            retry_attempts: settings.retry_attempts.unwrap_or(defaults.retry_attempts),
            log_level: settings
                .log_level
                .clone()
                .unwrap_or(defaults.log_level),
            source,
        })
    }

    pub fn contains_domain(&self, name: &str) -> bool {
        self.domains.iter().any(|d| d == name)
    }
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}
