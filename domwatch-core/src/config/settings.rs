//! Partial settings layers and their precedence.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{LiveConfig, SourceSettings};
use crate::error::{Result, WatchError};
use crate::validation::split_list;

/// `concurrency` accepts a worker count or the word `serial`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Concurrency {
    Limit(usize),
    Named(String),
}

/// One layer of engine settings. `None` means the layer leaves the value
/// to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub domains: Option<Vec<String>>,
    pub check_interval: Option<u64>,
    pub timeout: Option<u64>,
    pub concurrency: Option<Concurrency>,
    pub serial_pause_ms: Option<u64>,
    pub whois_servers: Option<Vec<String>>,
    pub retry_attempts: Option<usize>,
    pub log_level: Option<String>,
}

impl EngineSettings {
    /// Parse an external payload: JSON when it starts with `{`, otherwise
    /// TOML, falling back to YAML (the format most config-store entries
    /// are kept in).
    pub fn from_payload(payload: &str) -> Result<Self> {
        let trimmed = payload.trim();
        let settings: EngineSettings = if trimmed.starts_with('{') {
            serde_json::from_str(trimmed).map_err(|e| WatchError::MalformedPayload(e.to_string()))?
        } else {
            match toml::from_str(trimmed) {
                Ok(settings) => settings,
                Err(toml_err) => serde_yaml::from_str(trimmed).map_err(|yaml_err| {
                    WatchError::MalformedPayload(format!(
                        "neither TOML nor YAML: {}; {}",
                        toml_err, yaml_err
                    ))
                })?,
            }
        };
        settings
            .validate()
            .map_err(|e| WatchError::MalformedPayload(e.to_string()))?;
        Ok(settings.normalized())
    }

    /// Read the environment overrides through `lookup`.
    ///
    /// Unparseable numbers are ignored with a warning.
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(variable = key, value = %raw, "Ignoring non-numeric environment override");
                    None
                }
            }
        };

        let concurrency = lookup("CONCURRENCY").and_then(|raw| {
            let raw = raw.trim().to_string();
            match raw.parse::<usize>() {
                Ok(n) => Some(Concurrency::Limit(n)),
                Err(_) if !raw.is_empty() => Some(Concurrency::Named(raw)),
                Err(_) => None,
            }
        });

        Self {
            domains: lookup("DOMAINS").map(|v| split_list(&v)),
            check_interval: number("CHECK_INTERVAL"),
            timeout: number("TIMEOUT"),
            concurrency,
            serial_pause_ms: number("SERIAL_PAUSE_MS"),
            whois_servers: lookup("WHOIS_SERVERS").map(|v| split_list(&v)),
            retry_attempts: number("RETRY_ATTEMPTS").map(|v| v as usize),
            log_level: lookup("LOG_LEVEL").map(|v| v.trim().to_string()),
        }
        .normalized()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(Concurrency::Named(mode)) = &self.concurrency {
            parse_mode(mode)?;
        }
        Ok(())
    }

    /// Zero numbers and empty lists or strings count as unset.
    pub fn normalized(mut self) -> Self {
        self.domains = self.domains.filter(|d| !d.is_empty());
        self.check_interval = self.check_interval.filter(|v| *v > 0);
        self.timeout = self.timeout.filter(|v| *v > 0);
        self.retry_attempts = self.retry_attempts.filter(|v| *v > 0);
        self.concurrency = self.concurrency.filter(|c| !matches!(c, Concurrency::Limit(0)));
        self.whois_servers = self.whois_servers.filter(|s| !s.is_empty());
        self.log_level = self.log_level.filter(|l| !l.is_empty());
        self
    }

    /// Values set in `upper` win.
    pub fn overlay(&self, upper: &EngineSettings) -> EngineSettings {
        EngineSettings {
            domains: upper.domains.clone().or_else(|| self.domains.clone()),
            check_interval: upper.check_interval.or(self.check_interval),
            timeout: upper.timeout.or(self.timeout),
            concurrency: upper.concurrency.clone().or_else(|| self.concurrency.clone()),
            serial_pause_ms: upper.serial_pause_ms.or(self.serial_pause_ms),
            whois_servers: upper
                .whois_servers
                .clone()
                .or_else(|| self.whois_servers.clone()),
            retry_attempts: upper.retry_attempts.or(self.retry_attempts),
            log_level: upper.log_level.clone().or_else(|| self.log_level.clone()),
        }
    }
}

/// Execution mode named in a `concurrency` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NamedMode {
    Serial,
    Concurrent,
}

pub(crate) fn parse_mode(mode: &str) -> Result<NamedMode> {
    match mode.trim().to_lowercase().as_str() {
        "serial" | "sequential" => Ok(NamedMode::Serial),
        "concurrent" | "parallel" => Ok(NamedMode::Concurrent),
        other => Err(WatchError::Config(format!(
            "unknown concurrency mode '{}'",
            other
        ))),
    }
}

/// Shape of the local file: engine keys at the top level plus a `source`
/// table. `.yaml`/`.yml` files are read as YAML, anything else as TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(flatten)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub source: SourceSettings,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            serde_yaml::from_str(&content)
                .map_err(|e| WatchError::Config(format!("{}: {}", path.display(), e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| WatchError::Config(format!("{}: {}", path.display(), e)))
        }
    }
}

/// Every static layer, kept so an external payload can be merged in
/// between them later.
///
/// Precedence, lowest first: defaults, file, external payload, environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayers {
    pub file: EngineSettings,
    pub env: EngineSettings,
    pub source: SourceSettings,
}

impl ConfigLayers {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration file");
                FileConfig::load(path)?
            }
            None => FileConfig::default(),
        };
        file.engine.validate()?;

        let mut source = file.source;
        source.apply_env(&lookup);

        Ok(Self {
            file: file.engine.normalized(),
            env: EngineSettings::from_env_with(&lookup),
            source,
        })
    }

    /// Build a [`LiveConfig`] with an optional external layer merged in.
    pub fn build(&self, external: Option<&EngineSettings>) -> Result<LiveConfig> {
        let mut merged = self.file.clone();
        if let Some(external) = external {
            merged = merged.overlay(external);
        }
        merged = merged.overlay(&self.env);
        LiveConfig::from_settings(&merged, self.source.clone())
    }
}
