//! Nacos-style HTTP configuration source.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::source::ConfigSource;
use super::SourceSettings;
use crate::error::{Result, WatchError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TOKEN_TTL_SECS: u64 = 18000;
const MAX_TOKEN_TTL_SECS: u64 = 7 * 24 * 3600;
/// Refresh this long before the server-side expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(30);
const MISSING_CONFIG_BODY: &str = "config data not exist";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: Option<String>,
    token_ttl: Option<u64>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

/// Fetches the payload stored under `data_id`/`group` in a namespace,
/// logging in first when credentials are configured.
pub struct NacosSource {
    http: Client,
    settings: SourceSettings,
    base_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl NacosSource {
    pub fn new(settings: SourceSettings) -> Result<Self> {
        let base_url = settings
            .url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| WatchError::Config("configuration source URL is not set".to_string()))?;

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("domwatch/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(settings.skip_ssl_verify)
            .build()?;

        Ok(Self {
            http,
            settings,
            base_url,
            token: Mutex::new(None),
        })
    }

    /// `None` when no URL is configured.
    pub fn from_settings(settings: &SourceSettings) -> Result<Option<Self>> {
        if !settings.is_enabled() {
            return Ok(None);
        }
        Self::new(settings.clone()).map(Some)
    }

    fn has_credentials(&self) -> bool {
        self.settings
            .username
            .as_deref()
            .is_some_and(|u| !u.is_empty())
    }

    async fn access_token(&self) -> Result<Option<String>> {
        if !self.has_credentials() {
            return Ok(None);
        }

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(Some(token.value.clone()));
        }

        let token = self.login().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(Some(value))
    }

    async fn login(&self) -> Result<AccessToken> {
        let url = format!("{}/nacos/v1/auth/login", self.base_url);
        let form = [
            ("username", self.settings.username.clone().unwrap_or_default()),
            ("password", self.settings.password.clone().unwrap_or_default()),
        ];

        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| WatchError::SourceUnavailable(format!("login request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(WatchError::SourceUnavailable(format!(
                "login rejected with {}: {}",
                status,
                body.trim()
            )));
        }

        let login: LoginResponse = serde_json::from_str(&body).map_err(|e| {
            WatchError::SourceUnavailable(format!("unreadable login response: {}", e))
        })?;
        let value = login.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            WatchError::SourceUnavailable(format!("login response carries no token: {}", body.trim()))
        })?;
        let ttl = login
            .token_ttl
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
            .min(MAX_TOKEN_TTL_SECS);

        debug!(expires_in_secs = ttl, "Refreshed access token");
        Ok(AccessToken {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl),
        })
    }
}

#[async_trait]
impl ConfigSource for NacosSource {
    #[instrument(skip(self), fields(data_id = %self.settings.data_id, group = %self.settings.group))]
    async fn fetch(&self) -> Result<String> {
        let token = self.access_token().await?;
        let url = format!("{}/nacos/v1/cs/configs", self.base_url);

        let mut query = vec![
            ("dataId", self.settings.data_id.as_str()),
            ("group", self.settings.group.as_str()),
            ("tenant", self.settings.namespace_id.as_str()),
        ];
        if let Some(token) = token.as_deref() {
            query.push(("accessToken", token));
        }

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| WatchError::SourceUnavailable(format!("config request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND || body.trim() == MISSING_CONFIG_BODY {
            return Err(WatchError::SourceEmpty);
        }
        if !status.is_success() {
            if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED {
                // Token may have been revoked early; log in again next time.
                *self.token.lock().await = None;
            }
            return Err(WatchError::SourceUnavailable(format!(
                "config request returned {}",
                status
            )));
        }
        if body.trim().is_empty() {
            return Err(WatchError::SourceEmpty);
        }

        debug!(bytes = body.len(), "Fetched configuration payload");
        Ok(body)
    }

    fn poll_interval(&self) -> Duration {
        self.settings.poll_interval()
    }

    fn name(&self) -> &str {
        "nacos"
    }
}
