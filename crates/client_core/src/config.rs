use std::time::Duration;

use url::Url;

use crate::error::{ClientError, Result};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080/api";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_ECHO_MATCH_WINDOW: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub poll_interval: Duration,
    /// How far apart a local post and a snapshot message may be stamped and
    /// still count as the same message.
    pub echo_match_window: Duration,
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            echo_match_window: DEFAULT_ECHO_MATCH_WINDOW,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl ClientConfig {
    pub fn with_api_base_url(mut self, raw: &str) -> Result<Self> {
        self.api_base_url = normalize_api_base_url(raw)?;
        Ok(self)
    }
}

/// Normalizes a server URL to the API base the feed endpoints hang off.
///
/// A bare origin (`http://host:8080`) gets the service's `/api` mount point
/// appended; an explicit path is kept as given.
pub fn normalize_api_base_url(raw: &str) -> Result<String> {
    let raw = raw.trim().trim_end_matches('/');
    if raw.is_empty() {
        return Ok(DEFAULT_API_BASE_URL.to_string());
    }

    let parsed = Url::parse(raw)?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ClientError::InvalidConfig(format!(
            "server url must start with http:// or https://: {raw}"
        )));
    }

    if parsed.path() == "/" || parsed.path().is_empty() {
        Ok(format!("{raw}/api"))
    } else {
        Ok(raw.to_string())
    }
}
