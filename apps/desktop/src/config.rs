use std::{collections::HashMap, fs, time::Duration};

use anyhow::Context;
use client_core::config::{
    normalize_api_base_url, ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_ECHO_MATCH_WINDOW,
    DEFAULT_POLL_INTERVAL,
};

const SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub poll_interval: Duration,
    pub echo_match_window: Duration,
    pub token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_API_BASE_URL.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            echo_match_window: DEFAULT_ECHO_MATCH_WINDOW,
            token: None,
        }
    }
}

impl Settings {
    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let api_base_url = normalize_api_base_url(&self.server_url)
            .with_context(|| format!("invalid server url '{}'", self.server_url))?;
        Ok(ClientConfig {
            api_base_url,
            poll_interval: self.poll_interval,
            echo_match_window: self.echo_match_window,
            ..ClientConfig::default()
        })
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        tracing::warn!("config: ignoring malformed {SETTINGS_FILE}");
        return;
    };
    if let Some(v) = file_cfg.get("server_url") {
        settings.server_url = v.clone();
    }
    if let Some(v) = file_cfg.get("poll_interval_ms").and_then(|v| v.parse().ok()) {
        settings.poll_interval = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg
        .get("echo_match_window_secs")
        .and_then(|v| v.parse().ok())
    {
        settings.echo_match_window = Duration::from_secs(v);
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("FEED_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = var("APP__POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        settings.poll_interval = Duration::from_millis(v);
    }
    if let Some(v) = var("APP__ECHO_MATCH_WINDOW_SECS").and_then(|v| v.parse().ok()) {
        settings.echo_match_window = Duration::from_secs(v);
    }

    if let Some(v) = var("FEED_TOKEN").filter(|v| !v.trim().is_empty()) {
        settings.token = Some(v);
    }
}
