//! Application settings, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::messages::{MessageCatalog, MessageKey};

pub const DEFAULT_SESSION_COOKIE: &str = "WEFTSESSIONID";
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_REQUEST_BODY_SIZE: u64 = 64 * 1024 * 1024;
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// How the response to a listener invocation is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStrategy {
    /// Render straight into the response.
    DirectRender,
    /// Render into a buffer, redirect, and serve the buffer on the follow-up GET.
    #[default]
    RedirectToBuffer,
    /// Redirect to the page's `redirect` URL and render on the follow-up GET.
    RedirectToRender,
}

impl RenderStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectRender => "direct_render",
            Self::RedirectToBuffer => "redirect_to_buffer",
            Self::RedirectToRender => "redirect_to_render",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    /// Bookmarkable page class served for the bare root URL.
    pub home_page: String,
    pub page_expired_page: Option<String>,
    pub stale_data_page: Option<String>,
    pub internal_error_page: Option<String>,
    pub render_strategy: RenderStrategy,
    pub max_pages_per_map: usize,
    pub buffer_capacity_per_session: usize,
    pub default_max_upload_size: u64,
    /// Ceiling on any request body, applied before the body is read.
    pub max_request_body_size: u64,
    pub static_root: Option<PathBuf>,
    pub session_cookie_name: String,
    /// Idle sessions are dropped after this many seconds.
    pub session_timeout_secs: u64,
    pub max_sessions: usize,
    pub messages: BTreeMap<MessageKey, String>,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            home_page: "Home".to_string(),
            page_expired_page: None,
            stale_data_page: None,
            internal_error_page: None,
            render_strategy: RenderStrategy::default(),
            max_pages_per_map: 16,
            buffer_capacity_per_session: 4,
            default_max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            max_request_body_size: DEFAULT_MAX_REQUEST_BODY_SIZE,
            static_root: None,
            session_cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            max_sessions: DEFAULT_MAX_SESSIONS,
            messages: BTreeMap::new(),
        }
    }
}

impl ApplicationSettings {
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self> {
        toml::from_str(content).map_err(|source| ModelError::SettingsToml {
            origin: origin.to_string(),
            source,
        })
    }

    /// Load settings from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ModelError::SettingsIo {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&content, &path.display().to_string())?;
        tracing::info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn message_catalog(&self) -> MessageCatalog {
        MessageCatalog::with_overrides(self.messages.clone())
    }

    #[must_use]
    pub fn with_home_page(mut self, class: impl Into<String>) -> Self {
        self.home_page = class.into();
        self
    }

    #[must_use]
    pub fn with_page_expired_page(mut self, class: impl Into<String>) -> Self {
        self.page_expired_page = Some(class.into());
        self
    }

    #[must_use]
    pub fn with_stale_data_page(mut self, class: impl Into<String>) -> Self {
        self.stale_data_page = Some(class.into());
        self
    }

    #[must_use]
    pub fn with_internal_error_page(mut self, class: impl Into<String>) -> Self {
        self.internal_error_page = Some(class.into());
        self
    }

    #[must_use]
    pub fn with_render_strategy(mut self, strategy: RenderStrategy) -> Self {
        self.render_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_max_pages_per_map(mut self, max: usize) -> Self {
        self.max_pages_per_map = max.max(1);
        self
    }

    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity_per_session = capacity;
        self
    }

    #[must_use]
    pub fn with_default_max_upload_size(mut self, bytes: u64) -> Self {
        self.default_max_upload_size = bytes;
        self
    }

    #[must_use]
    pub fn with_max_request_body_size(mut self, bytes: u64) -> Self {
        self.max_request_body_size = bytes;
        self
    }

    #[must_use]
    pub fn with_session_timeout_secs(mut self, secs: u64) -> Self {
        self.session_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max.max(1);
        self
    }

    #[must_use]
    pub fn with_static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_root = Some(root.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_valid() {
        let settings = ApplicationSettings::from_toml_str("", "inline").unwrap();
        assert_eq!(settings, ApplicationSettings::default());
        assert_eq!(settings.render_strategy, RenderStrategy::RedirectToBuffer);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = ApplicationSettings::from_toml_str(
            r#"
            home_page = "Start"
            render_strategy = "direct_render"
            stale_data_page = "Stale"

            [messages]
            Required = "${label} fehlt"
            "#,
            "inline",
        )
        .unwrap();
        assert_eq!(settings.home_page, "Start");
        assert_eq!(settings.render_strategy, RenderStrategy::DirectRender);
        assert_eq!(settings.stale_data_page.as_deref(), Some("Stale"));
        assert_eq!(settings.max_pages_per_map, 16);
        assert_eq!(settings.session_cookie_name, DEFAULT_SESSION_COOKIE);
        assert_eq!(settings.session_timeout_secs, DEFAULT_SESSION_TIMEOUT_SECS);
        assert_eq!(
            settings.message_catalog().template(MessageKey::Required),
            "${label} fehlt"
        );
    }

    #[test]
    fn unknown_strategy_is_an_error() {
        let err = ApplicationSettings::from_toml_str("render_strategy = \"sometimes\"", "inline")
            .unwrap_err();
        assert!(err.to_string().contains("inline"));
    }
}
