use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::paging::HasMorePolicy;
use crate::{
    BOOKMARK_PAGE_SIZE, MAX_NOTIFICATION_REOPEN_DELAY_MS, MAX_PAGE_SIZE,
    NOTIFICATION_REOPEN_DELAY_MS, SEARCH_PAGE_SIZE,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("malformed configuration: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub search_path: String,
    pub bookmarks_path: String,
    /// `{id}` is replaced by the camp id.
    pub bookmark_toggle_path: String,
    /// Thumbnails used when a camp has none.
    pub fallback_thumbnails: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.camping.example".into(),
            search_path: "/api/camps/search".into(),
            bookmarks_path: "/api/bookmarks".into(),
            bookmark_toggle_path: "/api/bookmarks/{id}".into(),
            fallback_thumbnails: Vec::new(),
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Validation(format!("base_url: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "base_url scheme '{}' is not http(s)",
                parsed.scheme()
            )));
        }
        for (name, path) in [
            ("search_path", &self.search_path),
            ("bookmarks_path", &self.bookmarks_path),
            ("bookmark_toggle_path", &self.bookmark_toggle_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Validation(format!("{name} must start with '/'")));
            }
        }
        if !self.bookmark_toggle_path.contains("{id}") {
            return Err(ConfigError::Validation(
                "bookmark_toggle_path must contain '{id}'".into(),
            ));
        }
        Ok(())
    }
}

/// Page size and continuation rule of one list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfig {
    pub page_size: u32,
    #[serde(default)]
    pub has_more_policy: HasMorePolicy,
}

impl ListConfig {
    #[must_use]
    pub const fn search() -> Self {
        Self {
            page_size: SEARCH_PAGE_SIZE,
            has_more_policy: HasMorePolicy::TotalCount,
        }
    }

    #[must_use]
    pub const fn bookmarks() -> Self {
        Self {
            page_size: BOOKMARK_PAGE_SIZE,
            has_more_policy: HasMorePolicy::TotalCount,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Validation("page_size must be > 0".into()));
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Validation(format!(
                "page_size must be <= {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub reopen_delay_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            reopen_delay_ms: NOTIFICATION_REOPEN_DELAY_MS,
        }
    }
}

impl NotificationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reopen_delay_ms > MAX_NOTIFICATION_REOPEN_DELAY_MS {
            return Err(ConfigError::Validation(format!(
                "reopen_delay_ms must be <= {MAX_NOTIFICATION_REOPEN_DELAY_MS}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub search: ListConfig,
    pub bookmarks: ListConfig,
    pub notifications: NotificationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            search: ListConfig::search(),
            bookmarks: ListConfig::bookmarks(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parses and validates a JSON document; missing fields take defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()?;
        self.search.validate()?;
        self.bookmarks.validate()?;
        self.notifications.validate()?;
        Ok(())
    }
}
