use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

use crate::config::AppConfig;
use crate::notify::NotificationSlot;
use crate::paging::ListState;
use crate::toggle::ToggleBook;

/// Stable identity of a list item.
pub trait Listed {
    type Id: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampId(pub u64);

impl fmt::Display for CampId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camp {
    #[serde(rename = "campId")]
    pub id: CampId,
    pub name: String,
    #[serde(default)]
    pub thumb_image: Option<String>,
    #[serde(default)]
    pub street_addr: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub line_intro: Option<String>,
    /// Bookmark state as reported by the server when the page was fetched.
    #[serde(default)]
    pub marked: bool,
    #[serde(default)]
    pub tel: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
}

impl Listed for Camp {
    type Id = CampId;

    fn id(&self) -> CampId {
        self.id
    }
}

/// Query criteria of a list. Values are compared verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter(BTreeMap<String, String>);

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn search(city: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self::new().with("city", city).with("keyword", keyword)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// True when no criterion carries a value.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(String::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub cursor: u32,
}

/// Spring-style page envelope returned by the camping API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(default)]
    pub total_elements: u64,
}

impl<T> PageResponse<T> {
    pub fn into_page(self, cursor: u32) -> Page<T> {
        Page {
            items: self.content,
            total_count: self.total_elements,
            cursor,
        }
    }
}

/// Authenticated session. The token never leaves through `Debug`.
pub struct Session {
    token: SecretString,
}

impl Session {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
        }
    }

    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"[REDACTED]").finish()
    }
}

#[derive(Debug)]
pub struct Model {
    pub config: AppConfig,
    pub session: Option<Session>,
    /// Path the shell should display.
    pub location: String,
    pub search: ListState<Camp>,
    pub bookmarks: ListState<Camp>,
    pub flags: ToggleBook<CampId>,
    pub notifications: NotificationSlot,
    pub active_error: Option<crate::AppError>,
}

impl Default for Model {
    fn default() -> Self {
        Self::with_config(AppConfig::default())
    }
}

impl Model {
    #[must_use]
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            search: ListState::new(config.search),
            bookmarks: ListState::new(config.bookmarks),
            flags: ToggleBook::new(),
            notifications: NotificationSlot::new(config.notifications.reopen_delay_ms),
            session: None,
            location: "/".into(),
            active_error: None,
            config,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn list_mut(&mut self, kind: crate::ListKind) -> &mut ListState<Camp> {
        match kind {
            crate::ListKind::Search => &mut self.search,
            crate::ListKind::Bookmarks => &mut self.bookmarks,
        }
    }

    /// Looks a camp up in either accumulated list.
    pub fn find_camp(&self, id: CampId) -> Option<&Camp> {
        self.search
            .items()
            .iter()
            .chain(self.bookmarks.items())
            .find(|c| c.id == id)
    }

    /// Replaces configuration and empties both lists. Epochs and sequence
    /// numbers carry over, so completions issued earlier stay stale.
    pub fn apply_config(&mut self, config: AppConfig) {
        self.search.reconfigure(config.search);
        self.bookmarks.reconfigure(config.bookmarks);
        self.flags.clear();
        self.notifications.reconfigure(config.notifications.reopen_delay_ms);
        self.config = config;
    }
}
