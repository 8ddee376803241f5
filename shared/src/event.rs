use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::AppConfig;
use crate::model::{Camp, CampId, Page};
use crate::paging::LoadTicket;
use crate::toggle::ToggleTicket;
use crate::view::NavTab;
use crate::RemoteError;

// --- Access token as handed over by the shell; redacted in Debug ---

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Which accumulated list an event targets.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Search,
    Bookmarks,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Search => "search",
            Self::Bookmarks => "bookmarks",
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Setup & session
    Configure {
        config: Box<AppConfig>,
    },
    SessionStarted {
        token: AccessToken,
    },
    SessionEnded,

    // Navigation
    RouteChanged {
        path: String,
    },
    TabSelected {
        tab: NavTab,
    },
    AuthButtonClicked,
    CampSelected {
        camp_id: CampId,
    },

    // Lists
    SearchRouteEntered {
        city: String,
        keyword: String,
    },
    SearchSubmitted {
        city: String,
        keyword: String,
    },
    BookmarksOpened,
    ViewClosed {
        list: ListKind,
    },
    /// The scroll sentinel entered the viewport.
    LoadMore {
        list: ListKind,
    },
    PageLoaded {
        list: ListKind,
        ticket: LoadTicket,
        result: Result<Page<Camp>, RemoteError>,
    },

    // Bookmark toggling
    ToggleRequested {
        list: ListKind,
        camp_id: CampId,
    },
    ToggleSettled {
        list: ListKind,
        ticket: ToggleTicket<CampId>,
        result: Result<(), RemoteError>,
    },

    // Notifications
    NotificationReopenDue {
        seq: u64,
    },
    NotificationDismissed {
        seq: u64,
    },
}

impl Event {
    /// Stable name for log fields.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Configure { .. } => "configure",
            Self::SessionStarted { .. } => "session_started",
            Self::SessionEnded => "session_ended",
            Self::RouteChanged { .. } => "route_changed",
            Self::TabSelected { .. } => "tab_selected",
            Self::AuthButtonClicked => "auth_button_clicked",
            Self::CampSelected { .. } => "camp_selected",
            Self::SearchRouteEntered { .. } => "search_route_entered",
            Self::SearchSubmitted { .. } => "search_submitted",
            Self::BookmarksOpened => "bookmarks_opened",
            Self::ViewClosed { .. } => "view_closed",
            Self::LoadMore { .. } => "load_more",
            Self::PageLoaded { .. } => "page_loaded",
            Self::ToggleRequested { .. } => "toggle_requested",
            Self::ToggleSettled { .. } => "toggle_settled",
            Self::NotificationReopenDue { .. } => "notification_reopen_due",
            Self::NotificationDismissed { .. } => "notification_dismissed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_debug_is_redacted() {
        let token = AccessToken::new("jwt-value");
        assert_eq!(format!("{token:?}"), "[REDACTED]");
        let event = Event::SessionStarted { token };
        assert!(!format!("{event:?}").contains("jwt-value"));
    }

    #[test]
    fn event_survives_json() {
        let event = Event::ToggleRequested {
            list: ListKind::Bookmarks,
            camp_id: CampId(12),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(serde_json::from_str::<Event>(&json).unwrap(), event);
    }

    #[test]
    fn names_are_snake_case() {
        assert_eq!(Event::BookmarksOpened.name(), "bookmarks_opened");
        assert_eq!(Event::LoadMore { list: ListKind::Search }.name(), "load_more");
    }
}
