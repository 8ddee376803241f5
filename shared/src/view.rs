use serde::{Deserialize, Serialize};

use crate::event::ListKind;
use crate::model::{Camp, CampId, Filter, Model};
use crate::notify::{Notification, Severity};
use crate::paging::ListState;
use crate::toggle::ToggleBook;

pub const NO_ADDRESS: &str = "도로명 주소 정보 없음";
pub const NO_TEL: &str = "연락처 정보 없음";
pub const NO_HOMEPAGE: &str = "홈페이지 정보 없음";
pub const HOMEPAGE_LINK_LABEL: &str = "홈페이지 바로가기";
pub const NO_SEARCH_RESULTS: &str = "검색 결과가 없습니다.";
pub const NO_BOOKMARKS: &str = "찜한 캠핑장이 없습니다.";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum NavTab {
    #[default]
    Home,
    MyReservation,
    MyBookmark,
    MyPage,
}

impl NavTab {
    pub const ALL: [Self; 4] = [Self::Home, Self::MyReservation, Self::MyBookmark, Self::MyPage];

    /// Unknown paths select `Home`.
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        match path {
            "/my-reservation" => Self::MyReservation,
            "/my-bookmark" => Self::MyBookmark,
            "/my-page" => Self::MyPage,
            _ => Self::Home,
        }
    }

    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::MyReservation => "/my-reservation",
            Self::MyBookmark => "/my-bookmark",
            Self::MyPage => "/my-page",
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Home => 0,
            Self::MyReservation => 1,
            Self::MyBookmark => 2,
            Self::MyPage => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Home => "홈",
            Self::MyReservation => "나의예약",
            Self::MyBookmark => "찜한캠핑장",
            Self::MyPage => "마이페이지",
        }
    }

    pub const fn requires_auth(self) -> bool {
        !matches!(self, Self::Home)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HeaderView {
    pub active_tab: NavTab,
    pub tabs: Vec<NavTab>,
    pub authenticated: bool,
    pub auth_label: String,
}

impl HeaderView {
    pub fn new(path: &str, authenticated: bool) -> Self {
        Self {
            active_tab: NavTab::from_path(path),
            tabs: NavTab::ALL
                .into_iter()
                .filter(|tab| authenticated || !tab.requires_auth())
                .collect(),
            authenticated,
            auth_label: if authenticated { "LOGOUT" } else { "LOGIN" }.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CampCardView {
    pub id: CampId,
    pub name: String,
    pub address: String,
    pub thumbnail: Option<String>,
    pub keywords: Vec<String>,
    pub line_intro: String,
    pub liked: bool,
    pub toggle_pending: bool,
}

impl CampCardView {
    pub fn new(camp: &Camp, flags: &ToggleBook<CampId>, fallback_thumbnails: &[String]) -> Self {
        let state = flags.state(&camp.id);
        Self {
            id: camp.id,
            name: camp.name.clone(),
            address: camp.street_addr.clone(),
            thumbnail: thumbnail_for(camp, fallback_thumbnails),
            keywords: camp.keywords.iter().map(|k| format!("#{k}")).collect(),
            line_intro: line_intro(camp),
            liked: state.map_or(camp.marked, |s| s.flagged),
            toggle_pending: state.is_some_and(|s| s.pending),
        }
    }
}

/// The camp's own intro, or "{first two address words}에 있는 {name}".
pub fn line_intro(camp: &Camp) -> String {
    if let Some(intro) = camp.line_intro.as_deref().filter(|s| !s.trim().is_empty()) {
        return intro.to_owned();
    }
    let region = camp
        .street_addr
        .split(' ')
        .take(2)
        .collect::<Vec<_>>()
        .join(" ");
    format!("{region}에 있는 {}", camp.name)
}

/// The camp's thumbnail, else a pool entry picked from the camp id.
pub fn thumbnail_for(camp: &Camp, pool: &[String]) -> Option<String> {
    if let Some(thumb) = camp.thumb_image.as_deref().filter(|s| !s.is_empty()) {
        return Some(thumb.to_owned());
    }
    if pool.is_empty() {
        return None;
    }
    let digest = blake3::hash(&camp.id.0.to_le_bytes());
    let mut head = [0_u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    let index = u64::from_le_bytes(head) % pool.len() as u64;
    usize::try_from(index).ok().and_then(|i| pool.get(i)).cloned()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AddressInfo {
    pub address: String,
    pub tel_label: String,
    /// `tel:` link with dashes removed.
    pub tel_href: Option<String>,
    pub homepage_label: String,
    pub homepage_href: Option<String>,
}

impl AddressInfo {
    pub fn new(camp: &Camp) -> Self {
        let address = if camp.street_addr.trim().is_empty() {
            NO_ADDRESS.to_owned()
        } else {
            camp.street_addr.clone()
        };

        let tel = camp.tel.as_deref().filter(|t| !t.is_empty());
        let dialable = tel.map(|t| t.replace('-', "")).filter(|t| !t.is_empty());
        let (tel_label, tel_href) = match (tel, dialable) {
            (Some(tel), Some(digits)) => (tel.to_owned(), Some(format!("tel:{digits}"))),
            _ => (NO_TEL.to_owned(), None),
        };

        let homepage = camp.homepage.as_deref().filter(|h| !h.is_empty());
        let (homepage_label, homepage_href) = match homepage {
            Some(url) => (HOMEPAGE_LINK_LABEL.to_owned(), Some(url.to_owned())),
            None => (NO_HOMEPAGE.to_owned(), None),
        };

        Self {
            address,
            tel_label,
            tel_href,
            homepage_label,
            homepage_href,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ListView {
    pub cards: Vec<CampCardView>,
    pub loading: bool,
    pub has_more: bool,
    /// Set when nothing loaded and nothing loading.
    pub empty_message: Option<String>,
}

impl ListView {
    fn new(kind: ListKind, list: &ListState<Camp>, model: &Model) -> Self {
        let pool = &model.config.api.fallback_thumbnails;
        let cards: Vec<CampCardView> = list
            .items()
            .iter()
            .map(|camp| CampCardView::new(camp, &model.flags, pool))
            .collect();
        let empty_message = (cards.is_empty() && !list.is_loading()).then(|| {
            match kind {
                ListKind::Search => NO_SEARCH_RESULTS,
                ListKind::Bookmarks => NO_BOOKMARKS,
            }
            .to_owned()
        });
        Self {
            cards,
            loading: list.is_loading(),
            has_more: list.has_more(),
            empty_message,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SearchFormView {
    pub city: String,
    pub keyword: String,
}

impl SearchFormView {
    fn new(filter: &Filter) -> Self {
        Self {
            city: filter.get("city").unwrap_or_default().to_owned(),
            keyword: filter.get("keyword").unwrap_or_default().to_owned(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CampDetailView {
    pub card: CampCardView,
    pub info: AddressInfo,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NotificationView {
    pub seq: u64,
    pub message: String,
    pub severity: Severity,
    pub duration_ms: u64,
}

impl From<&Notification> for NotificationView {
    fn from(n: &Notification) -> Self {
        Self {
            seq: n.seq,
            message: n.message.clone(),
            severity: n.severity,
            duration_ms: n.duration_ms,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ViewModel {
    pub location: String,
    pub header: HeaderView,
    pub search_form: SearchFormView,
    pub search: ListView,
    pub bookmarks: ListView,
    pub selected: Option<CampDetailView>,
    pub notification: Option<NotificationView>,
    pub error: Option<String>,
}

impl ViewModel {
    pub fn from_model(model: &Model) -> Self {
        let selected = selected_camp(&model.location)
            .and_then(|id| model.find_camp(id))
            .map(|camp| CampDetailView {
                card: CampCardView::new(camp, &model.flags, &model.config.api.fallback_thumbnails),
                info: AddressInfo::new(camp),
            });

        Self {
            location: model.location.clone(),
            header: HeaderView::new(&model.location, model.is_authenticated()),
            search_form: SearchFormView::new(model.search.filter()),
            search: ListView::new(ListKind::Search, &model.search, model),
            bookmarks: ListView::new(ListKind::Bookmarks, &model.bookmarks, model),
            selected,
            notification: model.notifications.current().map(NotificationView::from),
            error: model.active_error.as_ref().map(crate::AppError::user_facing_message),
        }
    }
}

/// Camp id of a `/camps/{id}` location.
pub fn selected_camp(location: &str) -> Option<CampId> {
    location
        .strip_prefix("/camps/")
        .and_then(|rest| rest.split(['/', '?', '#']).next())
        .and_then(|id| id.parse().ok())
        .map(CampId)
}
