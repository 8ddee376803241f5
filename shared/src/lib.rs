// lib.rs - Camping discovery core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod model;
pub mod notify;
pub mod paging;
pub mod toggle;
pub mod view;
pub mod viewport;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::{ApiConfig, AppConfig, ConfigError, ListConfig, NotificationConfig};
pub use crux_core::{render::Render, App as CruxApp};
pub use event::{AccessToken, Event, ListKind};
pub use model::{Camp, CampId, Filter, Listed, Model, Page, PageResponse, Session};
pub use notify::{Notification, NotificationChannel, NotificationSlot, Severity, SlotTransition};
pub use paging::{
    HasMorePolicy, IncrementalListController, ListSnapshot, ListState, LoadOutcome, LoadStatus,
    LoadTicket, PageFetcher, PageRequest,
};
pub use toggle::{
    AuthStatus, OptimisticToggleController, ToggleBook, ToggleOutcome, ToggleService, ToggleState,
    ToggleStatus, ToggleTicket,
};
pub use view::{AddressInfo, CampCardView, HeaderView, NavTab, ViewModel};
pub use viewport::{Intersection, LoadMore, ViewportTrigger, FULL_VISIBILITY};

pub const SEARCH_PAGE_SIZE: u32 = 12;
pub const BOOKMARK_PAGE_SIZE: u32 = 3;
pub const NOTIFICATION_REOPEN_DELAY_MS: u64 = 100;
pub const MAX_NOTIFICATION_REOPEN_DELAY_MS: u64 = 10_000;
pub const MAX_PAGE_SIZE: u32 = 200;

pub const MEMBERS_ONLY_MESSAGE: &str = "회원만 이용할 수 있는 기능입니다";
pub const BOOKMARK_CHANGED_MESSAGE: &str = "찜 상태를 변경하였습니다.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    RateLimited,
    Deserialization,
    Configuration,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            408 => Self::Timeout,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

/// An error as the shell sees it. `message` is for logs; the view shows
/// [`user_facing_message`](Self::user_facing_message).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        let message = match self.kind {
            ErrorKind::Network => "네트워크에 연결할 수 없습니다. 잠시 후 다시 시도해 주세요.",
            ErrorKind::Timeout => "요청 시간이 초과되었습니다. 다시 시도해 주세요.",
            ErrorKind::Authentication => "로그인이 만료되었습니다. 다시 로그인해 주세요.",
            ErrorKind::Authorization => "이 작업을 수행할 권한이 없습니다.",
            ErrorKind::Validation => "요청이 올바르지 않습니다.",
            ErrorKind::NotFound => "캠핑장을 찾을 수 없습니다.",
            ErrorKind::Conflict => "다른 변경과 충돌했습니다. 새로고침 후 다시 시도해 주세요.",
            ErrorKind::RateLimited => "요청이 너무 많습니다. 잠시 후 다시 시도해 주세요.",
            ErrorKind::Deserialization => "데이터를 처리하지 못했습니다.",
            ErrorKind::Configuration => "앱 설정이 올바르지 않습니다.",
            ErrorKind::Internal | ErrorKind::Unknown => {
                "알 수 없는 오류가 발생했습니다. 잠시 후 다시 시도해 주세요."
            }
        };
        message.into()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

/// Failure of a remote page query or toggle mutation.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server responded with status {status}")]
    Status { status: u16 },

    #[error("response body missing or undecodable")]
    EmptyBody,

    #[error("invalid request url: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Network,
            Self::Status { status } => ErrorKind::from_status(*status),
            Self::EmptyBody => ErrorKind::Deserialization,
            Self::InvalidUrl(_) => ErrorKind::Configuration,
        }
    }
}

impl From<RemoteError> for AppError {
    fn from(e: RemoteError) -> Self {
        let error = AppError::new(e.kind(), e.to_string());
        match e {
            RemoteError::Status { status } => error.with_context("http_status", status.to_string()),
            _ => error,
        }
    }
}
