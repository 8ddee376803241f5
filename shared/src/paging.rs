//! Incremental list loading.
//!
//! [`ListState`] is the pure bookkeeping: it hands out a [`PageRequest`] when a
//! fetch may start and merges the completion that carries the matching
//! [`LoadTicket`]. [`IncrementalListController`] drives it against a
//! [`PageFetcher`] for hosts that run the fetch themselves.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, ListConfig};
use crate::model::{Filter, Listed, Page};
use crate::RemoteError;

/// How `has_more` is derived from a merged page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HasMorePolicy {
    /// `total_count > (cursor + 1) * page_size`
    #[default]
    TotalCount,
    /// Any non-empty page may be followed by another.
    NonEmptyPage,
}

/// Identifies one fetch of one list session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadTicket {
    epoch: u64,
    cursor: u32,
}

impl LoadTicket {
    pub fn cursor(self) -> u32 {
        self.cursor
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub ticket: LoadTicket,
    pub cursor: u32,
    pub page_size: u32,
    pub filter: Filter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Merged { added: usize, has_more: bool },
    Failed(RemoteError),
    /// The ticket belongs to a reset or closed session.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSnapshot<T> {
    pub items: Vec<T>,
    pub cursor: u32,
    pub loading: bool,
    pub has_more: bool,
    pub filter: Filter,
}

#[derive(Debug, Clone)]
pub struct ListState<T: Listed> {
    items: Vec<T>,
    seen: HashSet<T::Id>,
    cursor: u32,
    loading: bool,
    has_more: bool,
    filter: Filter,
    config: ListConfig,
    epoch: u64,
    closed: bool,
}

impl<T: Listed> ListState<T> {
    #[must_use]
    pub fn new(config: ListConfig) -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
            cursor: 0,
            loading: false,
            has_more: true,
            filter: Filter::default(),
            config,
            epoch: 0,
            closed: false,
        }
    }

    /// Starts a fresh session for `filter`. Any fetch still in flight becomes stale.
    pub fn reset(&mut self, filter: Filter) {
        self.items.clear();
        self.seen.clear();
        self.cursor = 0;
        self.loading = false;
        self.has_more = true;
        self.filter = filter;
        self.epoch = self.epoch.wrapping_add(1);
        self.closed = false;
    }

    /// Swaps in a new page size and policy and starts an empty session.
    /// The epoch keeps counting, so tickets issued before stay stale.
    pub fn reconfigure(&mut self, config: ListConfig) {
        self.config = config;
        self.reset(Filter::default());
    }

    /// Returns the request for the next page, or `None` while a fetch is in
    /// flight, after the list is exhausted, or after [`close`](Self::close).
    pub fn begin_load(&mut self) -> Option<PageRequest> {
        if self.loading || !self.has_more || self.closed {
            return None;
        }
        self.loading = true;
        Some(PageRequest {
            ticket: LoadTicket {
                epoch: self.epoch,
                cursor: self.cursor,
            },
            cursor: self.cursor,
            page_size: self.config.page_size,
            filter: self.filter.clone(),
        })
    }

    pub fn complete(&mut self, ticket: LoadTicket, result: Result<Page<T>, RemoteError>) -> LoadOutcome {
        if !self.is_current(ticket) {
            return LoadOutcome::Stale;
        }
        self.loading = false;

        match result {
            Ok(page) => {
                let received = page.items.len();
                let mut added = 0;
                for item in page.items {
                    if self.seen.insert(item.id()) {
                        self.items.push(item);
                        added += 1;
                    }
                }
                self.has_more = match self.config.has_more_policy {
                    HasMorePolicy::TotalCount => {
                        let loaded = u64::from(self.cursor + 1) * u64::from(self.config.page_size);
                        page.total_count > loaded
                    }
                    HasMorePolicy::NonEmptyPage => received > 0,
                };
                self.cursor += 1;
                LoadOutcome::Merged {
                    added,
                    has_more: self.has_more,
                }
            }
            Err(e) => {
                self.has_more = false;
                LoadOutcome::Failed(e)
            }
        }
    }

    /// Releases the in-flight slot of an abandoned fetch without merging.
    pub fn abandon(&mut self, ticket: LoadTicket) {
        if self.is_current(ticket) {
            self.loading = false;
        }
    }

    /// Tears the session down; later completions are discarded.
    pub fn close(&mut self) {
        self.closed = true;
        self.loading = false;
    }

    /// Ticket of the fetch currently in flight.
    pub fn pending_ticket(&self) -> Option<LoadTicket> {
        (self.loading && !self.closed).then_some(LoadTicket {
            epoch: self.epoch,
            cursor: self.cursor,
        })
    }

    fn is_current(&self, ticket: LoadTicket) -> bool {
        !self.closed && self.loading && ticket.epoch == self.epoch && ticket.cursor == self.cursor
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_more(&self) -> bool {
        self.has_more && !self.closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn page_size(&self) -> u32 {
        self.config.page_size
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.seen.contains(id)
    }
}

impl<T: Listed + Clone> ListState<T> {
    pub fn snapshot(&self) -> ListSnapshot<T> {
        ListSnapshot {
            items: self.items.clone(),
            cursor: self.cursor,
            loading: self.loading,
            has_more: self.has_more(),
            filter: self.filter.clone(),
        }
    }
}

/// Remote paged query.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    async fn fetch(&self, cursor: u32, filter: &Filter, page_size: u32) -> Result<Page<T>, RemoteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// A fetch was already in flight, the list is exhausted, or it is closed.
    Skipped,
    Merged { added: usize, has_more: bool },
    /// The result arrived after a reset or teardown and was dropped.
    Discarded,
}

/// Owns one view's [`ListState`] and runs its fetches.
pub struct IncrementalListController<T: Listed, F> {
    fetcher: Arc<F>,
    state: Arc<Mutex<ListState<T>>>,
}

impl<T, F> IncrementalListController<T, F>
where
    T: Listed + Clone + Send + 'static,
    F: PageFetcher<T>,
{
    pub fn new(fetcher: Arc<F>, config: ListConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            fetcher,
            state: Arc::new(Mutex::new(ListState::new(config))),
        })
    }

    fn state(&self) -> MutexGuard<'_, ListState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset(&self, filter: Filter) {
        debug!(?filter, "list reset");
        self.state().reset(filter);
    }

    /// Fetches and merges the next page. A fetch failure halts the session
    /// (`has_more` becomes false) and is returned to the caller.
    #[instrument(skip(self))]
    pub async fn load_next(&self) -> Result<LoadStatus, RemoteError> {
        let Some(request) = self.state().begin_load() else {
            debug!("load_next skipped");
            return Ok(LoadStatus::Skipped);
        };

        let mut guard = InFlight {
            state: &self.state,
            ticket: Some(request.ticket),
        };
        let result = self
            .fetcher
            .fetch(request.cursor, &request.filter, request.page_size)
            .await;
        guard.ticket = None;

        match self.state().complete(request.ticket, result) {
            LoadOutcome::Merged { added, has_more } => {
                debug!(cursor = request.cursor, added, has_more, "page merged");
                Ok(LoadStatus::Merged { added, has_more })
            }
            LoadOutcome::Failed(e) => {
                warn!(cursor = request.cursor, error = %e, "page fetch failed; auto-loading halted");
                Err(e)
            }
            LoadOutcome::Stale => {
                debug!(cursor = request.cursor, "stale page discarded");
                Ok(LoadStatus::Discarded)
            }
        }
    }

    /// Teardown: no further fetch starts and in-flight results are dropped.
    pub fn close(&self) {
        info!("list controller closed");
        self.state().close();
    }

    pub fn has_more(&self) -> bool {
        self.state().has_more()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    pub fn snapshot(&self) -> ListSnapshot<T> {
        self.state().snapshot()
    }
}

/// Frees the loading slot if a `load_next` future is dropped mid-fetch.
struct InFlight<'a, T: Listed> {
    state: &'a Mutex<ListState<T>>,
    ticket: Option<LoadTicket>,
}

impl<T: Listed> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .abandon(ticket);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Camp, CampId};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn camp(id: u64) -> Camp {
        Camp {
            id: CampId(id),
            name: format!("camp-{id}"),
            thumb_image: None,
            street_addr: "경기도 가평군 청평면".into(),
            keywords: Vec::new(),
            line_intro: None,
            marked: false,
            tel: None,
            homepage: None,
        }
    }

    fn config(page_size: u32) -> ListConfig {
        ListConfig {
            page_size,
            has_more_policy: HasMorePolicy::TotalCount,
        }
    }

    /// Serves `total` camps in id order.
    fn page_of(cursor: u32, page_size: u32, total: u64) -> Page<Camp> {
        let start = u64::from(cursor) * u64::from(page_size);
        let end = (start + u64::from(page_size)).min(total);
        Page {
            items: (start..end).map(camp).collect(),
            total_count: total,
            cursor,
        }
    }

    fn load(state: &mut ListState<Camp>, total: u64) -> LoadOutcome {
        let request = state.begin_load().expect("load should start");
        let page = page_of(request.cursor, request.page_size, total);
        state.complete(request.ticket, Ok(page))
    }

    #[test]
    fn test_three_of_five_then_exhausted() {
        let mut state = ListState::new(config(3));

        assert_eq!(load(&mut state, 5), LoadOutcome::Merged { added: 3, has_more: true });
        assert_eq!(state.items().len(), 3);
        assert!(state.has_more());

        assert_eq!(load(&mut state, 5), LoadOutcome::Merged { added: 2, has_more: false });
        assert_eq!(state.items().len(), 5);
        assert!(!state.has_more());
        assert_eq!(state.cursor(), 2);

        assert!(state.begin_load().is_none());
    }

    #[test]
    fn test_exact_multiple_is_exhausted() {
        let mut state = ListState::new(config(3));
        load(&mut state, 6);
        assert!(state.has_more());
        load(&mut state, 6);
        assert!(!state.has_more());
    }

    #[test]
    fn test_begin_load_refuses_while_loading() {
        let mut state: ListState<Camp> = ListState::new(config(3));
        let first = state.begin_load();
        assert!(first.is_some());
        assert!(state.is_loading());
        assert!(state.begin_load().is_none());
    }

    #[test]
    fn test_failure_halts_session() {
        let mut state = ListState::new(config(3));
        load(&mut state, 5);

        let request = state.begin_load().unwrap();
        let outcome = state.complete(request.ticket, Err(RemoteError::Transport("offline".into())));

        assert!(matches!(outcome, LoadOutcome::Failed(_)));
        assert_eq!(state.items().len(), 3);
        assert!(!state.has_more());
        assert!(!state.is_loading());
        assert_eq!(state.cursor(), 1);
        assert!(state.begin_load().is_none());
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut state = ListState::new(config(3));
        load(&mut state, 10);
        let _in_flight = state.begin_load().unwrap();

        state.reset(Filter::search("부산", ""));

        assert!(state.items().is_empty());
        assert_eq!(state.cursor(), 0);
        assert!(state.has_more());
        assert!(!state.is_loading());
        assert_eq!(state.filter(), &Filter::search("부산", ""));
    }

    #[test]
    fn test_reset_discards_in_flight_result() {
        let mut state = ListState::new(config(3));
        let stale = state.begin_load().unwrap();
        state.reset(Filter::search("제주", ""));

        let outcome = state.complete(stale.ticket, Ok(page_of(0, 3, 10)));
        assert_eq!(outcome, LoadOutcome::Stale);
        assert!(state.items().is_empty());

        // the new session still loads normally
        assert_eq!(load(&mut state, 2), LoadOutcome::Merged { added: 2, has_more: false });
    }

    #[test]
    fn test_reconfigure_keeps_earlier_tickets_stale() {
        let mut state = ListState::new(config(3));
        state.reset(Filter::search("제주", ""));
        let stale = state.begin_load().unwrap();

        state.reconfigure(config(5));
        state.reset(Filter::search("속초", ""));
        let fresh = state.begin_load().unwrap();
        assert_ne!(fresh.ticket, stale.ticket);
        assert_eq!(fresh.page_size, 5);

        let outcome = state.complete(stale.ticket, Ok(page_of(0, 3, 10)));
        assert_eq!(outcome, LoadOutcome::Stale);
        assert!(state.is_loading());
    }

    #[test]
    fn test_close_discards_and_blocks() {
        let mut state = ListState::new(config(3));
        let request = state.begin_load().unwrap();
        state.close();

        assert_eq!(state.complete(request.ticket, Ok(page_of(0, 3, 10))), LoadOutcome::Stale);
        assert!(state.items().is_empty());
        assert!(state.begin_load().is_none());
        assert!(!state.has_more());
    }

    #[test]
    fn test_overlapping_pages_are_deduplicated() {
        let mut state = ListState::new(config(3));
        let request = state.begin_load().unwrap();
        state.complete(request.ticket, Ok(Page { items: vec![camp(1), camp(2), camp(3)], total_count: 9, cursor: 0 }));

        let request = state.begin_load().unwrap();
        let outcome = state.complete(
            request.ticket,
            Ok(Page { items: vec![camp(3), camp(4), camp(5)], total_count: 9, cursor: 1 }),
        );

        assert_eq!(outcome, LoadOutcome::Merged { added: 2, has_more: true });
        let ids: Vec<u64> = state.items().iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(state.cursor(), 2);
    }

    #[test]
    fn test_non_empty_page_policy() {
        let mut state = ListState::new(ListConfig {
            page_size: 3,
            has_more_policy: HasMorePolicy::NonEmptyPage,
        });
        load(&mut state, 2);
        assert!(state.has_more());
        assert_eq!(load(&mut state, 2), LoadOutcome::Merged { added: 0, has_more: false });
        assert!(!state.has_more());
    }

    #[test]
    fn test_abandon_frees_slot() {
        let mut state: ListState<Camp> = ListState::new(config(3));
        let request = state.begin_load().unwrap();
        state.abandon(request.ticket);
        assert!(!state.is_loading());
        assert_eq!(state.cursor(), 0);
        assert!(state.begin_load().is_some());
    }

    proptest! {
        #[test]
        fn prop_merges_track_cursor_and_length(page_size in 1u32..20, total in 0u64..200, attempts in 1usize..30) {
            let mut state = ListState::new(config(page_size));
            let mut merges = 0u32;
            let mut merged_len = 0usize;

            for _ in 0..attempts {
                let Some(request) = state.begin_load() else { break };
                let page = page_of(request.cursor, request.page_size, total);
                merged_len += page.items.len();
                let outcome = state.complete(request.ticket, Ok(page));
                prop_assert!(matches!(outcome, LoadOutcome::Merged { .. }), "page {} did not merge", merges);
                merges += 1;

                prop_assert_eq!(state.cursor(), merges);
                prop_assert_eq!(state.items().len(), merged_len);
                let expected_more = total > u64::from(merges) * u64::from(page_size);
                prop_assert_eq!(state.has_more(), expected_more);
            }

            let mut ids: Vec<u64> = state.items().iter().map(|c| c.id.0).collect();
            ids.dedup();
            prop_assert_eq!(ids.len(), state.items().len());
        }

        #[test]
        fn prop_reset_always_initial(page_size in 1u32..20, loads in 0usize..5, leave_in_flight in any::<bool>()) {
            let mut state = ListState::new(config(page_size));
            for _ in 0..loads {
                if let Some(request) = state.begin_load() {
                    let page = page_of(request.cursor, request.page_size, 1_000);
                    state.complete(request.ticket, Ok(page));
                }
            }
            if leave_in_flight {
                let _ = state.begin_load();
            }

            state.reset(Filter::search("x", "y"));
            prop_assert_eq!(state.cursor(), 0);
            prop_assert!(state.items().is_empty());
            prop_assert!(state.has_more());
            prop_assert!(!state.is_loading());
        }
    }

    /// Serves pages of a fixed-size catalogue, optionally failing from a cursor on.
    struct CatalogueFetcher {
        total: u64,
        fail_from: Option<u32>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        overlapped: AtomicBool,
    }

    impl CatalogueFetcher {
        fn new(total: u64) -> Self {
            Self {
                total,
                fail_from: None,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                overlapped: AtomicBool::new(false),
            }
        }

        fn failing_from(mut self, cursor: u32) -> Self {
            self.fail_from = Some(cursor);
            self
        }
    }

    #[async_trait]
    impl PageFetcher<Camp> for CatalogueFetcher {
        async fn fetch(&self, cursor: u32, _filter: &Filter, page_size: u32) -> Result<Page<Camp>, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_from.is_some_and(|c| cursor >= c) {
                return Err(RemoteError::Status { status: 503 });
            }
            Ok(page_of(cursor, page_size, self.total))
        }
    }

    #[tokio::test]
    async fn test_concurrent_load_next_issues_one_fetch() {
        let fetcher = Arc::new(CatalogueFetcher::new(30));
        let controller = IncrementalListController::new(fetcher.clone(), config(12)).unwrap();

        let (a, b, c) = tokio::join!(controller.load_next(), controller.load_next(), controller.load_next());
        let statuses = [a.unwrap(), b.unwrap(), c.unwrap()];

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(!fetcher.overlapped.load(Ordering::SeqCst));
        assert_eq!(statuses.iter().filter(|s| **s == LoadStatus::Skipped).count(), 2);
        assert_eq!(controller.snapshot().items.len(), 12);
    }

    #[test]
    fn test_controller_rejects_invalid_page_size() {
        let fetcher = Arc::new(CatalogueFetcher::new(10));
        assert!(matches!(
            IncrementalListController::new(fetcher.clone(), config(0)),
            Err(ConfigError::Validation(_))
        ));
        assert!(IncrementalListController::new(fetcher, config(crate::MAX_PAGE_SIZE + 1)).is_err());
    }

    #[tokio::test]
    async fn test_second_page_failure_stops_loading() {
        let fetcher = Arc::new(CatalogueFetcher::new(5).failing_from(1));
        let controller = IncrementalListController::new(fetcher.clone(), config(3)).unwrap();

        assert_eq!(controller.load_next().await, Ok(LoadStatus::Merged { added: 3, has_more: true }));
        assert_eq!(controller.load_next().await, Err(RemoteError::Status { status: 503 }));
        assert_eq!(controller.load_next().await, Ok(LoadStatus::Skipped));

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.items.len(), 3);
        assert!(!snapshot.has_more);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reset_after_failure_resumes() {
        let fetcher = Arc::new(CatalogueFetcher::new(5).failing_from(1));
        let controller = IncrementalListController::new(fetcher, config(3)).unwrap();
        controller.load_next().await.unwrap();
        let _ = controller.load_next().await;

        controller.reset(Filter::search("강릉", ""));
        assert!(controller.has_more());
        assert_eq!(controller.load_next().await, Ok(LoadStatus::Merged { added: 3, has_more: true }));
    }

    /// Blocks every fetch until released.
    struct GatedFetcher {
        gate: Notify,
        started: Notify,
    }

    #[async_trait]
    impl PageFetcher<Camp> for GatedFetcher {
        async fn fetch(&self, cursor: u32, _filter: &Filter, page_size: u32) -> Result<Page<Camp>, RemoteError> {
            self.started.notify_one();
            self.gate.notified().await;
            Ok(page_of(cursor, page_size, 100))
        }
    }

    #[tokio::test]
    async fn test_result_after_close_is_discarded() {
        let fetcher = Arc::new(GatedFetcher { gate: Notify::new(), started: Notify::new() });
        let controller = Arc::new(IncrementalListController::new(fetcher.clone(), config(12)).unwrap());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load_next().await }
        });
        fetcher.started.notified().await;

        controller.close();
        fetcher.gate.notify_one();

        assert_eq!(task.await.unwrap(), Ok(LoadStatus::Discarded));
        assert!(controller.snapshot().items.is_empty());
        assert_eq!(controller.load_next().await, Ok(LoadStatus::Skipped));
    }

    #[tokio::test]
    async fn test_dropped_load_releases_loading_flag() {
        let fetcher = Arc::new(GatedFetcher { gate: Notify::new(), started: Notify::new() });
        let controller = Arc::new(IncrementalListController::new(fetcher.clone(), config(12)).unwrap());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load_next().await }
        });
        fetcher.started.notified().await;
        assert!(controller.is_loading());

        task.abort();
        let _ = task.await;

        assert!(!controller.is_loading());
        assert_eq!(controller.snapshot().cursor, 0);
    }
}
