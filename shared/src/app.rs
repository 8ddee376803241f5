use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::capabilities::{Capabilities, Endpoints};
use crate::event::{Event, ListKind};
use crate::model::{Camp, CampId, Filter, Model, PageResponse, Session};
use crate::notify::{Severity, SlotTransition};
use crate::paging::{LoadOutcome, LoadTicket};
use crate::toggle::{ToggleOutcome, ToggleTicket};
use crate::view::{NavTab, ViewModel};
use crate::{AppError, ErrorKind, RemoteError, BOOKMARK_CHANGED_MESSAGE, MEMBERS_ONLY_MESSAGE};

pub const LOGIN_PATH: &str = "/login";
pub const SEARCH_PATH: &str = "/search";

#[derive(Default)]
pub struct App;

impl App {
    fn start_list(list: ListKind, filter: Filter, model: &mut Model, caps: &Capabilities) {
        let should_load = match list {
            ListKind::Search => !filter.is_empty(),
            ListKind::Bookmarks => true,
        };
        model.list_mut(list).reset(filter);
        model.active_error = None;
        Self::prune_flags(model);
        info!(%list, "list session started");

        if should_load {
            Self::load_next(list, model, caps);
        } else {
            debug!(%list, "empty filter; not querying");
        }
    }

    fn load_next(list: ListKind, model: &mut Model, caps: &Capabilities) {
        let Some(request) = model.list_mut(list).begin_load() else {
            debug!(%list, "load skipped");
            return;
        };
        let ticket = request.ticket;

        let url = match Endpoints::new(&model.config.api).page_url(list, &request) {
            Ok(url) => url,
            Err(error) => {
                Self::page_loaded(list, ticket, Err(error), model);
                return;
            }
        };
        debug!(%list, cursor = request.cursor, "fetching page");

        let mut builder = caps.http.get(url.as_str());
        if let Some(session) = &model.session {
            builder = builder.header("Authorization", session.bearer().as_str());
        }
        builder
            .expect_json::<PageResponse<Camp>>()
            .send(move |result| Event::PageLoaded {
                list,
                ticket,
                result: match result {
                    Ok(mut response) if response.status().is_success() => response
                        .take_body()
                        .map(|body| body.into_page(ticket.cursor()))
                        .ok_or(RemoteError::EmptyBody),
                    Ok(response) => Err(RemoteError::Status {
                        status: u16::from(response.status()),
                    }),
                    Err(e) => Err(RemoteError::Transport(e.to_string())),
                },
            });
    }

    fn page_loaded(
        list: ListKind,
        ticket: LoadTicket,
        result: Result<crate::model::Page<Camp>, RemoteError>,
        model: &mut Model,
    ) -> bool {
        match model.list_mut(list).complete(ticket, result) {
            LoadOutcome::Merged { added, has_more } => {
                debug!(%list, added, has_more, "page merged");
                let Model { search, bookmarks, flags, .. } = model;
                let merged = match list {
                    ListKind::Search => search.items(),
                    ListKind::Bookmarks => bookmarks.items(),
                };
                for camp in merged {
                    flags.observe(camp.id, camp.marked);
                }
                true
            }
            LoadOutcome::Failed(error) => {
                warn!(%list, error = %error, "page fetch failed");
                model.active_error = Some(AppError::from(error).with_context("list", list.to_string()));
                true
            }
            LoadOutcome::Stale => {
                debug!(%list, "stale page discarded");
                false
            }
        }
    }

    fn request_toggle(list: ListKind, camp_id: CampId, model: &mut Model, caps: &Capabilities) {
        if !model.is_authenticated() {
            debug!(%camp_id, "toggle refused for anonymous user");
            Self::notify(MEMBERS_ONLY_MESSAGE, Severity::Warning, model, caps);
            return;
        }
        let Some(ticket) = model.flags.begin(&camp_id) else {
            debug!(%camp_id, "toggle ignored");
            return;
        };

        let url = match Endpoints::new(&model.config.api).toggle_url(camp_id) {
            Ok(url) => url,
            Err(error) => {
                Self::toggle_settled(list, &ticket, Err(error), model, caps);
                return;
            }
        };

        let mut builder = caps.http.post(url.as_str());
        if let Some(session) = &model.session {
            builder = builder.header("Authorization", session.bearer().as_str());
        }
        builder.send(move |result| Event::ToggleSettled {
            list,
            ticket,
            result: match result {
                Ok(response) if response.status().is_success() => Ok(()),
                Ok(response) => Err(RemoteError::Status {
                    status: u16::from(response.status()),
                }),
                Err(e) => Err(RemoteError::Transport(e.to_string())),
            },
        });
    }

    fn toggle_settled(
        list: ListKind,
        ticket: &ToggleTicket<CampId>,
        result: Result<(), RemoteError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        match model.flags.settle(ticket, result) {
            ToggleOutcome::Confirmed { flagged } => {
                debug!(camp_id = %ticket.id, flagged, "toggle confirmed");
                let severity = match list {
                    ListKind::Search => Severity::Info,
                    ListKind::Bookmarks => Severity::Success,
                };
                Self::notify(BOOKMARK_CHANGED_MESSAGE, severity, model, caps);
            }
            ToggleOutcome::RolledBack { flagged, error } => {
                warn!(camp_id = %ticket.id, flagged, error = %error, "toggle failed; flag restored");
                let message = AppError::from(error).user_facing_message();
                Self::notify(message, Severity::Error, model, caps);
            }
            ToggleOutcome::Stale => debug!(camp_id = %ticket.id, "stale toggle discarded"),
        }
    }

    fn notify(message: impl Into<String>, severity: Severity, model: &mut Model, caps: &Capabilities) {
        match model.notifications.show(message, severity) {
            SlotTransition::Presented { seq } => debug!(seq, "notification shown"),
            SlotTransition::Reopening { seq, delay_ms } => {
                caps.delay
                    .after(delay_ms, move |_| Event::NotificationReopenDue { seq });
            }
        }
    }

    /// Drops flags no list shows anymore, keeping in-flight ones.
    fn prune_flags(model: &mut Model) {
        let Model { search, bookmarks, flags, .. } = model;
        flags.retain(|id, state| state.pending || search.contains(id) || bookmarks.contains(id));
    }

    fn end_session(model: &mut Model) {
        model.session = None;
        model.bookmarks.close();
        if NavTab::from_path(&model.location).requires_auth() {
            model.location = NavTab::Home.path().into();
        }
        info!("session ended");
    }
}

fn search_location(filter: &Filter) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    for key in ["city", "keyword"] {
        if let Some(value) = filter.get(key).filter(|v| !v.is_empty()) {
            query.append_pair(key, value);
        }
    }
    let query = query.finish();
    if query.is_empty() {
        SEARCH_PATH.into()
    } else {
        format!("{SEARCH_PATH}?{query}")
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(event = event.name(), "update");

        match event {
            Event::Configure { config } => {
                if let Err(e) = config.validate() {
                    warn!(error = %e, "configuration rejected");
                    model.active_error = Some(AppError::new(ErrorKind::Configuration, e.to_string()));
                } else {
                    model.apply_config(*config);
                    info!("configuration applied");
                }
            }

            Event::SessionStarted { token } => {
                model.session = Some(Session::new(token.into_inner()));
                info!("session started");
            }

            Event::SessionEnded => Self::end_session(model),

            Event::RouteChanged { path } => model.location = path,

            Event::TabSelected { tab } => model.location = tab.path().into(),

            Event::AuthButtonClicked => {
                if model.is_authenticated() {
                    Self::end_session(model);
                } else {
                    model.location = LOGIN_PATH.into();
                }
            }

            Event::CampSelected { camp_id } => model.location = format!("/camps/{camp_id}"),

            Event::SearchRouteEntered { city, keyword } => {
                Self::start_list(ListKind::Search, Filter::search(city, keyword), model, caps);
            }

            Event::SearchSubmitted { city, keyword } => {
                let filter = Filter::search(city, keyword);
                if model.search.filter() == &filter && !model.search.is_closed() {
                    debug!("identical search ignored");
                    return;
                }
                model.location = search_location(&filter);
                Self::start_list(ListKind::Search, filter, model, caps);
            }

            Event::BookmarksOpened => {
                Self::start_list(ListKind::Bookmarks, Filter::new(), model, caps);
            }

            Event::ViewClosed { list } => {
                model.list_mut(list).close();
                info!(%list, "list view closed");
            }

            Event::LoadMore { list } => Self::load_next(list, model, caps),

            Event::PageLoaded { list, ticket, result } => {
                if !Self::page_loaded(list, ticket, result, model) {
                    return;
                }
            }

            Event::ToggleRequested { list, camp_id } => {
                Self::request_toggle(list, camp_id, model, caps);
            }

            Event::ToggleSettled { list, ticket, result } => {
                Self::toggle_settled(list, &ticket, result, model, caps);
            }

            Event::NotificationReopenDue { seq } => {
                if model.notifications.reopen_due(seq).is_none() {
                    return;
                }
            }

            Event::NotificationDismissed { seq } => {
                if !model.notifications.dismiss(seq) {
                    return;
                }
            }
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel::from_model(model)
    }
}
