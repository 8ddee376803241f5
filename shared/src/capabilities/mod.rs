mod delay;
mod http;

pub use self::delay::{Delay, DelayOperation, DelayOutput};
pub use self::http::{Endpoints, MAX_URL_LENGTH};

// Crux's built-in Render covers view updates.
pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::event::Event;
// The Effect derive refers to `App`.
use crate::App;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub delay: Delay<Event>,
}
