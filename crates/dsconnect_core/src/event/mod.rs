//! In-memory event catalog and the handlers addressing it with the `event`
//! scheme.
mod catalog;
mod handler;

pub use catalog::EventCatalog;
pub use handler::{EventPersistHandler, EventSourceHandler};

use crate::factory::{HandlerEntry, HandlerExtension};

pub const EVENT_SCHEME: &str = "event";

const EVENT_HANDLERS: &[HandlerEntry] = &[
    HandlerEntry::new(EventSourceHandler::NAME, EventSourceHandler::construct),
    HandlerEntry::new(EventPersistHandler::NAME, EventPersistHandler::construct),
];

/// Builtin module serving the event catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventExtension;

impl HandlerExtension for EventExtension {
    const MODULE: &'static str = "dsconnect_core::event";

    fn handlers(&self) -> &[HandlerEntry] {
        EVENT_HANDLERS
    }
}
