use tracing::{debug, trace};

use super::{EVENT_SCHEME, EventCatalog};
use crate::address::ConnectorAddress;
use crate::dataset::{Dataset, shape};
use crate::errors::{ConnectorError, Result};
use crate::handler::{HandlerCapabilities, HandlerRole, PersistHandler, SourceHandler};
use crate::options::{OptionMap, OptionValue};

/// Read only handler over the event catalog.
///
/// The event name is the location of the bound address, so `event://orders`
/// reads the `orders` event.
///
/// Load options:
/// - `drop` (bool): remove the event from the catalog after reading it.
///   Values that aren't a boolean read without removing.
#[derive(Debug)]
pub struct EventSourceHandler {
    address: ConnectorAddress,
    event_name: String,
    catalog: &'static EventCatalog,
    changed: bool,
}

impl EventSourceHandler {
    pub const NAME: &'static str = "EventSourceHandler";

    /// Create a handler reading from the global catalog.
    pub fn new(address: ConnectorAddress) -> Self {
        Self::with_catalog(address, EventCatalog::global())
    }

    pub fn with_catalog(address: ConnectorAddress, catalog: &'static EventCatalog) -> Self {
        EventSourceHandler {
            event_name: address.location().to_string(),
            address,
            catalog,
            changed: true,
        }
    }

    pub(crate) fn construct(address: ConnectorAddress) -> Result<Box<dyn HandlerCapabilities>> {
        Ok(Box::new(Self::new(address)))
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }
}

impl SourceHandler for EventSourceHandler {
    fn address(&self) -> &ConnectorAddress {
        &self.address
    }

    fn supported_types(&self) -> Vec<&'static str> {
        vec![EVENT_SCHEME]
    }

    fn load(&mut self, options: &OptionMap) -> Result<Dataset> {
        let options = self.address.effective_options(options);
        let drop = matches!(options.get("drop"), Some(OptionValue::Bool(true)));

        let dataset = if drop {
            // Delete hands back the removed dataset, reading and removing
            // happen under one lock.
            self.catalog.delete(&self.event_name)?
        } else {
            self.catalog
                .get(&self.event_name)
                .ok_or_else(|| ConnectorError::event_not_found(&self.event_name))?
        };

        trace!(event = %self.event_name, drop, shape = ?shape(&dataset), "loaded event");
        self.changed = false;

        Ok(dataset)
    }

    fn exists(&self) -> bool {
        self.catalog.has(&self.event_name)
    }

    fn has_changed(&self) -> bool {
        self.changed
    }

    fn reset_changed(&mut self, changed: bool) {
        self.changed = changed;
    }
}

impl HandlerCapabilities for EventSourceHandler {
    fn into_role(self: Box<Self>) -> Option<HandlerRole> {
        Some(HandlerRole::Source(self))
    }
}

/// Read/write handler over the event catalog.
///
/// Backups only target other events, writing to an address with a different
/// scheme fails.
#[derive(Debug)]
pub struct EventPersistHandler {
    source: EventSourceHandler,
}

impl EventPersistHandler {
    pub const NAME: &'static str = "EventPersistHandler";

    pub fn new(address: ConnectorAddress) -> Self {
        EventPersistHandler {
            source: EventSourceHandler::new(address),
        }
    }

    pub fn with_catalog(address: ConnectorAddress, catalog: &'static EventCatalog) -> Self {
        EventPersistHandler {
            source: EventSourceHandler::with_catalog(address, catalog),
        }
    }

    pub(crate) fn construct(address: ConnectorAddress) -> Result<Box<dyn HandlerCapabilities>> {
        Ok(Box::new(Self::new(address)))
    }

    pub fn event_name(&self) -> &str {
        self.source.event_name()
    }
}

impl SourceHandler for EventPersistHandler {
    fn address(&self) -> &ConnectorAddress {
        self.source.address()
    }

    fn supported_types(&self) -> Vec<&'static str> {
        self.source.supported_types()
    }

    fn load(&mut self, options: &OptionMap) -> Result<Dataset> {
        self.source.load(options)
    }

    fn exists(&self) -> bool {
        self.source.exists()
    }

    fn has_changed(&self) -> bool {
        self.source.has_changed()
    }

    fn reset_changed(&mut self, changed: bool) {
        self.source.reset_changed(changed)
    }
}

impl PersistHandler for EventPersistHandler {
    fn backup(
        &mut self,
        dataset: &Dataset,
        address: &ConnectorAddress,
        _options: &OptionMap,
    ) -> Result<bool> {
        if address.scheme() != EVENT_SCHEME {
            return Err(ConnectorError::SchemeMismatch {
                expected: EVENT_SCHEME,
                given: address.scheme().to_string(),
            });
        }
        let name = address.location();
        if name.is_empty() {
            return Err(ConnectorError::Validation(format!(
                "The address '{address}' does not name an event"
            )));
        }

        self.source.catalog.update(name, dataset.clone());
        self.source.reset_changed(true);
        debug!(event = %name, from = %self.source.address, "backed up to event");

        Ok(true)
    }

    fn remove(&mut self) -> Result<bool> {
        self.source.catalog.delete(&self.source.event_name)?;
        Ok(true)
    }
}

impl HandlerCapabilities for EventPersistHandler {
    fn into_role(self: Box<Self>) -> Option<HandlerRole> {
        Some(HandlerRole::Persist(self))
    }
}
