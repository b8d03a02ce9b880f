//! Resolution of module/handler references to handler instances.
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::address::ConnectorAddress;
use crate::dataset::Dataset;
use crate::errors::{ConnectorError, ResolutionError, Result};
use crate::event::EventExtension;
use crate::handler::{
    Capability, HandlerCapabilities, HandlerRole, PersistHandler, SourceHandler,
};
use crate::options::OptionMap;

/// Builds a handler bound to the given address.
pub type HandlerConstructor = fn(ConnectorAddress) -> Result<Box<dyn HandlerCapabilities>>;

/// A named, constructible handler within a module.
#[derive(Debug, Clone, Copy)]
pub struct HandlerEntry {
    pub name: &'static str,
    pub constructor: HandlerConstructor,
}

impl HandlerEntry {
    pub const fn new(name: &'static str, constructor: HandlerConstructor) -> Self {
        HandlerEntry { name, constructor }
    }
}

/// A module of handlers that can be registered with the factory.
pub trait HandlerExtension {
    /// The module reference addresses use to select this module.
    ///
    /// Must be unique within a factory.
    const MODULE: &'static str;

    fn handlers(&self) -> &[HandlerEntry];
}

/// Registry of handler modules.
///
/// Modules are registered once at startup. Resolution afterwards only reads
/// the registry, resolving the same references twice yields the same
/// constructor.
#[derive(Debug)]
pub struct HandlerFactory {
    modules: IndexMap<String, Vec<HandlerEntry>>,
}

impl Default for HandlerFactory {
    /// Factory with the builtin event module registered.
    fn default() -> Self {
        let mut modules = IndexMap::new();
        modules.insert(
            EventExtension::MODULE.to_string(),
            EventExtension.handlers().to_vec(),
        );
        HandlerFactory { modules }
    }
}

impl HandlerFactory {
    /// Factory without any modules.
    pub fn empty() -> Self {
        HandlerFactory {
            modules: IndexMap::new(),
        }
    }

    pub fn with_extension<E: HandlerExtension>(mut self, extension: E) -> Result<Self> {
        if self.modules.contains_key(E::MODULE) {
            return Err(ConnectorError::Registration(format!(
                "Duplicate handler module '{}'",
                E::MODULE
            )));
        }

        let handlers = extension.handlers();
        for (idx, entry) in handlers.iter().enumerate() {
            if handlers[..idx].iter().any(|other| other.name == entry.name) {
                return Err(ConnectorError::Registration(format!(
                    "Duplicate handler '{}' in module '{}'",
                    entry.name,
                    E::MODULE
                )));
            }
        }

        debug!(module = E::MODULE, handlers = handlers.len(), "registered handler module");
        self.modules.insert(E::MODULE.to_string(), handlers.to_vec());

        Ok(self)
    }

    /// Registered module references, in registration order.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(|k| k.as_str())
    }

    /// Handler names registered for a module.
    pub fn handlers(&self, module_ref: &str) -> Option<Vec<&'static str>> {
        self.modules
            .get(module_ref)
            .map(|entries| entries.iter().map(|e| e.name).collect())
    }

    fn resolve(&self, module_ref: &str, handler_ref: &str) -> Result<&HandlerEntry, ResolutionError> {
        let entries = self
            .modules
            .get(module_ref)
            .ok_or_else(|| ResolutionError::Module {
                module: module_ref.to_string(),
            })?;

        entries
            .iter()
            .find(|e| e.name == handler_ref)
            .ok_or_else(|| ResolutionError::Handler {
                handler: handler_ref.to_string(),
                module: module_ref.to_string(),
            })
    }

    /// Check if a module can be resolved. Never errors.
    pub fn check_module(&self, module_ref: &str) -> bool {
        self.modules.contains_key(module_ref)
    }

    /// Check if a handler can be resolved within a module. Never errors.
    pub fn check_handler(&self, module_ref: &str, handler_ref: &str) -> bool {
        self.resolve(module_ref, handler_ref).is_ok()
    }

    /// Construct the handler named by the address' module and handler
    /// references, bound to that address.
    pub fn instantiate(&self, address: &ConnectorAddress) -> Result<Handler> {
        let module_ref = address.module_ref().unwrap_or_default();
        let handler_ref = address.handler_ref().unwrap_or_default();
        trace!(%module_ref, %handler_ref, address = %address, "resolving handler");

        let entry = self.resolve(module_ref, handler_ref)?;
        let constructed = (entry.constructor)(address.clone())?;
        let role = constructed
            .into_role()
            .ok_or_else(|| ResolutionError::Capability {
                handler: handler_ref.to_string(),
                module: module_ref.to_string(),
                role: Capability::Source.as_str(),
            })?;

        debug!(%module_ref, %handler_ref, capability = role.capability().as_str(), "instantiated handler");

        Ok(Handler {
            module_ref: module_ref.to_string(),
            handler_ref: handler_ref.to_string(),
            role,
        })
    }
}

/// A handler produced by the factory.
///
/// Remembers which references it was resolved from. The source role is
/// always available, the persist role only if the handler implements it.
#[derive(Debug)]
pub struct Handler {
    module_ref: String,
    handler_ref: String,
    role: HandlerRole,
}

impl Handler {
    pub fn module_ref(&self) -> &str {
        &self.module_ref
    }

    pub fn handler_ref(&self) -> &str {
        &self.handler_ref
    }

    pub fn capability(&self) -> Capability {
        self.role.capability()
    }

    pub fn persist_handler(&mut self) -> Option<&mut dyn PersistHandler> {
        match &mut self.role {
            HandlerRole::Persist(h) => Some(h.as_mut()),
            HandlerRole::Source(_) => None,
        }
    }

    /// Get the persist role, erroring if the handler is read only.
    pub fn require_persist(&mut self) -> Result<&mut dyn PersistHandler> {
        match &mut self.role {
            HandlerRole::Persist(h) => Ok(h.as_mut()),
            HandlerRole::Source(_) => Err(ResolutionError::Capability {
                handler: self.handler_ref.clone(),
                module: self.module_ref.clone(),
                role: Capability::Persist.as_str(),
            }
            .into()),
        }
    }

    pub fn persist(&mut self, dataset: &Dataset, options: &OptionMap) -> Result<bool> {
        self.require_persist()?.persist(dataset, options)
    }

    pub fn backup(
        &mut self,
        dataset: &Dataset,
        address: &ConnectorAddress,
        options: &OptionMap,
    ) -> Result<bool> {
        self.require_persist()?.backup(dataset, address, options)
    }

    pub fn remove(&mut self) -> Result<bool> {
        self.require_persist()?.remove()
    }

    pub fn into_role(self) -> HandlerRole {
        self.role
    }
}

impl SourceHandler for Handler {
    fn address(&self) -> &ConnectorAddress {
        self.role.address()
    }

    fn supported_types(&self) -> Vec<&'static str> {
        self.role.supported_types()
    }

    fn load(&mut self, options: &OptionMap) -> Result<Dataset> {
        self.role.load(options)
    }

    fn exists(&self) -> bool {
        self.role.exists()
    }

    fn has_changed(&self) -> bool {
        self.role.has_changed()
    }

    fn reset_changed(&mut self, changed: bool) {
        self.role.reset_changed(changed)
    }
}
