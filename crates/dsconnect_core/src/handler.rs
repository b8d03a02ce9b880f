use std::fmt::Debug;

use crate::address::ConnectorAddress;
use crate::dataset::Dataset;
use crate::errors::Result;
use crate::options::OptionMap;

/// Read side of a backend.
///
/// A handler is bound to a single address at construction and is not shared
/// between addresses. The only state a handler keeps is its changed flag,
/// which tells callers whether the backing resource was written since the
/// last load.
///
/// Rules for writing a handler:
///
/// - A successful `load` clears the changed flag. A failed load leaves it
///   as is.
/// - `has_changed` must never trigger a load or any write. It may inspect
///   metadata of the backing resource.
/// - Options passed to `load` are the caller's explicit options. Handlers
///   merge them with the address params using
///   [`ConnectorAddress::effective_options`].
pub trait SourceHandler: Send + Debug {
    /// The address this handler was constructed with.
    fn address(&self) -> &ConnectorAddress;

    /// Format tags this handler can read.
    fn supported_types(&self) -> Vec<&'static str>;

    /// Load the canonical dataset from the bound address.
    fn load(&mut self, options: &OptionMap) -> Result<Dataset>;

    /// If the backing resource exists.
    fn exists(&self) -> bool;

    /// If the resource changed since the last load or reset.
    fn has_changed(&self) -> bool;

    /// Explicitly set the changed flag.
    fn reset_changed(&mut self, changed: bool);
}

/// Write side of a backend.
pub trait PersistHandler: SourceHandler {
    /// Persist the dataset to the bound address.
    ///
    /// This is a backup to the handler's own address. Implementations should
    /// not override this, keeping persist and backup consistent.
    fn persist(&mut self, dataset: &Dataset, options: &OptionMap) -> Result<bool> {
        let address = self.address().clone();
        self.backup(dataset, &address, options)
    }

    /// Write the dataset to an alternate address.
    ///
    /// The bound address is left untouched. The changed flag is set on
    /// success.
    fn backup(
        &mut self,
        dataset: &Dataset,
        address: &ConnectorAddress,
        options: &OptionMap,
    ) -> Result<bool>;

    /// Remove the resource at the bound address.
    fn remove(&mut self) -> Result<bool>;
}

/// Which roles a handler implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Source,
    Persist,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Persist => "persist",
        }
    }
}

/// A constructed handler tagged with the richest role it implements.
#[derive(Debug)]
pub enum HandlerRole {
    Source(Box<dyn SourceHandler>),
    Persist(Box<dyn PersistHandler>),
}

impl HandlerRole {
    pub fn capability(&self) -> Capability {
        match self {
            Self::Source(_) => Capability::Source,
            Self::Persist(_) => Capability::Persist,
        }
    }
}

/// Implemented by every type a handler module can construct.
///
/// The factory uses this to check which capability roles a freshly built
/// value exposes. Returning `None` means the value implements neither role and
/// can't be used as a handler.
pub trait HandlerCapabilities: Send {
    fn into_role(self: Box<Self>) -> Option<HandlerRole>;
}

impl SourceHandler for HandlerRole {
    fn address(&self) -> &ConnectorAddress {
        match self {
            Self::Source(h) => h.address(),
            Self::Persist(h) => h.address(),
        }
    }

    fn supported_types(&self) -> Vec<&'static str> {
        match self {
            Self::Source(h) => h.supported_types(),
            Self::Persist(h) => h.supported_types(),
        }
    }

    fn load(&mut self, options: &OptionMap) -> Result<Dataset> {
        match self {
            Self::Source(h) => h.load(options),
            Self::Persist(h) => h.load(options),
        }
    }

    fn exists(&self) -> bool {
        match self {
            Self::Source(h) => h.exists(),
            Self::Persist(h) => h.exists(),
        }
    }

    fn has_changed(&self) -> bool {
        match self {
            Self::Source(h) => h.has_changed(),
            Self::Persist(h) => h.has_changed(),
        }
    }

    fn reset_changed(&mut self, changed: bool) {
        match self {
            Self::Source(h) => h.reset_changed(changed),
            Self::Persist(h) => h.reset_changed(changed),
        }
    }
}
