//! Connector addresses, handler resolution, and the in-memory event catalog.
//!
//! A caller describes where a dataset lives with a [`ConnectorAddress`],
//! attaches the module and handler that should serve it, and asks the
//! [`HandlerFactory`] for a [`Handler`] bound to that address.

pub mod address;
pub mod contract;
pub mod dataset;
pub mod errors;
pub mod event;
pub mod factory;
pub mod handler;
pub mod options;

pub use address::ConnectorAddress;
pub use contract::ConnectorContract;
pub use dataset::Dataset;
pub use errors::{ConnectorError, ResolutionError, Result};
pub use factory::{Handler, HandlerEntry, HandlerExtension, HandlerFactory};
pub use handler::{Capability, HandlerCapabilities, HandlerRole, PersistHandler, SourceHandler};
pub use options::{OptionMap, OptionValue};

/// Re-exported so handler crates use the same arrow version.
pub use arrow;
