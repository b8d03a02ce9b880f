//! Local file handlers backed by arrow and parquet.
//!
//! Registers the `dsconnect_ext_arrow::file` module with a
//! [`HandlerFactory`]. Addresses use the `file` scheme, or no scheme at all.
pub mod format;
mod handler;

pub use handler::{ArrowPersistHandler, ArrowSourceHandler};

use dsconnect_core::{HandlerEntry, HandlerExtension, HandlerFactory, Result};

pub const FILE_SCHEME: &str = "file";

const ARROW_HANDLERS: &[HandlerEntry] = &[
    HandlerEntry::new(ArrowSourceHandler::NAME, ArrowSourceHandler::construct),
    HandlerEntry::new(ArrowPersistHandler::NAME, ArrowPersistHandler::construct),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ArrowFileExtension;

impl HandlerExtension for ArrowFileExtension {
    const MODULE: &'static str = "dsconnect_ext_arrow::file";

    fn handlers(&self) -> &[HandlerEntry] {
        ARROW_HANDLERS
    }
}

/// Factory with both the builtin event module and the file module.
pub fn default_factory() -> Result<HandlerFactory> {
    HandlerFactory::default().with_extension(ArrowFileExtension)
}
