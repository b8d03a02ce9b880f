use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::dataset::{Dataset, shape};
use crate::errors::{ConnectorError, Result};

static GLOBAL_CATALOG: Lazy<EventCatalog> = Lazy::new(EventCatalog::new);

type EventMap = IndexMap<String, Dataset>;

/// In-memory catalog of named datasets.
///
/// Mutations (`set`, `update`, `delete`, `reset`) are serialized through a
/// single catalog-wide lock. Each mutation builds a new mapping and publishes
/// it in one step, so readers observe either the state before or after a
/// mutation, never a mix.
///
/// Reads don't take the mutation lock and may race with a concurrent write.
/// Callers needing read-then-act semantics should rely on `set` failing for
/// an existing name, or hold their own lock.
#[derive(Debug, Default)]
pub struct EventCatalog {
    write_lock: Mutex<()>,
    events: RwLock<Arc<EventMap>>,
}

impl EventCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process wide catalog, created empty on first access.
    pub fn global() -> &'static EventCatalog {
        &GLOBAL_CATALOG
    }

    fn snapshot(&self) -> Arc<EventMap> {
        self.events.read().clone()
    }

    /// Apply a mutation to a copy of the current mapping and publish the copy
    /// if the mutation succeeded.
    fn mutate<T, E>(&self, f: impl FnOnce(&mut EventMap) -> Result<T, E>) -> Result<T, E> {
        let _guard = self.write_lock.lock();
        let mut next = EventMap::clone(&self.snapshot());
        let out = f(&mut next)?;
        *self.events.write() = Arc::new(next);
        Ok(out)
    }

    /// Event names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.snapshot().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Dataset> {
        self.snapshot().get(name).cloned()
    }

    /// Copy of every event, in insertion order.
    pub fn to_map(&self) -> IndexMap<String, Dataset> {
        EventMap::clone(&self.snapshot())
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Add a new event, erroring if the name is already taken.
    pub fn set(&self, name: impl Into<String>, dataset: Dataset) -> Result<()> {
        let name = name.into();
        self.mutate(|events| {
            if events.contains_key(&name) {
                return Err(ConnectorError::DuplicateKey(name));
            }
            debug!(%name, shape = ?shape(&dataset), "adding event");
            events.insert(name, dataset);
            Ok(())
        })
    }

    /// Insert or replace an event.
    pub fn update(&self, name: impl Into<String>, dataset: Dataset) {
        let name = name.into();
        let Ok(()) = self.mutate(|events| {
            debug!(%name, shape = ?shape(&dataset), "updating event");
            events.insert(name, dataset);
            Ok::<_, Infallible>(())
        });
    }

    /// Remove an event, returning the dataset it held.
    pub fn delete(&self, name: &str) -> Result<Dataset> {
        self.mutate(|events| -> Result<Dataset> {
            let dataset = events
                .shift_remove(name)
                .ok_or_else(|| ConnectorError::event_not_found(name))?;
            debug!(%name, "deleted event");
            Ok(dataset)
        })
    }

    /// Remove every event.
    pub fn reset(&self) -> &Self {
        let Ok(()) = self.mutate(|events| {
            events.clear();
            Ok::<_, Infallible>(())
        });
        debug!("reset event catalog");
        self
    }
}

impl fmt::Display for EventCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events = self.snapshot();
        write!(f, "[")?;
        for (idx, (name, dataset)) in events.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            let (rows, cols) = shape(dataset);
            write!(f, "{name} ({rows},{cols}) [")?;
            for (col_idx, field) in dataset.schema().fields().iter().enumerate() {
                if col_idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", field.name())?;
            }
            write!(f, "]")?;
        }
        write!(f, "]")
    }
}
