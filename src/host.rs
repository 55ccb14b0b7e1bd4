use std::collections::HashMap;

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::area::{AccessLevel, StorageArea};
use crate::event::AreaChanges;

/// In-memory host store binding, the default for tests and single-process use.
pub mod in_memory;
/// JSON-file backed host store binding.
pub mod json_file;

/// A handle for receiving host-level storage change notifications.
pub type HostSubscription = broadcast::Receiver<AreaChanges>;

/// Object-safe interface to the host's persistent key/value store.
///
/// This is the narrow boundary the rest of the crate operates through: an
/// asynchronous batch get/set per [`StorageArea`], an optional one-time
/// access-level escalation for the session area, and a change-event stream.
/// The host store is treated as an external, already-synchronized resource;
/// no locking is layered over it here.
///
/// Methods return boxed futures so the trait stays usable behind
/// `Arc<dyn HostStore>`.
pub trait HostStore: Send + Sync {
    /// Whether the given area is granted/available on this host.
    ///
    /// Availability is a configuration property; it does not change at
    /// runtime, so callers may check it eagerly and fail fast.
    fn is_available(&self, area: StorageArea) -> bool;

    /// Reads the given keys from `area`. Absent keys are simply missing from
    /// the returned mapping.
    fn get(
        &self,
        area: StorageArea,
        keys: &[String],
    ) -> BoxFuture<'_, Result<HashMap<String, Value>>>;

    /// Writes all entries of `items` into `area`, overwriting existing values.
    fn set(
        &self,
        area: StorageArea,
        items: HashMap<String, Value>,
    ) -> BoxFuture<'_, Result<()>>;

    /// Changes the access level of `area`. Only meaningful for the session
    /// area; other areas may reject the call.
    fn set_access_level(
        &self,
        area: StorageArea,
        level: AccessLevel,
    ) -> BoxFuture<'_, Result<()>>;

    /// Subscribes to change events for `area`. Every successful `set` on the
    /// host, from any handle in this process (and from other contexts, where
    /// the binding supports it), is delivered as an [`AreaChanges`] batch.
    fn subscribe(&self, area: StorageArea) -> HostSubscription;
}

pub use in_memory::InMemoryHostStore;
pub use json_file::JsonFileHostStore;
