use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::area::{AccessLevel, StorageArea};
use crate::event::{AreaChanges, KeyChange};
use crate::host::{HostSubscription, HostStore};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

struct AreaState {
    items: RwLock<HashMap<String, Value>>,
    changes: broadcast::Sender<AreaChanges>,
}

impl AreaState {
    fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            items: RwLock::new(HashMap::new()),
            changes: tx,
        }
    }
}

/// In-memory host store.
///
/// One map plus one change channel per granted area. Ungranted areas reject
/// every operation, which lets tests exercise the permission contract. The
/// access level of the session area is recorded, together with a call
/// counter, so the at-most-once escalation can be asserted.
pub struct InMemoryHostStore {
    areas: HashMap<StorageArea, AreaState>,
    access_level: RwLock<Option<AccessLevel>>,
    access_level_calls: AtomicUsize,
}

impl InMemoryHostStore {
    /// A store with every area granted.
    pub fn new() -> Self {
        Self::with_areas(&StorageArea::all())
    }

    /// A store granting only the given areas.
    pub fn with_areas(granted: &[StorageArea]) -> Self {
        let areas = granted
            .iter()
            .map(|area| (*area, AreaState::new()))
            .collect();
        Self {
            areas,
            access_level: RwLock::new(None),
            access_level_calls: AtomicUsize::new(0),
        }
    }

    fn area(&self, area: StorageArea) -> Result<&AreaState> {
        self.areas
            .get(&area)
            .ok_or_else(|| anyhow!("area `{area}` is not granted"))
    }

    /// The last access level set on the session area, if any.
    pub fn access_level(&self) -> Option<AccessLevel> {
        *self.access_level.read().unwrap()
    }

    /// How many times `set_access_level` was called.
    pub fn access_level_calls(&self) -> usize {
        self.access_level_calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryHostStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HostStore for InMemoryHostStore {
    fn is_available(&self, area: StorageArea) -> bool {
        self.areas.contains_key(&area)
    }

    fn get(
        &self,
        area: StorageArea,
        keys: &[String],
    ) -> BoxFuture<'_, Result<HashMap<String, Value>>> {
        let keys = keys.to_vec();
        Box::pin(async move {
            let state = self.area(area)?;
            let items = state.items.read().unwrap();
            Ok(keys
                .iter()
                .filter_map(|k| items.get(k).map(|v| (k.clone(), v.clone())))
                .collect())
        })
    }

    fn set(
        &self,
        area: StorageArea,
        items: HashMap<String, Value>,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let state = self.area(area)?;
            let mut changes = HashMap::new();
            {
                let mut stored = state.items.write().unwrap();
                for (key, new_value) in items {
                    let old_value = stored.insert(key.clone(), new_value.clone());
                    changes.insert(
                        key,
                        KeyChange {
                            old_value,
                            new_value: Some(new_value),
                        },
                    );
                }
            }
            // send() only fails with zero receivers, which is fine to ignore.
            let _ = state.changes.send(AreaChanges { area, changes });
            Ok(())
        })
    }

    fn set_access_level(
        &self,
        area: StorageArea,
        level: AccessLevel,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.access_level_calls.fetch_add(1, Ordering::SeqCst);
            if area != StorageArea::Session {
                return Err(anyhow!("access level is only settable on the session area"));
            }
            self.area(area)?;
            *self.access_level.write().unwrap() = Some(level);
            Ok(())
        })
    }

    fn subscribe(&self, area: StorageArea) -> HostSubscription {
        match self.areas.get(&area) {
            Some(state) => state.changes.subscribe(),
            // Ungranted area: hand out a receiver on a throwaway channel so
            // the caller simply never sees an event.
            None => broadcast::channel(1).1,
        }
    }
}
