use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::area::{AccessLevel, StorageArea};
use crate::event::{AreaChanges, KeyChange};
use crate::host::{HostSubscription, HostStore};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// On-disk layout: one document holding every area's items.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    areas: HashMap<StorageArea, HashMap<String, Value>>,
}

/// Host store persisted as a single pretty-printed JSON file.
///
/// Writes go through a load/modify/save cycle guarded by a process lock, so
/// all handles in one process see a consistent file. Change events are
/// broadcast for in-process writers only; external edits to the file are
/// picked up on the next read but emit no event.
pub struct JsonFileHostStore {
    path: PathBuf,
    granted: Vec<StorageArea>,
    // Guards the load/modify/save cycle; the file itself is the state.
    io: RwLock<()>,
    changes: HashMap<StorageArea, broadcast::Sender<AreaChanges>>,
}

impl JsonFileHostStore {
    /// Opens (or creates) the store file at `path` with every area granted.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_areas(path, &StorageArea::all())
    }

    /// Opens (or creates) the store file at `path`, granting only `granted`.
    pub fn with_areas(path: impl Into<PathBuf>, granted: &[StorageArea]) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            let empty = serde_json::to_string_pretty(&StoreFile::default())?;
            fs::write(&path, empty)
                .with_context(|| format!("creating store file {}", path.display()))?;
        }

        let changes = granted
            .iter()
            .map(|area| {
                let (tx, _rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
                (*area, tx)
            })
            .collect();

        Ok(Self {
            path,
            granted: granted.to_vec(),
            io: RwLock::new(()),
            changes,
        })
    }

    fn check_area(&self, area: StorageArea) -> Result<()> {
        if self.granted.contains(&area) {
            Ok(())
        } else {
            Err(anyhow!("area `{area}` is not granted"))
        }
    }

    fn load(&self) -> StoreFile {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                log::warn!(
                    "cannot read store file {}, treating it as empty: {err}",
                    self.path.display()
                );
                return StoreFile::default();
            }
        };
        // Malformed content degrades to an empty store rather than poisoning
        // every subsequent operation.
        serde_json::from_str(&contents).unwrap_or_default()
    }

    fn save(&self, file: &StoreFile) -> Result<()> {
        let contents = serde_json::to_string_pretty(file)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("writing store file {}", self.path.display()))
    }
}

impl HostStore for JsonFileHostStore {
    fn is_available(&self, area: StorageArea) -> bool {
        self.granted.contains(&area)
    }

    fn get(
        &self,
        area: StorageArea,
        keys: &[String],
    ) -> BoxFuture<'_, Result<HashMap<String, Value>>> {
        let keys = keys.to_vec();
        Box::pin(async move {
            self.check_area(area)?;
            let _guard = self.io.read().unwrap();
            let file = self.load();
            let items = file.areas.get(&area);
            Ok(keys
                .iter()
                .filter_map(|k| {
                    items
                        .and_then(|m| m.get(k))
                        .map(|v| (k.clone(), v.clone()))
                })
                .collect())
        })
    }

    fn set(
        &self,
        area: StorageArea,
        items: HashMap<String, Value>,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.check_area(area)?;
            let changes = {
                let _guard = self.io.write().unwrap();
                let mut file = self.load();
                let stored = file.areas.entry(area).or_default();
                let mut changes = HashMap::new();
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
                self.save(&file)?;
                changes
            };
            if let Some(tx) = self.changes.get(&area) {
                let _ = tx.send(AreaChanges { area, changes });
            }
            Ok(())
        })
    }

    fn set_access_level(
        &self,
        area: StorageArea,
        _level: AccessLevel,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if area != StorageArea::Session {
                return Err(anyhow!("access level is only settable on the session area"));
            }
            self.check_area(area)?;
            // File-level durability has no trusted/untrusted distinction; the
            // call succeeds so factory-level escalation behaves uniformly.
            Ok(())
        })
    }

    fn subscribe(&self, area: StorageArea) -> HostSubscription {
        match self.changes.get(&area) {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn values_survive_reopening_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = JsonFileHostStore::new(&path).unwrap();
            store
                .set(
                    StorageArea::Local,
                    HashMap::from([("theme".to_string(), json!("dark"))]),
                )
                .await
                .unwrap();
        }

        let store = JsonFileHostStore::new(&path).unwrap();
        let found = store
            .get(StorageArea::Local, &keys(&["theme"]))
            .await
            .unwrap();
        assert_eq!(found["theme"], json!("dark"));
    }

    #[tokio::test]
    async fn malformed_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json at all").unwrap();

        let store = JsonFileHostStore::new(&path).unwrap();
        let found = store
            .get(StorageArea::Local, &keys(&["theme"]))
            .await
            .unwrap();
        assert!(found.is_empty());

        // Writing repairs the file.
        store
            .set(
                StorageArea::Local,
                HashMap::from([("theme".to_string(), json!("light"))]),
            )
            .await
            .unwrap();
        let found = store
            .get(StorageArea::Local, &keys(&["theme"]))
            .await
            .unwrap();
        assert_eq!(found["theme"], json!("light"));
    }

    #[tokio::test]
    async fn unreadable_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonFileHostStore::new(&path).unwrap();
        store
            .set(
                StorageArea::Local,
                HashMap::from([("theme".to_string(), json!("dark"))]),
            )
            .await
            .unwrap();

        // Make the path unreadable as a file; reads degrade to an empty
        // store (with a logged warning) instead of erroring.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let found = store
            .get(StorageArea::Local, &keys(&["theme"]))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn in_process_writes_broadcast_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileHostStore::new(dir.path().join("store.json")).unwrap();
        let mut rx = store.subscribe(StorageArea::Sync);

        store
            .set(
                StorageArea::Sync,
                HashMap::from([("k".to_string(), json!(1))]),
            )
            .await
            .unwrap();

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.area, StorageArea::Sync);
        assert_eq!(ev.changes["k"].new_value, Some(json!(1)));
    }

    #[tokio::test]
    async fn ungranted_area_rejects_operations() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileHostStore::with_areas(
            dir.path().join("store.json"),
            &[StorageArea::Local],
        )
        .unwrap();

        assert!(!store.is_available(StorageArea::Managed));
        assert!(store
            .get(StorageArea::Managed, &keys(&["k"]))
            .await
            .is_err());
    }
}
