use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::area::{AccessLevel, StorageArea};
use crate::codec::JsonCodec;
use crate::config::StoreConfig;
use crate::error::StorageError;
use crate::host::{HostStore, InMemoryHostStore};
use crate::store::Store;

/// Factory for [`Store`] handles over one host store binding.
///
/// The service owns the one-time session-access escalation flag, so the
/// escalation happens at most once no matter how many handles request it.
/// Production code builds one service per execution context; tests get a
/// fresh flag by building a fresh service.
#[derive(Clone)]
pub struct StorageService {
    host: Arc<dyn HostStore>,
    session_access_attempted: Arc<AtomicBool>,
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService").finish_non_exhaustive()
    }
}

impl StorageService {
    pub fn new(host: Arc<dyn HostStore>) -> Self {
        Self {
            host,
            session_access_attempted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A service over an in-memory host store with every area granted.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryHostStore::new()))
    }

    /// The host store this service binds handles to.
    pub fn host(&self) -> Arc<dyn HostStore> {
        self.host.clone()
    }

    /// Creates a typed storage handle bound to `key` in the configured area.
    ///
    /// The handle immediately issues an asynchronous priming read to seed its
    /// cache and notify any listener registered before priming completes, so
    /// this must be called within a tokio runtime. Keys alias silently:
    /// two handles for the same key in one area share the underlying slot,
    /// not their caches.
    ///
    /// Fails with [`StorageError::AreaUnavailable`] when session access
    /// escalation is requested for an ungranted session area. Handles for
    /// other ungranted areas are still constructed; every operation touching
    /// the store then fails fast with the same error.
    pub fn create_store<T>(
        &self,
        key: impl Into<String>,
        fallback: T,
        config: StoreConfig<T>,
    ) -> Result<Store<T>, StorageError>
    where
        T: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        if config.area == StorageArea::Session && config.session_access_for_content_scripts {
            self.escalate_session_access()?;
        }

        let codec = config.codec.unwrap_or_else(|| Arc::new(JsonCodec));
        Ok(Store::new(
            self.host.clone(),
            key.into(),
            fallback,
            config.area,
            config.live_update,
            codec,
        ))
    }

    /// Escalates session-storage access for untrusted contexts, once per
    /// service. The permission probe is checked synchronously and propagates
    /// without marking the flag; the escalation call itself is
    /// fire-and-forget, its failure logged and never retried.
    fn escalate_session_access(&self) -> Result<(), StorageError> {
        if self.session_access_attempted.load(Ordering::SeqCst) {
            return Ok(());
        }
        if !self.host.is_available(StorageArea::Session) {
            return Err(StorageError::AreaUnavailable(StorageArea::Session));
        }
        if self.session_access_attempted.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let host = self.host.clone();
        tokio::spawn(async move {
            if let Err(err) = host
                .set_access_level(
                    StorageArea::Session,
                    AccessLevel::TrustedAndUntrustedContexts,
                )
                .await
            {
                log::warn!("session access-level escalation failed: {err}");
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use futures::future::BoxFuture;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::time::Duration;

    use crate::event::AreaChanges;
    use crate::host::HostSubscription;

    async fn eventually(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !condition() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn session_config() -> StoreConfig<String> {
        StoreConfig::default()
            .with_area(StorageArea::Session)
            .with_session_access_for_content_scripts(true)
    }

    #[tokio::test]
    async fn session_access_is_escalated_at_most_once() {
        let host = Arc::new(InMemoryHostStore::new());
        let service = StorageService::new(host.clone());

        let _a = service
            .create_store("a", String::new(), session_config())
            .unwrap();
        let _b = service
            .create_store("b", String::new(), session_config())
            .unwrap();

        eventually(|| host.access_level_calls() == 1).await;
        eventually(|| {
            host.access_level() == Some(AccessLevel::TrustedAndUntrustedContexts)
        })
        .await;

        // And never a second time.
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert_eq!(host.access_level_calls(), 1);
    }

    #[tokio::test]
    async fn escalation_is_not_requested_without_the_flag() {
        let host = Arc::new(InMemoryHostStore::new());
        let service = StorageService::new(host.clone());

        let _store = service
            .create_store(
                "a",
                String::new(),
                StoreConfig::default().with_area(StorageArea::Session),
            )
            .unwrap();

        tokio::task::yield_now().await;
        assert_eq!(host.access_level_calls(), 0);
    }

    #[tokio::test]
    async fn ungranted_session_area_fails_the_factory() {
        let host = Arc::new(InMemoryHostStore::with_areas(&[StorageArea::Local]));
        let service = StorageService::new(host.clone());

        let err = service
            .create_store("a", String::new(), session_config())
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::AreaUnavailable(StorageArea::Session)
        ));
        assert_eq!(host.access_level_calls(), 0);

        // The flag was not marked, so a later create with the same service
        // still probes (and fails) rather than silently skipping.
        let err = service
            .create_store("b", String::new(), session_config())
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::AreaUnavailable(StorageArea::Session)
        ));
    }

    /// Delegates to an in-memory store but rejects access-level changes.
    struct RefusingHost {
        inner: InMemoryHostStore,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl RefusingHost {
        fn new() -> Self {
            Self {
                inner: InMemoryHostStore::new(),
                calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    impl HostStore for RefusingHost {
        fn is_available(&self, area: StorageArea) -> bool {
            self.inner.is_available(area)
        }
        fn get(
            &self,
            area: StorageArea,
            keys: &[String],
        ) -> BoxFuture<'_, anyhow::Result<HashMap<String, Value>>> {
            self.inner.get(area, keys)
        }
        fn set(
            &self,
            area: StorageArea,
            items: HashMap<String, Value>,
        ) -> BoxFuture<'_, anyhow::Result<()>> {
            self.inner.set(area, items)
        }
        fn set_access_level(
            &self,
            _area: StorageArea,
            _level: AccessLevel,
        ) -> BoxFuture<'_, anyhow::Result<()>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(anyhow!("host refused")) })
        }
        fn subscribe(&self, area: StorageArea) -> HostSubscription {
            self.inner.subscribe(area)
        }
    }

    #[tokio::test]
    async fn failed_escalation_is_logged_not_raised_and_not_retried() {
        let host = Arc::new(RefusingHost::new());
        let service = StorageService::new(host.clone());

        // The factory call itself succeeds; the refusal only gets logged.
        let store = service
            .create_store("a", String::new(), session_config())
            .unwrap();
        eventually(|| host.calls.load(Ordering::SeqCst) == 1).await;

        // The flag is already marked as attempted, so no retry happens.
        let _b = service
            .create_store("b", String::new(), session_config())
            .unwrap();
        tokio::task::yield_now().await;
        assert_eq!(host.calls.load(Ordering::SeqCst), 1);

        // And the handle is fully usable regardless.
        store.set("v".to_string()).await.unwrap();
        assert_eq!(store.get().await.unwrap(), "v");
    }

    #[tokio::test]
    async fn clones_share_the_escalation_flag() {
        let host = Arc::new(InMemoryHostStore::new());
        let service = StorageService::new(host.clone());
        let clone = service.clone();

        let _a = service
            .create_store("a", String::new(), session_config())
            .unwrap();
        let _b = clone
            .create_store("b", String::new(), session_config())
            .unwrap();

        eventually(|| host.access_level_calls() == 1).await;
    }
}
