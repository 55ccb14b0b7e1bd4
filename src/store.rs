use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use tokio::sync::{broadcast, watch};

use crate::area::StorageArea;
use crate::codec::Codec;
use crate::error::StorageError;
use crate::event::AreaChanges;
use crate::host::HostStore;
use crate::notify::{Listeners, Subscription};

/// A new value for [`Store::set`], given either literally or as a
/// transformation of the previous value.
///
/// Plain values convert via `From`, so `store.set(value)` works directly;
/// updaters are built with [`update`](ValueOrUpdate::update) and
/// [`update_async`](ValueOrUpdate::update_async).
pub enum ValueOrUpdate<T> {
    /// Use this value as-is.
    Value(T),
    /// Derive the new value from the previous one.
    Update(Box<dyn FnOnce(T) -> T + Send>),
    /// Derive the new value from the previous one, asynchronously.
    UpdateAsync(Box<dyn FnOnce(T) -> BoxFuture<'static, T> + Send>),
}

impl<T> ValueOrUpdate<T> {
    pub fn update(f: impl FnOnce(T) -> T + Send + 'static) -> Self {
        Self::Update(Box::new(f))
    }

    pub fn update_async<F, Fut>(f: F) -> Self
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::UpdateAsync(Box::new(move |prev| Box::pin(f(prev))))
    }

    /// Resolves against the previous value. The single reconciliation routine
    /// shared by [`Store::set`] and the live-update bridge.
    async fn resolve(self, previous: T) -> T {
        match self {
            ValueOrUpdate::Value(value) => value,
            ValueOrUpdate::Update(f) => f(previous),
            ValueOrUpdate::UpdateAsync(f) => f(previous).await,
        }
    }
}

impl<T> From<T> for ValueOrUpdate<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

struct Inner<T> {
    key: String,
    fallback: T,
    area: StorageArea,
    codec: Arc<dyn Codec<T>>,
    host: Arc<dyn HostStore>,
    /// `None` is the uninitialized marker; once `Some`, never `None` again.
    cache: RwLock<Option<T>>,
    primed: watch::Sender<bool>,
    listeners: Arc<Listeners>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Inner<T> {
    fn check_area(&self) -> Result<(), StorageError> {
        if self.host.is_available(self.area) {
            Ok(())
        } else {
            Err(StorageError::AreaUnavailable(self.area))
        }
    }

    /// Reads the persistent store directly, without touching the cache.
    async fn read(&self) -> Result<T, StorageError> {
        self.check_area()?;
        let mut found = self
            .host
            .get(self.area, std::slice::from_ref(&self.key))
            .await?;
        Ok(found
            .remove(&self.key)
            .and_then(|raw| self.codec.deserialize(raw))
            .unwrap_or_else(|| self.fallback.clone()))
    }

    fn store_cache(&self, value: T) {
        *self.cache.write().unwrap() = Some(value);
        self.primed.send_replace(true);
    }

    /// Seeds the cache from a completed priming read. Returns whether the
    /// seed was applied; a `set` that raced ahead already holds a fresher
    /// value and has broadcast it, so a late prime is dropped.
    fn prime_cache(&self, value: T) -> bool {
        let mut cache = self.cache.write().unwrap();
        if cache.is_some() {
            return false;
        }
        *cache = Some(value);
        drop(cache);
        self.primed.send_replace(true);
        true
    }

    /// Re-applies a host-originated change for this handle's key.
    async fn apply_host_change(&self, event: AreaChanges) {
        let Some(change) = event.changes.get(&self.key) else {
            return;
        };
        let incoming = change
            .new_value
            .clone()
            .and_then(|raw| self.codec.deserialize(raw))
            .unwrap_or_else(|| self.fallback.clone());

        let current = self.cache.read().unwrap().clone();
        if current.as_ref() == Some(&incoming) {
            // Echo of our own write, or a no-op change: skip entirely.
            return;
        }

        let previous = current.unwrap_or_else(|| self.fallback.clone());
        let resolved = ValueOrUpdate::Value(incoming).resolve(previous).await;
        self.store_cache(resolved);
        self.listeners.emit();
    }
}

/// A typed handle bound to one key of one storage area.
///
/// The handle owns an in-memory cache primed from the persistent store at
/// construction, offers synchronous [snapshot](Store::snapshot) reads once
/// primed, routes writes through a single reconciliation path, and notifies
/// subscribers after every cache-affecting event. Handles are cheap to clone
/// and share one cache and listener set per creation.
///
/// Created by [`StorageService::create_store`](crate::StorageService::create_store).
pub struct Store<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("key", &self.inner.key)
            .field("area", &self.inner.area)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Store<T> {
    pub(crate) fn new(
        host: Arc<dyn HostStore>,
        key: String,
        fallback: T,
        area: StorageArea,
        live_update: bool,
        codec: Arc<dyn Codec<T>>,
    ) -> Self {
        let (primed, _) = watch::channel(false);
        let store = Self {
            inner: Arc::new(Inner {
                key,
                fallback,
                area,
                codec,
                host,
                cache: RwLock::new(None),
                primed,
                listeners: Arc::new(Listeners::new()),
            }),
        };
        store.spawn_prime();
        if live_update {
            store.spawn_live_update();
        }
        store
    }

    /// The key this handle is bound to.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// The storage area backing this handle.
    pub fn area(&self) -> StorageArea {
        self.inner.area
    }

    /// Reads the current value from the persistent store.
    ///
    /// An absent key, and a stored value the codec cannot deserialize, both
    /// yield the fallback. The cache is not touched; `get` always reflects
    /// the store itself, [`snapshot`](Store::snapshot) reflects the cache.
    pub async fn get(&self) -> Result<T, StorageError> {
        self.inner.read().await
    }

    /// The cached value, or `None` while priming has not yet completed.
    ///
    /// Never suspends. Once this returns `Some`, it returns `Some` for the
    /// rest of the handle's life.
    pub fn snapshot(&self) -> Option<T> {
        self.inner.cache.read().unwrap().clone()
    }

    /// Writes a new value, or applies an updater to the previous one.
    ///
    /// Order of effects: seed the cache from the store if a write raced
    /// ahead of priming, resolve the updater against the current value,
    /// persist, update the cache, then broadcast to subscribers.
    ///
    /// Two overlapping `set` calls on one handle may both observe the same
    /// pre-update value and race to persist; the last write to the host
    /// store wins. The host offers no compare-and-swap to do better.
    pub async fn set(&self, value: impl Into<ValueOrUpdate<T>>) -> Result<(), StorageError> {
        self.inner.check_area()?;
        let previous = match self.snapshot() {
            Some(value) => value,
            None => self.inner.read().await?,
        };
        let next = value.into().resolve(previous).await;
        let raw = self
            .inner
            .codec
            .serialize(&next)
            .map_err(|source| StorageError::Serialize {
                key: self.inner.key.clone(),
                source,
            })?;
        self.inner
            .host
            .set(self.inner.area, HashMap::from([(self.inner.key.clone(), raw)]))
            .await?;
        self.inner.store_cache(next);
        self.inner.listeners.emit();
        Ok(())
    }

    /// Registers a zero-argument listener called synchronously after every
    /// broadcast. Listeners re-read state via [`snapshot`](Store::snapshot).
    ///
    /// Each call is an independent registration, even for the same closure.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.inner.listeners.subscribe(Arc::new(listener));
        Subscription::new(id, Arc::downgrade(&self.inner.listeners))
    }

    /// Resolves once the cache holds a value, whether through priming, a
    /// first `set`, or a live-update event.
    pub async fn primed(&self) {
        let mut rx = self.inner.primed.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    fn spawn_prime(&self) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            match inner.read().await {
                Ok(value) => {
                    if inner.prime_cache(value) {
                        inner.listeners.emit();
                    }
                }
                Err(err) => {
                    log::warn!("priming read for key `{}` failed: {err}", inner.key);
                }
            }
        });
    }

    fn spawn_live_update(&self) {
        let mut rx = self.inner.host.subscribe(self.inner.area);
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log::warn!("host change stream lagged, {missed} events missed");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                // The bridge holds no strong reference; dropping the last
                // handle tears the task down.
                let Some(inner) = weak.upgrade() else { break };
                inner.apply_host_change(event).await;
            }
        });
    }
}
