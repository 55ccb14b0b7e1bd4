//! Typed, change-notifying storage handles over an async host key/value store.
//!
//! This crate puts a small reactive front — an in-memory cache, synchronous
//! snapshot reads, and a publish/subscribe notifier — in front of a
//! persistent key/value store that is reachable only through a narrow async
//! get/set API and may be shared with other execution contexts.
//!
//! # Concepts
//!
//! - A [`HostStore`] is the persistent store boundary: async batch get/set
//!   per [`StorageArea`], an `onChanged`-style event stream, and a one-time
//!   access-level escalation for the session area. Two bindings ship with
//!   the crate: [`InMemoryHostStore`] and [`JsonFileHostStore`].
//! - A [`StorageService`] binds handles to one host store and owns the
//!   process-scoped session-access flag.
//! - A [`Store`] is the per-key handle: it primes its cache asynchronously at
//!   creation, exposes `get` / `set` / `snapshot` / `subscribe`, and — with
//!   live update enabled — re-applies host-originated changes to its cache
//!   before notifying subscribers.
//!
//! # Example
//!
//! ```no_run
//! use extstore::{StorageService, StoreConfig, ValueOrUpdate};
//!
//! # async fn demo() -> Result<(), extstore::StorageError> {
//! let service = StorageService::in_memory();
//! let theme = service.create_store(
//!     "theme",
//!     "light".to_string(),
//!     StoreConfig::default().with_live_update(true),
//! )?;
//!
//! let _sub = theme.subscribe(|| println!("theme changed"));
//!
//! theme.set("dark".to_string()).await?;
//! theme
//!     .set(ValueOrUpdate::update(|prev: String| {
//!         if prev == "dark" { "light".into() } else { "dark".into() }
//!     }))
//!     .await?;
//!
//! assert_eq!(theme.snapshot(), Some("light".to_string()));
//! # Ok(())
//! # }
//! ```
//!
//! # Consistency
//!
//! Handles for the same key in different contexts are reconciled only through
//! the host store and, with live update enabled, its change events. The host
//! offers no compare-and-swap, so overlapping writes race and the last
//! completed host write wins; listeners are only ever notified after the
//! local cache has actually changed.

/// Storage areas and session access levels.
pub mod area;
/// Codec seam between value types and the persisted representation.
pub mod codec;
/// Per-handle configuration.
pub mod config;
/// Error types.
pub mod error;
/// Host-level change event payloads.
pub mod event;
/// The host store boundary and its bindings.
pub mod host;
/// Listener registration and broadcast.
pub mod notify;
/// The store factory.
pub mod service;
/// The per-key storage handle.
pub mod store;

pub use area::{AccessLevel, StorageArea};
pub use codec::{Codec, JsonCodec};
pub use config::StoreConfig;
pub use error::StorageError;
pub use event::{AreaChanges, KeyChange};
pub use host::{HostStore, HostSubscription, InMemoryHostStore, JsonFileHostStore};
pub use notify::Subscription;
pub use service::StorageService;
pub use store::{Store, ValueOrUpdate};
