use std::sync::Arc;

use crate::area::StorageArea;
use crate::codec::Codec;

/// Per-handle configuration for [`StorageService::create_store`](crate::StorageService::create_store).
pub struct StoreConfig<T> {
    /// Which persistence tier backs this handle.
    pub area: StorageArea,
    /// Whether the handle bridges host-level change events into its cache.
    pub live_update: bool,
    /// Whether creating this handle escalates session-storage access for
    /// untrusted contexts. Only meaningful with [`StorageArea::Session`];
    /// the escalation happens at most once per service.
    pub session_access_for_content_scripts: bool,
    /// Codec used between the value type and the persisted representation.
    /// `None` selects the serde-based [`JsonCodec`](crate::JsonCodec).
    pub codec: Option<Arc<dyn Codec<T>>>,
}

impl<T> Default for StoreConfig<T> {
    fn default() -> Self {
        Self {
            area: StorageArea::default(),
            live_update: false,
            session_access_for_content_scripts: false,
            codec: None,
        }
    }
}

impl<T> StoreConfig<T> {
    pub fn with_area(mut self, area: StorageArea) -> Self {
        self.area = area;
        self
    }

    pub fn with_live_update(mut self, live_update: bool) -> Self {
        self.live_update = live_update;
        self
    }

    pub fn with_session_access_for_content_scripts(mut self, enabled: bool) -> Self {
        self.session_access_for_content_scripts = enabled;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec<T>>) -> Self {
        self.codec = Some(codec);
        self
    }
}

impl<T> std::fmt::Debug for StoreConfig<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("area", &self.area)
            .field("live_update", &self.live_update)
            .field(
                "session_access_for_content_scripts",
                &self.session_access_for_content_scripts,
            )
            .field("codec", &self.codec.as_ref().map(|_| "custom"))
            .finish()
    }
}
