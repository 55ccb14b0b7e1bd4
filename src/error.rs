use crate::area::StorageArea;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The configured storage area is not granted by the host. Checked before
    /// every store access; a configuration error, never retried.
    #[error("storage area `{0}` is not available; check the host manifest/permissions")]
    AreaUnavailable(StorageArea),

    /// A codec failed to serialize a value about to be persisted. The write
    /// is aborted and neither the cache nor the store is touched.
    #[error("failed to serialize value for key `{key}`: {source}")]
    Serialize {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The host store rejected a read or write.
    #[error("host store error: {0}")]
    Host(#[from] anyhow::Error),
}
