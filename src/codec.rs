use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Conversion between a store's in-memory value type and the persisted
/// representation ([`serde_json::Value`]).
///
/// `deserialize` returning `None` means "nothing usable was stored"; the
/// reconciler substitutes the fallback silently. It must not panic.
pub trait Codec<T>: Send + Sync {
    fn serialize(&self, value: &T) -> Result<Value>;
    fn deserialize(&self, raw: Value) -> Option<T>;
}

/// The default codec: serde round-trip through `serde_json::Value`.
///
/// For `T = Value` this is effectively the identity transformation.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn serialize(&self, value: &T) -> Result<Value> {
        Ok(serde_json::to_value(value)?)
    }

    fn deserialize(&self, raw: Value) -> Option<T> {
        serde_json::from_value(raw).ok()
    }
}
