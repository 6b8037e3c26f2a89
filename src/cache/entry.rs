//! Cache entry snapshots handed out to readers.

use crate::cache::key::CacheKey;
use crate::error::ErrorKind;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;

/// Lifecycle state of a cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Created on first reference, nothing fetched yet.
    Idle,
    /// A fetch is in flight. Any previous value is still readable.
    Loading,
    /// Fetched within the staleness window.
    Fresh,
    /// Outdated, either by elapsed time or explicit invalidation. The value
    /// remains readable until the next fetch replaces it.
    Stale,
    /// The last fetch failed. The previous value, if any, is retained for
    /// continued display (stale-while-error).
    Error,
}

/// Read-only snapshot of one cache entry, as of the moment of the call that
/// produced it. Cheap to clone; the payload is shared.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: Option<Arc<Value>>,
    pub status: CacheStatus,
    pub fetched_at: Option<Instant>,
    pub error: Option<ErrorKind>,
}

impl CacheEntry {
    /// Decode the opaque payload into a concrete type.
    ///
    /// Returns `None` when the entry holds no value; a present value that
    /// does not match `T` is a `Serialization` error.
    pub fn value_as<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T, ErrorKind>> {
        let value = self.value.as_ref()?;
        Some(
            T::deserialize(value.as_ref())
                .map_err(|e| ErrorKind::Serialization(e.to_string())),
        )
    }

    /// Human-readable message for the UI when the entry is in `Error`.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}
