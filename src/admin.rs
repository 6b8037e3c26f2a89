//! Administrative facade over the three cache tiers: read-only
//! introspection plus idempotent bulk clears.

use crate::cache::query::QueryCache;
use crate::error::StorageError;
use crate::store::favorites::FavoriteStore;
use crate::store::preferences::PreferenceStore;
use crate::store::storage::Storage;
use serde::Serialize;
use tracing::{info, warn};

/// Point-in-time view of all three tiers. Computed on demand, never stored.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheSnapshot {
    /// Number of entries in the query cache, regardless of status.
    pub query_cache_entries: usize,
    /// Serialized byte size of the durable tier (keys + values).
    pub persistent_store_bytes: usize,
    /// Serialized byte size of the session tier (keys + values).
    pub session_store_bytes: usize,
    /// Current favorite count.
    pub favorite_count: usize,
}

/// Per-tier outcome of [`CacheAdmin::clear_all`]. One tier failing never
/// stops the others from being attempted.
#[derive(Debug)]
pub struct ClearReport {
    pub query: Result<(), StorageError>,
    pub persistent: Result<(), StorageError>,
    pub session: Result<(), StorageError>,
}

impl ClearReport {
    pub fn all_ok(&self) -> bool {
        self.query.is_ok() && self.persistent.is_ok() && self.session.is_ok()
    }
}

/// Borrowed view over the three tiers; constructed by the dashboard state.
pub struct CacheAdmin<'a> {
    pub(crate) query_cache: &'a QueryCache,
    pub(crate) favorites: &'a FavoriteStore,
    pub(crate) preferences: &'a PreferenceStore,
    pub(crate) durable: &'a dyn Storage,
    pub(crate) session: &'a dyn Storage,
}

impl CacheAdmin<'_> {
    /// Compute tier sizes without mutating any store.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            query_cache_entries: self.query_cache.len(),
            persistent_store_bytes: self.durable.byte_size(),
            session_store_bytes: self.session.byte_size(),
            favorite_count: self.favorites.len(),
        }
    }

    /// Drop every query cache entry.
    pub fn clear_query_cache(&self) -> Result<(), StorageError> {
        self.query_cache.clear();
        info!("query cache cleared");
        Ok(())
    }

    /// Clear the durable tier, including the in-memory favorite set so
    /// subsequent reads stay consistent with storage.
    pub fn clear_persistent_store(&self) -> Result<(), StorageError> {
        self.favorites.clear()?;
        self.durable.clear()?;
        info!("persistent store cleared");
        Ok(())
    }

    /// Clear the session tier and reset the cached preference record.
    pub fn clear_session_store(&self) -> Result<(), StorageError> {
        self.preferences.clear()?;
        self.session.clear()?;
        info!("session store cleared");
        Ok(())
    }

    /// Clear all three tiers in sequence, reporting each independently.
    pub fn clear_all(&self) -> ClearReport {
        let report = ClearReport {
            query: self.clear_query_cache(),
            persistent: self.clear_persistent_store(),
            session: self.clear_session_store(),
        };
        if let Err(e) = &report.persistent {
            warn!(error = %e, "persistent clear failed");
        }
        if let Err(e) = &report.session {
            warn!(error = %e, "session clear failed");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::favorites::SELECTION_KEY;
    use crate::store::preferences::PreferenceUpdate;
    use crate::store::storage::MemoryStorage;
    use std::sync::Arc;

    struct Fixture {
        query_cache: QueryCache,
        favorites: FavoriteStore,
        preferences: PreferenceStore,
        durable: Arc<dyn Storage>,
        session: Arc<dyn Storage>,
    }

    impl Fixture {
        fn new() -> Self {
            let durable: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
            let session: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
            Self {
                query_cache: QueryCache::default(),
                favorites: FavoriteStore::new(durable.clone()),
                preferences: PreferenceStore::new(session.clone()),
                durable,
                session,
            }
        }

        fn admin(&self) -> CacheAdmin<'_> {
            CacheAdmin {
                query_cache: &self.query_cache,
                favorites: &self.favorites,
                preferences: &self.preferences,
                durable: self.durable.as_ref(),
                session: self.session.as_ref(),
            }
        }
    }

    #[test]
    fn snapshot_reports_sizes_without_mutating() {
        let fx = Fixture::new();
        fx.favorites.add(3).unwrap();
        fx.favorites.add(9).unwrap();
        fx.preferences.set(PreferenceUpdate::default()).unwrap();

        let snapshot = fx.admin().snapshot();
        assert_eq!(snapshot.query_cache_entries, 0);
        assert_eq!(snapshot.favorite_count, 2);
        // product-storage(15) + {"favorites":[3,9]}(19)
        assert_eq!(snapshot.persistent_store_bytes, 15 + 19);
        assert!(snapshot.session_store_bytes > "userPreferences".len());

        // Taking a snapshot twice observes identical state.
        assert_eq!(fx.admin().snapshot(), snapshot);
    }

    #[test]
    fn persistent_clear_resets_set_and_storage() {
        let fx = Fixture::new();
        fx.favorites.add(1).unwrap();
        fx.favorites.add(2).unwrap();

        fx.admin().clear_persistent_store().unwrap();
        assert!(!fx.favorites.contains(1));
        assert!(!fx.favorites.contains(2));
        assert_eq!(fx.durable.read(SELECTION_KEY).unwrap(), None);
        assert_eq!(fx.durable.byte_size(), 0);
        // Idempotent.
        fx.admin().clear_persistent_store().unwrap();
    }

    #[test]
    fn clear_all_reports_each_tier() {
        let fx = Fixture::new();
        fx.favorites.add(4).unwrap();
        fx.preferences.set(PreferenceUpdate::default()).unwrap();

        let report = fx.admin().clear_all();
        assert!(report.all_ok());

        let snapshot = fx.admin().snapshot();
        assert_eq!(snapshot.favorite_count, 0);
        assert_eq!(snapshot.persistent_store_bytes, 0);
        assert_eq!(snapshot.session_store_bytes, 0);
    }

    /// Backend that refuses every mutation, for exercising partial failure.
    struct ReadOnlyStorage;

    impl Storage for ReadOnlyStorage {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }
        fn write(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Encode {
                key: key.to_owned(),
                source: serde::ser::Error::custom("read-only backend"),
            })
        }
        fn remove(&self, key: &str) -> Result<(), StorageError> {
            Err(StorageError::Encode {
                key: key.to_owned(),
                source: serde::ser::Error::custom("read-only backend"),
            })
        }
        fn clear(&self) -> Result<(), StorageError> {
            Err(StorageError::Encode {
                key: "*".to_owned(),
                source: serde::ser::Error::custom("read-only backend"),
            })
        }
        fn byte_size(&self) -> usize {
            0
        }
    }

    #[test]
    fn one_failing_tier_does_not_stop_the_others() {
        let durable: Arc<dyn Storage> = Arc::new(ReadOnlyStorage);
        let session: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let query_cache = QueryCache::default();
        let favorites = FavoriteStore::new(durable.clone());
        let preferences = PreferenceStore::new(session.clone());
        preferences.set(PreferenceUpdate::default()).unwrap();

        let admin = CacheAdmin {
            query_cache: &query_cache,
            favorites: &favorites,
            preferences: &preferences,
            durable: durable.as_ref(),
            session: session.as_ref(),
        };
        let report = admin.clear_all();

        assert!(report.query.is_ok());
        assert!(report.persistent.is_err());
        // The session tier was still attempted and succeeded.
        assert!(report.session.is_ok());
        assert_eq!(session.byte_size(), 0);
        assert!(!report.all_ok());
    }
}
