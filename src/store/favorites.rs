//! Persistent selection store: the user's favorite products.
//!
//! Only the favorite set is durable. The store also carries the last
//! fetched product list and its timestamp so callers can decide when that
//! ancillary data needs refreshing, but neither ever touches disk — the
//! persisted subset is the named [`PersistedSelection`] projection.

use crate::api::models::Product;
use crate::error::StorageError;
use crate::store::storage::Storage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed durable storage key for the selection store.
pub const SELECTION_KEY: &str = "product-storage";

/// The durable projection of the store's state: favorites and nothing else.
/// Serialized sorted so round-trips are insertion-order independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSelection {
    pub favorites: Vec<u64>,
}

#[derive(Default)]
struct SelectionState {
    favorites: HashSet<u64>,
    products: Vec<Product>,
    last_fetch: Option<DateTime<Utc>>,
}

/// Durable set of favorite product ids plus transient product-list state.
pub struct FavoriteStore {
    storage: Arc<dyn Storage>,
    state: RwLock<SelectionState>,
}

impl FavoriteStore {
    /// Open the store, rehydrating the favorite set from durable storage.
    /// A missing or corrupt payload yields the empty set, never an error.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let favorites = Self::rehydrate(storage.as_ref());
        Self {
            storage,
            state: RwLock::new(SelectionState {
                favorites,
                ..SelectionState::default()
            }),
        }
    }

    fn rehydrate(storage: &dyn Storage) -> HashSet<u64> {
        let raw = match storage.read(SELECTION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return HashSet::new(),
            Err(e) => {
                warn!(error = %e, "selection storage unreadable, starting empty");
                return HashSet::new();
            }
        };
        match serde_json::from_str::<PersistedSelection>(&raw) {
            Ok(persisted) => {
                debug!(count = persisted.favorites.len(), "favorites rehydrated");
                persisted.favorites.into_iter().collect()
            }
            Err(e) => {
                warn!(error = %e, "corrupt selection payload, starting empty");
                HashSet::new()
            }
        }
    }

    /// Add a favorite. Adding an already-present id is a no-op and does not
    /// rewrite storage.
    pub fn add(&self, id: u64) -> Result<(), StorageError> {
        let changed = {
            let mut state = self.state.write().expect("selection lock poisoned");
            state.favorites.insert(id)
        };
        if changed { self.persist() } else { Ok(()) }
    }

    /// Remove a favorite. Removing an absent id is a no-op.
    pub fn remove(&self, id: u64) -> Result<(), StorageError> {
        let changed = {
            let mut state = self.state.write().expect("selection lock poisoned");
            state.favorites.remove(&id)
        };
        if changed { self.persist() } else { Ok(()) }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.state
            .read()
            .expect("selection lock poisoned")
            .favorites
            .contains(&id)
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .expect("selection lock poisoned")
            .favorites
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All favorite ids, sorted for stable display.
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .state
            .read()
            .expect("selection lock poisoned")
            .favorites
            .iter()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Replace the transient product list and stamp the fetch time.
    pub fn set_products(&self, products: Vec<Product>, now: DateTime<Utc>) {
        let mut state = self.state.write().expect("selection lock poisoned");
        state.products = products;
        state.last_fetch = Some(now);
    }

    pub fn products(&self) -> Vec<Product> {
        self.state
            .read()
            .expect("selection lock poisoned")
            .products
            .clone()
    }

    /// Whether the transient product list needs refreshing: stale when no
    /// fetch has occurred or the last one is older than `window`.
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let state = self.state.read().expect("selection lock poisoned");
        match state.last_fetch {
            None => true,
            Some(last) => {
                now.signed_duration_since(last)
                    > chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX)
            }
        }
    }

    /// The durable projection of the current state.
    pub fn persisted(&self) -> PersistedSelection {
        PersistedSelection {
            favorites: self.ids(),
        }
    }

    fn persist(&self) -> Result<(), StorageError> {
        let projection = self.persisted();
        let raw =
            serde_json::to_string(&projection).map_err(|source| StorageError::Encode {
                key: SELECTION_KEY.to_owned(),
                source,
            })?;
        self.storage.write(SELECTION_KEY, &raw)
    }

    /// Remove the durable payload and reset all in-memory state.
    pub fn clear(&self) -> Result<(), StorageError> {
        {
            let mut state = self.state.write().expect("selection lock poisoned");
            *state = SelectionState::default();
        }
        self.storage.remove(SELECTION_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::storage::MemoryStorage;
    use chrono::TimeZone;

    fn memory() -> Arc<dyn Storage> {
        Arc::new(MemoryStorage::new())
    }

    #[test]
    fn add_is_idempotent() {
        let store = FavoriteStore::new(memory());
        store.add(7).unwrap();
        store.add(7).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains(7));
    }

    #[test]
    fn remove_is_idempotent() {
        let store = FavoriteStore::new(memory());
        store.add(3).unwrap();
        store.remove(3).unwrap();
        store.remove(3).unwrap();
        assert!(!store.contains(3));
        assert!(store.is_empty());
    }

    #[test]
    fn persisted_state_round_trips_regardless_of_order() {
        let storage = memory();
        let store = FavoriteStore::new(storage.clone());
        store.add(9).unwrap();
        store.add(3).unwrap();

        // A store reopened over the same backend sees the same set.
        let reopened = FavoriteStore::new(storage);
        assert_eq!(reopened.ids(), vec![3, 9]);
        assert!(reopened.contains(3) && reopened.contains(9));
    }

    #[test]
    fn only_favorites_are_persisted() {
        let storage = memory();
        let store = FavoriteStore::new(storage.clone());
        store.add(1).unwrap();
        store.set_products(
            vec![Product {
                id: 1,
                name: "Hammer".into(),
                category: "tools".into(),
                price: 12.5,
                stock: 3,
            }],
            Utc::now(),
        );

        let raw = storage.read(SELECTION_KEY).unwrap().unwrap();
        assert_eq!(raw, r#"{"favorites":[1]}"#);

        // Reopening restores favorites only; transient state starts over.
        let reopened = FavoriteStore::new(storage);
        assert!(reopened.contains(1));
        assert!(reopened.products().is_empty());
        assert!(reopened.is_stale(Utc::now(), Duration::from_secs(300)));
    }

    #[test]
    fn corrupt_payload_rehydrates_empty() {
        let storage = memory();
        storage.write(SELECTION_KEY, "{not json").unwrap();
        let store = FavoriteStore::new(storage.clone());
        assert!(store.is_empty());

        // Wrong shape is handled the same as unparseable text.
        storage.write(SELECTION_KEY, r#"{"favorites":"nope"}"#).unwrap();
        let store = FavoriteStore::new(storage);
        assert!(store.is_empty());
    }

    #[test]
    fn staleness_window() {
        let store = FavoriteStore::new(memory());
        let window = Duration::from_secs(5 * 60);
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        // No fetch recorded yet.
        assert!(store.is_stale(t0, window));

        store.set_products(Vec::new(), t0);
        assert!(!store.is_stale(t0 + chrono::Duration::minutes(4), window));
        assert!(store.is_stale(t0 + chrono::Duration::minutes(6), window));
    }

    #[test]
    fn clear_resets_memory_and_storage() {
        let storage = memory();
        let store = FavoriteStore::new(storage.clone());
        store.add(1).unwrap();
        store.add(2).unwrap();
        store.set_products(Vec::new(), Utc::now());

        store.clear().unwrap();
        assert!(!store.contains(1));
        assert!(!store.contains(2));
        assert!(store.is_empty());
        assert_eq!(storage.read(SELECTION_KEY).unwrap(), None);
        // Idempotent.
        store.clear().unwrap();
    }
}
