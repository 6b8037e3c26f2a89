//! Side stores consulted directly by UI logic: durable favorites and
//! session-scoped preferences, over pluggable storage backends.

pub mod favorites;
pub mod preferences;
pub mod storage;

pub use favorites::{FavoriteStore, PersistedSelection, SELECTION_KEY};
pub use preferences::{
    PREFERENCES_KEY, PreferenceRecord, PreferenceStore, PreferenceUpdate, Theme,
};
pub use storage::{FileStorage, MemoryStorage, Storage};
