//! Session preference store: UI settings that live for the current session.

use crate::error::StorageError;
use crate::store::storage::Storage;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Fixed session storage key for the preference record.
pub const PREFERENCES_KEY: &str = "userPreferences";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Auto,
}

/// The full preference record. Always persisted whole; partial changes are
/// merged in memory first (see [`PreferenceUpdate`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceRecord {
    pub theme: Theme,
    pub notifications: bool,
    pub email_updates: bool,
}

impl Default for PreferenceRecord {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            notifications: true,
            email_updates: false,
        }
    }
}

/// A partial preference change; `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferenceUpdate {
    pub theme: Option<Theme>,
    pub notifications: Option<bool>,
    pub email_updates: Option<bool>,
}

impl PreferenceRecord {
    fn merged(self, update: PreferenceUpdate) -> Self {
        Self {
            theme: update.theme.unwrap_or(self.theme),
            notifications: update.notifications.unwrap_or(self.notifications),
            email_updates: update.email_updates.unwrap_or(self.email_updates),
        }
    }
}

/// Session-scoped preference store with lazy first-access initialization.
pub struct PreferenceStore {
    storage: Arc<dyn Storage>,
    /// `None` until first access; then the in-memory copy of the record.
    current: RwLock<Option<PreferenceRecord>>,
}

impl PreferenceStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            current: RwLock::new(None),
        }
    }

    /// The current record, loaded from session storage on first access.
    /// Absent or corrupt payloads yield the documented defaults.
    pub fn get(&self) -> PreferenceRecord {
        if let Some(record) = *self.current.read().expect("preference lock poisoned") {
            return record;
        }
        let record = self.load();
        *self.current.write().expect("preference lock poisoned") = Some(record);
        record
    }

    fn load(&self) -> PreferenceRecord {
        let raw = match self.storage.read(PREFERENCES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return PreferenceRecord::default(),
            Err(e) => {
                warn!(error = %e, "session storage unreadable, using defaults");
                return PreferenceRecord::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "corrupt preference payload, using defaults");
            PreferenceRecord::default()
        })
    }

    /// Merge a partial update into the current record and synchronously
    /// persist the full merged record.
    pub fn set(&self, update: PreferenceUpdate) -> Result<PreferenceRecord, StorageError> {
        let merged = self.get().merged(update);
        let raw = serde_json::to_string(&merged).map_err(|source| StorageError::Encode {
            key: PREFERENCES_KEY.to_owned(),
            source,
        })?;
        self.storage.write(PREFERENCES_KEY, &raw)?;
        *self.current.write().expect("preference lock poisoned") = Some(merged);
        debug!(?merged, "preferences persisted");
        Ok(merged)
    }

    /// Drop the session payload and forget the in-memory copy, so the next
    /// read starts from defaults again.
    pub fn clear(&self) -> Result<(), StorageError> {
        *self.current.write().expect("preference lock poisoned") = None;
        self.storage.remove(PREFERENCES_KEY)
    }
}
