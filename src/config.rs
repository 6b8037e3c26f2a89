//! Runtime configuration, extracted from `STOCKPILE_*` environment variables
//! merged over built-in defaults.

use crate::cache::key::KeyClass;
use figment::{Figment, providers::{Env, Serialized}};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the remote data source.
    pub api_base_url: Url,
    /// Directory backing the durable storage tier.
    pub storage_dir: PathBuf,
    /// Staleness window for product detail entries, in seconds.
    pub product_stale_secs: u64,
    /// Staleness window for product list entries (filtered or not), in seconds.
    pub product_list_stale_secs: u64,
    /// Staleness window for user entries, in seconds.
    pub user_stale_secs: u64,
    /// Age past last access at which unsubscribed entries become collectable.
    pub gc_window_secs: u64,
    /// Freshness window for the selection store's transient product list.
    pub favorites_stale_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse("http://localhost:3001")
                .expect("default base url is valid"),
            storage_dir: PathBuf::from("stockpile-data"),
            product_stale_secs: 10 * 60,
            product_list_stale_secs: 5 * 60,
            user_stale_secs: 15 * 60,
            gc_window_secs: 30 * 60,
            favorites_stale_secs: 5 * 60,
        }
    }
}

impl Config {
    /// Load configuration from the environment over the defaults.
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("STOCKPILE_"))
            .extract()
    }

    /// Staleness window for a key class.
    pub fn stale_window(&self, class: KeyClass) -> Duration {
        let secs = match class {
            KeyClass::Product => self.product_stale_secs,
            KeyClass::ProductList => self.product_list_stale_secs,
            KeyClass::User => self.user_stale_secs,
        };
        Duration::from_secs(secs)
    }

    pub fn gc_window(&self) -> Duration {
        Duration::from_secs(self.gc_window_secs)
    }

    pub fn favorites_window(&self) -> Duration {
        Duration::from_secs(self.favorites_stale_secs)
    }
}
