//! Dashboard state shared across UI pages: the query cache, the remote
//! client, and both side stores, wired per [`Config`].
//!
//! Read operations go through the query cache; write operations call the
//! remote source and, strictly after success, apply the invalidation
//! mapping before returning — a read issued after a completed write sees
//! Stale, never a value known to be outdated with no refresh pending.

use crate::admin::CacheAdmin;
use crate::api::InventoryApi;
use crate::api::models::{Product, ProductInput, User, UserInput};
use crate::cache::entry::CacheEntry;
use crate::cache::invalidation::WriteOp;
use crate::cache::key::{CacheKey, KeyClass};
use crate::cache::query::{GetOptions, QueryCache, Subscription};
use crate::config::Config;
use crate::error::ErrorKind;
use crate::store::favorites::FavoriteStore;
use crate::store::preferences::PreferenceStore;
use crate::store::storage::{FileStorage, MemoryStorage, Storage};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct Dashboard {
    pub config: Config,
    pub api: InventoryApi,
    pub query_cache: QueryCache,
    pub favorites: FavoriteStore,
    pub preferences: PreferenceStore,
    durable: Arc<dyn Storage>,
    session: Arc<dyn Storage>,
}

impl Dashboard {
    /// Wire up all tiers from a config. Rehydrates the favorite set from
    /// the durable tier as part of construction.
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let api = InventoryApi::new(config.api_base_url.clone())
            .context("failed to create inventory api client")?;
        let durable: Arc<dyn Storage> = Arc::new(
            FileStorage::new(&config.storage_dir).context("failed to open durable storage")?,
        );
        let session: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let favorites = FavoriteStore::new(durable.clone());
        let preferences = PreferenceStore::new(session.clone());
        let query_cache = QueryCache::new(config.gc_window());

        info!(
            api = %config.api_base_url,
            storage_dir = %config.storage_dir.display(),
            favorites = favorites.len(),
            "dashboard state initialized"
        );

        Ok(Self {
            config,
            api,
            query_cache,
            favorites,
            preferences,
            durable,
            session,
        })
    }

    /// Wire up from `STOCKPILE_*` environment variables.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = Config::from_env().context("failed to load config")?;
        Self::new(config)
    }

    fn options(&self, class: KeyClass) -> GetOptions {
        GetOptions::with_window(self.config.stale_window(class))
    }

    /// The unfiltered product list, through the cache.
    pub fn products(&self) -> CacheEntry {
        let api = self.api.clone();
        self.query_cache.get(
            &CacheKey::ProductList,
            move || {
                let api = api.clone();
                async move { to_payload(api.list_products(None).await) }
            },
            self.options(KeyClass::ProductList),
        )
    }

    /// The product list for one category, through the cache.
    pub fn products_by_category(&self, category: &str) -> CacheEntry {
        let api = self.api.clone();
        let filter = category.to_owned();
        self.query_cache.get(
            &CacheKey::ProductListByCategory(category.to_owned()),
            move || {
                let api = api.clone();
                let filter = filter.clone();
                async move { to_payload(api.list_products(Some(&filter)).await) }
            },
            self.options(KeyClass::ProductList),
        )
    }

    /// One product's detail record, through the cache.
    pub fn product(&self, id: u64) -> CacheEntry {
        let api = self.api.clone();
        self.query_cache.get(
            &CacheKey::Product(id),
            move || {
                let api = api.clone();
                async move { to_payload(api.get_product(id).await) }
            },
            self.options(KeyClass::Product),
        )
    }

    /// One user's record, through the cache.
    pub fn user(&self, id: u64) -> CacheEntry {
        let api = self.api.clone();
        self.query_cache.get(
            &CacheKey::User(id),
            move || {
                let api = api.clone();
                async move { to_payload(api.get_user(id).await) }
            },
            self.options(KeyClass::User),
        )
    }

    /// Shield a key from gc while a page displays it.
    pub fn subscribe(&self, key: &CacheKey) -> Subscription {
        self.query_cache.subscribe(key)
    }

    pub async fn create_product(&self, input: &ProductInput) -> Result<Product, ErrorKind> {
        let created = self.api.create_product(input).await?;
        self.invalidate_after(WriteOp::CreateProduct);
        Ok(created)
    }

    pub async fn update_product(
        &self,
        id: u64,
        input: &ProductInput,
    ) -> Result<Product, ErrorKind> {
        let updated = self.api.update_product(id, input).await?;
        self.invalidate_after(WriteOp::UpdateProduct { id });
        Ok(updated)
    }

    pub async fn delete_product(&self, id: u64) -> Result<(), ErrorKind> {
        self.api.delete_product(id).await?;
        self.invalidate_after(WriteOp::DeleteProduct { id });
        Ok(())
    }

    pub async fn update_user(&self, id: u64, input: &UserInput) -> Result<User, ErrorKind> {
        let updated = self.api.update_user(id, input).await?;
        self.invalidate_after(WriteOp::UpdateUser { id });
        Ok(updated)
    }

    /// Apply a completed write's invalidation set. Runs before the write's
    /// result is handed back, and only on success.
    fn invalidate_after(&self, op: WriteOp) {
        let mut marked = 0;
        for predicate in op.invalidations() {
            marked += self.query_cache.invalidate(&predicate);
        }
        debug!(?op, marked, "write invalidation applied");
    }

    /// Whether the selection store's ancillary product data wants a refresh,
    /// per the configured window.
    pub fn favorites_need_refresh(&self, now: DateTime<Utc>) -> bool {
        self.favorites.is_stale(now, self.config.favorites_window())
    }

    /// Run query-cache gc on an interval until the process exits.
    pub fn spawn_gc(&self, interval: Duration) {
        self.query_cache.spawn_gc(interval);
    }

    /// Admin facade over all three tiers.
    pub fn admin(&self) -> CacheAdmin<'_> {
        CacheAdmin {
            query_cache: &self.query_cache,
            favorites: &self.favorites,
            preferences: &self.preferences,
            durable: self.durable.as_ref(),
            session: self.session.as_ref(),
        }
    }
}

/// Serialize a fetched record into the cache's opaque payload form.
fn to_payload<T: serde::Serialize>(result: Result<T, ErrorKind>) -> Result<Value, ErrorKind> {
    result.and_then(|value| {
        serde_json::to_value(value).map_err(|e| ErrorKind::Serialization(e.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::CacheStatus;
    use serde_json::json;

    fn dashboard(dir: &std::path::Path) -> Dashboard {
        let config = Config {
            // Discard port: connections are refused immediately, which is
            // all these tests need from the network.
            api_base_url: url::Url::parse("http://127.0.0.1:1").unwrap(),
            storage_dir: dir.to_path_buf(),
            ..Config::default()
        };
        Dashboard::new(config).unwrap()
    }

    fn seed(dash: &Dashboard, key: &CacheKey, payload: Value) {
        dash.query_cache.get(
            key,
            move || {
                let payload = payload.clone();
                async move { Ok::<_, ErrorKind>(payload) }
            },
            GetOptions::default(),
        );
    }

    fn peek(dash: &Dashboard, key: &CacheKey) -> CacheEntry {
        dash.query_cache.get(
            key,
            || async { Ok::<_, ErrorKind>(json!(null)) },
            GetOptions::disabled(),
        )
    }

    async fn wait_fresh(dash: &Dashboard, key: &CacheKey) {
        for _ in 0..200 {
            if peek(dash, key).status == CacheStatus::Fresh {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("entry never became fresh: {key}");
    }

    fn status_of(dash: &Dashboard, key: &CacheKey) -> CacheStatus {
        peek(dash, key).status
    }

    #[tokio::test]
    async fn product_update_invalidates_detail_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let dash = dashboard(dir.path());

        let keys = [
            CacheKey::Product(5),
            CacheKey::Product(3),
            CacheKey::ProductList,
            CacheKey::ProductListByCategory("tools".into()),
            CacheKey::User(2),
        ];
        for key in &keys {
            seed(&dash, key, json!({"seeded": true}));
        }
        for key in &keys {
            wait_fresh(&dash, key).await;
        }

        dash.invalidate_after(WriteOp::UpdateProduct { id: 5 });

        assert_eq!(status_of(&dash, &CacheKey::Product(5)), CacheStatus::Stale);
        assert_eq!(status_of(&dash, &CacheKey::ProductList), CacheStatus::Stale);
        assert_eq!(
            status_of(&dash, &CacheKey::ProductListByCategory("tools".into())),
            CacheStatus::Stale
        );
        // Unrelated entries stay fresh.
        assert_eq!(status_of(&dash, &CacheKey::Product(3)), CacheStatus::Fresh);
        assert_eq!(status_of(&dash, &CacheKey::User(2)), CacheStatus::Fresh);
    }

    #[tokio::test]
    async fn failed_write_does_not_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let dash = dashboard(dir.path());

        seed(&dash, &CacheKey::ProductList, json!([{"id": 1}]));
        wait_fresh(&dash, &CacheKey::ProductList).await;

        let result = dash
            .create_product(&ProductInput {
                name: "Socket Set".into(),
                category: "tools".into(),
                price: 59.0,
                stock: 8,
            })
            .await;
        assert!(matches!(result, Err(ErrorKind::Network(_))));

        // The list entry was not marked stale by the failed write.
        assert_eq!(status_of(&dash, &CacheKey::ProductList), CacheStatus::Fresh);
    }

    #[tokio::test]
    async fn favorites_survive_a_dashboard_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let dash = dashboard(dir.path());
            dash.favorites.add(3).unwrap();
            dash.favorites.add(9).unwrap();
        }
        let dash = dashboard(dir.path());
        assert_eq!(dash.favorites.ids(), vec![3, 9]);
    }

    #[test]
    fn favorites_need_refresh_until_first_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let dash = dashboard(dir.path());
        let now = Utc::now();
        assert!(dash.favorites_need_refresh(now));
        dash.favorites.set_products(Vec::new(), now);
        assert!(!dash.favorites_need_refresh(now));
    }
}
