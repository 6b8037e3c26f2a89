//! Keyed, TTL-based query cache with request de-duplication.
//!
//! Readers always get the current entry snapshot instantly; fetching happens
//! in spawned tasks behind a per-key in-flight slot, so N concurrent readers
//! of the same key cost one network call. Resolutions carry a ticket and are
//! discarded if the entry has been superseded or removed in the meantime —
//! last-completion-wins is not acceptable here, a cleared or re-fetched key
//! must never be overwritten by an older fetch straggling in.
//!
//! The in-flight slot is claimed synchronously inside [`QueryCache::get`]
//! before any await point, so interleaved callers on the cooperative
//! scheduler cannot issue duplicate fetches.

use crate::cache::entry::{CacheEntry, CacheStatus};
use crate::cache::invalidation::KeyPredicate;
use crate::cache::key::CacheKey;
use crate::error::ErrorKind;
use dashmap::DashMap;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Per-call options for [`QueryCache::get`].
#[derive(Debug, Clone, Copy)]
pub struct GetOptions {
    /// How long a fetched value counts as fresh.
    pub stale_window: Duration,
    /// When false, the read is passive: the entry is returned as-is and no
    /// fetch is started (mirrors a query whose input is not ready yet).
    pub enabled: bool,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            stale_window: Duration::from_secs(5 * 60),
            enabled: true,
        }
    }
}

impl GetOptions {
    pub fn with_window(stale_window: Duration) -> Self {
        Self {
            stale_window,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Internal per-key state. Only ever touched under the map guard, never
/// across an await point.
struct EntryState {
    value: Option<Arc<Value>>,
    status: CacheStatus,
    fetched_at: Option<Instant>,
    error: Option<ErrorKind>,
    /// Ticket of the fetch currently in flight, if any.
    inflight: Option<u64>,
    /// Ticket counter value at the last explicit invalidation. A resolution
    /// with an older ticket lands as Stale instead of Fresh: the write that
    /// triggered the invalidation postdates that fetch.
    invalidated_ticket: u64,
    subscribers: usize,
    last_access: Instant,
}

impl EntryState {
    fn idle() -> Self {
        Self {
            value: None,
            status: CacheStatus::Idle,
            fetched_at: None,
            error: None,
            inflight: None,
            invalidated_ticket: 0,
            subscribers: 0,
            last_access: Instant::now(),
        }
    }

    /// Degrade Fresh to Stale once the staleness window has elapsed.
    fn degrade(&mut self, now: Instant, stale_window: Duration) {
        if self.status == CacheStatus::Fresh
            && let Some(fetched_at) = self.fetched_at
            && now.duration_since(fetched_at) >= stale_window
        {
            self.status = CacheStatus::Stale;
        }
    }

    fn snapshot(&self, key: &CacheKey) -> CacheEntry {
        CacheEntry {
            key: key.clone(),
            value: self.value.clone(),
            status: self.status,
            fetched_at: self.fetched_at,
            error: self.error.clone(),
        }
    }
}

/// Shared query cache. Clone-cheap (all internals behind `Arc`).
#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<DashMap<CacheKey, EntryState>>,
    /// Monotonic ticket source for fetches and invalidation markers.
    ticket: Arc<AtomicU64>,
    gc_window: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30 * 60))
    }
}

impl QueryCache {
    pub fn new(gc_window: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ticket: Arc::new(AtomicU64::new(1)),
            gc_window,
        }
    }

    fn next_ticket(&self) -> u64 {
        self.ticket.fetch_add(1, Ordering::Relaxed)
    }

    /// Read the entry for `key`, starting at most one fetch.
    ///
    /// Returns the entry as it was at the moment of the call (possibly Stale
    /// or Loading); the fetch registered by this call is observed by
    /// subsequent reads. A fetch starts only when the read is enabled, the
    /// entry is absent, Stale, or Error, and no fetch for the key is already
    /// in flight — concurrent callers share the in-flight fetch.
    pub fn get<F, Fut>(&self, key: &CacheKey, fetcher: F, options: GetOptions) -> CacheEntry
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ErrorKind>> + Send + 'static,
    {
        let now = Instant::now();
        let mut state = self
            .entries
            .entry(key.clone())
            .or_insert_with(EntryState::idle);
        state.last_access = now;
        state.degrade(now, options.stale_window);

        let snapshot = state.snapshot(key);

        let eligible = matches!(
            state.status,
            CacheStatus::Idle | CacheStatus::Stale | CacheStatus::Error
        );
        if options.enabled && eligible && state.inflight.is_none() {
            // Claim the in-flight slot before yielding anywhere.
            let ticket = self.next_ticket();
            state.inflight = Some(ticket);
            state.status = CacheStatus::Loading;
            drop(state);
            debug!(key = %key, ticket, "fetch started");
            self.spawn_fetch(key.clone(), ticket, fetcher);
        }

        snapshot
    }

    fn spawn_fetch<F, Fut>(&self, key: CacheKey, ticket: u64, fetcher: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ErrorKind>> + Send + 'static,
    {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut result = fetcher().await;
            if let Err(kind) = &result
                && kind.is_transport()
            {
                // One automatic retry, inside the same in-flight slot.
                debug!(key = %key, error = %kind, "transport failure, retrying once");
                result = fetcher().await;
            }
            cache.resolve(&key, ticket, result);
        });
    }

    /// Apply a fetch resolution, unless the entry moved on without it.
    fn resolve(&self, key: &CacheKey, ticket: u64, result: Result<Value, ErrorKind>) {
        let Some(mut state) = self.entries.get_mut(key) else {
            debug!(key = %key, ticket, "discarding resolution for removed entry");
            return;
        };
        if state.inflight != Some(ticket) {
            debug!(key = %key, ticket, "discarding superseded resolution");
            return;
        }
        state.inflight = None;
        match result {
            Ok(value) => {
                state.value = Some(Arc::new(value));
                state.fetched_at = Some(Instant::now());
                state.error = None;
                // An invalidation issued while this fetch was in flight means
                // its payload predates an acknowledged write.
                state.status = if state.invalidated_ticket > ticket {
                    CacheStatus::Stale
                } else {
                    CacheStatus::Fresh
                };
                debug!(key = %key, status = ?state.status, "fetch resolved");
            }
            Err(kind) => {
                warn!(key = %key, error = %kind, "fetch failed");
                state.error = Some(kind);
                state.status = CacheStatus::Error;
                // Previous value retained for continued display.
            }
        }
    }

    /// Mark every entry matching `predicate` as Stale without clearing its
    /// value. Does not trigger refetches; the next `get` on a marked key
    /// does. Returns the number of entries marked.
    pub fn invalidate(&self, predicate: &KeyPredicate) -> usize {
        let marker = self.next_ticket();
        let mut marked = 0;
        for mut entry in self.entries.iter_mut() {
            if !predicate.matches(entry.key()) {
                continue;
            }
            let state = entry.value_mut();
            state.invalidated_ticket = marker;
            if state.status == CacheStatus::Fresh {
                state.status = CacheStatus::Stale;
            }
            marked += 1;
        }
        if marked > 0 {
            debug!(predicate = ?predicate, marked, "entries invalidated");
        }
        marked
    }

    /// Register interest in a key, shielding its entry from gc for the
    /// lifetime of the returned guard.
    pub fn subscribe(&self, key: &CacheKey) -> Subscription {
        let mut state = self
            .entries
            .entry(key.clone())
            .or_insert_with(EntryState::idle);
        state.subscribers += 1;
        drop(state);
        Subscription {
            cache: self.clone(),
            key: key.clone(),
        }
    }

    /// Purge entries with no subscribers whose last access is older than the
    /// gc window. Loading entries are never purged; their in-flight fetch
    /// must be allowed to land (or be discarded by the ticket guard).
    /// Returns the number of entries evicted.
    pub fn gc(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|key, state| {
            let keep = state.inflight.is_some()
                || state.subscribers > 0
                || now.duration_since(state.last_access) < self.gc_window;
            if !keep {
                debug!(key = %key, "evicting unused entry");
            }
            keep
        });
        before - self.entries.len()
    }

    /// Run gc on an interval until the process exits.
    pub fn spawn_gc(&self, interval: Duration) {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // skip the immediate first tick
            loop {
                ticker.tick().await;
                let evicted = cache.gc();
                if evicted > 0 {
                    debug!(evicted, "gc pass complete");
                }
            }
        });
    }

    /// Drop every entry. In-flight fetches resolve into nothing.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// RAII guard marking a key as in use. Dropping it releases the entry back
/// to gc eligibility.
pub struct Subscription {
    cache: QueryCache,
    key: CacheKey,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(mut state) = self.cache.entries.get_mut(&self.key) {
            state.subscribers = state.subscribers.saturating_sub(1);
        }
    }
}
