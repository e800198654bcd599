//! Query cache implementing invalidate-and-refetch.
//!
//! Query results are cached under a stable [`QueryKey`]. Mutations never patch
//! cached data; they invalidate whole scopes so that the next read goes back
//! to the gateway.

use log::debug;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::GatewayResult;

/// Cache scopes
pub mod scopes {
    pub const ACCOUNTS: &str = "accounts";
    pub const TRANSACTIONS: &str = "transactions";
    pub const CATEGORIES: &str = "categories";
    pub const LINK_TOKEN: &str = "plaid-link-token";
    pub const LINK_STATUS: &str = "plaid-status";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    scope: &'static str,
    params: Option<String>,
}

impl QueryKey {
    pub fn new(scope: &'static str) -> Self {
        Self { scope, params: None }
    }

    /// Key for a parameterized query; parameters are identified by their JSON form
    pub fn with_params<P: Serialize>(scope: &'static str, params: &P) -> Self {
        Self {
            scope,
            params: serde_json::to_string(params).ok(),
        }
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }
}

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, CacheEntry>,
    // Bumped on every invalidation so in-flight fetches can tell they are stale
    generations: HashMap<&'static str, u64>,
}

pub struct QueryCache {
    state: Mutex<CacheState>,
    default_stale_time: Duration,
}

impl QueryCache {
    pub fn new(default_stale_time: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            default_stale_time,
        }
    }

    pub fn default_stale_time(&self) -> Duration {
        self.default_stale_time
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The cached value for `key` if it is younger than `stale_time`
    pub fn get<T>(&self, key: &QueryKey, stale_time: Duration) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let state = self.lock();
        let entry = state.entries.get(key)?;
        if entry.fetched_at.elapsed() >= stale_time {
            return None;
        }
        entry.value.downcast_ref::<T>().cloned()
    }

    /// Return the cached value when it is younger than `stale_time`, otherwise
    /// run `fetch` and cache its result. Errors are never cached.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: QueryKey, stale_time: Duration, fetch: F) -> GatewayResult<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        if let Some(value) = self.get::<T>(&key, stale_time) {
            debug!("Cache hit for {:?}", key);
            return Ok(value);
        }
        let generation = self.lock().generations.get(key.scope).copied().unwrap_or(0);

        debug!("Cache miss for {:?}, fetching", key);
        let value = fetch().await?;

        let mut state = self.lock();
        let current = state.generations.get(key.scope).copied().unwrap_or(0);
        if current == generation {
            state.entries.insert(
                key,
                CacheEntry {
                    value: Arc::new(value.clone()),
                    fetched_at: Instant::now(),
                },
            );
        } else {
            debug!("Scope {} was invalidated during fetch, not caching", key.scope);
        }
        Ok(value)
    }

    /// Drop every entry of `scope`; returns how many were removed
    pub fn invalidate(&self, scope: &'static str) -> usize {
        let mut state = self.lock();
        *state.generations.entry(scope).or_insert(0) += 1;
        let before = state.entries.len();
        state.entries.retain(|key, _| key.scope != scope);
        let removed = before - state.entries.len();
        debug!("Invalidated {} cached queries in scope {}", removed, scope);
        removed
    }

    pub fn invalidate_all(&self) {
        let mut state = self.lock();
        let scopes: Vec<&'static str> = state.entries.keys().map(QueryKey::scope).collect();
        for scope in scopes {
            *state.generations.entry(scope).or_insert(0) += 1;
        }
        state.entries.clear();
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock().entries.contains_key(key)
    }
}
