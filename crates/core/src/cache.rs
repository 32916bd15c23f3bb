//! Keyed cache of client instances

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

/// How entries leave the cache once it is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Eviction {
    /// Least recently used goes first
    #[default]
    Lru,
    /// Frequency-aware admission and eviction
    TinyLfu,
}

/// Capacity and expiry policy for a [`ClientCache`].
///
/// The default keeps every entry until it is replaced or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CachePolicy {
    pub max_clients: Option<u64>,
    pub idle_timeout: Option<Duration>,
    pub eviction: Eviction,
}

impl CachePolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(max_clients: u64) -> Self {
        Self {
            max_clients: Some(max_clients),
            ..Self::default()
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    pub fn with_eviction(mut self, eviction: Eviction) -> Self {
        self.eviction = eviction;
        self
    }
}

/// Name-keyed cache holding at most one live `Arc<V>` per name.
///
/// Concurrent first lookups of the same name are coalesced: one caller runs
/// the constructor, the others wait for it and receive the same `Arc`.
pub struct ClientCache<V> {
    entries: Cache<String, Arc<V>>,
    policy: CachePolicy,
}

impl<V> ClientCache<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(policy: CachePolicy) -> Self {
        let mut builder = Cache::builder().eviction_policy(match policy.eviction {
            Eviction::Lru => EvictionPolicy::lru(),
            Eviction::TinyLfu => EvictionPolicy::tiny_lfu(),
        });

        if let Some(max_clients) = policy.max_clients {
            builder = builder.max_capacity(max_clients);
        }
        if let Some(idle_timeout) = policy.idle_timeout {
            builder = builder.time_to_idle(idle_timeout);
        }

        Self {
            entries: builder.build(),
            policy,
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn get(&self, name: &str) -> Option<Arc<V>> {
        self.entries.get(name)
    }

    /// Return the entry for `name`, building it with `init` if absent.
    pub fn get_or_insert_with(&self, name: &str, init: impl FnOnce() -> V) -> Arc<V> {
        self.entries.get_with_by_ref(name, || Arc::new(init()))
    }

    /// Insert `value` under `name`, dropping any previous entry
    pub fn replace(&self, name: &str, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.insert(name.to_string(), Arc::clone(&value));
        value
    }

    /// Remove the entry for `name`; `true` if there was one
    pub fn remove(&self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    /// Number of live entries, after applying pending evictions
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Default for ClientCache<V>
where
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}
