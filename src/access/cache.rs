use crate::core::{DbError, Result, Value};
use crate::result::QueryResult;
use log::debug;
use lru::LruCache;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache key: statement text plus the bound parameter values.
///
/// Keying on the statement alone would let two queries that differ only in
/// their parameters alias each other's results, so the parameters are part
/// of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    statement: String,
    params: Vec<Value>,
}

impl QueryKey {
    pub fn new(statement: impl Into<String>, params: &[Value]) -> Self {
        Self {
            statement: statement.into(),
            params: params.to_vec(),
        }
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }
}

/// Result Cache: memoizes query results for the cache's lifetime.
///
/// An explicitly owned object, constructed by whoever needs it and passed by
/// reference — no ambient process-wide state. By default nothing expires and
/// nothing is evicted; entries live as long as the cache does and a stored
/// entry is returned as-is to every caller with the same key, regardless of
/// whether the underlying data has changed since. That staleness is the
/// contract, not a bug. [`QueryCache::bounded`] opts into LRU eviction for
/// callers that need a memory cap.
///
/// Concurrency: the map sits behind a mutex that is held only for lookup and
/// insert, never while the wrapped operation runs. Two tasks missing on the
/// same key may both execute the query; the last writer wins and entries are
/// only ever inserted whole.
pub struct QueryCache {
    entries: Mutex<LruCache<QueryKey, QueryResult>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    /// Unbounded cache: no expiry, no eviction.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache holding at most `capacity` entries, evicting least-recently
    /// inserted ones beyond that.
    pub fn bounded(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| DbError::ConfigError("cache capacity must be > 0".into()))?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Serve from the cache or execute the operation and remember its result.
    ///
    /// On a hit the stored result is cloned out and the operation is never
    /// invoked; hits touch nothing, so they are side-effect-free. On a miss
    /// the operation runs (without the lock held) and a successful result is
    /// stored under the key. Failures are not cached.
    pub async fn get_or_execute<F, Fut>(&self, key: QueryKey, op: F) -> Result<QueryResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<QueryResult>>,
    {
        if let Some(hit) = self.lookup(&key)? {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("cache hit for query: {}", key.statement());
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("cache miss for query: {}", key.statement());

        let result = op().await?;
        self.insert(key, result.clone())?;
        Ok(result)
    }

    /// Non-promoting lookup; a hit does not reorder entries.
    pub fn lookup(&self, key: &QueryKey) -> Result<Option<QueryResult>> {
        let entries = self.entries.lock()?;
        Ok(entries.peek(key).cloned())
    }

    pub fn insert(&self, key: QueryKey, result: QueryResult) -> Result<()> {
        self.entries.lock()?.put(key, result);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cache Stats: {} hits, {} misses, {} entries",
            self.hits, self.misses, self.entries
        )
    }
}
