use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache as MokaCache;
use moka::ops::compute::Op;
use moka::Expiry;

// ============================================================================
// State Cache
// ============================================================================
//
// Folded states keyed by stream name, shared by every resolver of a context.
// Entries are weighed by the encoded bytes they were folded from so that the
// configured megabytes bound the cache. Each entry carries its own sliding
// window: creation, update and every read push its expiry out again.
//
// ============================================================================

/// Window used by resolvers built from a context
pub const SLIDING_WINDOW: Duration = Duration::from_secs(20 * 60);

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Clone)]
struct CacheEntry {
    version: i64,
    bytes: u64,
    state: Arc<dyn Any + Send + Sync>,
    window: Duration,
}

struct SlidingExpiry;

impl Expiry<String, CacheEntry> for SlidingExpiry {
    fn expire_after_create(&self, _key: &String, value: &CacheEntry, _created_at: Instant) -> Option<Duration> {
        Some(value.window)
    }

    fn expire_after_read(
        &self,
        _key: &String,
        value: &CacheEntry,
        _read_at: Instant,
        _duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        Some(value.window)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.window)
    }
}

/// Cached state of a stream as of `version`
#[derive(Debug, Clone, PartialEq)]
pub struct CachedState<S> {
    pub version: i64,
    pub bytes: u64,
    pub state: S,
}

#[derive(Clone)]
pub struct Cache {
    name: String,
    size_mb: u64,
    entries: MokaCache<String, CacheEntry>,
}

impl Cache {
    pub fn new(name: impl Into<String>, size_mb: u64) -> Self {
        let name = name.into();
        let entries = MokaCache::builder()
            .name(&name)
            .max_capacity(size_mb.saturating_mul(BYTES_PER_MB))
            .weigher(|_key: &String, entry: &CacheEntry| -> u32 {
                u32::try_from(entry.bytes.max(1)).unwrap_or(u32::MAX)
            })
            .expire_after(SlidingExpiry)
            .build();

        Self {
            name,
            size_mb,
            entries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_mb(&self) -> u64 {
        self.size_mb
    }

    /// `None` on a miss, or when the entry holds a different state type
    pub async fn try_get<S>(&self, stream: &str) -> Option<CachedState<S>>
    where
        S: Clone + Send + Sync + 'static,
    {
        let entry = self.entries.get(stream).await?;
        let state = entry.state.downcast_ref::<S>()?.clone();
        Some(CachedState {
            version: entry.version,
            bytes: entry.bytes,
            state,
        })
    }

    /// Store `state`, unless the cache already holds a newer version
    pub async fn update<S>(&self, stream: &str, cached: CachedState<S>, window: Duration)
    where
        S: Send + Sync + 'static,
    {
        let entry = CacheEntry {
            version: cached.version,
            bytes: cached.bytes,
            state: Arc::new(cached.state),
            window,
        };

        // Compare and insert under the entry's lock
        self.entries
            .entry(stream.to_string())
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(current) if current.value().version > entry.version => Op::Nop,
                    _ => Op::Put(entry),
                };
                std::future::ready(op)
            })
            .await;
    }

    pub async fn invalidate(&self, stream: &str) {
        self.entries.invalidate(stream).await;
    }
}

/// How a resolver uses the shared cache
#[derive(Clone)]
pub enum CachingStrategy {
    /// Entries expire `window` after they were last touched
    SlidingWindow { cache: Cache, window: Duration },
}

impl CachingStrategy {
    pub fn sliding_window(cache: Cache, window: Duration) -> Self {
        CachingStrategy::SlidingWindow { cache, window }
    }

    pub fn cache(&self) -> &Cache {
        match self {
            CachingStrategy::SlidingWindow { cache, .. } => cache,
        }
    }

    pub fn window(&self) -> Duration {
        match self {
            CachingStrategy::SlidingWindow { window, .. } => *window,
        }
    }
}
