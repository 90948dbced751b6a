use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::error::{Result, StoreError};
use crate::metrics::Metrics;

use super::cache::{CachedState, CachingStrategy};
use super::core::{Codec, Compact, EventData, Fold, IsOrigin, StreamToken, SyncResult, Target};
use super::store::{AppendResult, Store, StoredEvent};

// ============================================================================
// Resolver & Stream
// ============================================================================
//
// A resolver binds one aggregate type (codec, fold, initial state, optional
// snapshot strategy, optional caching) to a store. Resolving a target gives
// a `Stream` handle that loads state and appends events for that stream.
//
// Load order:
// 1. cached state + events appended since it was cached
// 2. snapshot strategy: stored snapshot + later events, or a backwards read
//    down to the newest origin event
// 3. full forward read
//
// ============================================================================

/// How a resolver reads and writes its streams
pub enum AccessStrategy<E, S> {
    /// Write a compacted event with every append and start loads from the
    /// newest origin event instead of the beginning of the stream
    Snapshot {
        is_origin: IsOrigin<E>,
        compact: Compact<E, S>,
    },
}

impl<E, S> AccessStrategy<E, S> {
    /// Snapshotting only applies when both functions are supplied
    pub fn snapshot(is_origin: Option<IsOrigin<E>>, compact: Option<Compact<E, S>>) -> Option<Self> {
        match (is_origin, compact) {
            (Some(is_origin), Some(compact)) => Some(AccessStrategy::Snapshot { is_origin, compact }),
            _ => None,
        }
    }
}

impl<E, S> Clone for AccessStrategy<E, S> {
    fn clone(&self) -> Self {
        match self {
            AccessStrategy::Snapshot { is_origin, compact } => AccessStrategy::Snapshot {
                is_origin: is_origin.clone(),
                compact: compact.clone(),
            },
        }
    }
}

struct ResolverInner<E, S> {
    store: Arc<OnceCell<Store>>,
    codec: Arc<dyn Codec<E>>,
    fold: Fold<E, S>,
    initial: S,
    access: Option<AccessStrategy<E, S>>,
    caching: Option<CachingStrategy>,
    metrics: Arc<Metrics>,
}

pub struct Resolver<E, S> {
    inner: Arc<ResolverInner<E, S>>,
}

impl<E, S> Clone for Resolver<E, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E, S> Resolver<E, S>
where
    E: Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    /// The store cell is filled by the owning context's connect step; streams
    /// fail with `NotConnected` until then.
    pub fn new(
        store: Arc<OnceCell<Store>>,
        codec: Arc<dyn Codec<E>>,
        fold: Fold<E, S>,
        initial: S,
        access: Option<AccessStrategy<E, S>>,
        caching: Option<CachingStrategy>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                store,
                codec,
                fold,
                initial,
                access,
                caching,
                metrics,
            }),
        }
    }

    pub fn resolve(&self, target: Target) -> Stream<E, S> {
        Stream {
            name: target.stream_name(),
            inner: self.inner.clone(),
        }
    }

    /// The resolver as a plain target-to-stream function
    pub fn into_fn(self) -> impl Fn(Target) -> Stream<E, S> + Send + Sync {
        move |target| self.resolve(target)
    }

    pub fn access_strategy(&self) -> Option<&AccessStrategy<E, S>> {
        self.inner.access.as_ref()
    }

    pub fn caching_strategy(&self) -> Option<&CachingStrategy> {
        self.inner.caching.as_ref()
    }
}

pub struct Stream<E, S> {
    name: String,
    inner: Arc<ResolverInner<E, S>>,
}

impl<E, S> Stream<E, S>
where
    E: Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    fn store(&self) -> Result<&Store> {
        self.inner.store.get().ok_or(StoreError::NotConnected)
    }

    pub async fn load(&self) -> Result<(StreamToken, S)> {
        let store = self.store()?;

        if let Some(caching) = &self.inner.caching {
            match caching.cache().try_get::<S>(&self.name).await {
                Some(cached) => {
                    self.inner.metrics.record_cache(true);
                    tracing::debug!(stream = %self.name, version = cached.version, "Cache hit");
                    let token = StreamToken::new(cached.version, cached.bytes);
                    return self.load_after(store, token, cached.state).await;
                }
                None => self.inner.metrics.record_cache(false),
            }
        }

        match &self.inner.access {
            Some(AccessStrategy::Snapshot { is_origin, .. }) => self.load_from_origin(store, is_origin).await,
            None => {
                self.load_after(store, StreamToken::default(), self.inner.initial.clone())
                    .await
            }
        }
    }

    /// Append `events` decided against `state` as of `token`
    pub async fn try_sync(&self, token: &StreamToken, state: S, events: Vec<E>) -> Result<SyncResult<S>> {
        if events.is_empty() {
            return Ok(SyncResult::Written(*token, state));
        }

        let store = self.store()?;
        let encoded = events
            .iter()
            .map(|e| self.inner.codec.encode(e))
            .collect::<Result<Vec<EventData>>>()?;
        let appended_bytes: u64 = encoded.iter().map(|e| e.size() as u64).sum();

        let new_state = (self.inner.fold)(state, &events);

        let snapshot = match &self.inner.access {
            Some(AccessStrategy::Snapshot { compact, .. }) => {
                Some(self.inner.codec.encode(&compact(&new_state))?)
            }
            None => None,
        };

        let result = store
            .gateway()
            .append(store.collections(), &self.name, token.version, encoded, snapshot)
            .await?;

        match result {
            AppendResult::Written { version } => {
                let token = StreamToken::new(version, token.bytes + appended_bytes);
                self.cache(&token, &new_state).await;
                Ok(SyncResult::Written(token, new_state))
            }
            AppendResult::Conflict { .. } => {
                let (token, state) = self.load().await?;
                Ok(SyncResult::Conflict(token, state))
            }
        }
    }

    async fn load_from_origin(&self, store: &Store, is_origin: &IsOrigin<E>) -> Result<(StreamToken, S)> {
        let codec = &self.inner.codec;
        let tip = store.gateway().read_tip(store.collections(), &self.name).await?;

        if let Some(snapshot) = tip.snapshot {
            match codec.try_decode(&snapshot.event) {
                Some(event) if is_origin(&event) => {
                    let state = (self.inner.fold)(self.inner.initial.clone(), std::slice::from_ref(&event));
                    let token = StreamToken::new(snapshot.version, snapshot.event.size() as u64);
                    return self.load_after(store, token, state).await;
                }
                _ => tracing::debug!(stream = %self.name, "Snapshot unusable, reading back to origin"),
            }
        }

        let stored = store
            .gateway()
            .read_backward_to_origin(store.collections(), &self.name, |event| {
                codec
                    .try_decode(&event.to_event_data())
                    .map(|decoded| is_origin(&decoded))
                    .unwrap_or(false)
            })
            .await?;

        let (token, state) = self.fold_stored(StreamToken::default(), self.inner.initial.clone(), &stored);
        self.cache(&token, &state).await;
        Ok((token, state))
    }

    async fn load_after(&self, store: &Store, token: StreamToken, state: S) -> Result<(StreamToken, S)> {
        let stored = store
            .gateway()
            .read_forward(store.collections(), &self.name, token.version)
            .await?;

        let (token, state) = self.fold_stored(token, state, &stored);
        self.cache(&token, &state).await;
        Ok((token, state))
    }

    fn fold_stored(&self, token: StreamToken, state: S, stored: &[StoredEvent]) -> (StreamToken, S) {
        let events: Vec<E> = stored
            .iter()
            .filter_map(|e| self.inner.codec.try_decode(&e.to_event_data()))
            .collect();

        let version = stored.last().map(|e| e.sequence_number).unwrap_or(token.version);
        let bytes = token.bytes + stored.iter().map(|e| e.size() as u64).sum::<u64>();

        (StreamToken::new(version, bytes), (self.inner.fold)(state, &events))
    }

    async fn cache(&self, token: &StreamToken, state: &S) {
        if let Some(caching) = &self.inner.caching {
            caching
                .cache()
                .update(
                    &self.name,
                    CachedState {
                        version: token.version,
                        bytes: token.bytes,
                        state: state.clone(),
                    },
                    caching.window(),
                )
                .await;
        }
    }
}
