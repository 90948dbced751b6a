use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::config::{ConnectionMode, ConnectorSettings, Discovery, StoreConfig};
use crate::error::{Result, StoreError};
use crate::event_sourcing::cache::{Cache, CachingStrategy, SLIDING_WINDOW};
use crate::event_sourcing::core::{Codec, Compact, Fold, IsOrigin};
use crate::event_sourcing::resolver::{AccessStrategy, Resolver};
use crate::event_sourcing::store::{
    BatchingPolicy, Collections, Connector, Gateway, MemoryClient, ScyllaConnector, Store, StoreClient,
    DEFAULT_MAX_ITEMS,
};
use crate::metrics::Metrics;
use crate::utils::RetryConfig;

// ============================================================================
// Store Context
// ============================================================================
//
// config → connect (lazy, once) → gateway → collections → store
//        → resolve(codec, fold, initial, snapshot fns) per aggregate type
//
// The cache is created with the context and shared by every resolver it
// hands out. Resolvers can be built before connect; their streams fail with
// `NotConnected` until connect has completed.
//
// ============================================================================

const CACHE_NAME: &str = "Scylla";

pub struct StoreContext {
    connector: Arc<dyn Connector>,
    settings: ConnectorSettings,
    collections: Collections,
    cache: Option<Cache>,
    store: Arc<OnceCell<Store>>,
    metrics: Arc<Metrics>,
}

impl StoreContext {
    /// Context over a ScyllaDB cluster. No I/O happens until `connect`.
    pub fn new(config: StoreConfig) -> Result<Self> {
        let settings = ConnectorSettings::default();
        let discovery = Discovery::from_connection_string(&config.connection_string)?;
        let connector = ScyllaConnector::new(config.mode, discovery, settings.clone());
        Self::with_connector(Arc::new(connector), settings, &config)
    }

    /// Context over an in-process store
    pub fn memory(cache_mb: u64) -> Result<Self> {
        let config = StoreConfig::new(ConnectionMode::default(), "", "memory", "events", cache_mb);
        Self::with_connector(
            Arc::new(MemoryConnector::default()),
            ConnectorSettings::default(),
            &config,
        )
    }

    pub fn with_connector(
        connector: Arc<dyn Connector>,
        settings: ConnectorSettings,
        config: &StoreConfig,
    ) -> Result<Self> {
        let metrics = Metrics::new().map_err(|e| StoreError::Config(format!("Metrics registry: {}", e)))?;

        Ok(Self {
            connector,
            settings,
            collections: Collections::new(config.database.clone(), config.collection.clone())?,
            cache: (config.cache_mb > 0).then(|| Cache::new(CACHE_NAME, config.cache_mb)),
            store: Arc::new(OnceCell::new()),
            metrics: Arc::new(metrics),
        })
    }

    /// Connect on first call; later calls return once the first completes
    pub async fn connect(&self) -> Result<()> {
        self.store
            .get_or_try_init(|| async {
                let gateway = self.connect_gateway().await?;
                gateway.initialize(&self.collections).await?;
                tracing::info!(
                    keyspace = %self.collections.database,
                    table = %self.collections.collection,
                    "Store ready"
                );
                Ok::<_, StoreError>(Store::new(gateway, self.collections.clone()))
            })
            .await?;
        Ok(())
    }

    async fn connect_gateway(&self) -> Result<Gateway> {
        let client = self.connector.connect(&self.settings.app_name).await?;
        let retry = RetryConfig::throttling(
            self.settings.max_retries_on_throttling,
            self.settings.max_retry_wait,
        );
        Ok(Gateway::new(
            client,
            BatchingPolicy::new(DEFAULT_MAX_ITEMS),
            retry,
            self.metrics.clone(),
        )
        .with_request_timeout(self.settings.request_timeout))
    }

    pub fn is_connected(&self) -> bool {
        self.store.initialized()
    }

    /// Bind an aggregate type to this context's store. Snapshotting is used
    /// only when both `is_origin` and `compact` are given.
    pub fn resolve<E, S>(
        &self,
        codec: Arc<dyn Codec<E>>,
        fold: Fold<E, S>,
        initial: S,
        is_origin: Option<IsOrigin<E>>,
        compact: Option<Compact<E, S>>,
    ) -> Resolver<E, S>
    where
        E: Send + Sync + 'static,
        S: Clone + Send + Sync + 'static,
    {
        let access = AccessStrategy::snapshot(is_origin, compact);
        let caching = self
            .cache
            .as_ref()
            .map(|cache| CachingStrategy::sliding_window(cache.clone(), SLIDING_WINDOW));

        Resolver::new(
            self.store.clone(),
            codec,
            fold,
            initial,
            access,
            caching,
            self.metrics.clone(),
        )
    }

    pub fn cache(&self) -> Option<&Cache> {
        self.cache.as_ref()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn store(&self) -> Option<&Store> {
        self.store.get()
    }
}

/// Hands out one shared in-memory client
#[derive(Default)]
pub struct MemoryConnector {
    client: Arc<MemoryClient>,
}

impl MemoryConnector {
    pub fn new(client: Arc<MemoryClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _app_name: &str) -> Result<Arc<dyn StoreClient>> {
        Ok(self.client.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::{EventData, StreamToken, SyncResult, Target};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct CountingConnector {
        inner: MemoryConnector,
        connects: AtomicU32,
    }

    impl CountingConnector {
        fn new() -> Self {
            Self {
                inner: MemoryConnector::default(),
                connects: AtomicU32::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Connector for CountingConnector {
        async fn connect(&self, app_name: &str) -> Result<Arc<dyn StoreClient>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.inner.connect(app_name).await
        }
    }

    struct FailingConnector;

    #[async_trait::async_trait]
    impl Connector for FailingConnector {
        async fn connect(&self, _app_name: &str) -> Result<Arc<dyn StoreClient>> {
            Err(StoreError::Connection("no hosts reachable".to_string()))
        }
    }

    struct TextCodec;

    impl Codec<String> for TextCodec {
        fn encode(&self, event: &String) -> Result<EventData> {
            Ok(EventData::new("Noted", event.clone().into_bytes()))
        }

        fn try_decode(&self, event: &EventData) -> Option<String> {
            String::from_utf8(event.data.clone()).ok()
        }
    }

    fn codec() -> Arc<dyn Codec<String>> {
        Arc::new(TextCodec)
    }

    fn fold() -> Fold<String, Vec<String>> {
        Arc::new(|mut state: Vec<String>, events: &[String]| {
            state.extend(events.iter().cloned());
            state
        })
    }

    fn config(cache_mb: u64) -> StoreConfig {
        StoreConfig::new(ConnectionMode::Direct, "127.0.0.1", "equinox", "events", cache_mb)
    }

    #[test]
    fn test_scylla_context_construction_does_no_io() {
        let context = StoreContext::new(config(50)).unwrap();
        assert!(!context.is_connected());
        assert_eq!(context.cache().map(|c| c.name()), Some("Scylla"));
        assert_eq!(context.cache().map(|c| c.size_mb()), Some(50));
    }

    #[test]
    fn test_invalid_connection_string_is_rejected() {
        let bad = StoreConfig::new(ConnectionMode::Direct, "Username=only", "equinox", "events", 50);
        assert!(matches!(StoreContext::new(bad), Err(StoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_connect_builds_gateway_with_fixed_policies() {
        let context = StoreContext::memory(10).unwrap();
        context.connect().await.unwrap();

        let store = context.store().unwrap();
        assert_eq!(store.gateway().batching().max_items, 500);
        assert_eq!(store.gateway().retry().max_attempts, 2);
        assert_eq!(store.gateway().retry().max_delay, Duration::from_secs(5));
        assert_eq!(store.gateway().request_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(store.collections().qualified(), "memory.events");
    }

    #[tokio::test]
    async fn test_connect_runs_once() {
        let connector = Arc::new(CountingConnector::new());
        let context = StoreContext::with_connector(connector.clone(), ConnectorSettings::default(), &config(1)).unwrap();

        let (a, b) = tokio::join!(context.connect(), context.connect());
        a.unwrap();
        b.unwrap();
        context.connect().await.unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces_unchanged() {
        let context =
            StoreContext::with_connector(Arc::new(FailingConnector), ConnectorSettings::default(), &config(1)).unwrap();

        let err = context.connect().await.unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
        assert!(!context.is_connected());
    }

    #[test]
    fn test_resolve_attaches_snapshot_only_with_both_functions() {
        let context = StoreContext::memory(1).unwrap();
        let codec = codec();
        let is_origin: IsOrigin<String> = Arc::new(|e: &String| e.is_empty());
        let compact: Compact<String, Vec<String>> = Arc::new(|s: &Vec<String>| s.join(","));

        let none = context.resolve(codec.clone(), fold(), vec![], None, None);
        assert!(none.access_strategy().is_none());

        let origin_only = context.resolve(codec.clone(), fold(), vec![], Some(is_origin.clone()), None);
        assert!(origin_only.access_strategy().is_none());

        let compact_only = context.resolve(codec.clone(), fold(), vec![], None, Some(compact.clone()));
        assert!(compact_only.access_strategy().is_none());

        let both = context.resolve(codec, fold(), vec![], Some(is_origin), Some(compact));
        assert!(matches!(both.access_strategy(), Some(AccessStrategy::Snapshot { .. })));
    }

    #[test]
    fn test_resolve_uses_twenty_minute_sliding_window() {
        let context = StoreContext::memory(1).unwrap();
        let resolver = context.resolve(codec(), fold(), vec![], None, None);

        let caching = resolver.caching_strategy().unwrap();
        assert_eq!(caching.window(), Duration::from_secs(20 * 60));
        assert_eq!(caching.cache().name(), "Scylla");
    }

    #[test]
    fn test_zero_cache_size_means_no_caching() {
        let context = StoreContext::memory(0).unwrap();
        let resolver = context.resolve(codec(), fold(), vec![], None, None);

        assert!(context.cache().is_none());
        assert!(resolver.caching_strategy().is_none());
    }

    #[tokio::test]
    async fn test_resolver_built_before_connect_works_after() {
        let context = StoreContext::memory(1).unwrap();
        let resolver = context.resolve(codec(), fold(), vec![], None, None);
        let stream = resolver.resolve(Target::aggregate("Notes", 1));

        assert!(matches!(stream.load().await, Err(StoreError::NotConnected)));

        context.connect().await.unwrap();
        let result = stream
            .try_sync(&StreamToken::default(), vec![], vec!["hello".to_string()])
            .await
            .unwrap();
        assert!(matches!(result, SyncResult::Written(token, _) if token.version == 1));
    }

    #[tokio::test]
    async fn test_resolvers_share_the_context_cache() {
        let context = StoreContext::memory(1).unwrap();
        context.connect().await.unwrap();
        let writer = context.resolve(codec(), fold(), vec![], None, None);
        let reader = context.resolve(codec(), fold(), vec![], None, None);

        let stream = writer.resolve(Target::aggregate("Notes", 1));
        stream
            .try_sync(&StreamToken::default(), vec![], vec!["a".to_string()])
            .await
            .unwrap();

        let cached = context.cache().unwrap().try_get::<Vec<String>>("Notes-1").await.unwrap();
        assert_eq!(cached.state, vec!["a".to_string()]);

        let (_, state) = reader.resolve(Target::aggregate("Notes", 1)).load().await.unwrap();
        assert_eq!(state, vec!["a".to_string()]);
    }
}
