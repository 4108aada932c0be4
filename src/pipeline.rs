use crate::catalog::SourceCatalog;
use crate::storage::CacheStore;
use crate::types::{EventAdapter, EventSourceConfig, SourceResultBundle};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// Runs adapters over their configured sources and keeps the last good
/// snapshot of every adapter in the cache.
pub struct Pipeline {
    cache: Arc<dyn CacheStore>,
}

impl Pipeline {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    /// Look up the adapter's family in the catalog and run it. A missing or
    /// malformed family serves the cached snapshot instead.
    #[instrument(skip(self, adapter, catalog), fields(adapter = adapter.adapter_name()))]
    pub async fn run_family(
        &self,
        adapter: Arc<dyn EventAdapter>,
        catalog: &SourceCatalog,
    ) -> Vec<SourceResultBundle> {
        match catalog.sources_for(adapter.catalog_key()) {
            Ok(sources) => self.run_adapter(adapter, sources).await,
            Err(e) => {
                error!("Cannot read sources for {}: {}", adapter.adapter_name(), e);
                counter!("event_ingest_adapter_failures_total", "adapter" => adapter.adapter_name())
                    .increment(1);
                self.cached_snapshot(adapter.cache_key()).await.unwrap_or_default()
            }
        }
    }

    /// Fetch every source concurrently. One bundle per source comes back in
    /// configuration order; a failed source yields an empty bundle.
    #[instrument(skip(self, adapter, sources), fields(adapter = adapter.adapter_name(), sources = sources.len()))]
    pub async fn run_adapter(
        &self,
        adapter: Arc<dyn EventAdapter>,
        sources: Vec<EventSourceConfig>,
    ) -> Vec<SourceResultBundle> {
        let name = adapter.adapter_name();
        info!("🚀 Starting {} with {} sources", name, sources.len());
        counter!("event_ingest_runs_total", "adapter" => name).increment(1);
        let started = Instant::now();

        let mut tasks = JoinSet::new();
        for (index, source) in sources.iter().cloned().enumerate() {
            let adapter = adapter.clone();
            tasks.spawn(async move {
                let result = adapter.fetch_and_normalize(&source).await;
                (index, source, result)
            });
        }

        let mut slots: Vec<Option<SourceResultBundle>> = vec![None; sources.len()];
        let mut cancelled = false;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, source, Ok(events))) => {
                    debug!("{} produced {} events", source.name, events.len());
                    slots[index] = Some(SourceResultBundle::new(&source, events));
                }
                Ok((index, source, Err(e))) => {
                    warn!("Source {} failed: {}", source.name, e);
                    counter!("event_ingest_source_failures_total", "adapter" => name).increment(1);
                    slots[index] = Some(SourceResultBundle::empty(&source));
                }
                Err(e) if e.is_panic() => {
                    error!("Source task panicked: {}", e);
                    counter!("event_ingest_source_failures_total", "adapter" => name).increment(1);
                }
                Err(e) => {
                    error!("Source task cancelled: {}", e);
                    cancelled = true;
                }
            }
        }

        if cancelled {
            counter!("event_ingest_adapter_failures_total", "adapter" => name).increment(1);
            return match self.cached_snapshot(adapter.cache_key()).await {
                Some(snapshot) => snapshot,
                None => sources.iter().map(SourceResultBundle::empty).collect(),
            };
        }

        // Panicked tasks never filled their slot
        let bundles: Vec<SourceResultBundle> = slots
            .into_iter()
            .zip(sources.iter())
            .map(|(slot, source)| slot.unwrap_or_else(|| SourceResultBundle::empty(source)))
            .collect();

        let total: usize = bundles.iter().map(|b| b.events.len()).sum();
        counter!("event_ingest_events_total", "adapter" => name).increment(total as u64);
        histogram!("event_ingest_run_duration_seconds", "adapter" => name)
            .record(started.elapsed().as_secs_f64());

        self.store_snapshot(adapter.cache_key(), &bundles).await;
        info!("✅ {} finished with {} events", name, total);
        bundles
    }

    async fn store_snapshot(&self, key: &str, bundles: &[SourceResultBundle]) {
        let value = match serde_json::to_value(bundles) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize snapshot for {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.cache.set_item(key, value).await {
            warn!("Failed to write cache key {}: {}", key, e);
        }
    }

    /// Last stored bundles for `key`; unreadable snapshots count as missing.
    pub async fn cached_snapshot(&self, key: &str) -> Option<Vec<SourceResultBundle>> {
        let value = match self.cache.get_item(key).await {
            Ok(value) => value?,
            Err(e) => {
                warn!("Failed to read cache key {}: {}", key, e);
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(bundles) => Some(bundles),
            Err(e) => {
                warn!("Discarding unreadable snapshot under {}: {}", key, e);
                None
            }
        }
    }
}
