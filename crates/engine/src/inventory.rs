//! Periodic inventory synchronization.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use client::{ClientError, ContextStore, ErpClient, Resilience, Target};
use common::Sku;
use domain::InventoryItem;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Sync loop tuning.
#[derive(Debug, Clone)]
pub struct InventorySyncConfig {
    /// SKUs republished on every tick.
    pub tracked_skus: Vec<Sku>,
    /// Location names whose stock counts toward the published quantity.
    pub stock_locations: Vec<String>,
    pub interval: Duration,
}

impl Default for InventorySyncConfig {
    fn default() -> Self {
        Self {
            tracked_skus: Vec::new(),
            stock_locations: vec!["Stock".to_string(), "WH/Stock".to_string()],
            interval: Duration::from_secs(600),
        }
    }
}

/// Result of one sync tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Republishes per-SKU stock snapshots on a fixed cadence.
///
/// Shares only the stateless client facade with the orchestrator and never
/// touches project state.
pub struct InventorySync<E, C> {
    erp: Arc<E>,
    store: Arc<C>,
    resilience: Arc<Resilience>,
    config: InventorySyncConfig,
}

impl<E, C> InventorySync<E, C>
where
    E: ErpClient + Send + Sync + 'static,
    C: ContextStore + Send + Sync + 'static,
{
    pub fn new(
        erp: Arc<E>,
        store: Arc<C>,
        resilience: Arc<Resilience>,
        config: InventorySyncConfig,
    ) -> Self {
        Self {
            erp,
            store,
            resilience,
            config,
        }
    }

    /// Syncs every tracked SKU once. A failing SKU is logged and skipped;
    /// its record keeps the last published value.
    #[tracing::instrument(skip(self))]
    pub async fn sync_tick(&self) -> SyncReport {
        let started = Instant::now();
        let mut report = SyncReport::default();

        for sku in &self.config.tracked_skus {
            report.processed += 1;
            match self.sync_sku(sku).await {
                Ok(()) => report.updated += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(sku = %sku, error = %err, "inventory sync failed for SKU, keeping last-known record");
                }
            }
        }

        metrics::counter!("inventory_sync_ticks_total").increment(1);
        metrics::histogram!("inventory_sync_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            processed = report.processed,
            updated = report.updated,
            failed = report.failed,
            "inventory sync tick completed"
        );
        report
    }

    async fn sync_sku(&self, sku: &Sku) -> Result<(), ClientError> {
        let levels = self
            .resilience
            .call(Target::Erp, || {
                self.erp
                    .fetch_stock(std::slice::from_ref(sku), &self.config.stock_locations)
            })
            .await?;

        let quantity: f64 = levels.iter().map(|level| level.available).sum();
        let item = InventoryItem::new(sku.clone(), quantity.max(0.0), None, Utc::now());

        self.resilience
            .call(Target::ContextStore, || {
                self.store.upsert_inventory_item(&item)
            })
            .await
    }

    /// Drives [`Self::sync_tick`] on the configured interval until the
    /// shutdown signal flips. The first tick fires immediately.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            tracked = self.config.tracked_skus.len(),
            "inventory sync loop started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sync_tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("inventory sync loop stopping");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::{BreakerConfig, InMemoryContextStore, InMemoryErp, RetryPolicy};

    fn sync(
        erp: &InMemoryErp,
        store: &InMemoryContextStore,
        max_retries: u32,
        tracked: &[&str],
    ) -> InventorySync<InMemoryErp, InMemoryContextStore> {
        InventorySync::new(
            Arc::new(erp.clone()),
            Arc::new(store.clone()),
            Arc::new(Resilience::new(
                RetryPolicy {
                    max_retries,
                    base_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(2),
                },
                BreakerConfig::default(),
            )),
            InventorySyncConfig {
                tracked_skus: tracked.iter().map(|s| Sku::new(*s)).collect(),
                ..InventorySyncConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn tick_publishes_every_tracked_sku() {
        let erp = InMemoryErp::new();
        let store = InMemoryContextStore::new();
        erp.put_stock("SCH-REL-24V", "Stock", 6.0);
        erp.put_stock("SCH-REL-24V", "WH/Stock", 4.0);
        erp.put_stock("ABB-MCB-10A", "Stock", 5.0);

        let report = sync(&erp, &store, 0, &["SCH-REL-24V", "ABB-MCB-10A"])
            .sync_tick()
            .await;

        assert_eq!(
            report,
            SyncReport {
                processed: 2,
                updated: 2,
                failed: 0
            }
        );
        let relay = store.inventory_item(&Sku::new("SCH-REL-24V")).unwrap();
        assert_eq!(relay.quantity, 10.0);
        assert_eq!(store.inventory_count(), 2);
    }

    #[tokio::test]
    async fn untracked_sku_with_no_stock_publishes_zero() {
        let erp = InMemoryErp::new();
        let store = InMemoryContextStore::new();

        sync(&erp, &store, 0, &["GHOST-SKU"]).sync_tick().await;

        let item = store.inventory_item(&Sku::new("GHOST-SKU")).unwrap();
        assert_eq!(item.quantity, 0.0);
    }

    #[tokio::test]
    async fn one_failing_sku_does_not_abort_the_batch() {
        let erp = InMemoryErp::new();
        let store = InMemoryContextStore::new();
        erp.put_stock("A", "Stock", 1.0);
        erp.put_stock("B", "Stock", 2.0);
        // first fetch fails; with a zero retry budget the first SKU is lost
        erp.set_stock_failures(1);

        let report = sync(&erp, &store, 0, &["A", "B"]).sync_tick().await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.updated, 1);
        assert!(store.inventory_item(&Sku::new("A")).is_none());
        assert_eq!(store.inventory_item(&Sku::new("B")).unwrap().quantity, 2.0);
    }

    #[tokio::test]
    async fn transient_failures_within_budget_still_update() {
        let erp = InMemoryErp::new();
        let store = InMemoryContextStore::new();
        erp.put_stock("A", "Stock", 3.0);
        erp.set_stock_failures(2);

        let report = sync(&erp, &store, 3, &["A"]).sync_tick().await;

        assert_eq!(report.failed, 0);
        assert_eq!(store.inventory_item(&Sku::new("A")).unwrap().quantity, 3.0);
    }

    #[tokio::test]
    async fn republished_sku_overwrites_in_place() {
        let erp = InMemoryErp::new();
        let store = InMemoryContextStore::new();
        erp.put_stock("A", "Stock", 3.0);
        let worker = sync(&erp, &store, 0, &["A"]);

        worker.sync_tick().await;
        erp.set_stock("A", "Stock", 7.0);
        worker.sync_tick().await;

        assert_eq!(store.inventory_count(), 1);
        assert_eq!(store.inventory_item(&Sku::new("A")).unwrap().quantity, 7.0);
    }
}
