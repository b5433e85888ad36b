//! ERP read operations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{ProductCode, Sku};
use domain::{BomLine, StockLevel};

use crate::error::{ClientError, Target};

/// Read-side of the ERP: bill-of-materials and stock lookups.
///
/// Both operations are pure reads and therefore always safe to retry.
#[async_trait]
pub trait ErpClient: Send + Sync {
    /// Returns all BOM lines for a product, in the BOM's own line order.
    /// An unknown product or a product without a BOM yields an empty vec.
    async fn fetch_bom(&self, product_code: &ProductCode) -> Result<Vec<BomLine>, ClientError>;

    /// Returns per-location stock for the given SKUs, restricted to the
    /// named locations. One entry per (SKU, location) pair.
    async fn fetch_stock(
        &self,
        skus: &[Sku],
        locations: &[String],
    ) -> Result<Vec<StockLevel>, ClientError>;
}

#[derive(Debug, Default)]
struct InMemoryErpState {
    boms: HashMap<ProductCode, Vec<BomLine>>,
    stock: Vec<StockLevel>,
    bom_failures: u32,
    stock_failures: u32,
    fail_permanently: bool,
    delay: Option<Duration>,
    bom_calls: u32,
    stock_calls: u32,
}

/// In-memory ERP for testing.
///
/// Failure injection is scripted: `set_*_failures(n)` makes the next `n`
/// calls fail transiently before the data comes back, and `set_delay` holds
/// each call open long enough for staleness scenarios to interleave.
#[derive(Debug, Clone, Default)]
pub struct InMemoryErp {
    state: Arc<RwLock<InMemoryErpState>>,
}

impl InMemoryErp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a BOM for a product, replacing any existing one.
    pub fn put_bom(&self, product_code: impl Into<ProductCode>, lines: Vec<BomLine>) {
        self.state
            .write()
            .unwrap()
            .boms
            .insert(product_code.into(), lines);
    }

    /// Adds stock for a SKU at a location.
    pub fn put_stock(&self, sku: impl Into<Sku>, location: &str, available: f64) {
        self.state.write().unwrap().stock.push(StockLevel {
            sku: sku.into(),
            available,
            location: location.to_string(),
        });
    }

    /// Replaces all stock for a SKU with a single level.
    pub fn set_stock(&self, sku: impl Into<Sku>, location: &str, available: f64) {
        let sku = sku.into();
        let mut state = self.state.write().unwrap();
        state.stock.retain(|s| s.sku != sku);
        state.stock.push(StockLevel {
            sku,
            available,
            location: location.to_string(),
        });
    }

    /// The next `n` BOM fetches fail transiently.
    pub fn set_bom_failures(&self, n: u32) {
        self.state.write().unwrap().bom_failures = n;
    }

    /// The next `n` stock fetches fail transiently.
    pub fn set_stock_failures(&self, n: u32) {
        self.state.write().unwrap().stock_failures = n;
    }

    /// All calls fail permanently until cleared.
    pub fn set_fail_permanently(&self, fail: bool) {
        self.state.write().unwrap().fail_permanently = fail;
    }

    /// Every call sleeps this long before returning.
    pub fn set_delay(&self, delay: Duration) {
        self.state.write().unwrap().delay = Some(delay);
    }

    pub fn bom_call_count(&self) -> u32 {
        self.state.read().unwrap().bom_calls
    }

    pub fn stock_call_count(&self) -> u32 {
        self.state.read().unwrap().stock_calls
    }
}

#[async_trait]
impl ErpClient for InMemoryErp {
    async fn fetch_bom(&self, product_code: &ProductCode) -> Result<Vec<BomLine>, ClientError> {
        let delay;
        {
            let mut state = self.state.write().unwrap();
            state.bom_calls += 1;
            if state.fail_permanently {
                return Err(ClientError::permanent(Target::Erp, "rejected"));
            }
            if state.bom_failures > 0 {
                state.bom_failures -= 1;
                return Err(ClientError::transient(Target::Erp, "connection refused"));
            }
            delay = state.delay;
        }
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        let state = self.state.read().unwrap();
        Ok(state.boms.get(product_code).cloned().unwrap_or_default())
    }

    async fn fetch_stock(
        &self,
        skus: &[Sku],
        locations: &[String],
    ) -> Result<Vec<StockLevel>, ClientError> {
        let delay;
        {
            let mut state = self.state.write().unwrap();
            state.stock_calls += 1;
            if state.fail_permanently {
                return Err(ClientError::permanent(Target::Erp, "rejected"));
            }
            if state.stock_failures > 0 {
                state.stock_failures -= 1;
                return Err(ClientError::transient(Target::Erp, "connection refused"));
            }
            delay = state.delay;
        }
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        let state = self.state.read().unwrap();
        Ok(state
            .stock
            .iter()
            .filter(|s| skus.contains(&s.sku) && locations.contains(&s.location))
            .cloned()
            .collect())
    }
}
