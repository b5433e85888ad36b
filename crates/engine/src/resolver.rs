//! BOM resolution and per-line availability.

use std::collections::HashMap;
use std::sync::Arc;

use client::{ErpClient, Resilience, Target};
use common::{ProductCode, Sku};
use domain::Availability;

use crate::error::ResolveError;

/// Resolver tuning.
///
/// Both values are deliberately explicit configuration: the set of stock
/// locations that count toward availability, and the epsilon under which a
/// float shortfall is treated as zero.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Ordered set of location names whose stock is summed per SKU.
    pub stock_locations: Vec<String>,
    /// Shortfalls at or below this are rounded down to zero.
    pub epsilon: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            stock_locations: vec!["Stock".to_string(), "WH/Stock".to_string()],
            epsilon: 1e-6,
        }
    }
}

/// Resolves a product's BOM against current stock through the client facade.
pub struct Resolver<E> {
    erp: Arc<E>,
    resilience: Arc<Resilience>,
    config: ResolverConfig,
}

impl<E: ErpClient> Resolver<E> {
    pub fn new(erp: Arc<E>, resilience: Arc<Resilience>, config: ResolverConfig) -> Self {
        Self {
            erp,
            resilience,
            config,
        }
    }

    /// Fetches the BOM and a stock snapshot, then computes availability per
    /// line. Output follows the BOM's own line order; stock for a SKU is
    /// summed across all configured locations.
    #[tracing::instrument(skip(self), fields(product = %product_code))]
    pub async fn resolve(
        &self,
        product_code: &ProductCode,
        station: Option<&str>,
        quantity: f64,
    ) -> Result<Vec<Availability>, ResolveError> {
        let bom = self
            .resilience
            .call(Target::Erp, || self.erp.fetch_bom(product_code))
            .await?;
        if bom.is_empty() {
            return Err(ResolveError::UnknownProduct(product_code.clone()));
        }
        tracing::debug!(lines = bom.len(), ?station, "resolved BOM");

        let skus: Vec<Sku> = bom.iter().map(|line| line.sku.clone()).collect();
        let stock = self
            .resilience
            .call(Target::Erp, || {
                self.erp.fetch_stock(&skus, &self.config.stock_locations)
            })
            .await?;

        let mut available_by_sku: HashMap<Sku, f64> = HashMap::new();
        for level in &stock {
            if self.config.stock_locations.contains(&level.location) {
                *available_by_sku.entry(level.sku.clone()).or_default() += level.available;
            }
        }

        Ok(bom
            .iter()
            .map(|line| {
                let available = available_by_sku.get(&line.sku).copied().unwrap_or(0.0);
                Availability::compute(
                    line.sku.clone(),
                    line.qty_per_unit * quantity,
                    available,
                    self.config.epsilon,
                )
            })
            .collect())
    }
}
