//! Inventory item record owned by the sync loop.

use chrono::{DateTime, Utc};
use common::{Sku, URN_PREFIX};
use serde::{Deserialize, Serialize};

/// Stock snapshot for one SKU, published on every sync tick.
///
/// Keyed by SKU so each tick overwrites the previous record. Never read by
/// the orchestrator, which always resolves fresh stock per recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub sku: Sku,
    /// Quantity available, aggregated across the configured locations.
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub synced_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Deterministic entity id for a SKU's inventory record.
    pub fn id_for(sku: &Sku) -> String {
        format!("{URN_PREFIX}InventoryItem:{sku}")
    }

    pub fn new(
        sku: Sku,
        quantity: f64,
        location: Option<String>,
        synced_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::id_for(&sku),
            entity_type: "InventoryItem".to_string(),
            sku,
            quantity,
            location,
            synced_at,
        }
    }
}
