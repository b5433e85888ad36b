//! Typed contracts for payloads read from the ERP.
//!
//! These are the tagged shapes the client facade parses external data into.
//! Malformed payloads are rejected at that boundary; nothing past it sees
//! untyped data.

use common::{ProductCode, Sku};
use serde::{Deserialize, Serialize};

/// One line of a bill of materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomLine {
    /// Component SKU.
    pub sku: Sku,
    /// Quantity of the component required per unit of the parent product.
    pub qty_per_unit: f64,
    /// The product this line belongs to.
    pub product_code: ProductCode,
}

/// Stock on hand for one SKU at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    pub sku: Sku,
    /// Quantity available for reservation at this location.
    pub available: f64,
    pub location: String,
}

/// Required vs. available quantity for one BOM line.
///
/// Ephemeral, computed per recomputation; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub sku: Sku,
    pub required: f64,
    pub available: f64,
    /// `max(0, required - available)`, clamped to zero within epsilon.
    pub shortfall: f64,
}

impl Availability {
    /// Computes the shortfall for a BOM line against aggregated stock.
    ///
    /// `epsilon` absorbs floating-point noise: a shortfall at or below it is
    /// treated as fully satisfiable.
    pub fn compute(sku: Sku, required: f64, available: f64, epsilon: f64) -> Self {
        let raw = (required - available).max(0.0);
        let shortfall = if raw <= epsilon { 0.0 } else { raw };
        Self {
            sku,
            required,
            available,
            shortfall,
        }
    }

    /// Returns true if the required quantity is fully covered.
    pub fn is_satisfied(&self) -> bool {
        self.shortfall == 0.0
    }
}
