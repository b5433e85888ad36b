//! Engine error types.

use client::ClientError;
use common::ProductCode;
use thiserror::Error;

/// Errors from BOM/stock resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The ERP has no bill of materials for the product. Permanent.
    #[error("no bill of materials for product {0}")]
    UnknownProduct(ProductCode),

    /// The underlying facade call failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl ResolveError {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResolveError::Client(err) if err.is_circuit_open())
    }
}
