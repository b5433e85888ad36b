//! Shared identifier types used across the reconciliation adapter.

mod types;

pub use types::{ProductCode, ProjectId, Sku, URN_PREFIX};
