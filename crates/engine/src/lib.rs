//! The reconciliation engine.
//!
//! Given a project in `requested` status, the [`Orchestrator`] drives the
//! resolve → decide → publish pipeline with an at-most-one-in-flight
//! guarantee per project, revision-based staleness detection, and idempotent
//! publication. The [`Resolver`] turns a product code into per-line
//! availability via the client facade, and the [`InventorySync`] loop
//! republishes stock snapshots on its own cadence.
//!
//! [`Orchestrator::trigger_recompute`] and [`InventorySync::sync_tick`] are
//! the only entry points into the core.

pub mod error;
pub mod inventory;
pub mod orchestrator;
pub mod resolver;

pub use error::ResolveError;
pub use inventory::{InventorySync, InventorySyncConfig, SyncReport};
pub use orchestrator::{Orchestrator, PublishedKind, RecomputeRequest, RunOutcome};
pub use resolver::{Resolver, ResolverConfig};
