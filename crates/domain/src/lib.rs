//! Data contracts and the pure decision engine for demand reconciliation.
//!
//! This crate holds everything the engine reasons about without doing I/O:
//! the project status state machine, the BOM/stock contracts read from the
//! ERP, the availability computation, the outcome documents published to the
//! context store, and the [`decide`] function that turns resolved
//! availability into a Reservation or a Shortage.

pub mod contracts;
pub mod decision;
pub mod inventory;
pub mod outcome;
pub mod project;
pub mod status;

pub use contracts::{Availability, BomLine, StockLevel};
pub use decision::decide;
pub use inventory::InventoryItem;
pub use outcome::{Outcome, Reservation, ReservationLine, Shortage, ShortageLine};
pub use project::Project;
pub use status::ProjectStatus;
