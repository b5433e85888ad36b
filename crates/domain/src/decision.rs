//! Pure reservation/shortage decision.

use common::ProjectId;

use crate::contracts::Availability;
use crate::outcome::{Outcome, Reservation, ReservationLine, Shortage, ShortageLine};

/// Decides the outcome of a recomputation from resolved availability.
///
/// Pure function, no I/O and no clock: identical input always yields a
/// byte-identical outcome document, which is what makes re-publication under
/// retry safe. Line order follows the input (the BOM's own order).
///
/// Every shortfall zero → Reservation over the full required quantities.
/// Any positive shortfall → Shortage listing only the missing lines.
pub fn decide(project_id: &ProjectId, results: &[Availability]) -> Outcome {
    if results.iter().all(Availability::is_satisfied) {
        let lines = results
            .iter()
            .map(|a| ReservationLine {
                sku: a.sku.clone(),
                qty: a.required,
            })
            .collect();
        Outcome::Reservation(Reservation::new(project_id, lines))
    } else {
        let lines = results
            .iter()
            .filter(|a| a.shortfall > 0.0)
            .map(|a| ShortageLine {
                sku: a.sku.clone(),
                missing_qty: a.shortfall,
            })
            .collect();
        Outcome::Shortage(Shortage::new(project_id, lines))
    }
}
