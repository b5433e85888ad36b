//! Project status state machine.

use serde::{Deserialize, Serialize};

/// The status of a project as published in the context store.
///
/// Status transitions driven by this adapter:
/// ```text
/// Planning ──► Requested ──► Processing ──┬──► Reserved
///                  ▲                      ├──► Shortage
///                  └──(new revision)──────┴──► Error
/// ```
/// `Planning` and `Requested` are written by the external trigger source;
/// the engine only ever moves a project forward from `Requested`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    /// Project is being drafted, no demand yet.
    #[default]
    Planning,

    /// Parts have been requested, a recomputation is due.
    Requested,

    /// A recomputation pipeline is in flight.
    Processing,

    /// All components available, a Reservation was published.
    Reserved,

    /// One or more components missing, a Shortage was published.
    Shortage,

    /// The last recomputation failed unrecoverably.
    Error,
}

impl ProjectStatus {
    /// Returns true if a recomputation may start from this status.
    pub fn can_begin_recompute(&self) -> bool {
        matches!(self, ProjectStatus::Requested)
    }

    /// Returns true if a recomputation pipeline may run against this status.
    ///
    /// `Processing` is included so a pipeline restarted after a mid-flight
    /// supersession is not blocked by its own in-flight marker.
    pub fn recomputable(&self) -> bool {
        matches!(self, ProjectStatus::Requested | ProjectStatus::Processing)
    }

    /// Returns true if this status reflects a published outcome.
    pub fn is_outcome(&self) -> bool {
        matches!(self, ProjectStatus::Reserved | ProjectStatus::Shortage)
    }

    /// Returns the status name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::Requested => "requested",
            ProjectStatus::Processing => "processing",
            ProjectStatus::Reserved => "reserved",
            ProjectStatus::Shortage => "shortage",
            ProjectStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
