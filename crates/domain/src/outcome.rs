//! Outcome documents published to the context store.
//!
//! A recomputation ends in exactly one of two documents, each with an
//! identifier derived deterministically from the project, so re-publication
//! under retry overwrites instead of duplicating.

use common::{ProjectId, Sku, URN_PREFIX};
use serde::{Deserialize, Serialize};

/// One reserved component line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationLine {
    pub sku: Sku,
    pub qty: f64,
}

/// One missing component line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortageLine {
    pub sku: Sku,
    pub missing_qty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortageStatus {
    Open,
}

/// All components available and allocated for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: String,
    /// URN of the project this reservation fulfills.
    pub project_ref: String,
    pub lines: Vec<ReservationLine>,
    pub status: ReservationStatus,
}

impl Reservation {
    /// Deterministic entity id for a project's reservation.
    pub fn id_for(project_id: &ProjectId) -> String {
        format!("{URN_PREFIX}Reservation:{project_id}")
    }

    pub fn new(project_id: &ProjectId, lines: Vec<ReservationLine>) -> Self {
        Self {
            id: Self::id_for(project_id),
            project_ref: project_id.uri(),
            lines,
            status: ReservationStatus::Created,
        }
    }
}

/// One or more components missing for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortage {
    pub id: String,
    /// URN of the project this shortage blocks.
    pub project_ref: String,
    pub lines: Vec<ShortageLine>,
    pub status: ShortageStatus,
}

impl Shortage {
    /// Deterministic entity id for a project's shortage.
    pub fn id_for(project_id: &ProjectId) -> String {
        format!("{URN_PREFIX}Shortage:{project_id}")
    }

    pub fn new(project_id: &ProjectId, lines: Vec<ShortageLine>) -> Self {
        Self {
            id: Self::id_for(project_id),
            project_ref: project_id.uri(),
            lines,
            status: ShortageStatus::Open,
        }
    }
}

/// The decided outcome of one recomputation.
///
/// Serializes with a `type` tag so the context store document is
/// self-describing. Carries no timestamp: the same decision input must
/// always produce byte-identical output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Outcome {
    Reservation(Reservation),
    Shortage(Shortage),
}

impl Outcome {
    /// The entity id this outcome is published under.
    pub fn entity_id(&self) -> &str {
        match self {
            Outcome::Reservation(r) => &r.id,
            Outcome::Shortage(s) => &s.id,
        }
    }

    /// The entity id of the opposite outcome kind for the same project.
    ///
    /// Publishing deletes this id so a project never carries both an open
    /// Shortage and a created Reservation.
    pub fn counterpart_id(&self, project_id: &ProjectId) -> String {
        match self {
            Outcome::Reservation(_) => Shortage::id_for(project_id),
            Outcome::Shortage(_) => Reservation::id_for(project_id),
        }
    }

    /// The project status this outcome maps to.
    pub fn project_status(&self) -> crate::status::ProjectStatus {
        match self {
            Outcome::Reservation(_) => crate::status::ProjectStatus::Reserved,
            Outcome::Shortage(_) => crate::status::ProjectStatus::Shortage,
        }
    }

    /// Short kind name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Reservation(_) => "reservation",
            Outcome::Shortage(_) => "shortage",
        }
    }
}
