//! Project record as read from the context store.

use common::{ProductCode, ProjectId};
use serde::{Deserialize, Serialize};

use crate::status::ProjectStatus;

/// A manufacturing project requiring parts.
///
/// Created and revised by the external trigger source; the engine only ever
/// mutates `status`. The `revision` marker increments on every external
/// change and is what the orchestrator's staleness check compares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub code: ProductCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub revision: u64,
}

impl Project {
    /// Returns the full entity URN of this project.
    pub fn uri(&self) -> String {
        self.id.uri()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_roundtrip() {
        let project = Project {
            id: ProjectId::new("P-1042"),
            code: ProductCode::new("CTRL-PANEL-A1"),
            station: Some("ST-03".to_string()),
            status: ProjectStatus::Requested,
            revision: 7,
        };
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["status"], "requested");
        assert_eq!(json["revision"], 7);

        let back: Project = serde_json::from_value(json).unwrap();
        assert_eq!(back, project);
    }

    #[test]
    fn revision_defaults_to_zero() {
        let project: Project = serde_json::from_value(serde_json::json!({
            "id": "P-1",
            "code": "CTRL-PANEL-A1",
            "status": "planning"
        }))
        .unwrap();
        assert_eq!(project.revision, 0);
        assert_eq!(project.station, None);
    }
}
