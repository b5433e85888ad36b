//! Context-store notification webhook.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use client::{ContextStore, ErpClient};
use common::{ProductCode, ProjectId};
use engine::RecomputeRequest;
use serde::{Deserialize, Serialize};

use crate::routes::projects::AppState;

/// One notification batch as delivered by the context store subscription.
#[derive(Deserialize)]
pub struct Notification {
    pub data: Vec<EntityNotification>,
}

/// A notified entity. Fields beyond `id`/`type` are optional because the
/// subscription only projects the attributes we asked for.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityNotification {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub code: Option<ProductCode>,
    pub station: Option<String>,
    pub status: Option<String>,
    pub quantity: Option<f64>,
}

#[derive(Serialize)]
pub struct NotificationResponse {
    pub accepted: usize,
    pub ignored: usize,
}

/// POST /notifications — webhook target for project-change notifications.
///
/// Accepts recomputation for every notified `Project` in `requested`
/// status; everything else is ignored. Returns once the triggers are
/// enqueued, not once the pipelines finish.
#[tracing::instrument(skip(state, notification))]
pub async fn receive<E, C>(
    State(state): State<Arc<AppState<E, C>>>,
    Json(notification): Json<Notification>,
) -> Json<NotificationResponse>
where
    E: ErpClient + Send + Sync + 'static,
    C: ContextStore + Send + Sync + 'static,
{
    let mut accepted = 0;
    let mut ignored = 0;

    for entity in notification.data {
        if entity.entity_type != "Project" {
            tracing::warn!(id = %entity.id, entity_type = %entity.entity_type, "ignoring non-Project notification");
            ignored += 1;
            continue;
        }
        if entity.status.as_deref() != Some("requested") {
            tracing::debug!(id = %entity.id, status = ?entity.status, "project not requested, ignoring");
            ignored += 1;
            continue;
        }
        let Some(code) = entity.code else {
            tracing::warn!(id = %entity.id, "requested project without product code");
            ignored += 1;
            continue;
        };

        let mut request = RecomputeRequest::new(ProjectId::from_uri(&entity.id), code);
        if let Some(station) = entity.station {
            request = request.with_station(station);
        }
        if let Some(quantity) = entity.quantity {
            request = request.with_quantity(quantity);
        }
        state.orchestrator.trigger_recompute(request);
        accepted += 1;
    }

    Json(NotificationResponse { accepted, ignored })
}
