//! REST context-store client.
//!
//! Entity-document API: `GET`/`PUT` on `/entities/{id}`, attribute patches
//! on `/entities/{id}/attrs`, `DELETE` idempotent by treating 404 as done.

use std::time::Duration;

use async_trait::async_trait;
use common::{ProductCode, ProjectId};
use domain::{InventoryItem, Project, ProjectStatus, Reservation, Shortage};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ClientError, Target};
use crate::http::{classify_status, classify_transport};

/// Project entity document as stored in the context store. The document id
/// is the full URN; the domain type carries the bare identifier.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDoc {
    id: String,
    #[serde(rename = "type")]
    entity_type: String,
    code: ProductCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    station: Option<String>,
    status: ProjectStatus,
    #[serde(default)]
    revision: u64,
}

impl From<ProjectDoc> for Project {
    fn from(doc: ProjectDoc) -> Self {
        Project {
            id: ProjectId::from_uri(&doc.id),
            code: doc.code,
            station: doc.station,
            status: doc.status,
            revision: doc.revision,
        }
    }
}

/// HTTP implementation of [`crate::ContextStore`].
pub struct HttpContextStore {
    base_url: String,
    http: reqwest::Client,
}

impl HttpContextStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    fn entity_url(&self, entity_id: &str) -> String {
        format!("{}/entities/{entity_id}", self.base_url)
    }

    async fn put_entity(&self, entity_id: &str, body: Value) -> Result<(), ClientError> {
        let response = self
            .http
            .put(self.entity_url(entity_id))
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(Target::ContextStore, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(classify_status(Target::ContextStore, status, &text))
    }

    /// Serializes an entity and stamps the document `type`.
    fn tagged<T: Serialize>(entity: &T, entity_type: &str) -> Result<Value, ClientError> {
        let mut value = serde_json::to_value(entity).map_err(|e| {
            ClientError::permanent(Target::ContextStore, format!("serialize: {e}"))
        })?;
        if let Some(map) = value.as_object_mut() {
            map.insert("type".to_string(), Value::String(entity_type.to_string()));
        }
        Ok(value)
    }
}

#[async_trait]
impl crate::context::ContextStore for HttpContextStore {
    async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, ClientError> {
        let response = self
            .http
            .get(self.entity_url(&id.uri()))
            .send()
            .await
            .map_err(|e| classify_transport(Target::ContextStore, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(Target::ContextStore, status, &text));
        }

        let doc: ProjectDoc = response
            .json()
            .await
            .map_err(|e| classify_transport(Target::ContextStore, e))?;
        Ok(Some(doc.into()))
    }

    async fn patch_project_status(
        &self,
        id: &ProjectId,
        status: ProjectStatus,
    ) -> Result<(), ClientError> {
        let response = self
            .http
            .patch(format!("{}/attrs", self.entity_url(&id.uri())))
            .json(&json!({ "status": status }))
            .send()
            .await
            .map_err(|e| classify_transport(Target::ContextStore, e))?;

        let http_status = response.status();
        if http_status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(classify_status(Target::ContextStore, http_status, &text))
    }

    async fn upsert_reservation(&self, reservation: &Reservation) -> Result<(), ClientError> {
        let body = Self::tagged(reservation, "Reservation")?;
        self.put_entity(&reservation.id, body).await
    }

    async fn upsert_shortage(&self, shortage: &Shortage) -> Result<(), ClientError> {
        let body = Self::tagged(shortage, "Shortage")?;
        self.put_entity(&shortage.id, body).await
    }

    async fn upsert_inventory_item(&self, item: &InventoryItem) -> Result<(), ClientError> {
        let body = serde_json::to_value(item).map_err(|e| {
            ClientError::permanent(Target::ContextStore, format!("serialize: {e}"))
        })?;
        self.put_entity(&item.id, body).await
    }

    async fn delete_entity(&self, entity_id: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.entity_url(entity_id))
            .send()
            .await
            .map_err(|e| classify_transport(Target::ContextStore, e))?;

        let status = response.status();
        // already gone is success: deletes must be idempotent under retry
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(classify_status(Target::ContextStore, status, &text))
    }
}
