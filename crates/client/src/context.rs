//! Context-store operations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{ProjectId, Sku};
use domain::{InventoryItem, Project, ProjectStatus, Reservation, Shortage};

use crate::error::{ClientError, Target};

/// Write/read side of the context store.
///
/// All writes are keyed by deterministic entity ids: upserts overwrite in
/// place and deletes tolerate missing entities, which is what makes the
/// whole surface retry-safe.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Reads a project, `None` if it does not exist.
    async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, ClientError>;

    /// Patches only the status attribute of a project.
    async fn patch_project_status(
        &self,
        id: &ProjectId,
        status: ProjectStatus,
    ) -> Result<(), ClientError>;

    /// Upserts a reservation under its deterministic id.
    async fn upsert_reservation(&self, reservation: &Reservation) -> Result<(), ClientError>;

    /// Upserts a shortage under its deterministic id.
    async fn upsert_shortage(&self, shortage: &Shortage) -> Result<(), ClientError>;

    /// Upserts an inventory item under its deterministic id.
    async fn upsert_inventory_item(&self, item: &InventoryItem) -> Result<(), ClientError>;

    /// Deletes an entity by id; deleting a missing entity succeeds.
    async fn delete_entity(&self, entity_id: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
struct InMemoryContextState {
    projects: HashMap<ProjectId, Project>,
    reservations: HashMap<String, Reservation>,
    shortages: HashMap<String, Shortage>,
    inventory: HashMap<String, InventoryItem>,
    outcome_upserts: u32,
    inventory_upserts: u32,
    read_failures: u32,
    write_failures: u32,
}

/// In-memory context store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContextStore {
    state: Arc<RwLock<InMemoryContextState>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds or replaces a project.
    pub fn put_project(&self, project: Project) {
        let mut state = self.state.write().unwrap();
        state.projects.insert(project.id.clone(), project);
    }

    /// Increments a project's revision marker, as the external trigger
    /// source would on a change.
    pub fn bump_revision(&self, id: &ProjectId) {
        let mut state = self.state.write().unwrap();
        if let Some(project) = state.projects.get_mut(id) {
            project.revision += 1;
        }
    }

    /// Sets a project's status directly, bypassing the patch counter.
    pub fn set_project_status(&self, id: &ProjectId, status: ProjectStatus) {
        let mut state = self.state.write().unwrap();
        if let Some(project) = state.projects.get_mut(id) {
            project.status = status;
        }
    }

    pub fn project(&self, id: &ProjectId) -> Option<Project> {
        self.state.read().unwrap().projects.get(id).cloned()
    }

    pub fn reservation_for(&self, id: &ProjectId) -> Option<Reservation> {
        self.state
            .read()
            .unwrap()
            .reservations
            .get(&Reservation::id_for(id))
            .cloned()
    }

    pub fn shortage_for(&self, id: &ProjectId) -> Option<Shortage> {
        self.state
            .read()
            .unwrap()
            .shortages
            .get(&Shortage::id_for(id))
            .cloned()
    }

    pub fn reservation_count(&self) -> usize {
        self.state.read().unwrap().reservations.len()
    }

    pub fn shortage_count(&self) -> usize {
        self.state.read().unwrap().shortages.len()
    }

    pub fn inventory_item(&self, sku: &Sku) -> Option<InventoryItem> {
        self.state
            .read()
            .unwrap()
            .inventory
            .get(&InventoryItem::id_for(sku))
            .cloned()
    }

    pub fn inventory_count(&self) -> usize {
        self.state.read().unwrap().inventory.len()
    }

    /// Total reservation + shortage upsert calls observed.
    pub fn outcome_upsert_count(&self) -> u32 {
        self.state.read().unwrap().outcome_upserts
    }

    pub fn inventory_upsert_count(&self) -> u32 {
        self.state.read().unwrap().inventory_upserts
    }

    /// The next `n` reads fail transiently.
    pub fn set_read_failures(&self, n: u32) {
        self.state.write().unwrap().read_failures = n;
    }

    /// The next `n` writes fail transiently.
    pub fn set_write_failures(&self, n: u32) {
        self.state.write().unwrap().write_failures = n;
    }

    fn take_read_failure(&self) -> bool {
        let mut state = self.state.write().unwrap();
        if state.read_failures > 0 {
            state.read_failures -= 1;
            true
        } else {
            false
        }
    }

    fn take_write_failure(&self) -> bool {
        let mut state = self.state.write().unwrap();
        if state.write_failures > 0 {
            state.write_failures -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, ClientError> {
        if self.take_read_failure() {
            return Err(ClientError::transient(Target::ContextStore, "timeout"));
        }
        Ok(self.state.read().unwrap().projects.get(id).cloned())
    }

    async fn patch_project_status(
        &self,
        id: &ProjectId,
        status: ProjectStatus,
    ) -> Result<(), ClientError> {
        if self.take_write_failure() {
            return Err(ClientError::transient(Target::ContextStore, "timeout"));
        }
        let mut state = self.state.write().unwrap();
        match state.projects.get_mut(id) {
            Some(project) => {
                project.status = status;
                Ok(())
            }
            None => Err(ClientError::permanent(
                Target::ContextStore,
                format!("project {id} not found"),
            )),
        }
    }

    async fn upsert_reservation(&self, reservation: &Reservation) -> Result<(), ClientError> {
        if self.take_write_failure() {
            return Err(ClientError::transient(Target::ContextStore, "timeout"));
        }
        let mut state = self.state.write().unwrap();
        state.outcome_upserts += 1;
        state
            .reservations
            .insert(reservation.id.clone(), reservation.clone());
        Ok(())
    }

    async fn upsert_shortage(&self, shortage: &Shortage) -> Result<(), ClientError> {
        if self.take_write_failure() {
            return Err(ClientError::transient(Target::ContextStore, "timeout"));
        }
        let mut state = self.state.write().unwrap();
        state.outcome_upserts += 1;
        state.shortages.insert(shortage.id.clone(), shortage.clone());
        Ok(())
    }

    async fn upsert_inventory_item(&self, item: &InventoryItem) -> Result<(), ClientError> {
        if self.take_write_failure() {
            return Err(ClientError::transient(Target::ContextStore, "timeout"));
        }
        let mut state = self.state.write().unwrap();
        state.inventory_upserts += 1;
        state.inventory.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn delete_entity(&self, entity_id: &str) -> Result<(), ClientError> {
        if self.take_write_failure() {
            return Err(ClientError::transient(Target::ContextStore, "timeout"));
        }
        let mut state = self.state.write().unwrap();
        state.reservations.remove(entity_id);
        state.shortages.remove(entity_id);
        state.inventory.remove(entity_id);
        Ok(())
    }
}
