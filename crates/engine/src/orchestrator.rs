//! Recompute orchestrator.
//!
//! The stateful core of the engine. Guarantees at-most-one in-flight
//! recomputation per project via an atomic claim on the project key,
//! deduplicates redundant triggers against a settled-revision ledger, and
//! drives resolve → decide → publish with a staleness check before any
//! write leaves the process.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use client::{ClientError, ContextStore, ErpClient, Resilience, Target};
use common::{ProductCode, ProjectId};
use domain::{Outcome, Project, ProjectStatus, decide};

use crate::error::ResolveError;
use crate::resolver::Resolver;

/// A request to reconcile one project, as delivered by a notification or an
/// administrative call.
#[derive(Debug, Clone)]
pub struct RecomputeRequest {
    pub project_id: ProjectId,
    pub product_code: ProductCode,
    pub station: Option<String>,
    /// How many units the project builds; BOM quantities scale by this.
    pub quantity: f64,
}

impl RecomputeRequest {
    pub fn new(project_id: impl Into<ProjectId>, product_code: impl Into<ProductCode>) -> Self {
        Self {
            project_id: project_id.into(),
            product_code: product_code.into(),
            station: None,
            quantity: 1.0,
        }
    }

    pub fn with_station(mut self, station: impl Into<String>) -> Self {
        self.station = Some(station.into());
        self
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = quantity;
        self
    }
}

/// Which outcome kind a completed run published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishedKind {
    Reservation,
    Shortage,
}

/// How one recomputation run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Outcome published and project status updated.
    Published(PublishedKind),
    /// A pipeline for the same revision is already in flight; this trigger
    /// joined it by doing nothing.
    Coalesced,
    /// A newer revision arrived while a pipeline was in flight; the claim
    /// was updated and the in-flight pipeline will rerun when it finishes.
    SupersededInFlight,
    /// This revision was already settled; duplicate notification dropped.
    Duplicate,
    /// Project missing or not in a recomputable status.
    Skipped,
    /// Unrecoverable failure; project moved to `error`.
    Failed,
    /// A circuit is open; nothing was changed and nothing was settled, so
    /// the next trigger or timer retries.
    Deferred,
}

#[derive(Debug)]
struct Claim {
    revision: u64,
    rerun: bool,
}

enum PipelineError {
    /// The project changed while the pipeline ran; the result was discarded.
    Stale { expected: u64, actual: u64 },
    /// A breaker rejected a call; retry later, no state was damaged.
    CircuitOpen(ClientError),
    /// Retries exhausted or a permanent failure; the project goes to error.
    Fatal(String),
}

impl PipelineError {
    fn from_client(err: ClientError) -> Self {
        if err.is_circuit_open() {
            PipelineError::CircuitOpen(err)
        } else {
            PipelineError::Fatal(err.to_string())
        }
    }

    fn from_resolve(err: ResolveError) -> Self {
        match err {
            ResolveError::UnknownProduct(_) => PipelineError::Fatal(err.to_string()),
            ResolveError::Client(client_err) => Self::from_client(client_err),
        }
    }
}

/// Orchestrates recomputation pipelines across projects.
///
/// Multiple projects recompute concurrently; per project the claim map
/// enforces a single owner. The claim map and the settled ledger are the
/// only mutable state in the engine.
pub struct Orchestrator<E, C> {
    resolver: Resolver<E>,
    store: Arc<C>,
    resilience: Arc<Resilience>,
    claims: Mutex<HashMap<ProjectId, Claim>>,
    settled: Mutex<HashMap<ProjectId, u64>>,
}

impl<E, C> Orchestrator<E, C>
where
    E: ErpClient + Send + Sync + 'static,
    C: ContextStore + Send + Sync + 'static,
{
    pub fn new(resolver: Resolver<E>, store: Arc<C>, resilience: Arc<Resilience>) -> Self {
        Self {
            resolver,
            store,
            resilience,
            claims: Mutex::new(HashMap::new()),
            settled: Mutex::new(HashMap::new()),
        }
    }

    /// Entry point for the transport layer: accepts immediately and
    /// completes asynchronously on a spawned task.
    pub fn trigger_recompute(self: &Arc<Self>, request: RecomputeRequest) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.recompute(&request).await;
        });
    }

    /// Forgets the settled revision for a project so an operator can force
    /// a rerun without a new revision from the trigger source.
    pub fn clear_settled(&self, project_id: &ProjectId) {
        self.settled.lock().unwrap().remove(project_id);
    }

    /// Runs one recomputation to completion.
    ///
    /// Loops internally: a stale result or a rerun requested by a newer
    /// trigger starts over with a fresh read, so the latest revision always
    /// wins.
    #[tracing::instrument(skip(self, request), fields(project = %request.project_id))]
    pub async fn recompute(&self, request: &RecomputeRequest) -> RunOutcome {
        metrics::counter!("recompute_triggers_total").increment(1);
        // set once this call owes the project a fresh run (stale discard or
        // rerun requested by a newer trigger); those iterations skip the
        // status gate, which may still reflect the outcome just published
        let mut rerun_owed = false;
        loop {
            let project = match self
                .resilience
                .call(Target::ContextStore, || {
                    self.store.get_project(&request.project_id)
                })
                .await
            {
                Ok(Some(project)) => project,
                Ok(None) => {
                    tracing::warn!("project not found in context store");
                    return RunOutcome::Skipped;
                }
                Err(err) => return self.absorb_read_error(&request.project_id, err).await,
            };

            if !rerun_owed && !project.status.recomputable() {
                tracing::debug!(status = %project.status, "project not recomputable, ignoring");
                return RunOutcome::Skipped;
            }

            let revision = project.revision;
            if self
                .settled
                .lock()
                .unwrap()
                .get(&request.project_id)
                .copied()
                == Some(revision)
            {
                metrics::counter!("recompute_duplicates_total").increment(1);
                tracing::debug!(revision, "revision already settled, dropping trigger");
                return RunOutcome::Duplicate;
            }

            // atomic claim: exactly one pipeline per project key
            {
                let mut claims = self.claims.lock().unwrap();
                match claims.entry(request.project_id.clone()) {
                    Entry::Occupied(mut entry) => {
                        let claim = entry.get_mut();
                        if claim.revision == revision {
                            metrics::counter!("recompute_coalesced_total").increment(1);
                            return RunOutcome::Coalesced;
                        }
                        claim.revision = revision;
                        claim.rerun = true;
                        return RunOutcome::SupersededInFlight;
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(Claim {
                            revision,
                            rerun: false,
                        });
                    }
                }
            }

            let result = self.run_pipeline(request, &project).await;

            let rerun = self
                .claims
                .lock()
                .unwrap()
                .remove(&request.project_id)
                .map(|claim| claim.rerun)
                .unwrap_or(false);

            match result {
                Ok(kind) => {
                    self.settle(&request.project_id, revision);
                    if rerun {
                        rerun_owed = true;
                        continue;
                    }
                    return RunOutcome::Published(kind);
                }
                Err(PipelineError::Stale { expected, actual }) => {
                    metrics::counter!("recompute_stale_discards_total").increment(1);
                    tracing::info!(expected, actual, "project changed mid-flight, recomputing");
                    rerun_owed = true;
                    continue;
                }
                Err(PipelineError::CircuitOpen(err)) => {
                    metrics::counter!("recompute_deferred_total").increment(1);
                    tracing::warn!(error = %err, "dependency unavailable, deferring recomputation");
                    return RunOutcome::Deferred;
                }
                Err(PipelineError::Fatal(message)) => {
                    metrics::counter!("recompute_failures_total").increment(1);
                    tracing::error!(error = %message, revision, "recomputation failed");
                    self.try_patch_status(&request.project_id, ProjectStatus::Error)
                        .await;
                    self.settle(&request.project_id, revision);
                    if rerun {
                        rerun_owed = true;
                        continue;
                    }
                    return RunOutcome::Failed;
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        request: &RecomputeRequest,
        project: &Project,
    ) -> Result<PublishedKind, PipelineError> {
        let attempt_id = uuid::Uuid::new_v4();
        let started = Instant::now();
        tracing::info!(%attempt_id, revision = project.revision, "recomputation started");

        // operator-visible in-flight marker; best effort only
        self.try_patch_status(&request.project_id, ProjectStatus::Processing)
            .await;

        let availability = self
            .resolver
            .resolve(
                &request.product_code,
                request.station.as_deref(),
                request.quantity,
            )
            .await
            .map_err(PipelineError::from_resolve)?;

        let outcome = decide(&request.project_id, &availability);

        // staleness check: never publish a result for a superseded revision
        let current = self
            .resilience
            .call(Target::ContextStore, || {
                self.store.get_project(&request.project_id)
            })
            .await
            .map_err(PipelineError::from_client)?
            .ok_or_else(|| PipelineError::Fatal("project removed mid-flight".to_string()))?;
        if current.revision != project.revision {
            return Err(PipelineError::Stale {
                expected: project.revision,
                actual: current.revision,
            });
        }

        self.publish(&request.project_id, &outcome)
            .await
            .map_err(PipelineError::from_client)?;

        let kind = match &outcome {
            Outcome::Reservation(_) => {
                metrics::counter!("reservations_created_total").increment(1);
                PublishedKind::Reservation
            }
            Outcome::Shortage(_) => {
                metrics::counter!("shortages_created_total").increment(1);
                PublishedKind::Shortage
            }
        };
        metrics::histogram!("recompute_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(%attempt_id, kind = outcome.kind(), "outcome published");
        Ok(kind)
    }

    /// Publishes the outcome under its deterministic id, removes the
    /// opposite kind so the mutual-exclusivity invariant holds across kind
    /// flips, and moves the project status to match.
    async fn publish(&self, project_id: &ProjectId, outcome: &Outcome) -> Result<(), ClientError> {
        match outcome {
            Outcome::Reservation(reservation) => {
                self.resilience
                    .call(Target::ContextStore, || {
                        self.store.upsert_reservation(reservation)
                    })
                    .await?;
            }
            Outcome::Shortage(shortage) => {
                self.resilience
                    .call(Target::ContextStore, || self.store.upsert_shortage(shortage))
                    .await?;
            }
        }

        let counterpart = outcome.counterpart_id(project_id);
        self.resilience
            .call(Target::ContextStore, || {
                self.store.delete_entity(&counterpart)
            })
            .await?;

        self.resilience
            .call(Target::ContextStore, || {
                self.store
                    .patch_project_status(project_id, outcome.project_status())
            })
            .await
    }

    fn settle(&self, project_id: &ProjectId, revision: u64) {
        self.settled
            .lock()
            .unwrap()
            .insert(project_id.clone(), revision);
    }

    async fn try_patch_status(&self, project_id: &ProjectId, status: ProjectStatus) {
        let result = self
            .resilience
            .call(Target::ContextStore, || {
                self.store.patch_project_status(project_id, status)
            })
            .await;
        if let Err(err) = result {
            tracing::warn!(error = %err, status = %status, "failed to patch project status");
        }
    }

    async fn absorb_read_error(&self, project_id: &ProjectId, err: ClientError) -> RunOutcome {
        if err.is_circuit_open() {
            metrics::counter!("recompute_deferred_total").increment(1);
            tracing::warn!(error = %err, "context store unavailable, deferring recomputation");
            return RunOutcome::Deferred;
        }
        metrics::counter!("recompute_failures_total").increment(1);
        tracing::error!(error = %err, "failed to read project");
        self.try_patch_status(project_id, ProjectStatus::Error).await;
        RunOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::{BreakerConfig, InMemoryContextStore, InMemoryErp, RetryPolicy};
    use common::Sku;
    use domain::BomLine;
    use std::time::Duration;

    fn fast_resilience() -> Arc<Resilience> {
        Arc::new(Resilience::new(
            RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
            },
            BreakerConfig::default(),
        ))
    }

    fn orchestrator(
        erp: &InMemoryErp,
        store: &InMemoryContextStore,
    ) -> Orchestrator<InMemoryErp, InMemoryContextStore> {
        let resilience = fast_resilience();
        let resolver = Resolver::new(
            Arc::new(erp.clone()),
            resilience.clone(),
            crate::resolver::ResolverConfig::default(),
        );
        Orchestrator::new(resolver, Arc::new(store.clone()), resilience)
    }

    fn seed_project(store: &InMemoryContextStore, id: &str, status: ProjectStatus) {
        store.put_project(Project {
            id: ProjectId::new(id),
            code: ProductCode::new("CTRL-PANEL-A1"),
            station: Some("ST-03".to_string()),
            status,
            revision: 1,
        });
    }

    fn seed_bom(erp: &InMemoryErp) {
        erp.put_bom(
            "CTRL-PANEL-A1",
            vec![BomLine {
                sku: Sku::new("SCH-REL-24V"),
                qty_per_unit: 4.0,
                product_code: ProductCode::new("CTRL-PANEL-A1"),
            }],
        );
    }

    #[tokio::test]
    async fn missing_project_is_skipped() {
        let erp = InMemoryErp::new();
        let store = InMemoryContextStore::new();
        let orchestrator = orchestrator(&erp, &store);

        let outcome = orchestrator
            .recompute(&RecomputeRequest::new("P-404", "CTRL-PANEL-A1"))
            .await;
        assert_eq!(outcome, RunOutcome::Skipped);
    }

    #[tokio::test]
    async fn non_requested_project_is_skipped() {
        let erp = InMemoryErp::new();
        let store = InMemoryContextStore::new();
        seed_project(&store, "P-1", ProjectStatus::Planning);
        seed_bom(&erp);
        let orchestrator = orchestrator(&erp, &store);

        let outcome = orchestrator
            .recompute(&RecomputeRequest::new("P-1", "CTRL-PANEL-A1"))
            .await;
        assert_eq!(outcome, RunOutcome::Skipped);
        assert!(store.reservation_for(&ProjectId::new("P-1")).is_none());
    }

    #[tokio::test]
    async fn settled_revision_drops_duplicate_trigger() {
        let erp = InMemoryErp::new();
        let store = InMemoryContextStore::new();
        seed_project(&store, "P-1", ProjectStatus::Requested);
        seed_bom(&erp);
        erp.put_stock("SCH-REL-24V", "Stock", 10.0);
        let orchestrator = orchestrator(&erp, &store);
        let request = RecomputeRequest::new("P-1", "CTRL-PANEL-A1");

        assert_eq!(
            orchestrator.recompute(&request).await,
            RunOutcome::Published(PublishedKind::Reservation)
        );

        // trigger source re-requests without a new revision: same content
        store.set_project_status(&ProjectId::new("P-1"), ProjectStatus::Requested);
        assert_eq!(orchestrator.recompute(&request).await, RunOutcome::Duplicate);
        assert_eq!(store.outcome_upsert_count(), 1);
    }

    #[tokio::test]
    async fn clear_settled_allows_forced_rerun() {
        let erp = InMemoryErp::new();
        let store = InMemoryContextStore::new();
        seed_project(&store, "P-1", ProjectStatus::Requested);
        seed_bom(&erp);
        erp.put_stock("SCH-REL-24V", "Stock", 10.0);
        let orchestrator = orchestrator(&erp, &store);
        let request = RecomputeRequest::new("P-1", "CTRL-PANEL-A1");

        orchestrator.recompute(&request).await;
        store.set_project_status(&ProjectId::new("P-1"), ProjectStatus::Requested);
        orchestrator.clear_settled(&ProjectId::new("P-1"));

        assert_eq!(
            orchestrator.recompute(&request).await,
            RunOutcome::Published(PublishedKind::Reservation)
        );
        assert_eq!(store.reservation_count(), 1);
        assert_eq!(store.outcome_upsert_count(), 2);
    }
}
