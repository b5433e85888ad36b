//! End-to-end tests for the recompute pipeline against in-memory clients.

use std::sync::Arc;
use std::time::Duration;

use client::{BreakerConfig, InMemoryContextStore, InMemoryErp, Resilience, RetryPolicy};
use common::{ProductCode, ProjectId, Sku};
use domain::{BomLine, Project, ProjectStatus};
use engine::{
    Orchestrator, PublishedKind, RecomputeRequest, Resolver, ResolverConfig, RunOutcome,
};

fn fast_resilience(max_retries: u32, failure_threshold: u32, cool_down: Duration) -> Arc<Resilience> {
    Arc::new(Resilience::new(
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        },
        BreakerConfig {
            failure_threshold,
            cool_down,
        },
    ))
}

fn build_orchestrator(
    erp: &InMemoryErp,
    store: &InMemoryContextStore,
    resilience: Arc<Resilience>,
) -> Arc<Orchestrator<InMemoryErp, InMemoryContextStore>> {
    let resolver = Resolver::new(
        Arc::new(erp.clone()),
        resilience.clone(),
        ResolverConfig::default(),
    );
    Arc::new(Orchestrator::new(
        resolver,
        Arc::new(store.clone()),
        resilience,
    ))
}

fn setup() -> (
    Arc<Orchestrator<InMemoryErp, InMemoryContextStore>>,
    InMemoryErp,
    InMemoryContextStore,
) {
    let erp = InMemoryErp::new();
    let store = InMemoryContextStore::new();
    let resilience = fast_resilience(3, 5, Duration::from_secs(60));
    let orchestrator = build_orchestrator(&erp, &store, resilience);
    (orchestrator, erp, store)
}

fn bom_line(sku: &str, qty: f64) -> BomLine {
    BomLine {
        sku: Sku::new(sku),
        qty_per_unit: qty,
        product_code: ProductCode::new("CTRL-PANEL-A1"),
    }
}

/// Seeds the control-panel BOM: 4 relays, 2 breakers.
fn seed_panel_bom(erp: &InMemoryErp) {
    erp.put_bom(
        "CTRL-PANEL-A1",
        vec![bom_line("SCH-REL-24V", 4.0), bom_line("ABB-MCB-10A", 2.0)],
    );
}

fn seed_requested_project(store: &InMemoryContextStore, id: &str) {
    store.put_project(Project {
        id: ProjectId::new(id),
        code: ProductCode::new("CTRL-PANEL-A1"),
        station: Some("ST-03".to_string()),
        status: ProjectStatus::Requested,
        revision: 1,
    });
}

fn panel_request(id: &str) -> RecomputeRequest {
    RecomputeRequest::new(id, "CTRL-PANEL-A1").with_station("ST-03")
}

#[tokio::test]
async fn sufficient_stock_publishes_reservation() {
    let (orchestrator, erp, store) = setup();
    seed_panel_bom(&erp);
    seed_requested_project(&store, "P-1");
    erp.put_stock("SCH-REL-24V", "Stock", 10.0);
    erp.put_stock("ABB-MCB-10A", "Stock", 5.0);

    let outcome = orchestrator.recompute(&panel_request("P-1")).await;

    assert_eq!(outcome, RunOutcome::Published(PublishedKind::Reservation));

    let project_id = ProjectId::new("P-1");
    let reservation = store.reservation_for(&project_id).unwrap();
    assert_eq!(reservation.id, "urn:mfg:Reservation:P-1");
    assert_eq!(reservation.lines.len(), 2);
    assert_eq!(reservation.lines[0].sku, Sku::new("SCH-REL-24V"));
    assert_eq!(reservation.lines[0].qty, 4.0);
    assert_eq!(reservation.lines[1].sku, Sku::new("ABB-MCB-10A"));
    assert_eq!(reservation.lines[1].qty, 2.0);

    assert!(store.shortage_for(&project_id).is_none());
    assert_eq!(store.project(&project_id).unwrap().status, ProjectStatus::Reserved);
}

#[tokio::test]
async fn insufficient_stock_publishes_shortage_with_missing_lines_only() {
    let (orchestrator, erp, store) = setup();
    seed_panel_bom(&erp);
    seed_requested_project(&store, "P-2");
    erp.put_stock("SCH-REL-24V", "Stock", 2.0);
    erp.put_stock("ABB-MCB-10A", "Stock", 5.0);

    let outcome = orchestrator.recompute(&panel_request("P-2")).await;

    assert_eq!(outcome, RunOutcome::Published(PublishedKind::Shortage));

    let project_id = ProjectId::new("P-2");
    let shortage = store.shortage_for(&project_id).unwrap();
    assert_eq!(shortage.lines.len(), 1);
    assert_eq!(shortage.lines[0].sku, Sku::new("SCH-REL-24V"));
    assert_eq!(shortage.lines[0].missing_qty, 2.0);

    assert!(store.reservation_for(&project_id).is_none());
    assert_eq!(store.project(&project_id).unwrap().status, ProjectStatus::Shortage);
}

#[tokio::test]
async fn unknown_product_sets_error_and_publishes_nothing() {
    let (orchestrator, _erp, store) = setup();
    seed_requested_project(&store, "P-3");

    let outcome = orchestrator.recompute(&panel_request("P-3")).await;

    assert_eq!(outcome, RunOutcome::Failed);

    let project_id = ProjectId::new("P-3");
    assert_eq!(store.project(&project_id).unwrap().status, ProjectStatus::Error);
    assert!(store.reservation_for(&project_id).is_none());
    assert!(store.shortage_for(&project_id).is_none());
    assert_eq!(store.outcome_upsert_count(), 0);
}

#[tokio::test]
async fn concurrent_triggers_for_same_revision_publish_once() {
    let (orchestrator, erp, store) = setup();
    seed_panel_bom(&erp);
    seed_requested_project(&store, "P-4");
    erp.put_stock("SCH-REL-24V", "Stock", 10.0);
    erp.put_stock("ABB-MCB-10A", "Stock", 5.0);
    // hold the ERP calls open so the second trigger lands mid-flight
    erp.set_delay(Duration::from_millis(50));

    let first = orchestrator.clone();
    let second = orchestrator.clone();
    let request_a = panel_request("P-4");
    let request_b = panel_request("P-4");

    let (outcome_a, outcome_b) = tokio::join!(
        async move { first.recompute(&request_a).await },
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            second.recompute(&request_b).await
        }
    );

    assert_eq!(outcome_a, RunOutcome::Published(PublishedKind::Reservation));
    assert_eq!(outcome_b, RunOutcome::Coalesced);
    assert_eq!(store.outcome_upsert_count(), 1);
    assert_eq!(store.reservation_count(), 1);
}

#[tokio::test]
async fn transient_erp_failures_within_budget_still_publish() {
    let (orchestrator, erp, store) = setup();
    seed_panel_bom(&erp);
    seed_requested_project(&store, "P-5");
    erp.put_stock("SCH-REL-24V", "Stock", 10.0);
    erp.put_stock("ABB-MCB-10A", "Stock", 5.0);
    erp.set_bom_failures(3);

    let outcome = orchestrator.recompute(&panel_request("P-5")).await;

    assert_eq!(outcome, RunOutcome::Published(PublishedKind::Reservation));
    let project_id = ProjectId::new("P-5");
    assert_eq!(store.project(&project_id).unwrap().status, ProjectStatus::Reserved);
    assert_eq!(erp.bom_call_count(), 4);
}

#[tokio::test]
async fn republishing_the_same_outcome_is_idempotent() {
    let (orchestrator, erp, store) = setup();
    seed_panel_bom(&erp);
    seed_requested_project(&store, "P-6");
    erp.put_stock("SCH-REL-24V", "Stock", 10.0);
    erp.put_stock("ABB-MCB-10A", "Stock", 5.0);

    let request = panel_request("P-6");
    orchestrator.recompute(&request).await;

    let project_id = ProjectId::new("P-6");
    let first = store.reservation_for(&project_id).unwrap();

    // force a second run over unchanged input
    store.set_project_status(&project_id, ProjectStatus::Requested);
    orchestrator.clear_settled(&project_id);
    let outcome = orchestrator.recompute(&request).await;

    assert_eq!(outcome, RunOutcome::Published(PublishedKind::Reservation));
    assert_eq!(store.reservation_count(), 1);
    let second = store.reservation_for(&project_id).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn kind_flip_deletes_the_counterpart_record() {
    let (orchestrator, erp, store) = setup();
    seed_panel_bom(&erp);
    seed_requested_project(&store, "P-7");
    erp.put_stock("SCH-REL-24V", "Stock", 2.0);
    erp.put_stock("ABB-MCB-10A", "Stock", 5.0);

    let request = panel_request("P-7");
    orchestrator.recompute(&request).await;

    let project_id = ProjectId::new("P-7");
    assert!(store.shortage_for(&project_id).is_some());

    // stock arrives, the trigger source re-requests with a new revision
    erp.set_stock("SCH-REL-24V", "Stock", 10.0);
    store.bump_revision(&project_id);
    store.set_project_status(&project_id, ProjectStatus::Requested);

    let outcome = orchestrator.recompute(&request).await;

    assert_eq!(outcome, RunOutcome::Published(PublishedKind::Reservation));
    assert!(store.reservation_for(&project_id).is_some());
    assert!(store.shortage_for(&project_id).is_none());
    assert_eq!(store.project(&project_id).unwrap().status, ProjectStatus::Reserved);
}

#[tokio::test]
async fn revision_change_mid_flight_discards_and_recomputes() {
    let (orchestrator, erp, store) = setup();
    seed_panel_bom(&erp);
    seed_requested_project(&store, "P-8");
    erp.put_stock("SCH-REL-24V", "Stock", 10.0);
    erp.put_stock("ABB-MCB-10A", "Stock", 5.0);
    erp.set_delay(Duration::from_millis(50));

    let runner = orchestrator.clone();
    let handle = tokio::spawn(async move { runner.recompute(&panel_request("P-8")).await });

    // revise the project while the resolve is in flight
    tokio::time::sleep(Duration::from_millis(20)).await;
    let project_id = ProjectId::new("P-8");
    store.bump_revision(&project_id);

    let outcome = handle.await.unwrap();

    // the stale attempt was discarded before publishing; only the rerun wrote
    assert_eq!(outcome, RunOutcome::Published(PublishedKind::Reservation));
    assert_eq!(store.outcome_upsert_count(), 1);
    assert_eq!(store.project(&project_id).unwrap().status, ProjectStatus::Reserved);

    // the settled revision is the post-bump one, so replaying it is a no-op
    store.set_project_status(&project_id, ProjectStatus::Requested);
    assert_eq!(
        orchestrator.recompute(&panel_request("P-8")).await,
        RunOutcome::Duplicate
    );
}

#[tokio::test]
async fn open_circuit_defers_instead_of_erroring() {
    let erp = InMemoryErp::new();
    let store = InMemoryContextStore::new();
    // no retries, breaker trips on the first failure, short cool-down
    let resilience = fast_resilience(0, 1, Duration::from_millis(50));
    let orchestrator = build_orchestrator(&erp, &store, resilience);

    seed_panel_bom(&erp);
    seed_requested_project(&store, "P-9");
    erp.put_stock("SCH-REL-24V", "Stock", 10.0);
    erp.put_stock("ABB-MCB-10A", "Stock", 5.0);
    erp.set_bom_failures(1);

    let project_id = ProjectId::new("P-9");
    let request = panel_request("P-9");

    // first run exhausts the (zero) retry budget and trips the ERP breaker
    assert_eq!(orchestrator.recompute(&request).await, RunOutcome::Failed);
    assert_eq!(store.project(&project_id).unwrap().status, ProjectStatus::Error);

    // new revision arrives while the breaker is open: deferred, not error
    store.bump_revision(&project_id);
    store.set_project_status(&project_id, ProjectStatus::Requested);
    assert_eq!(orchestrator.recompute(&request).await, RunOutcome::Deferred);
    assert_ne!(store.project(&project_id).unwrap().status, ProjectStatus::Error);
    assert!(store.reservation_for(&project_id).is_none());

    // after the cool-down the half-open probe succeeds and the run completes
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(
        orchestrator.recompute(&request).await,
        RunOutcome::Published(PublishedKind::Reservation)
    );
    assert_eq!(store.project(&project_id).unwrap().status, ProjectStatus::Reserved);
}

#[tokio::test]
async fn trigger_recompute_returns_immediately_and_completes_async() {
    let (orchestrator, erp, store) = setup();
    seed_panel_bom(&erp);
    seed_requested_project(&store, "P-10");
    erp.put_stock("SCH-REL-24V", "Stock", 10.0);
    erp.put_stock("ABB-MCB-10A", "Stock", 5.0);

    orchestrator.trigger_recompute(panel_request("P-10"));

    let project_id = ProjectId::new("P-10");
    // poll briefly; the spawned pipeline finishes well within this window
    for _ in 0..50 {
        if store.reservation_for(&project_id).is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(store.reservation_for(&project_id).is_some());
    assert_eq!(store.project(&project_id).unwrap().status, ProjectStatus::Reserved);
}

#[tokio::test]
async fn context_store_read_failure_past_budget_marks_error() {
    let (orchestrator, erp, store) = setup();
    seed_panel_bom(&erp);
    seed_requested_project(&store, "P-11");
    erp.put_stock("SCH-REL-24V", "Stock", 10.0);
    erp.put_stock("ABB-MCB-10A", "Stock", 5.0);
    // more read failures than the retry budget of 3 can absorb
    store.set_read_failures(5);

    let outcome = orchestrator.recompute(&panel_request("P-11")).await;

    assert_eq!(outcome, RunOutcome::Failed);
    assert_eq!(
        store.project(&ProjectId::new("P-11")).unwrap().status,
        ProjectStatus::Error
    );
    assert_eq!(store.outcome_upsert_count(), 0);
}
