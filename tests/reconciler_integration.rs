//! ---
//! ems_section: "15-testing-qa-runbook"
//! ems_subsection: "integration-tests"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Integration and validation tests for the R-VEN stack."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use r_ven_core::EventReconciler;
use r_ven_msg::{
    ActivePeriod, Event, EventBatch, EventStatus, OptType, ResponseDescriptor, ResponseRequired,
};
use r_ven_testharness::{FixedClock, ScriptedHandler};

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
    ))
}

fn event(clock: &FixedClock, id: &str, revision: u32, status: &str) -> Event {
    use r_ven_common::Clock;

    let status = match status {
        "far" => EventStatus::Far,
        "near" => EventStatus::Near,
        "active" => EventStatus::Active,
        "completed" => EventStatus::Completed,
        _ => EventStatus::Cancelled,
    };
    Event::new(
        id,
        revision,
        status,
        ActivePeriod::new(clock.now() + chrono::Duration::minutes(30), Duration::from_secs(3600)),
    )
}

fn batch(request_id: &str, events: Vec<Event>) -> EventBatch {
    EventBatch {
        request_id: request_id.into(),
        vtn_id: Some("MyVTN".into()),
        events,
    }
}

#[tokio::test]
async fn single_far_event_produces_reference_response() {
    let clock = clock();
    let handler = Arc::new(ScriptedHandler::new(OptType::OptIn));
    let mut reconciler = EventReconciler::new(handler).with_clock(clock.clone());

    let responses = reconciler
        .reconcile(&batch("req-42", vec![event(&clock, "e1", 0, "far")]))
        .await;

    assert_eq!(
        responses,
        [ResponseDescriptor {
            event_id: "e1".into(),
            modification_number: 0,
            opt_type: OptType::OptIn,
            response_code: 200,
            response_description: "OK".into(),
            request_id: "req-42".into(),
        }]
    );
}

#[tokio::test]
async fn redelivery_is_idempotent_and_revisions_replace() {
    let clock = clock();
    let handler = Arc::new(
        ScriptedHandler::new(OptType::OptIn).on_update("e1", Some(OptType::OptOut)),
    );
    let mut reconciler = EventReconciler::new(handler.clone()).with_clock(clock.clone());

    let first = reconciler
        .reconcile(&batch("r1", vec![event(&clock, "e1", 0, "far")]))
        .await;
    let again = reconciler
        .reconcile(&batch("r2", vec![event(&clock, "e1", 0, "far")]))
        .await;
    assert_eq!(first[0].opt_type, again[0].opt_type);
    assert_eq!(handler.total_calls(), 1);

    let revised = reconciler
        .reconcile(&batch("r3", vec![event(&clock, "e1", 1, "near")]))
        .await;
    assert_eq!(revised[0].opt_type, OptType::OptOut);
    assert_eq!(reconciler.state().decision("e1"), Some(OptType::OptOut));
    assert_eq!(handler.on_update_calls(), [("e1".to_owned(), 1)]);
}

#[tokio::test]
async fn completed_event_is_forgotten_and_decided_afresh() {
    let clock = clock();
    let handler = Arc::new(ScriptedHandler::default());
    let mut reconciler = EventReconciler::new(handler.clone()).with_clock(clock.clone());

    reconciler
        .reconcile(&batch("r1", vec![event(&clock, "e1", 2, "completed")]))
        .await;
    reconciler
        .reconcile(&batch("r2", vec![event(&clock, "e1", 2, "completed")]))
        .await;

    assert_eq!(
        handler.on_event_calls(),
        [("e1".to_owned(), 2), ("e1".to_owned(), 2)]
    );
    assert!(reconciler.state().tracked_event("e1").is_none());
}

#[tokio::test]
async fn batch_without_required_responses_is_silent() {
    let clock = clock();
    let mut reconciler =
        EventReconciler::new(Arc::new(ScriptedHandler::default())).with_clock(clock.clone());

    let responses = reconciler
        .reconcile(&batch(
            "r1",
            vec![
                event(&clock, "e1", 0, "far").with_response_required(ResponseRequired::Never),
                event(&clock, "e2", 0, "near").with_response_required(ResponseRequired::Never),
            ],
        ))
        .await;

    assert!(responses.is_empty());
}

#[tokio::test]
async fn default_update_hook_resubmits_prior_decision() {
    let clock = clock();
    let handler = Arc::new(ScriptedHandler::new(OptType::OptOut));
    let mut reconciler = EventReconciler::new(handler.clone()).with_clock(clock.clone());

    reconciler
        .reconcile(&batch("r1", vec![event(&clock, "e1", 0, "far")]))
        .await;
    for revision in 1..=3 {
        let responses = reconciler
            .reconcile(&batch("rN", vec![event(&clock, "e1", revision, "far")]))
            .await;
        assert_eq!(responses[0].opt_type, OptType::OptOut);
        assert_eq!(responses[0].modification_number, revision);
    }
    assert_eq!(handler.on_event_calls().len(), 1);
}
