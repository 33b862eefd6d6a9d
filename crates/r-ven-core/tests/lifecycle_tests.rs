//! ---
//! ems_section: "12-testing"
//! ems_subsection: "integration"
//! ems_type: "test"
//! ems_scope: "code"
//! ems_description: "Lifecycle transitions driven through an in-memory transport."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use r_ven_core::{
    EventReconciler, LifecycleSettings, LifecycleState, ReportSet, ReportSpecification, Scheduler,
    StaticDecision, VenError, VenLifecycle,
};
use r_ven_msg::{
    ActivePeriod, Event, EventBatch, EventStatus, InMemoryTransport, OptType, ReportRequest,
    RequestPayload, ResponsePayload, ResponseStatus,
};

#[derive(Default)]
struct DelayLog(Mutex<Vec<Duration>>);

#[async_trait]
impl Scheduler for DelayLog {
    async fn sleep(&self, duration: Duration) {
        self.0.lock().push(duration);
    }
}

fn settings() -> LifecycleSettings {
    LifecycleSettings {
        ven_name: "ven123".into(),
        ven_id: None,
        idle_delay: Duration::from_secs(60),
    }
}

fn reports() -> ReportSet {
    let mut set = ReportSet::new();
    set.add_report(ReportSpecification::new(
        "CurrentReport",
        "Device001",
        "current",
        "A",
        Arc::new(|| 12.5),
    ));
    set.add_report(ReportSpecification::new(
        "VoltageReport",
        "Device001",
        "voltage",
        "V",
        Arc::new(|| 230.0),
    ));
    set
}

fn lifecycle(transport: &InMemoryTransport, scheduler: Arc<DelayLog>) -> VenLifecycle {
    VenLifecycle::new(
        settings(),
        Arc::new(transport.clone()),
        scheduler,
        EventReconciler::new(Arc::new(StaticDecision(OptType::OptIn))),
        reports(),
    )
}

fn registered() -> ResponsePayload {
    ResponsePayload::CreatedPartyRegistration {
        response: ResponseStatus::ok(None),
        ven_id: Some("ven-assigned".into()),
        registration_id: Some("reg_id_123".into()),
    }
}

fn distribute(event_id: &str) -> ResponsePayload {
    let event = Event::new(
        event_id,
        0,
        EventStatus::Far,
        ActivePeriod::new(Utc::now() + chrono::Duration::minutes(5), Duration::from_secs(600)),
    );
    ResponsePayload::DistributeEvent(EventBatch {
        request_id: "dist-1".into(),
        vtn_id: Some("MyVTN".into()),
        events: vec![event],
    })
}

fn ack() -> Option<ResponsePayload> {
    Some(ResponsePayload::Response(ResponseStatus::ok(None)))
}

#[tokio::test]
async fn full_run_walks_every_state_in_order() {
    let transport = InMemoryTransport::new();
    transport.push_reply(Some(registered()));
    transport.push_reply(Some(distribute("event001")));
    transport.push_reply(ack());
    transport.push_reply(Some(ResponsePayload::RegisteredReport {
        response: ResponseStatus::ok(None),
        report_requests: vec![ReportRequest {
            report_specifier_id: "VoltageReport".into(),
            resource_id: "Device001".into(),
            measurement: "voltage".into(),
        }],
    }));
    transport.push_reply(Some(ResponsePayload::UpdatedReport {
        response: ResponseStatus::ok(None),
    }));
    transport.push_reply(Some(ResponsePayload::CanceledPartyRegistration {
        response: ResponseStatus::ok(None),
        registration_id: Some("reg_id_123".into()),
    }));
    let scheduler = Arc::new(DelayLog::default());

    let mut lifecycle = lifecycle(&transport, scheduler.clone());
    let summary = lifecycle.run().await.expect("lifecycle completes");

    assert_eq!(summary.final_state, LifecycleState::Cancelled);
    assert_eq!(summary.events_received, 1);
    assert_eq!(summary.responses_sent, 1);
    assert_eq!(summary.reports_registered, 2);
    assert_eq!(summary.readings_sent, 1);
    assert_eq!(*scheduler.0.lock(), vec![Duration::from_secs(60); 3]);

    let kinds: Vec<_> = transport.sent().iter().map(|r| r.kind()).collect();
    assert_eq!(
        kinds,
        [
            "oadrCreatePartyRegistration",
            "oadrPoll",
            "oadrCreatedEvent",
            "oadrRegisterReport",
            "oadrUpdateReport",
            "oadrCancelPartyRegistration"
        ]
    );

    let sent = transport.sent();
    match &sent[2].payload {
        RequestPayload::CreatedEvent {
            ven_id,
            response,
            event_responses,
        } => {
            assert_eq!(ven_id, "ven-assigned");
            assert_eq!(response.request_id.as_deref(), Some("dist-1"));
            assert_eq!(event_responses.len(), 1);
            assert_eq!(event_responses[0].event_id, "event001");
            assert_eq!(event_responses[0].opt_type, OptType::OptIn);
        }
        other => panic!("unexpected request {other:?}"),
    }
    match &sent[4].payload {
        RequestPayload::UpdateReport { readings, .. } => {
            assert_eq!(readings.len(), 1);
            assert_eq!(readings[0].value, 230.0);
        }
        other => panic!("unexpected request {other:?}"),
    }
    match &sent[5].payload {
        RequestPayload::CancelPartyRegistration {
            registration_id, ..
        } => assert_eq!(registration_id.as_deref(), Some("reg_id_123")),
        other => panic!("unexpected request {other:?}"),
    }
}

#[tokio::test]
async fn rejected_registration_is_fatal() {
    let transport = InMemoryTransport::new();
    transport.push_reply(Some(ResponsePayload::CreatedPartyRegistration {
        response: ResponseStatus::error(452, "Invalid ID"),
        ven_id: None,
        registration_id: None,
    }));
    let mut lifecycle = lifecycle(&transport, Arc::new(DelayLog::default()));

    let err = lifecycle.run().await.expect_err("registration rejected");
    assert!(matches!(err, VenError::Protocol(ref message) if message.contains("452")));
    assert_eq!(lifecycle.state(), LifecycleState::Registering);
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn transport_failure_during_poll_stops_the_run() {
    let transport = InMemoryTransport::new();
    transport.push_reply(Some(registered()));
    transport.push_failure("connection refused");
    let mut lifecycle = lifecycle(&transport, Arc::new(DelayLog::default()));

    let err = lifecycle.run().await.expect_err("poll fails");
    assert!(matches!(err, VenError::Transport(_)));
    assert_eq!(lifecycle.state(), LifecycleState::Polling);
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn empty_poll_sends_no_event_responses() {
    let transport = InMemoryTransport::new();
    transport.push_reply(Some(registered()));
    transport.push_reply(None);
    let mut lifecycle = lifecycle(&transport, Arc::new(DelayLog::default()));

    lifecycle.register().await.unwrap();
    let sent = lifecycle.poll().await.unwrap();

    assert_eq!(sent, 0);
    assert_eq!(lifecycle.state(), LifecycleState::Polling);
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn steps_out_of_order_are_rejected() {
    let transport = InMemoryTransport::new();
    let scheduler = Arc::new(DelayLog::default());
    let mut lifecycle = lifecycle(&transport, scheduler.clone());

    let err = lifecycle.poll().await.expect_err("poll before registration");
    assert!(matches!(
        err,
        VenError::InvalidTransition {
            from: LifecycleState::Init,
            to: LifecycleState::Polling
        }
    ));
    assert!(transport.sent().is_empty());
    assert!(scheduler.0.lock().is_empty());
}

#[tokio::test]
async fn unacknowledged_report_registration_continues_to_cancel() {
    let transport = InMemoryTransport::new();
    transport.push_reply(Some(registered()));
    transport.push_reply(None);
    transport.push_reply(Some(ResponsePayload::RegisteredReport {
        response: ResponseStatus::error(500, "busy"),
        report_requests: Vec::new(),
    }));
    transport.push_reply(None);
    let mut lifecycle = lifecycle(&transport, Arc::new(DelayLog::default()));

    let summary = lifecycle.run().await.expect("lifecycle completes");
    assert_eq!(summary.final_state, LifecycleState::Cancelled);
    assert_eq!(summary.reports_registered, 0);
    assert_eq!(summary.readings_sent, 0);
}

#[tokio::test]
async fn negative_cancellation_is_surfaced() {
    let transport = InMemoryTransport::new();
    transport.push_reply(Some(registered()));
    transport.push_reply(None);
    transport.push_reply(ack());
    transport.push_reply(Some(ResponsePayload::CanceledPartyRegistration {
        response: ResponseStatus::error(463, "not registered"),
        registration_id: None,
    }));
    let mut lifecycle = lifecycle(&transport, Arc::new(DelayLog::default()));

    let err = lifecycle.run().await.expect_err("cancellation rejected");
    assert!(matches!(err, VenError::Protocol(_)));
    assert_eq!(lifecycle.state(), LifecycleState::Cancelling);
}
