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
use prometheus::Registry;
use r_ven_common::{Clock, VenConfig};
use r_ven_core::{
    render_metrics, EventReconciler, LifecycleSettings, LifecycleState, ReportSet, VenError,
    VenLifecycle, VenMetrics,
};
use r_ven_msg::{ActivePeriod, Event, EventStatus, OptType, Service};
use r_ven_testharness::{FixedClock, RecordingScheduler, ScriptedHandler, SimulatedVtn};

struct Rig {
    vtn: SimulatedVtn,
    scheduler: Arc<RecordingScheduler>,
    clock: Arc<FixedClock>,
    handler: Arc<ScriptedHandler>,
}

impl Rig {
    fn new(handler: ScriptedHandler) -> Self {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
        ));
        Self {
            vtn: SimulatedVtn::default().with_clock(clock.clone()),
            scheduler: Arc::new(RecordingScheduler::with_clock(clock.clone())),
            clock,
            handler: Arc::new(handler),
        }
    }

    fn lifecycle(&self, config: &VenConfig) -> VenLifecycle {
        let reconciler = EventReconciler::new(self.handler.clone()).with_clock(self.clock.clone());
        VenLifecycle::new(
            LifecycleSettings::from_config(config),
            Arc::new(self.vtn.clone()),
            self.scheduler.clone(),
            reconciler,
            ReportSet::from_config(&config.reports),
        )
        .with_clock(self.clock.clone())
    }
}

#[tokio::test]
async fn default_participant_completes_against_simulated_coordinator() {
    let rig = Rig::new(ScriptedHandler::default());
    let config = VenConfig::default();
    let mut lifecycle = rig.lifecycle(&config);

    let summary = lifecycle.run().await.expect("lifecycle completes");

    assert_eq!(summary.final_state, LifecycleState::Cancelled);
    let registration = summary.registration.expect("registered");
    assert_eq!(registration.ven_id, "ven123");
    assert_eq!(registration.registration_id.as_deref(), Some("reg_id_123"));
    assert_eq!(summary.events_received, 1);
    assert_eq!(summary.responses_sent, 1);
    assert_eq!(summary.reports_registered, 4);
    assert_eq!(summary.readings_sent, 4);
    assert_eq!(rig.scheduler.delays(), vec![Duration::from_secs(60); 3]);
    assert_eq!(
        rig.vtn.request_kinds(),
        [
            "oadrCreatePartyRegistration",
            "oadrPoll",
            "oadrCreatedEvent",
            "oadrRegisterReport",
            "oadrUpdateReport",
            "oadrCancelPartyRegistration"
        ]
    );

    let responses = rig.vtn.event_responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].event_id, "event001");
    assert_eq!(responses[0].opt_type, OptType::OptIn);

    let readings = rig.vtn.readings();
    assert!(readings.iter().all(|r| (0.0..100.0).contains(&r.value)));
    // sampled after the poll and report idle delays
    let sampled_at = Utc.with_ymd_and_hms(2026, 6, 1, 8, 2, 0).unwrap();
    assert_eq!(readings[0].timestamp, sampled_at);
}

#[tokio::test]
async fn unknown_participant_is_refused_and_run_stops() {
    let rig = Rig::new(ScriptedHandler::default());
    let mut config = VenConfig::default();
    config.ven.ven_name = "ven999".into();
    let mut lifecycle = rig.lifecycle(&config);

    let err = lifecycle.run().await.expect_err("registration refused");

    assert!(matches!(err, VenError::Protocol(_)));
    assert_eq!(lifecycle.state(), LifecycleState::Registering);
    assert_eq!(rig.vtn.request_kinds(), ["oadrCreatePartyRegistration"]);
    assert!(rig.scheduler.delays().is_empty());
}

#[tokio::test]
async fn poll_failure_is_propagated_without_retry() {
    let rig = Rig::new(ScriptedHandler::default());
    rig.vtn.fail_next(Service::OadrPoll, "connection reset by peer");
    let mut lifecycle = rig.lifecycle(&VenConfig::default());

    let err = lifecycle.run().await.expect_err("poll fails");

    assert!(matches!(err, VenError::Transport(_)));
    assert_eq!(lifecycle.state(), LifecycleState::Polling);
    assert_eq!(
        rig.vtn.request_kinds(),
        ["oadrCreatePartyRegistration", "oadrPoll"]
    );
}

#[tokio::test]
async fn failing_hook_opts_out_every_polled_event() {
    let rig = Rig::new(ScriptedHandler::new(OptType::OptIn).fail_on("b"));
    let start = rig.clock.now() + chrono::Duration::hours(1);
    let period = ActivePeriod::new(start, Duration::from_secs(900));
    rig.vtn.distribute(vec![
        Event::new("a", 0, EventStatus::Far, period.clone()),
        Event::new("b", 0, EventStatus::Far, period.clone()),
        Event::new("c", 0, EventStatus::Far, period),
    ]);
    let mut lifecycle = rig.lifecycle(&VenConfig::default());

    let summary = lifecycle.run().await.expect("hook failure is not fatal");

    assert_eq!(summary.final_state, LifecycleState::Cancelled);
    let decisions: Vec<_> = rig
        .vtn
        .event_responses()
        .into_iter()
        .map(|r| (r.event_id, r.opt_type))
        .collect();
    assert_eq!(
        decisions,
        [
            ("a".to_owned(), OptType::OptOut),
            ("b".to_owned(), OptType::OptOut),
            ("c".to_owned(), OptType::OptOut)
        ]
    );
}

#[tokio::test]
async fn events_lapsing_before_the_poll_are_not_answered() {
    let rig = Rig::new(ScriptedHandler::default());
    // Ends 30s after the start instant; the idle delay before polling is 60s.
    let period = ActivePeriod::new(rig.clock.now(), Duration::from_secs(30));
    rig.vtn
        .distribute(vec![Event::new("short", 0, EventStatus::Active, period)]);
    let mut lifecycle = rig.lifecycle(&VenConfig::default());

    let summary = lifecycle.run().await.expect("lifecycle completes");

    assert_eq!(summary.events_received, 1);
    assert_eq!(summary.responses_sent, 0);
    assert!(!rig.vtn.request_kinds().contains(&"oadrCreatedEvent"));
    assert_eq!(rig.handler.on_event_calls().len(), 1);
}

#[tokio::test]
async fn empty_poll_skips_event_responses() {
    let rig = Rig::new(ScriptedHandler::default());
    rig.vtn.push_poll(None);
    let mut lifecycle = rig.lifecycle(&VenConfig::default());

    let summary = lifecycle.run().await.expect("lifecycle completes");

    assert_eq!(summary.events_received, 0);
    assert_eq!(rig.handler.total_calls(), 0);
    assert_eq!(rig.vtn.request_kinds().len(), 5);
}

#[tokio::test]
async fn metrics_track_decisions_and_transitions() {
    let rig = Rig::new(ScriptedHandler::new(OptType::OptOut));
    let registry = Registry::new();
    let metrics = VenMetrics::register(&registry).unwrap();
    let config = VenConfig::default();
    let reconciler = EventReconciler::new(rig.handler.clone())
        .with_clock(rig.clock.clone())
        .with_metrics(metrics.clone());
    let mut lifecycle = VenLifecycle::new(
        LifecycleSettings::from_config(&config),
        Arc::new(rig.vtn.clone()),
        rig.scheduler.clone(),
        reconciler,
        ReportSet::from_config(&config.reports),
    )
    .with_metrics(metrics);

    lifecycle.run().await.expect("lifecycle completes");

    let text = render_metrics(&registry).unwrap();
    assert!(text.contains("ven_event_decisions_total{opt_type=\"optOut\"} 1"));
    assert!(text.contains("ven_event_responses_total 1"));
    assert!(text.contains("ven_lifecycle_transitions_total{state=\"cancelled\"} 1"));
    assert!(text.contains("ven_lifecycle_transitions_total{state=\"polling\"} 1"));
}
