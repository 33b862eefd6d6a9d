//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Event reconciliation and registration lifecycle."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use r_ven_common::time::{Clock, SystemClock};
use r_ven_common::VenConfig;
use r_ven_msg::{
    EventBatch, Request, RequestPayload, ResponsePayload, ResponseStatus, Transport,
};
use tracing::{debug, info, warn};

use crate::error::{Result, VenError};
use crate::metrics::VenMetrics;
use crate::reconciler::EventReconciler;
use crate::reports::ReportSet;
use crate::scheduler::Scheduler;

/// Named stages of a single participant run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Init,
    Registering,
    Registered,
    Polling,
    Reporting,
    Cancelling,
    Cancelled,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Init => "init",
            LifecycleState::Registering => "registering",
            LifecycleState::Registered => "registered",
            LifecycleState::Polling => "polling",
            LifecycleState::Reporting => "reporting",
            LifecycleState::Cancelling => "cancelling",
            LifecycleState::Cancelled => "cancelled",
        }
    }

    /// Whether `to` directly follows `self`.
    pub fn can_transition_to(self, to: LifecycleState) -> bool {
        use LifecycleState::*;

        matches!(
            (self, to),
            (Init, Registering)
                | (Registering, Registered)
                | (Registered, Polling)
                | (Polling, Reporting)
                | (Reporting, Cancelling)
                | (Cancelling, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == LifecycleState::Cancelled
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and pacing for one lifecycle run.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub ven_name: String,
    pub ven_id: Option<String>,
    pub idle_delay: Duration,
}

impl LifecycleSettings {
    pub fn from_config(config: &VenConfig) -> Self {
        Self {
            ven_name: config.ven.ven_name.clone(),
            ven_id: config.ven.ven_id.clone(),
            idle_delay: config.lifecycle.idle_delay,
        }
    }
}

/// Identifiers issued by the coordinator on registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub ven_id: String,
    pub registration_id: Option<String>,
}

/// Outcome of a lifecycle run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSummary {
    pub final_state: LifecycleState,
    pub registration: Option<Registration>,
    pub events_received: usize,
    pub responses_sent: usize,
    pub reports_registered: usize,
    pub readings_sent: usize,
}

/// Drives registration, one poll, report registration and cancellation.
///
/// Requests are issued strictly one at a time. Transport failures and
/// negative registration or cancellation answers end the run and are returned
/// to the caller; nothing is retried here.
pub struct VenLifecycle {
    settings: LifecycleSettings,
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    reconciler: EventReconciler,
    reports: ReportSet,
    metrics: Option<VenMetrics>,
    state: LifecycleState,
    registration: Option<Registration>,
    events_received: usize,
    responses_sent: usize,
    reports_registered: usize,
    readings_sent: usize,
}

impl VenLifecycle {
    pub fn new(
        settings: LifecycleSettings,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
        reconciler: EventReconciler,
        reports: ReportSet,
    ) -> Self {
        Self {
            settings,
            transport,
            scheduler,
            clock: Arc::new(SystemClock),
            reconciler,
            reports,
            metrics: None,
            state: LifecycleState::Init,
            registration: None,
            events_received: 0,
            responses_sent: 0,
            reports_registered: 0,
            readings_sent: 0,
        }
    }

    pub fn with_metrics(mut self, metrics: VenMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Clock used to timestamp report readings.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }

    pub fn reconciler(&self) -> &EventReconciler {
        &self.reconciler
    }

    pub fn summary(&self) -> LifecycleSummary {
        LifecycleSummary {
            final_state: self.state,
            registration: self.registration.clone(),
            events_received: self.events_received,
            responses_sent: self.responses_sent,
            reports_registered: self.reports_registered,
            readings_sent: self.readings_sent,
        }
    }

    /// Run every step from `Init` through `Cancelled`.
    pub async fn run(&mut self) -> Result<LifecycleSummary> {
        info!(
            ven_name = %self.settings.ven_name,
            transport = self.transport.name(),
            idle_delay_secs = self.settings.idle_delay.as_secs(),
            "starting participant lifecycle"
        );
        self.register().await?;
        self.poll().await?;
        self.register_reports().await?;
        self.cancel().await?;
        let summary = self.summary();
        info!(
            state = %summary.final_state,
            events = summary.events_received,
            responses = summary.responses_sent,
            "participant lifecycle finished"
        );
        Ok(summary)
    }

    /// `Init -> Registering -> Registered`.
    pub async fn register(&mut self) -> Result<Registration> {
        self.advance(LifecycleState::Registering)?;
        let answer = self
            .submit(RequestPayload::CreatePartyRegistration {
                ven_name: self.settings.ven_name.clone(),
                ven_id: self.settings.ven_id.clone(),
            })
            .await?;

        let registration = match answer {
            Some(ResponsePayload::CreatedPartyRegistration {
                response,
                ven_id,
                registration_id,
            }) => {
                if !response.is_success() {
                    return Err(rejected("registration", &response));
                }
                Registration {
                    ven_id: ven_id
                        .or_else(|| self.settings.ven_id.clone())
                        .unwrap_or_else(|| self.settings.ven_name.clone()),
                    registration_id,
                }
            }
            other => return Err(unexpected("oadrCreatePartyRegistration", other.as_ref())),
        };

        info!(
            ven_id = %registration.ven_id,
            registration_id = registration.registration_id.as_deref().unwrap_or("none"),
            "registered with coordinator"
        );
        self.registration = Some(registration.clone());
        self.advance(LifecycleState::Registered)?;
        Ok(registration)
    }

    /// `Registered -> Polling`: request pending messages once and answer any
    /// distributed events. Returns the number of responses sent.
    pub async fn poll(&mut self) -> Result<usize> {
        self.idle_then_advance(LifecycleState::Polling).await?;
        let ven_id = self.ven_id();
        let answer = self
            .submit(RequestPayload::Poll {
                ven_id: ven_id.clone(),
            })
            .await?;

        match answer {
            Some(ResponsePayload::DistributeEvent(batch)) if batch.events.is_empty() => {
                debug!(request_id = %batch.request_id, "distribute message without events");
                Ok(0)
            }
            Some(ResponsePayload::DistributeEvent(batch)) => self.answer_batch(ven_id, batch).await,
            Some(ResponsePayload::Response(status)) => {
                debug!(response_code = status.response_code, "no pending messages");
                Ok(0)
            }
            Some(other) => {
                warn!(kind = other.kind(), "no handler implemented for polled message");
                Ok(0)
            }
            None => {
                debug!("poll returned nothing");
                Ok(0)
            }
        }
    }

    async fn answer_batch(&mut self, ven_id: String, batch: EventBatch) -> Result<usize> {
        self.events_received += batch.events.len();
        let event_responses = self.reconciler.reconcile(&batch).await;
        if event_responses.is_empty() {
            return Ok(0);
        }

        let count = event_responses.len();
        let answer = self
            .submit(RequestPayload::CreatedEvent {
                ven_id,
                response: ResponseStatus::ok(Some(batch.request_id.clone())),
                event_responses,
            })
            .await?;
        self.responses_sent += count;
        if let Some(metrics) = &self.metrics {
            metrics.record_responses(count);
        }

        match answer.as_ref().and_then(ResponsePayload::status) {
            Some(status) if !status.is_success() => warn!(
                response_code = status.response_code,
                description = %status.response_description,
                "coordinator did not accept event responses"
            ),
            _ => debug!(responses = count, "event responses acknowledged"),
        }
        Ok(count)
    }

    /// `Polling -> Reporting`: offer the report set and push one update for
    /// whatever the coordinator requests. Returns the number of readings sent.
    pub async fn register_reports(&mut self) -> Result<usize> {
        self.idle_then_advance(LifecycleState::Reporting).await?;
        let ven_id = self.ven_id();
        let answer = self
            .submit(RequestPayload::RegisterReport {
                ven_id: ven_id.clone(),
                reports: self.reports.descriptions(),
            })
            .await?;

        let requests = match answer {
            Some(ResponsePayload::RegisteredReport {
                response,
                report_requests,
            }) if response.is_success() => report_requests,
            Some(ResponsePayload::Response(response)) if response.is_success() => Vec::new(),
            Some(ResponsePayload::RegisteredReport { response, .. })
            | Some(ResponsePayload::Response(response)) => {
                warn!(
                    response_code = response.response_code,
                    description = %response.response_description,
                    "report registration was not accepted"
                );
                return Ok(0);
            }
            None => {
                warn!("report registration was not acknowledged");
                return Ok(0);
            }
            Some(other) => return Err(unexpected("oadrRegisterReport", Some(&other))),
        };
        self.reports_registered = self.reports.len();
        info!(
            offered = self.reports_registered,
            requested = requests.len(),
            "reports registered"
        );

        let readings = self.reports.sample_requested(&requests, self.clock.now());
        if readings.is_empty() {
            return Ok(0);
        }
        let count = readings.len();
        let answer = self
            .submit(RequestPayload::UpdateReport { ven_id, readings })
            .await?;
        self.readings_sent += count;
        if let Some(status) = answer.as_ref().and_then(ResponsePayload::status) {
            if !status.is_success() {
                warn!(
                    response_code = status.response_code,
                    "coordinator did not accept report update"
                );
            }
        }
        Ok(count)
    }

    /// `Reporting -> Cancelling -> Cancelled`.
    pub async fn cancel(&mut self) -> Result<()> {
        self.idle_then_advance(LifecycleState::Cancelling).await?;
        let answer = self
            .submit(RequestPayload::CancelPartyRegistration {
                ven_id: self.ven_id(),
                registration_id: self
                    .registration
                    .as_ref()
                    .and_then(|r| r.registration_id.clone()),
            })
            .await?;

        match answer {
            None => {}
            Some(ResponsePayload::CanceledPartyRegistration { response, .. })
            | Some(ResponsePayload::Response(response)) => {
                if !response.is_success() {
                    return Err(rejected("cancellation", &response));
                }
            }
            Some(other) => return Err(unexpected("oadrCancelPartyRegistration", Some(&other))),
        }
        self.advance(LifecycleState::Cancelled)
    }

    async fn submit(&self, payload: RequestPayload) -> Result<Option<ResponsePayload>> {
        let request = Request::new(payload);
        debug!(
            state = %self.state,
            kind = request.kind(),
            request_id = %request.request_id,
            "submitting request"
        );
        Ok(self.transport.submit(request).await?)
    }

    async fn idle_then_advance(&mut self, to: LifecycleState) -> Result<()> {
        self.check_transition(to)?;
        self.scheduler.sleep(self.settings.idle_delay).await;
        self.advance(to)
    }

    fn check_transition(&self, to: LifecycleState) -> Result<()> {
        if self.state.can_transition_to(to) {
            Ok(())
        } else {
            Err(VenError::InvalidTransition {
                from: self.state,
                to,
            })
        }
    }

    fn advance(&mut self, to: LifecycleState) -> Result<()> {
        self.check_transition(to)?;
        info!(from = %self.state, to = %to, "lifecycle state changed");
        self.state = to;
        if let Some(metrics) = &self.metrics {
            metrics.record_transition(to);
        }
        Ok(())
    }

    fn ven_id(&self) -> String {
        self.registration
            .as_ref()
            .map(|r| r.ven_id.clone())
            .or_else(|| self.settings.ven_id.clone())
            .unwrap_or_else(|| self.settings.ven_name.clone())
    }
}

fn rejected(step: &str, status: &ResponseStatus) -> VenError {
    VenError::Protocol(format!(
        "{step} rejected with code {}: {}",
        status.response_code, status.response_description
    ))
}

fn unexpected(request: &str, answer: Option<&ResponsePayload>) -> VenError {
    VenError::Protocol(format!(
        "unexpected answer to {request}: {}",
        answer.map(ResponsePayload::kind).unwrap_or("nothing")
    ))
}
