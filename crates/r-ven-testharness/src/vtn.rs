//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "01-bootstrap"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Test harness for the participant runtime and shared exports."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use r_ven_common::{Clock, SystemClock};
use r_ven_msg::{
    log_request, log_response, ActivePeriod, Event, EventBatch, EventSignal, EventStatus,
    ReportReading, ReportRequest, Request, RequestPayload, ResponseDescriptor, ResponsePayload,
    ResponseStatus, Service, SignalInterval, Transport, TransportError,
};
use tracing::info;

/// Behaviour of the simulated coordinator.
#[derive(Debug, Clone)]
pub struct VtnSettings {
    pub vtn_id: String,
    /// Only this participant name may register.
    pub accepted_ven_name: String,
    pub assigned_ven_id: String,
    pub registration_id: String,
    pub market_context: String,
}

impl Default for VtnSettings {
    fn default() -> Self {
        Self {
            vtn_id: "MyVTN".into(),
            accepted_ven_name: "ven123".into(),
            assigned_ven_id: "ven123".into(),
            registration_id: "reg_id_123".into(),
            market_context: "http://marketcontext01".into(),
        }
    }
}

#[derive(Default)]
struct VtnState {
    requests: Vec<Request>,
    poll_script: VecDeque<Option<ResponsePayload>>,
    failures: HashMap<Service, VecDeque<String>>,
}

/// In-process coordinator implementing [`Transport`].
///
/// Polls are answered from a scripted queue; once it is empty every poll
/// distributes the single `event001` demo event.
#[derive(Clone)]
pub struct SimulatedVtn {
    settings: VtnSettings,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<VtnState>>,
}

/// Failure reported when the simulated coordinator rejects a registration.
pub const INVALID_ID_CODE: u16 = 452;

impl SimulatedVtn {
    pub fn new(settings: VtnSettings) -> Self {
        Self {
            settings,
            clock: Arc::new(SystemClock),
            state: Arc::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &VtnSettings {
        &self.settings
    }

    /// Queue the answer for the next poll.
    pub fn push_poll(&self, reply: Option<ResponsePayload>) {
        self.state.lock().poll_script.push_back(reply);
    }

    /// Queue a batch to be distributed on the next poll.
    pub fn distribute(&self, events: Vec<Event>) -> String {
        let mut batch = EventBatch::new(events);
        batch.vtn_id = Some(self.settings.vtn_id.clone());
        let request_id = batch.request_id.clone();
        self.push_poll(Some(ResponsePayload::DistributeEvent(batch)));
        request_id
    }

    /// Make the next request routed to `service` fail at the transport level.
    pub fn fail_next(&self, service: Service, reason: impl Into<String>) {
        self.state
            .lock()
            .failures
            .entry(service)
            .or_default()
            .push_back(reason.into());
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().requests.clone()
    }

    pub fn request_kinds(&self) -> Vec<&'static str> {
        self.state.lock().requests.iter().map(Request::kind).collect()
    }

    /// Every event response received, in submission order.
    pub fn event_responses(&self) -> Vec<ResponseDescriptor> {
        self.state
            .lock()
            .requests
            .iter()
            .filter_map(|request| match &request.payload {
                RequestPayload::CreatedEvent {
                    event_responses, ..
                } => Some(event_responses.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Every report reading received, in submission order.
    pub fn readings(&self) -> Vec<ReportReading> {
        self.state
            .lock()
            .requests
            .iter()
            .filter_map(|request| match &request.payload {
                RequestPayload::UpdateReport { readings, .. } => Some(readings.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// The demo event distributed when no poll answer is scripted.
    pub fn demo_event(&self) -> Event {
        let now = self.clock.now();
        let duration = Duration::from_secs(10 * 60);
        Event::new("event001", 0, EventStatus::Far, ActivePeriod::new(now, duration))
            .with_market_context(self.settings.market_context.clone())
            .with_signal(EventSignal {
                signal_id: "signal001".into(),
                signal_name: "simple".into(),
                signal_type: "level".into(),
                intervals: vec![SignalInterval {
                    dtstart: now,
                    duration,
                    payload: 1.0,
                }],
            })
    }

    fn answer(&self, request: &Request) -> Option<ResponsePayload> {
        match &request.payload {
            RequestPayload::CreatePartyRegistration { ven_name, .. } => {
                if *ven_name == self.settings.accepted_ven_name {
                    info!(ven_name = %ven_name, "simulated coordinator accepted registration");
                    Some(ResponsePayload::CreatedPartyRegistration {
                        response: ResponseStatus::ok(Some(request.request_id.clone())),
                        ven_id: Some(self.settings.assigned_ven_id.clone()),
                        registration_id: Some(self.settings.registration_id.clone()),
                    })
                } else {
                    info!(ven_name = %ven_name, "simulated coordinator refused registration");
                    Some(ResponsePayload::CreatedPartyRegistration {
                        response: ResponseStatus::error(INVALID_ID_CODE, "Invalid ID"),
                        ven_id: None,
                        registration_id: None,
                    })
                }
            }
            RequestPayload::Poll { .. } => {
                let scripted = self.state.lock().poll_script.pop_front();
                match scripted {
                    Some(reply) => reply,
                    None => {
                        let mut batch = EventBatch::new(vec![self.demo_event()]);
                        batch.vtn_id = Some(self.settings.vtn_id.clone());
                        Some(ResponsePayload::DistributeEvent(batch))
                    }
                }
            }
            RequestPayload::CreatedEvent {
                ven_id,
                event_responses,
                ..
            } => {
                for response in event_responses {
                    info!(
                        ven_id = %ven_id,
                        event_id = %response.event_id,
                        opt_type = %response.opt_type,
                        "participant responded to event"
                    );
                }
                Some(ResponsePayload::Response(ResponseStatus::ok(Some(
                    request.request_id.clone(),
                ))))
            }
            RequestPayload::RegisterReport { reports, .. } => {
                let report_requests = reports
                    .iter()
                    .map(|report| ReportRequest {
                        report_specifier_id: report.report_specifier_id.clone(),
                        resource_id: report.resource_id.clone(),
                        measurement: report.measurement.clone(),
                    })
                    .collect();
                Some(ResponsePayload::RegisteredReport {
                    response: ResponseStatus::ok(Some(request.request_id.clone())),
                    report_requests,
                })
            }
            RequestPayload::UpdateReport { ven_id, readings } => {
                for reading in readings {
                    info!(
                        ven_id = %ven_id,
                        resource_id = %reading.resource_id,
                        measurement = %reading.measurement,
                        value = reading.value,
                        "participant reported"
                    );
                }
                Some(ResponsePayload::UpdatedReport {
                    response: ResponseStatus::ok(Some(request.request_id.clone())),
                })
            }
            RequestPayload::CancelPartyRegistration {
                registration_id, ..
            } => Some(ResponsePayload::CanceledPartyRegistration {
                response: ResponseStatus::ok(Some(request.request_id.clone())),
                registration_id: registration_id.clone(),
            }),
        }
    }
}

impl Default for SimulatedVtn {
    fn default() -> Self {
        Self::new(VtnSettings::default())
    }
}

#[async_trait]
impl Transport for SimulatedVtn {
    async fn submit(&self, request: Request) -> r_ven_msg::Result<Option<ResponsePayload>> {
        log_request(self.name(), &request);
        let service = request.service();
        let failure = {
            let mut state = self.state.lock();
            state.requests.push(request.clone());
            state
                .failures
                .get_mut(&service)
                .and_then(VecDeque::pop_front)
        };
        if let Some(reason) = failure {
            return Err(TransportError::Unreachable {
                service: service.path(),
                reason,
            });
        }
        let answer = self.answer(&request);
        log_response(self.name(), &request, answer.as_ref());
        Ok(answer)
    }

    fn name(&self) -> &'static str {
        "simulated_vtn"
    }
}
