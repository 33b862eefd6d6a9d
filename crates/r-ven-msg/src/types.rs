//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Demand-response message model and collaborator contracts."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use uuid::Uuid;

/// Response code carried by successful acknowledgements.
pub const RESPONSE_OK: u16 = 200;

/// Description paired with [`RESPONSE_OK`].
pub const RESPONSE_OK_DESCRIPTION: &str = "OK";

/// Lifecycle status of a dispatched event as announced by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Scheduled well into the future.
    Far,
    /// Starting soon (inside the ramp-up window).
    Near,
    /// Currently in effect.
    Active,
    /// Finished.
    Completed,
    /// Withdrawn by the coordinator.
    Cancelled,
}

impl EventStatus {
    /// Whether the event no longer needs tracking.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Cancelled)
    }

    /// Wire label of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Far => "far",
            EventStatus::Near => "near",
            EventStatus::Active => "active",
            EventStatus::Completed => "completed",
            EventStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the coordinator expects an opt response for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseRequired {
    /// A created-event response must be sent.
    #[default]
    Always,
    /// The participant must not respond.
    Never,
}

/// Accept/decline decision for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptType {
    /// Participate in the event.
    #[serde(rename = "optIn")]
    OptIn,
    /// Decline the event.
    #[serde(rename = "optOut")]
    OptOut,
}

impl OptType {
    /// Wire label of the decision.
    pub fn as_str(self) -> &'static str {
        match self {
            OptType::OptIn => "optIn",
            OptType::OptOut => "optOut",
        }
    }
}

impl fmt::Display for OptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window during which an event is in effect.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivePeriod {
    /// Start of the event.
    pub dtstart: DateTime<Utc>,
    /// Length of the event.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub duration: Duration,
    /// Optional lead time before `dtstart` during which the event is `near`.
    #[serde(default)]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub ramp_up: Option<Duration>,
}

impl ActivePeriod {
    /// Construct an active period without ramp-up.
    pub fn new(dtstart: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            dtstart,
            duration,
            ramp_up: None,
        }
    }

    /// Attach a ramp-up window.
    pub fn with_ramp_up(mut self, ramp_up: Duration) -> Self {
        self.ramp_up = Some(ramp_up);
        self
    }

    /// End of the active window.
    pub fn end(&self) -> DateTime<Utc> {
        chrono_duration(self.duration)
            .and_then(|duration| self.dtstart.checked_add_signed(duration))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Status implied by the schedule alone at `now`.
    pub fn status_at(&self, now: DateTime<Utc>) -> EventStatus {
        if now >= self.end() {
            return EventStatus::Completed;
        }
        if now >= self.dtstart {
            return EventStatus::Active;
        }
        if let Some(ramp_up) = self.ramp_up {
            let ramp_start = chrono_duration(ramp_up)
                .and_then(|ramp_up| self.dtstart.checked_sub_signed(ramp_up))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            if now >= ramp_start {
                return EventStatus::Near;
            }
        }
        EventStatus::Far
    }
}

fn chrono_duration(duration: Duration) -> Option<chrono::Duration> {
    chrono::Duration::from_std(duration).ok()
}

/// Single interval of a signal.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalInterval {
    /// Interval start.
    pub dtstart: DateTime<Utc>,
    /// Interval length.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub duration: Duration,
    /// Signal value for the interval.
    pub payload: f64,
}

/// Instruction carried by an event (price, level, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSignal {
    /// Signal identifier unique within the event.
    pub signal_id: String,
    /// Signal name, e.g. `simple`.
    pub signal_name: String,
    /// Signal type, e.g. `level`.
    pub signal_type: String,
    /// Ordered intervals.
    #[serde(default)]
    pub intervals: Vec<SignalInterval>,
}

/// Dispatched demand-response event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identity key of the event.
    pub event_id: String,
    /// Monotonic revision marker.
    pub modification_number: u32,
    /// Announced status.
    pub status: EventStatus,
    /// Market context the event belongs to.
    #[serde(default)]
    pub market_context: Option<String>,
    /// Window during which the event is in effect.
    pub active_period: ActivePeriod,
    /// Whether an opt response is expected.
    #[serde(default)]
    pub response_required: ResponseRequired,
    /// Signals attached to the event.
    #[serde(default)]
    pub signals: Vec<EventSignal>,
}

impl Event {
    /// Construct an event requiring a response and carrying no signals.
    pub fn new(
        event_id: impl Into<String>,
        modification_number: u32,
        status: EventStatus,
        active_period: ActivePeriod,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            modification_number,
            status,
            market_context: None,
            active_period,
            response_required: ResponseRequired::Always,
            signals: Vec::new(),
        }
    }

    /// Override the response requirement.
    pub fn with_response_required(mut self, response_required: ResponseRequired) -> Self {
        self.response_required = response_required;
        self
    }

    /// Attach a signal.
    pub fn with_signal(mut self, signal: EventSignal) -> Self {
        self.signals.push(signal);
        self
    }

    /// Attach a market context.
    pub fn with_market_context(mut self, market_context: impl Into<String>) -> Self {
        self.market_context = Some(market_context.into());
        self
    }
}

/// Event distribution message delivered in answer to a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    /// Request identifier echoed in created-event responses.
    pub request_id: String,
    /// Coordinator identity.
    #[serde(default)]
    pub vtn_id: Option<String>,
    /// Events in arrival order.
    #[serde(default)]
    pub events: Vec<Event>,
}

impl EventBatch {
    /// Construct a batch with a fresh request identifier.
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            request_id: new_request_id(),
            vtn_id: None,
            events,
        }
    }
}

/// Outbound opt response for a single event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDescriptor {
    /// Event the response refers to.
    pub event_id: String,
    /// Revision the decision applies to.
    pub modification_number: u32,
    /// Decision.
    pub opt_type: OptType,
    /// Response code, 200 on success.
    pub response_code: u16,
    /// Human readable response description.
    pub response_description: String,
    /// Request identifier of the distribute message being answered.
    pub request_id: String,
}

impl ResponseDescriptor {
    /// Successful response for `event` with `opt_type`.
    pub fn ok(event: &Event, opt_type: OptType, request_id: impl Into<String>) -> Self {
        Self {
            event_id: event.event_id.clone(),
            modification_number: event.modification_number,
            opt_type,
            response_code: RESPONSE_OK,
            response_description: RESPONSE_OK_DESCRIPTION.to_owned(),
            request_id: request_id.into(),
        }
    }
}

/// Generic acknowledgement status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseStatus {
    /// Response code, 200 on success.
    pub response_code: u16,
    /// Human readable description.
    pub response_description: String,
    /// Request being acknowledged.
    #[serde(default)]
    pub request_id: Option<String>,
}

impl ResponseStatus {
    /// Successful status.
    pub fn ok(request_id: Option<String>) -> Self {
        Self {
            response_code: RESPONSE_OK,
            response_description: RESPONSE_OK_DESCRIPTION.to_owned(),
            request_id,
        }
    }

    /// Failed status with the supplied code and description.
    pub fn error(response_code: u16, description: impl Into<String>) -> Self {
        Self {
            response_code,
            response_description: description.into(),
            request_id: None,
        }
    }

    /// Whether the code denotes success.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.response_code)
    }
}

/// Report offered to the coordinator during report registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDescription {
    /// Report specifier, e.g. `CurrentReport`.
    pub report_specifier_id: String,
    /// Resource the measurement belongs to.
    pub resource_id: String,
    /// Measured quantity, e.g. `voltage`.
    pub measurement: String,
    /// Unit of the measurement.
    pub unit: String,
}

/// Report the coordinator asks to receive after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    /// Report specifier being requested.
    pub report_specifier_id: String,
    /// Resource within the report.
    pub resource_id: String,
    /// Measured quantity within the report.
    pub measurement: String,
}

/// Single sampled telemetry value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportReading {
    /// Report specifier the reading belongs to.
    pub report_specifier_id: String,
    /// Resource the reading was taken from.
    pub resource_id: String,
    /// Measured quantity.
    pub measurement: String,
    /// Sampled value.
    pub value: f64,
    /// Sampling time.
    pub timestamp: DateTime<Utc>,
}

/// Coordinator service a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Party registration.
    EiRegisterParty,
    /// Message polling.
    OadrPoll,
    /// Event responses.
    EiEvent,
    /// Report registration and updates.
    EiReport,
}

impl Service {
    /// Path segment of the service below the coordinator base URL.
    pub fn path(self) -> &'static str {
        match self {
            Service::EiRegisterParty => "EiRegisterParty",
            Service::OadrPoll => "OadrPoll",
            Service::EiEvent => "EiEvent",
            Service::EiReport => "EiReport",
        }
    }
}

/// Messages the participant sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum RequestPayload {
    /// Registration request carrying the participant identity.
    #[serde(rename = "oadrCreatePartyRegistration")]
    CreatePartyRegistration {
        /// Participant name.
        ven_name: String,
        /// Pre-assigned participant identifier.
        ven_id: Option<String>,
    },
    /// Request for pending messages.
    #[serde(rename = "oadrPoll")]
    Poll {
        /// Registered participant identifier.
        ven_id: String,
    },
    /// Opt responses for a distributed batch.
    #[serde(rename = "oadrCreatedEvent")]
    CreatedEvent {
        /// Registered participant identifier.
        ven_id: String,
        /// Overall acknowledgement of the distribute message.
        response: ResponseStatus,
        /// Per-event responses in batch order.
        event_responses: Vec<ResponseDescriptor>,
    },
    /// Offer of telemetry reports.
    #[serde(rename = "oadrRegisterReport")]
    RegisterReport {
        /// Registered participant identifier.
        ven_id: String,
        /// Offered reports.
        reports: Vec<ReportDescription>,
    },
    /// Sampled telemetry for requested reports.
    #[serde(rename = "oadrUpdateReport")]
    UpdateReport {
        /// Registered participant identifier.
        ven_id: String,
        /// Readings in registration order.
        readings: Vec<ReportReading>,
    },
    /// Request to end the registration.
    #[serde(rename = "oadrCancelPartyRegistration")]
    CancelPartyRegistration {
        /// Registered participant identifier.
        ven_id: String,
        /// Registration being cancelled.
        registration_id: Option<String>,
    },
}

impl RequestPayload {
    /// Protocol message name.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestPayload::CreatePartyRegistration { .. } => "oadrCreatePartyRegistration",
            RequestPayload::Poll { .. } => "oadrPoll",
            RequestPayload::CreatedEvent { .. } => "oadrCreatedEvent",
            RequestPayload::RegisterReport { .. } => "oadrRegisterReport",
            RequestPayload::UpdateReport { .. } => "oadrUpdateReport",
            RequestPayload::CancelPartyRegistration { .. } => "oadrCancelPartyRegistration",
        }
    }

    /// Service the message is routed to.
    pub fn service(&self) -> Service {
        match self {
            RequestPayload::CreatePartyRegistration { .. }
            | RequestPayload::CancelPartyRegistration { .. } => Service::EiRegisterParty,
            RequestPayload::Poll { .. } => Service::OadrPoll,
            RequestPayload::CreatedEvent { .. } => Service::EiEvent,
            RequestPayload::RegisterReport { .. } | RequestPayload::UpdateReport { .. } => {
                Service::EiReport
            }
        }
    }
}

/// Outbound request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Unique request identifier.
    pub request_id: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Message body.
    pub payload: RequestPayload,
}

impl Request {
    /// Wrap `payload` in a fresh envelope.
    pub fn new(payload: RequestPayload) -> Self {
        Self {
            request_id: new_request_id(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Protocol message name of the payload.
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    /// Service the request is routed to.
    pub fn service(&self) -> Service {
        self.payload.service()
    }
}

/// Messages the coordinator answers with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum ResponsePayload {
    /// Outcome of a registration request.
    #[serde(rename = "oadrCreatedPartyRegistration")]
    CreatedPartyRegistration {
        /// Acknowledgement status.
        response: ResponseStatus,
        /// Identifier assigned to the participant.
        #[serde(default)]
        ven_id: Option<String>,
        /// Registration identifier.
        #[serde(default)]
        registration_id: Option<String>,
    },
    /// Events dispatched to the participant.
    #[serde(rename = "oadrDistributeEvent")]
    DistributeEvent(EventBatch),
    /// Outcome of a report registration.
    #[serde(rename = "oadrRegisteredReport")]
    RegisteredReport {
        /// Acknowledgement status.
        response: ResponseStatus,
        /// Reports the coordinator wants to receive.
        #[serde(default)]
        report_requests: Vec<ReportRequest>,
    },
    /// Acknowledgement of a report update.
    #[serde(rename = "oadrUpdatedReport")]
    UpdatedReport {
        /// Acknowledgement status.
        response: ResponseStatus,
    },
    /// Outcome of a cancellation request.
    #[serde(rename = "oadrCanceledPartyRegistration")]
    CanceledPartyRegistration {
        /// Acknowledgement status.
        response: ResponseStatus,
        /// Registration that was cancelled.
        #[serde(default)]
        registration_id: Option<String>,
    },
    /// Generic acknowledgement.
    #[serde(rename = "oadrResponse")]
    Response(ResponseStatus),
}

impl ResponsePayload {
    /// Protocol message name.
    pub fn kind(&self) -> &'static str {
        match self {
            ResponsePayload::CreatedPartyRegistration { .. } => "oadrCreatedPartyRegistration",
            ResponsePayload::DistributeEvent(_) => "oadrDistributeEvent",
            ResponsePayload::RegisteredReport { .. } => "oadrRegisteredReport",
            ResponsePayload::UpdatedReport { .. } => "oadrUpdatedReport",
            ResponsePayload::CanceledPartyRegistration { .. } => "oadrCanceledPartyRegistration",
            ResponsePayload::Response(_) => "oadrResponse",
        }
    }

    /// Acknowledgement status carried by the payload, if any.
    pub fn status(&self) -> Option<&ResponseStatus> {
        match self {
            ResponsePayload::CreatedPartyRegistration { response, .. }
            | ResponsePayload::RegisteredReport { response, .. }
            | ResponsePayload::UpdatedReport { response }
            | ResponsePayload::CanceledPartyRegistration { response, .. }
            | ResponsePayload::Response(response) => Some(response),
            ResponsePayload::DistributeEvent(_) => None,
        }
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().simple().to_string()
}
