//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Demand-response message model and collaborator contracts."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use tracing::debug;

use crate::types::{Request, ResponsePayload};

/// Direction of the message movement, used for consistent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    /// Message sent to the coordinator.
    Outbound,
    /// Message received from the coordinator.
    Inbound,
}

/// Emit a structured log entry for an outbound request.
pub fn log_request(transport: &str, request: &Request) {
    debug!(
        transport,
        request_id = %request.request_id,
        timestamp = %request.timestamp,
        kind = request.kind(),
        service = request.service().path(),
        direction = ?MessageDirection::Outbound,
        "messaging activity"
    );
}

/// Emit a structured log entry for the answer to `request`.
pub fn log_response(transport: &str, request: &Request, response: Option<&ResponsePayload>) {
    debug!(
        transport,
        request_id = %request.request_id,
        kind = response.map(ResponsePayload::kind).unwrap_or("none"),
        response_code = response.and_then(|r| r.status()).map(|s| s.response_code),
        direction = ?MessageDirection::Inbound,
        "messaging activity"
    );
}
