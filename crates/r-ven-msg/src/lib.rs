//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Demand-response message model and collaborator contracts."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! In-memory model of the demand-response exchange between a participant
//! (VEN) and its coordinator (VTN), together with the transport and codec
//! contracts the participant core consumes.

pub mod codec;
pub mod logging;
pub mod transport;
pub mod types;

/// Shared result type for transport and codec operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures raised by transport and codec collaborators.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Wrapper for JSON serialization or deserialization problems.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// The coordinator could not be reached or the exchange was interrupted.
    #[error("request to {service} failed: {reason}")]
    Unreachable {
        /// Service endpoint the request targeted.
        service: &'static str,
        /// Underlying cause rendered as text.
        reason: String,
    },
    /// The coordinator answered with a non-success transport status.
    #[error("{service} answered with status {status}")]
    Status {
        /// Service endpoint the request targeted.
        service: &'static str,
        /// Transport level status code.
        status: u16,
    },
    /// A decoded message failed structural validation.
    #[error("invalid message: {0}")]
    Invalid(String),
}

pub use codec::{Codec, JsonCodec};
pub use logging::{log_request, log_response, MessageDirection};
pub use transport::{InMemoryTransport, Transport};
pub use types::{
    ActivePeriod, Event, EventBatch, EventSignal, EventStatus, OptType, ReportDescription,
    ReportReading, ReportRequest, Request, RequestPayload, ResponseDescriptor, ResponsePayload,
    ResponseRequired, ResponseStatus, Service, SignalInterval,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_render_their_context() {
        let json: TransportError = serde_json::from_str::<ResponsePayload>("{")
            .expect_err("truncated body")
            .into();
        assert!(matches!(json, TransportError::Json(_)));

        let status = TransportError::Status {
            service: Service::OadrPoll.path(),
            status: 503,
        };
        assert_eq!(status.to_string(), "OadrPoll answered with status 503");
    }
}
