//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Demand-response message model and collaborator contracts."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use crate::types::{Request, ResponsePayload};
use crate::{Result, TransportError};

/// Converts between the in-memory model and a wire representation.
///
/// Decoding validates the message before it reaches the participant core.
pub trait Codec: Send + Sync {
    /// MIME type of the encoded representation.
    fn content_type(&self) -> &'static str;
    /// Encode an outbound request.
    fn encode_request(&self, request: &Request) -> Result<Vec<u8>>;
    /// Decode and validate an inbound answer; an empty body decodes to `None`.
    fn decode_response(&self, bytes: &[u8]) -> Result<Option<ResponsePayload>>;
}

/// JSON codec used by the HTTP transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode_request(&self, request: &Request) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(request)?)
    }

    fn decode_response(&self, bytes: &[u8]) -> Result<Option<ResponsePayload>> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let payload: Option<ResponsePayload> = serde_json::from_slice(bytes)?;
        if let Some(payload) = &payload {
            validate_response(payload)?;
        }
        Ok(payload)
    }
}

/// Structural checks applied to every decoded answer.
///
/// A distribution may list the same event more than once (for example a
/// revision pair); the entries are reconciled in order downstream.
pub fn validate_response(payload: &ResponsePayload) -> Result<()> {
    if let ResponsePayload::DistributeEvent(batch) = payload {
        if batch.request_id.trim().is_empty() {
            return Err(TransportError::Invalid(
                "oadrDistributeEvent without request_id".into(),
            ));
        }
        if batch.events.iter().any(|event| event.event_id.trim().is_empty()) {
            return Err(TransportError::Invalid("event without event_id".into()));
        }
    }
    Ok(())
}
