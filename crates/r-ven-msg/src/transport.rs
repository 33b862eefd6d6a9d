//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Demand-response message model and collaborator contracts."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::types::{Request, ResponsePayload};
use crate::{Result, TransportError};

/// Request/response exchange with the coordinator.
///
/// Implementations own connection handling, encoding and retries. A `None`
/// answer means the coordinator had nothing to say (e.g. an empty poll).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit a request and wait for the coordinator's answer.
    async fn submit(&self, request: Request) -> Result<Option<ResponsePayload>>;
    /// Human-readable transport name for logging.
    fn name(&self) -> &'static str;
}

enum Scripted {
    Reply(Option<ResponsePayload>),
    Fail(String),
}

/// In-memory transport answering from a scripted queue.
///
/// Every submitted request is recorded; once the script runs dry further
/// requests are answered with `None`.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    sent: Arc<Mutex<Vec<Request>>>,
}

impl InMemoryTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer for the next unanswered request.
    pub fn push_reply(&self, reply: Option<ResponsePayload>) {
        self.script.lock().push_back(Scripted::Reply(reply));
    }

    /// Queue a transport failure for the next unanswered request.
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.script.lock().push_back(Scripted::Fail(reason.into()));
    }

    /// Requests submitted so far, in order.
    pub fn sent(&self) -> Vec<Request> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn submit(&self, request: Request) -> Result<Option<ResponsePayload>> {
        let service = request.service().path();
        self.sent.lock().push(request);
        match self.script.lock().pop_front() {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Fail(reason)) => Err(TransportError::Unreachable { service, reason }),
            None => Ok(None),
        }
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
