//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Event reconciliation and registration lifecycle."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use r_ven_common::time::{Clock, SystemClock};
use r_ven_msg::{Event, EventBatch, EventStatus, OptType, ResponseDescriptor, ResponseRequired};
use tracing::{debug, error, info, warn};

use crate::hooks::{EventHandler, HookResult};
use crate::metrics::VenMetrics;

/// Per-session tracking of received events and the decisions returned for them.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationState {
    received: HashMap<String, Event>,
    responses: HashMap<String, OptType>,
}

impl ReconciliationState {
    /// Last revision seen for `event_id`.
    pub fn tracked_event(&self, event_id: &str) -> Option<&Event> {
        self.received.get(event_id)
    }

    /// Last decision recorded for `event_id`.
    pub fn decision(&self, event_id: &str) -> Option<OptType> {
        self.responses.get(event_id).copied()
    }

    pub fn tracked_len(&self) -> usize {
        self.received.len()
    }

    pub fn is_empty(&self) -> bool {
        self.received.is_empty() && self.responses.is_empty()
    }

    fn seen_revision(&self, event_id: &str) -> Option<u32> {
        self.received.get(event_id).map(|event| event.modification_number)
    }

    fn record(&mut self, event: &Event, decision: Option<OptType>) {
        if event.status.is_terminal() {
            self.received.remove(&event.event_id);
            self.responses.remove(&event.event_id);
            return;
        }
        match decision {
            Some(opt_type) => {
                self.responses.insert(event.event_id.clone(), opt_type);
            }
            None => {
                self.responses.remove(&event.event_id);
            }
        }
    }
}

/// Turns inbound event batches into ordered opt responses.
///
/// Hooks run only on first sight of an event or on a revision bump; a
/// redelivery of a known revision re-uses the recorded decision. A failing
/// hook opts the whole batch out.
pub struct EventReconciler {
    handler: Arc<dyn EventHandler>,
    clock: Arc<dyn Clock>,
    state: ReconciliationState,
    metrics: Option<VenMetrics>,
}

impl EventReconciler {
    pub fn new(handler: Arc<dyn EventHandler>) -> Self {
        Self {
            handler,
            clock: Arc::new(SystemClock),
            state: ReconciliationState::default(),
            metrics: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: VenMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> &ReconciliationState {
        &self.state
    }

    /// Decide on every event of `batch` and build the responses to send.
    ///
    /// An empty result means no created-event message should be sent.
    pub async fn reconcile(&mut self, batch: &EventBatch) -> Vec<ResponseDescriptor> {
        let decisions = match self.decide_all(&batch.events).await {
            Ok(decisions) => decisions,
            Err(err) => {
                error!(
                    request_id = %batch.request_id,
                    events = batch.events.len(),
                    error = %err,
                    "decision hook failed; opting out of every event in the batch"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_hook_failure();
                }
                self.opt_out_all(&batch.events)
            }
        };

        let decisions: Vec<Option<OptType>> = batch
            .events
            .iter()
            .zip(decisions)
            .map(|(event, decision)| self.validate(event, decision))
            .collect();

        let now = self.clock.now();
        let responses: Vec<ResponseDescriptor> = batch
            .events
            .iter()
            .zip(&decisions)
            .filter(|(event, _)| event.response_required == ResponseRequired::Always)
            .filter(|(event, _)| event.active_period.status_at(now) != EventStatus::Completed)
            .filter_map(|(event, decision)| {
                decision.map(|opt_type| ResponseDescriptor::ok(event, opt_type, &batch.request_id))
            })
            .collect();

        if responses.is_empty() {
            info!(
                request_id = %batch.request_id,
                "not sending any event responses; none required or allowed"
            );
        } else {
            info!(
                request_id = %batch.request_id,
                responses = responses.len(),
                "event responses prepared"
            );
        }
        responses
    }

    async fn decide_all(&mut self, events: &[Event]) -> HookResult<Vec<Option<OptType>>> {
        let mut decisions = Vec::with_capacity(events.len());
        for event in events {
            let decision = self.decide(event).await?;
            self.state.record(event, decision);
            decisions.push(decision);
        }
        Ok(decisions)
    }

    async fn decide(&mut self, event: &Event) -> HookResult<Option<OptType>> {
        let event_id = event.event_id.as_str();
        match self.state.seen_revision(event_id) {
            Some(revision) if revision == event.modification_number => {
                debug!(
                    event_id,
                    modification_number = revision,
                    "repeat delivery; re-using recorded decision"
                );
                Ok(self.state.decision(event_id))
            }
            Some(revision) => {
                debug!(
                    event_id,
                    from = revision,
                    to = event.modification_number,
                    "event revision changed"
                );
                self.state.received.insert(event.event_id.clone(), event.clone());
                let previous = self.state.decision(event_id);
                let updated = self.handler.on_update_event(event, previous).await?;
                Ok(updated.or(previous))
            }
            None => {
                self.state.received.insert(event.event_id.clone(), event.clone());
                let decision = self.handler.on_event(event).await?;
                Ok(Some(decision))
            }
        }
    }

    fn opt_out_all(&mut self, events: &[Event]) -> Vec<Option<OptType>> {
        events
            .iter()
            .map(|event| {
                self.state.received.insert(event.event_id.clone(), event.clone());
                self.state.record(event, Some(OptType::OptOut));
                Some(OptType::OptOut)
            })
            .collect()
    }

    fn validate(&self, event: &Event, decision: Option<OptType>) -> Option<OptType> {
        let decision = match decision {
            None if event.response_required == ResponseRequired::Always => {
                warn!(
                    event_id = %event.event_id,
                    modification_number = event.modification_number,
                    "decision hooks must return optIn or optOut; responding with optOut"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_coercion();
                }
                Some(OptType::OptOut)
            }
            other => other,
        };
        if let (Some(opt_type), Some(metrics)) = (decision, &self.metrics) {
            metrics.record_decision(opt_type);
        }
        decision
    }
}
