//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Metrics collection for the participant core."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use r_ven_msg::OptType;

use crate::lifecycle::LifecycleState;

/// Prometheus handles for reconciliation and lifecycle activity.
#[derive(Debug, Clone)]
pub struct VenMetrics {
    decisions: IntCounterVec,
    hook_failures: IntCounter,
    coerced_results: IntCounter,
    responses_sent: IntCounter,
    transitions: IntCounterVec,
}

impl VenMetrics {
    /// Register participant metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let decisions = IntCounterVec::new(
            Opts::new("ven_event_decisions_total", "Event decisions by opt type"),
            &["opt_type"],
        )?;
        let hook_failures = IntCounter::with_opts(Opts::new(
            "ven_hook_failures_total",
            "Batches opted out because a decision hook failed",
        ))?;
        let coerced_results = IntCounter::with_opts(Opts::new(
            "ven_coerced_results_total",
            "Missing decisions coerced to optOut",
        ))?;
        let responses_sent = IntCounter::with_opts(Opts::new(
            "ven_event_responses_total",
            "Event responses handed to the transport",
        ))?;
        let transitions = IntCounterVec::new(
            Opts::new("ven_lifecycle_transitions_total", "Lifecycle states entered"),
            &["state"],
        )?;

        registry.register(Box::new(decisions.clone()))?;
        registry.register(Box::new(hook_failures.clone()))?;
        registry.register(Box::new(coerced_results.clone()))?;
        registry.register(Box::new(responses_sent.clone()))?;
        registry.register(Box::new(transitions.clone()))?;

        Ok(Self {
            decisions,
            hook_failures,
            coerced_results,
            responses_sent,
            transitions,
        })
    }

    pub fn record_decision(&self, opt_type: OptType) {
        self.decisions.with_label_values(&[opt_type.as_str()]).inc();
    }

    pub fn record_hook_failure(&self) {
        self.hook_failures.inc();
    }

    pub fn record_coercion(&self) {
        self.coerced_results.inc();
    }

    pub fn record_responses(&self, count: usize) {
        self.responses_sent.inc_by(count as u64);
    }

    pub fn record_transition(&self, state: LifecycleState) {
        self.transitions.with_label_values(&[state.as_str()]).inc();
    }
}

/// Render the registry in the Prometheus text exposition format.
pub fn render_metrics(registry: &Registry) -> Result<String, prometheus::Error> {
    TextEncoder::new().encode_to_string(&registry.gather())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_appear_in_exposition() {
        let registry = Registry::new();
        let metrics = VenMetrics::register(&registry).unwrap();
        metrics.record_decision(OptType::OptOut);
        metrics.record_decision(OptType::OptOut);
        metrics.record_responses(3);
        metrics.record_transition(LifecycleState::Polling);

        let text = render_metrics(&registry).unwrap();
        assert!(text.contains("ven_event_decisions_total{opt_type=\"optOut\"} 2"));
        assert!(text.contains("ven_event_responses_total 3"));
        assert!(text.contains("ven_lifecycle_transitions_total{state=\"polling\"} 1"));
    }

    #[test]
    fn double_registration_is_rejected() {
        let registry = Registry::new();
        VenMetrics::register(&registry).unwrap();
        assert!(VenMetrics::register(&registry).is_err());
    }
}
