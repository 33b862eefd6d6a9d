//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Event reconciliation and registration lifecycle."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Participant core: decides on dispatched events and drives the
//! registration, polling, reporting and cancellation exchange with the
//! coordinator.

pub mod error;
pub mod hooks;
pub mod lifecycle;
pub mod metrics;
pub mod reconciler;
pub mod reports;
pub mod scheduler;

pub use error::{HookError, Result, VenError};
pub use hooks::{EventHandler, FnHandler, HookResult, StaticDecision};
pub use lifecycle::{
    LifecycleSettings, LifecycleState, LifecycleSummary, Registration, VenLifecycle,
};
pub use metrics::{render_metrics, VenMetrics};
pub use reconciler::{EventReconciler, ReconciliationState};
pub use reports::{RandomSampler, ReportSet, ReportSpecification, Sampler};
pub use scheduler::{Scheduler, TokioScheduler};
