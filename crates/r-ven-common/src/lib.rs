//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the participant runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Shared primitives for the R-VEN demand-response participant.
//! This crate exposes configuration loading, tracing initialisation, and the
//! wall-clock abstraction consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    DecisionConfig, DecisionPolicy, LifecycleConfig, LoadedVenConfig, LoggingConfig,
    ReportConfig, VenConfig, VenIdentity, VtnConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use time::{Clock, SystemClock};
