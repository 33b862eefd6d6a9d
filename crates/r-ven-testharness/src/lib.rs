//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "01-bootstrap"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Test harness for the participant runtime and shared exports."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Deterministic collaborators for exercising the participant core without a
//! network or real timers: an in-process coordinator, a scheduler that only
//! records delays, a pinned clock and scripted decision hooks.

pub mod clock;
pub mod handlers;
pub mod scheduler;
pub mod vtn;

pub use clock::FixedClock;
pub use handlers::ScriptedHandler;
pub use scheduler::RecordingScheduler;
pub use vtn::{SimulatedVtn, VtnSettings};
