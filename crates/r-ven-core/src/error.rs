//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Event reconciliation and registration lifecycle."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use r_ven_msg::TransportError;

use crate::lifecycle::LifecycleState;

/// Result alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, VenError>;

/// Failure raised by an owner-supplied decision hook.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("decision hook failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        HookError::Failed(message.into())
    }
}

/// Errors surfaced to the owner of a participant lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum VenError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    /// Negative or unexpected answer from the coordinator.
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
}
