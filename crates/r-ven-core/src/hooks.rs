//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Event reconciliation and registration lifecycle."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use async_trait::async_trait;
use r_ven_msg::{Event, OptType};
use tracing::warn;

use crate::error::HookError;

pub type HookResult<T> = std::result::Result<T, HookError>;

/// Owner-supplied decision logic for dispatched events.
///
/// Both hooks are awaited uniformly; implementations that decide synchronously
/// simply return without suspending.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Decide on an event seen for the first time.
    async fn on_event(&self, event: &Event) -> HookResult<OptType>;

    /// Decide on a new revision of a known event. `previous` is the decision
    /// last recorded for the event; returning `None` keeps it.
    async fn on_update_event(
        &self,
        event: &Event,
        previous: Option<OptType>,
    ) -> HookResult<Option<OptType>> {
        match previous {
            Some(opt_type) => {
                warn!(
                    event_id = %event.event_id,
                    modification_number = event.modification_number,
                    opt_type = %opt_type,
                    "event updated without an on_update_event handler; re-using previous decision"
                );
                Ok(Some(opt_type))
            }
            None => self.on_event(event).await.map(Some),
        }
    }
}

/// Handler answering every event with the same decision.
#[derive(Debug, Clone, Copy)]
pub struct StaticDecision(pub OptType);

#[async_trait]
impl EventHandler for StaticDecision {
    async fn on_event(&self, _event: &Event) -> HookResult<OptType> {
        Ok(self.0)
    }
}

/// Adapts a synchronous closure into an [`EventHandler`].
pub struct FnHandler<F> {
    decide: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Event) -> HookResult<OptType> + Send + Sync,
{
    pub fn new(decide: F) -> Self {
        Self { decide }
    }
}

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> HookResult<OptType> + Send + Sync,
{
    async fn on_event(&self, event: &Event) -> HookResult<OptType> {
        (self.decide)(event)
    }
}
