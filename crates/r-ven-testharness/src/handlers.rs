//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "01-bootstrap"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Test harness for the participant runtime and shared exports."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use r_ven_core::{EventHandler, HookError, HookResult};
use r_ven_msg::{Event, OptType};

#[derive(Debug, Default)]
struct Calls {
    on_event: Vec<(String, u32)>,
    on_update_event: Vec<(String, u32)>,
}

/// Decision hook answering from per-event tables and recording every call.
///
/// Events without an entry get the default decision. Update hooks are only
/// implemented when [`ScriptedHandler::on_update`] was used; otherwise the
/// trait default applies.
#[derive(Debug)]
pub struct ScriptedHandler {
    default: OptType,
    decisions: HashMap<String, OptType>,
    updates: Option<HashMap<String, Option<OptType>>>,
    failing: HashSet<String>,
    calls: Mutex<Calls>,
}

impl ScriptedHandler {
    pub fn new(default: OptType) -> Self {
        Self {
            default,
            decisions: HashMap::new(),
            updates: None,
            failing: HashSet::new(),
            calls: Mutex::default(),
        }
    }

    pub fn decide(mut self, event_id: impl Into<String>, opt_type: OptType) -> Self {
        self.decisions.insert(event_id.into(), opt_type);
        self
    }

    /// Answer revisions of `event_id` with `decision`; `None` keeps the
    /// previous decision.
    pub fn on_update(mut self, event_id: impl Into<String>, decision: Option<OptType>) -> Self {
        self.updates
            .get_or_insert_with(HashMap::new)
            .insert(event_id.into(), decision);
        self
    }

    /// Raise a hook error whenever `event_id` is decided.
    pub fn fail_on(mut self, event_id: impl Into<String>) -> Self {
        self.failing.insert(event_id.into());
        self
    }

    /// `(event_id, modification_number)` pairs passed to `on_event`.
    pub fn on_event_calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().on_event.clone()
    }

    /// `(event_id, modification_number)` pairs passed to `on_update_event`.
    pub fn on_update_calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().on_update_event.clone()
    }

    pub fn total_calls(&self) -> usize {
        let calls = self.calls.lock();
        calls.on_event.len() + calls.on_update_event.len()
    }

    fn check_failure(&self, event: &Event) -> HookResult<()> {
        if self.failing.contains(&event.event_id) {
            Err(HookError::new(format!(
                "scripted failure for {}",
                event.event_id
            )))
        } else {
            Ok(())
        }
    }
}

impl Default for ScriptedHandler {
    fn default() -> Self {
        Self::new(OptType::OptIn)
    }
}

#[async_trait]
impl EventHandler for ScriptedHandler {
    async fn on_event(&self, event: &Event) -> HookResult<OptType> {
        self.calls
            .lock()
            .on_event
            .push((event.event_id.clone(), event.modification_number));
        self.check_failure(event)?;
        Ok(self
            .decisions
            .get(&event.event_id)
            .copied()
            .unwrap_or(self.default))
    }

    async fn on_update_event(
        &self,
        event: &Event,
        previous: Option<OptType>,
    ) -> HookResult<Option<OptType>> {
        let Some(updates) = &self.updates else {
            return match previous {
                Some(opt_type) => Ok(Some(opt_type)),
                None => self.on_event(event).await.map(Some),
            };
        };
        self.calls
            .lock()
            .on_update_event
            .push((event.event_id.clone(), event.modification_number));
        self.check_failure(event)?;
        Ok(updates.get(&event.event_id).copied().flatten())
    }
}
