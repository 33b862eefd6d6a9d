//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "01-bootstrap"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Test harness for the participant runtime and shared exports."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use r_ven_core::Scheduler;

use crate::clock::FixedClock;

/// Scheduler that returns immediately and remembers every requested delay.
///
/// When attached to a [`FixedClock`] the clock is advanced by each delay so
/// wall-clock checks still see time passing.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    delays: Mutex<Vec<Duration>>,
    clock: Option<Arc<FixedClock>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<FixedClock>) -> Self {
        Self {
            delays: Mutex::default(),
            clock: Some(clock),
        }
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    pub fn total(&self) -> Duration {
        self.delays.lock().iter().sum()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
        if let Some(clock) = &self.clock {
            if let Ok(step) = chrono::Duration::from_std(duration) {
                clock.advance(step);
            }
        }
    }
}
