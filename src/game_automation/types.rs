// Messages exchanged with the detection scheduler
use super::scenario::Outcome;
use super::state::{TabKey, TabTimers};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationState {
    /// Stopped; ticks are not scheduled
    Idle,
    /// Waiting for the next tick
    Running,
    /// A tick is sweeping windows
    Detecting,
}

#[derive(Debug, Clone)]
pub enum AutomationCommand {
    Start,
    Stop,
    UpdateInterval(u64), // seconds
    /// Run a tick now instead of waiting for the timer
    RescanWindows,
    RequestSnapshot,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    pub windows: usize,
    pub tabs_visited: u32,
    pub resolutions: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum AutomationEvent {
    StateChanged(AutomationState),
    WindowsDetected(Vec<String>),
    ScenarioResolved {
        tab: String,
        scenario: &'static str,
        outcome: Outcome,
    },
    TickCompleted(TickSummary),
    Snapshot(Vec<(TabKey, TabTimers)>),
    IntervalUpdate(u64),
    Error(String),
}
