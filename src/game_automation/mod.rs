// Game automation module
// Scenario detection, tab navigation and the scheduler that drives them across
// every open game window.

pub mod channels;
pub mod fsm;
pub mod resolver;
pub mod scenario;
pub mod state;
pub mod tab_iterator;
pub mod types;

// Re-export the main types and functions for easy access
pub use channels::create_automation_channels;
pub use fsm::{AutomationHandle, GameAutomation, RunFlag};
pub use resolver::{ResolveAction, ResolveError, Resolver};
pub use scenario::{Outcome, ScenarioEngine, ScenarioError, ScenarioKind};
pub use state::{ScenarioState, TabId, TabKey, TabTimers};
pub use tab_iterator::{SweepOutcome, SweepReport, TabIterator};
pub use types::{AutomationCommand, AutomationEvent, AutomationState, TickSummary};
