pub mod args;
pub mod artifacts;
pub mod config;
pub mod desktop;
pub mod game_automation;
pub mod matching;

pub use config::DetectionConfig;
pub use desktop::{Desktop, GameWindow};
pub use game_automation::{AutomationHandle, GameAutomation, RunFlag};
