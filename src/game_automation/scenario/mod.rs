//! Detection scenarios
//!
//! Every stuck condition the engine knows about is one variant of
//! [`ScenarioKind`]. Each variant looks at a single tab screenshot, updates its
//! timers in [`ScenarioState`] and may ask the [`Resolver`] for an input sequence.
//! Errors never escape a scenario: they are logged and reported as
//! [`Outcome::NoOp`] so the remaining scenarios and the sweep keep going.

mod dialog;
mod login;
mod stuck_dialog;
mod town;


pub use dialog::OneShotScenario;
pub use login::LoginScenario;
pub use stuck_dialog::{DialogDetector, StuckDialogScenario};
pub use town::TownStuckScenario;

use super::resolver::{ResolveAction, ResolveError, Resolver};
use super::state::{ScenarioState, TabId};
use crate::artifacts::ScreenshotArchive;
use crate::config::{ConfigError, DetectionConfig};
use crate::desktop::{GameWindow, Screenshot};
use crate::matching::MatchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Matcher error: {0}")]
    Match(#[from] MatchError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),
}

pub type ScenarioResult<T> = Result<T, ScenarioError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoOp,
    Resolved,
    LoginConfirmed,
}

/// Everything a scenario may look at or touch during one tab visit.
pub struct ScenarioContext<'a> {
    pub state: &'a mut ScenarioState,
    pub resolver: &'a Resolver,
    pub window: &'a GameWindow,
    pub screenshot: &'a Screenshot,
    pub tab: &'a TabId,
}

impl ScenarioContext<'_> {
    async fn resolve(
        &self,
        action: ResolveAction,
        points: &[crate::desktop::WindowPoint],
    ) -> ScenarioResult<()> {
        self.resolver.resolve(self.window, action, points).await?;
        Ok(())
    }
}

pub enum ScenarioKind {
    StuckDialog(StuckDialogScenario),
    TownStuck(TownStuckScenario),
    Login(LoginScenario),
    OneShot(OneShotScenario),
}

impl ScenarioKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StuckDialog(s) => s.name,
            Self::TownStuck(_) => "town_stuck",
            Self::Login(_) => "login",
            Self::OneShot(s) => s.name,
        }
    }

    /// Inspect one tab screenshot and resolve whatever this scenario detects.
    pub async fn detect_and_solve(&mut self, ctx: &mut ScenarioContext<'_>) -> Outcome {
        let name = self.name();
        let result = match self {
            Self::StuckDialog(s) => s.detect_and_solve(ctx).await,
            Self::TownStuck(s) => s.detect_and_solve(ctx).await,
            Self::Login(s) => s.detect_and_solve(ctx).await,
            Self::OneShot(s) => s.detect_and_solve(ctx).await,
        };
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Scenario {name} failed on '{}' ({}): {e}", ctx.window.title, ctx.tab);
                Outcome::NoOp
            }
        }
    }
}

/// The ordered scenario list plus the state it shares.
pub struct ScenarioEngine {
    scenarios: Vec<ScenarioKind>,
    state: ScenarioState,
    resolver: Resolver,
    archive: Option<ScreenshotArchive>,
}

impl ScenarioEngine {
    pub fn new(scenarios: Vec<ScenarioKind>, resolver: Resolver) -> Self {
        Self {
            scenarios,
            state: ScenarioState::new(),
            resolver,
            archive: None,
        }
    }

    pub fn with_archive(mut self, archive: ScreenshotArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Build the scenarios enabled in `config`, in their fixed registration order.
    pub fn from_config(config: &DetectionConfig, resolver: Resolver) -> Result<Self, ConfigError> {
        let retries = config.detect_retry;
        let mut scenarios = Vec::new();

        if let Some(shop) = &config.stuck_shop {
            scenarios.push(ScenarioKind::StuckDialog(StuckDialogScenario::from_config(
                "stuck_shop",
                shop,
                (0.25, 0.5),
                retries,
            )?));
        }
        if let Some(bag) = &config.stuck_bag {
            scenarios.push(ScenarioKind::StuckDialog(StuckDialogScenario::from_config(
                "stuck_bag",
                bag,
                (0.75, 0.5),
                retries,
            )?));
        }
        if let Some(town) = &config.town_stuck {
            scenarios.push(ScenarioKind::TownStuck(TownStuckScenario::from_config(town, retries)?));
        }
        if let Some(login) = &config.login {
            scenarios.push(ScenarioKind::Login(LoginScenario::new(
                login.points.clone(),
                login.tolerance,
                std::time::Duration::from_secs(login.confirm_secs),
                config.login_points.clone(),
            )));
        }
        if let Some(dialog) = &config.account_warning {
            scenarios.push(ScenarioKind::OneShot(OneShotScenario::close_button(
                "account_warning",
                dialog,
            )));
        }
        if let Some(dialog) = &config.select_server {
            scenarios.push(ScenarioKind::OneShot(OneShotScenario::with_action(
                "select_server",
                dialog,
                ResolveAction::SelectServer,
                config.login_points.clone(),
            )));
        }
        if let Some(dialog) = &config.select_character {
            scenarios.push(ScenarioKind::OneShot(OneShotScenario::with_action(
                "select_character",
                dialog,
                ResolveAction::SelectCharacter,
                config.login_points.clone(),
            )));
        }
        if let Some(dialog) = &config.server_connect_warning {
            scenarios.push(ScenarioKind::OneShot(OneShotScenario::close_button(
                "server_connect_warning",
                dialog,
            )));
        }
        if let Some(dialog) = &config.crash_dialog {
            scenarios.push(ScenarioKind::OneShot(OneShotScenario::close_button("crash_dialog", dialog)));
        }

        log::info!(
            "Registered scenarios: {:?}",
            scenarios.iter().map(ScenarioKind::name).collect::<Vec<_>>()
        );

        let engine = Self::new(scenarios, resolver);
        Ok(match &config.artifacts_dir {
            Some(dir) => engine.with_archive(ScreenshotArchive::new(dir)),
            None => engine,
        })
    }

    pub fn scenario_names(&self) -> Vec<&'static str> {
        self.scenarios.iter().map(ScenarioKind::name).collect()
    }

    pub fn state(&self) -> &ScenarioState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ScenarioState {
        &mut self.state
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Run every scenario, in order, against one tab screenshot.
    ///
    /// All scenarios see the same screenshot even after an earlier one clicked.
    /// Returns the scenarios that did something.
    pub async fn run_tab(
        &mut self,
        window: &GameWindow,
        screenshot: &Screenshot,
        tab: &TabId,
    ) -> Vec<(&'static str, Outcome)> {
        let mut fired = Vec::new();
        let mut ctx = ScenarioContext {
            state: &mut self.state,
            resolver: &self.resolver,
            window,
            screenshot,
            tab,
        };

        for scenario in &mut self.scenarios {
            let outcome = scenario.detect_and_solve(&mut ctx).await;
            if outcome == Outcome::NoOp {
                continue;
            }
            log::info!("{} on '{}' ({tab}): {outcome:?}", scenario.name(), window.title);
            if let Some(archive) = &self.archive {
                archive.save(screenshot, &tab.to_string(), scenario.name());
            }
            fired.push((scenario.name(), outcome));
        }

        self.state.compact();
        fired
    }
}
