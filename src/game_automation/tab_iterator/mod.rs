//! Blind navigation through the tabs of one game window
//!
//! Tabs cannot be addressed directly. The only way around is the global
//! tab-cycle shortcut, and the only landmark is the home tab's pixel
//! fingerprint. A sweep first cycles until home is on screen, then cycles
//! again, running the scenarios on every tab, until home comes back.


use super::fsm::RunFlag;
use super::resolver::ResolveAction;
use super::scenario::{Outcome, ScenarioEngine};
use super::state::TabId;
use crate::config::{AutoModeConfig, ReopenConfig, TabConfig};
use crate::desktop::{Desktop, DesktopResult, GameWindow, Screenshot, WindowHandle, WindowPoint};
use crate::matching::{MatchError, check_pixel_pattern};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};

#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    /// Home tab seen again; every tab was visited
    Completed,
    /// The sweep hit `max_sweep_iterations` without seeing home again
    CapReached,
    /// Home tab never showed up during the initial search
    HomeNotFound,
    /// Focus, capture or input failed; retried next tick
    WindowUnavailable(String),
    /// The home fingerprint does not fit the screenshot
    PatternError(MatchError),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SweepReport {
    pub window: WindowHandle,
    pub outcome: SweepOutcome,
    pub tabs_visited: u32,
    pub resolutions: Vec<(TabId, &'static str, Outcome)>,
    pub game_reopened: bool,
}

impl SweepReport {
    fn new(window: WindowHandle) -> Self {
        Self {
            window,
            outcome: SweepOutcome::Completed,
            tabs_visited: 0,
            resolutions: Vec::new(),
            game_reopened: false,
        }
    }

    fn finish(mut self, outcome: SweepOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

enum Step<T> {
    Continue(T),
    Stop(SweepOutcome),
}

pub struct TabIterator {
    desktop: Arc<dyn Desktop>,
    config: TabConfig,
    auto_mode: Option<AutoModeConfig>,
    reopen: Option<ReopenConfig>,
    /// First home-tab sighting per window since the last re-open
    reopen_timers: HashMap<WindowHandle, Instant>,
    run_flag: RunFlag,
}

impl TabIterator {
    pub fn new(desktop: Arc<dyn Desktop>, config: TabConfig, run_flag: RunFlag) -> Self {
        Self {
            desktop,
            config,
            auto_mode: None,
            reopen: None,
            reopen_timers: HashMap::new(),
            run_flag,
        }
    }

    pub fn with_auto_mode(mut self, auto_mode: Option<AutoModeConfig>) -> Self {
        self.auto_mode = auto_mode;
        self
    }

    pub fn with_reopen(mut self, reopen: Option<ReopenConfig>) -> Self {
        self.reopen = reopen;
        self
    }

    /// Forget re-open timers of windows that are gone.
    pub fn retain_windows(&mut self, live: &[WindowHandle]) {
        self.reopen_timers.retain(|handle, _| live.contains(handle));
    }

    /// Sleep, then report whether the sweep may continue.
    async fn settle(&self, delay: Duration) -> bool {
        if !self.run_flag.is_running() {
            return false;
        }
        if !delay.is_zero() {
            sleep(delay).await;
        }
        self.run_flag.is_running()
    }

    /// Run a blocking desktop call on the blocking pool.
    async fn blocking<T, F>(&self, window: &GameWindow, call: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Desktop, &GameWindow) -> DesktopResult<T> + Send + 'static,
    {
        let desktop = Arc::clone(&self.desktop);
        let window = window.clone();
        match tokio::task::spawn_blocking(move || call(desktop.as_ref(), &window)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("desktop task failed: {e}")),
        }
    }

    async fn capture(&self, window: &GameWindow) -> Step<Screenshot> {
        match self.blocking(window, |desktop, w| desktop.screenshot(w)).await {
            Ok(shot) => Step::Continue(shot),
            Err(e) => {
                log::warn!("Capture failed for '{}': {e}", window.title);
                Step::Stop(SweepOutcome::WindowUnavailable(e))
            }
        }
    }

    async fn tab_cycle(&self, window: &GameWindow) -> Step<()> {
        match self.blocking(window, |desktop, _| desktop.send_tab_cycle()).await {
            Ok(()) => Step::Continue(()),
            Err(e) => {
                log::warn!("Tab cycle failed on '{}': {e}", window.title);
                Step::Stop(SweepOutcome::WindowUnavailable(e))
            }
        }
    }

    fn is_home(&self, screenshot: &Screenshot) -> Result<bool, MatchError> {
        check_pixel_pattern(screenshot, &self.config.home_points, self.config.home_tolerance)
    }

    /// Cycle tabs until the home fingerprint is on screen.
    async fn find_home(&self, window: &GameWindow) -> Step<()> {
        for attempt in 1..=self.config.max_initial_attempts {
            let shot = match self.capture(window).await {
                Step::Continue(shot) => shot,
                Step::Stop(outcome) => return Step::Stop(outcome),
            };
            match self.is_home(&shot) {
                Ok(true) => {
                    log::debug!("Home tab of '{}' found after {attempt} attempt(s)", window.title);
                    return Step::Continue(());
                }
                Ok(false) => {}
                Err(e) => {
                    log::error!("Home fingerprint check failed on '{}': {e}", window.title);
                    return Step::Stop(SweepOutcome::PatternError(e));
                }
            }
            if let Step::Stop(outcome) = self.tab_cycle(window).await {
                return Step::Stop(outcome);
            }
            if !self.settle(self.config.home_search_settle()).await {
                return Step::Stop(SweepOutcome::Cancelled);
            }
        }
        log::warn!(
            "Home tab of '{}' not found after {} attempts, skipping window this tick",
            window.title,
            self.config.max_initial_attempts
        );
        Step::Stop(SweepOutcome::HomeNotFound)
    }

    /// Re-open the game once the home tab has been around for the check period.
    async fn check_reopen(&mut self, window: &GameWindow, engine: &ScenarioEngine) -> bool {
        let Some(reopen) = &self.reopen else {
            return false;
        };
        let now = Instant::now();
        let Some(since) = self.reopen_timers.get(&window.handle).copied() else {
            self.reopen_timers.insert(window.handle, now);
            return false;
        };
        if now - since < Duration::from_secs(reopen.check_period_secs) {
            return false;
        }

        // Each shortcut opens a game tab; go back home before clicking the next one
        let points: Vec<WindowPoint> = reopen
            .shortcut_indexes
            .iter()
            .filter_map(|&i| reopen.shortcut_points.get(i).copied())
            .flat_map(|shortcut| [shortcut, reopen.home_tab_point])
            .collect();
        if points.is_empty() {
            log::warn!("No usable game shortcut configured for '{}'", window.title);
            self.reopen_timers.insert(window.handle, now);
            return false;
        }

        log::info!("Re-opening game shortcuts on '{}'", window.title);
        let reopened = match engine
            .resolver()
            .resolve(window, ResolveAction::ReopenGame, &points)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                log::error!("Re-open failed on '{}': {e}", window.title);
                false
            }
        };
        self.reopen_timers.insert(window.handle, now);
        reopened
    }

    /// Click the auto-play toggle when the tab shows auto-play switched off.
    async fn check_auto_mode(
        &self,
        window: &GameWindow,
        screenshot: &Screenshot,
        tab: &TabId,
        engine: &ScenarioEngine,
    ) {
        let Some(auto) = &self.auto_mode else {
            return;
        };
        match check_pixel_pattern(screenshot, &auto.off_points, auto.tolerance) {
            Ok(false) => {}
            Ok(true) => {
                log::info!("{tab} auto mode is off, switching it on");
                if let Err(e) = engine
                    .resolver()
                    .resolve(window, ResolveAction::SingleClick, &[auto.toggle_point])
                    .await
                {
                    log::error!("Auto mode toggle failed on '{}': {e}", window.title);
                }
            }
            Err(e) => log::error!("Auto mode check failed on '{}': {e}", window.title),
        }
    }

    /// Visit every tab of `window` once, running the scenarios on each.
    pub async fn sweep(&mut self, window: &GameWindow, engine: &mut ScenarioEngine) -> SweepReport {
        let mut report = SweepReport::new(window.handle);
        if !self.run_flag.is_running() {
            return report.finish(SweepOutcome::Cancelled);
        }

        if let Err(e) = self.blocking(window, |desktop, w| desktop.focus(w)).await {
            log::warn!("Could not focus '{}': {e}", window.title);
            return report.finish(SweepOutcome::WindowUnavailable(e));
        }
        if !self.settle(self.config.focus_settle()).await {
            return report.finish(SweepOutcome::Cancelled);
        }

        if let Step::Stop(outcome) = self.find_home(window).await {
            return report.finish(outcome);
        }

        report.game_reopened = self.check_reopen(window, engine).await;

        for iteration in 1..=self.config.max_sweep_iterations {
            if let Step::Stop(outcome) = self.tab_cycle(window).await {
                return report.finish(outcome);
            }
            if !self.settle(self.config.tab_settle()).await {
                return report.finish(SweepOutcome::Cancelled);
            }
            let shot = match self.capture(window).await {
                Step::Continue(shot) => shot,
                Step::Stop(outcome) => return report.finish(outcome),
            };
            match self.is_home(&shot) {
                Ok(true) => {
                    log::debug!(
                        "Sweep of '{}' complete after {iteration} step(s), {} tab(s) checked",
                        window.title,
                        report.tabs_visited
                    );
                    return report.finish(SweepOutcome::Completed);
                }
                Ok(false) => {}
                Err(e) => {
                    log::error!("Home fingerprint check failed on '{}': {e}", window.title);
                    return report.finish(SweepOutcome::PatternError(e));
                }
            }

            report.tabs_visited += 1;
            let tab = TabId::new(window, report.tabs_visited);
            log::debug!("Checking tab {tab}");
            for (scenario, outcome) in engine.run_tab(window, &shot, &tab).await {
                report.resolutions.push((tab.clone(), scenario, outcome));
            }
            self.check_auto_mode(window, &shot, &tab, engine).await;

            if !self.run_flag.is_running() {
                return report.finish(SweepOutcome::Cancelled);
            }
        }

        log::warn!(
            "Sweep of '{}' hit the {} tab cap without returning home",
            window.title,
            self.config.max_sweep_iterations
        );
        report.finish(SweepOutcome::CapReached)
    }
}
