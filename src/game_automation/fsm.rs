// Detection scheduler: one periodic tick sweeps every game window in turn
use super::resolver::Resolver;
use super::scenario::ScenarioEngine;
use super::tab_iterator::{SweepOutcome, TabIterator};
use super::types::{AutomationCommand, AutomationEvent, AutomationState, TickSummary};
use crate::config::{ConfigError, DetectionConfig};
use crate::desktop::{Desktop, GameWindow, WindowHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval};

/// Shared "is running" flag, checked by the tab iterator at every wait.
#[derive(Debug, Clone, Default)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn new(running: bool) -> Self {
        Self(Arc::new(AtomicBool::new(running)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, running: bool) {
        self.0.store(running, Ordering::SeqCst);
    }
}

/// Controls a scheduler running on another task.
///
/// Stop and Shutdown clear the run flag before the command is queued, however
/// they are sent, so a sweep in progress aborts at its next wait instead of
/// finishing first.
#[derive(Debug, Clone)]
pub struct AutomationHandle {
    command_tx: mpsc::Sender<AutomationCommand>,
    run_flag: RunFlag,
}

impl AutomationHandle {
    pub fn new(command_tx: mpsc::Sender<AutomationCommand>, run_flag: RunFlag) -> Self {
        Self { command_tx, run_flag }
    }

    pub async fn send(&self, command: AutomationCommand) -> bool {
        if matches!(command, AutomationCommand::Stop | AutomationCommand::Shutdown) {
            self.run_flag.set(false);
        }
        self.command_tx.send(command).await.is_ok()
    }

    pub async fn start(&self) -> bool {
        self.send(AutomationCommand::Start).await
    }

    pub async fn stop(&self) -> bool {
        self.send(AutomationCommand::Stop).await
    }

    pub async fn shutdown(&self) -> bool {
        self.send(AutomationCommand::Shutdown).await
    }

    pub fn is_running(&self) -> bool {
        self.run_flag.is_running()
    }
}

enum Wake {
    Command(Option<AutomationCommand>),
    Tick,
}

pub struct GameAutomation {
    state: AutomationState,
    desktop: Arc<dyn Desktop>,
    title_pattern: String,
    check_interval: Duration,
    engine: ScenarioEngine,
    iterator: TabIterator,
    run_flag: RunFlag,
    command_rx: mpsc::Receiver<AutomationCommand>,
    event_tx: mpsc::Sender<AutomationEvent>,
    should_exit: bool,
}

impl GameAutomation {
    /// Build the engine, tab iterator and scheduler described by `config`.
    pub fn new(
        config: &DetectionConfig,
        desktop: Arc<dyn Desktop>,
        command_rx: mpsc::Receiver<AutomationCommand>,
        event_tx: mpsc::Sender<AutomationEvent>,
        run_flag: RunFlag,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let resolver = Resolver::new(Arc::clone(&desktop), config.resolver.clone());
        let engine = ScenarioEngine::from_config(config, resolver)?;
        let iterator = TabIterator::new(Arc::clone(&desktop), config.tabs.clone(), run_flag.clone())
            .with_auto_mode(config.auto_mode.clone())
            .with_reopen(config.reopen.clone());

        Ok(Self {
            state: AutomationState::Idle,
            desktop,
            title_pattern: config.window_title_pattern.clone(),
            check_interval: config.check_interval(),
            engine,
            iterator,
            run_flag,
            command_rx,
            event_tx,
            should_exit: false,
        })
    }

    pub fn state(&self) -> AutomationState {
        self.state
    }

    pub fn engine(&self) -> &ScenarioEngine {
        &self.engine
    }

    // Never block detection on a slow listener
    fn emit(&self, event: AutomationEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            log::debug!("Automation event dropped: {e}");
        }
    }

    fn change_state(&mut self, new_state: AutomationState) {
        if self.state != new_state {
            log::debug!("Automation state: {:?} -> {:?}", self.state, new_state);
            self.state = new_state;
            self.emit(AutomationEvent::StateChanged(new_state));
        }
    }

    async fn discover_windows(&mut self) -> Option<Vec<GameWindow>> {
        let desktop = Arc::clone(&self.desktop);
        let pattern = self.title_pattern.clone();
        let found = tokio::task::spawn_blocking(move || desktop.find_windows(&pattern))
            .await
            .map_err(|e| e.to_string())
            .and_then(|result| result.map_err(|e| e.to_string()));
        let windows = match found {
            Ok(windows) => windows,
            Err(e) => {
                log::error!("Window discovery failed: {e}");
                self.emit(AutomationEvent::Error(format!("Window discovery failed: {e}")));
                return None;
            }
        };

        let live: Vec<WindowHandle> = windows.iter().map(|w| w.handle).collect();
        let evicted = self.engine.state_mut().retain_windows(&live);
        self.iterator.retain_windows(&live);
        if evicted > 0 {
            log::info!("Dropped timers of {evicted} tab(s) from closed windows");
        }

        if windows.is_empty() {
            log::info!("No windows matching '{}'", self.title_pattern);
        }
        self.emit(AutomationEvent::WindowsDetected(
            windows.iter().map(|w| w.title.clone()).collect(),
        ));
        Some(windows)
    }

    /// One detection pass over every live game window.
    pub async fn run_tick(&mut self) -> TickSummary {
        let started = Instant::now();
        self.change_state(AutomationState::Detecting);

        let mut summary = TickSummary {
            windows: 0,
            tabs_visited: 0,
            resolutions: 0,
            elapsed: Duration::ZERO,
        };

        if let Some(windows) = self.discover_windows().await {
            summary.windows = windows.len();
            for window in &windows {
                if !self.run_flag.is_running() {
                    log::info!("Stop requested, ending tick early");
                    break;
                }
                let report = self.iterator.sweep(window, &mut self.engine).await;
                summary.tabs_visited += report.tabs_visited;
                summary.resolutions += report.resolutions.len();

                for (tab, scenario, outcome) in report.resolutions {
                    self.emit(AutomationEvent::ScenarioResolved {
                        tab: tab.to_string(),
                        scenario,
                        outcome,
                    });
                }
                match report.outcome {
                    SweepOutcome::PatternError(e) => self.emit(AutomationEvent::Error(format!(
                        "Home fingerprint does not fit '{}': {e}",
                        window.title
                    ))),
                    SweepOutcome::Cancelled => break,
                    _ => {}
                }
            }
        }

        summary.elapsed = started.elapsed();
        log::debug!(
            "Tick done: {} window(s), {} tab(s), {} resolution(s) in {:.1}s",
            summary.windows,
            summary.tabs_visited,
            summary.resolutions,
            summary.elapsed.as_secs_f32()
        );
        self.emit(AutomationEvent::TickCompleted(summary.clone()));

        let next = if self.run_flag.is_running() {
            AutomationState::Running
        } else {
            AutomationState::Idle
        };
        self.change_state(next);
        summary
    }

    fn new_ticker(&self) -> Interval {
        let mut ticker = interval(self.check_interval);
        // An overrunning tick pushes the next one back; missed ticks are not replayed
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    async fn process_command(&mut self, command: AutomationCommand, ticker: &mut Interval) {
        log::debug!("Processing automation command: {command:?}");
        match command {
            AutomationCommand::Start => {
                if self.state == AutomationState::Idle {
                    self.run_flag.set(true);
                    *ticker = self.new_ticker();
                    self.change_state(AutomationState::Running);
                    log::info!(
                        "Automation started (interval: {}s)",
                        self.check_interval.as_secs()
                    );
                } else {
                    log::debug!("Automation already running, ignoring start command");
                }
            }
            AutomationCommand::Stop => {
                self.run_flag.set(false);
                self.change_state(AutomationState::Idle);
                log::info!("Automation stopped");
            }
            AutomationCommand::UpdateInterval(seconds) => {
                self.check_interval = Duration::from_secs(seconds.max(1));
                *ticker = self.new_ticker();
                self.emit(AutomationEvent::IntervalUpdate(self.check_interval.as_secs()));
                log::info!("Check interval updated to {}s", self.check_interval.as_secs());
            }
            AutomationCommand::RescanWindows => {
                if self.state == AutomationState::Running {
                    self.run_tick().await;
                    ticker.reset();
                } else {
                    self.discover_windows().await;
                }
            }
            AutomationCommand::RequestSnapshot => {
                self.emit(AutomationEvent::Snapshot(self.engine.state().snapshot()));
            }
            AutomationCommand::Shutdown => {
                self.should_exit = true;
                self.run_flag.set(false);
                self.change_state(AutomationState::Idle);
                log::info!("Automation shutting down");
            }
        }
    }

    /// Scheduler loop. Returns after `Shutdown` or when every command sender is gone.
    pub async fn run(&mut self) {
        log::debug!("Automation loop started");
        let mut ticker = self.new_ticker();

        loop {
            let ticking = self.state == AutomationState::Running;
            let wake = tokio::select! {
                command = self.command_rx.recv() => Wake::Command(command),
                _ = ticker.tick(), if ticking => Wake::Tick,
            };

            match wake {
                Wake::Command(Some(command)) => self.process_command(command, &mut ticker).await,
                Wake::Command(None) => break,
                Wake::Tick => {
                    self.run_tick().await;
                }
            }

            if self.should_exit {
                break;
            }
        }

        self.run_flag.set(false);
        log::debug!("Automation loop ended");
    }
}
