//! Input sequences that clear a detected condition
//!
//! A resolution always focuses the target window first, then runs its clicks
//! and fixed delays on the blocking pool. The calling scenario awaits the whole
//! sequence, so only one sequence is ever in flight.

use crate::config::ResolverConfig;
use crate::desktop::{Desktop, DesktopError, GameWindow, ScreenPoint, WindowPoint};
use std::fmt;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{action} needs point #{index}, only {available} configured")]
    MissingPoint {
        action: ResolveAction,
        index: usize,
        available: usize,
    },

    #[error("Desktop error: {0}")]
    Desktop(#[from] DesktopError),

    #[error("Input worker failed: {0}")]
    Join(String),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveAction {
    /// Click the first point
    SingleClick,
    /// Drag up, down, right and left from the first point
    DragAround,
    /// Login button, server icon, then double-click the character avatar
    Login,
    /// Server icon, then double-click the character avatar
    SelectServer,
    /// Double-click the character avatar (third point)
    SelectCharacter,
    /// Click every point in order with a short pause between them
    ReopenGame,
}

impl fmt::Display for ResolveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SingleClick => "single_click",
            Self::DragAround => "drag_around",
            Self::Login => "login",
            Self::SelectServer => "select_server",
            Self::SelectCharacter => "select_character",
            Self::ReopenGame => "reopen_game",
        };
        f.write_str(name)
    }
}

impl ResolveAction {
    /// Highest point index the sequence reads.
    fn required_points(&self) -> usize {
        match self {
            Self::SingleClick | Self::DragAround | Self::ReopenGame => 1,
            Self::Login | Self::SelectServer | Self::SelectCharacter => 3,
        }
    }
}

#[derive(Clone)]
pub struct Resolver {
    desktop: Arc<dyn Desktop>,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(desktop: Arc<dyn Desktop>, config: ResolverConfig) -> Self {
        Self { desktop, config }
    }

    /// Run `action` against `window`. `points` are window-relative and are
    /// converted to screen coordinates here, using the window's current origin.
    pub async fn resolve(
        &self,
        window: &GameWindow,
        action: ResolveAction,
        points: &[WindowPoint],
    ) -> ResolveResult<()> {
        let needed = action.required_points();
        if points.len() < needed {
            return Err(ResolveError::MissingPoint {
                action,
                index: needed - 1,
                available: points.len(),
            });
        }

        let screen_points: Vec<ScreenPoint> = points.iter().map(|p| window.to_screen(*p)).collect();
        log::info!(
            "Resolving {action} on '{}' at {:?}",
            window.title,
            screen_points.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>()
        );

        let desktop = Arc::clone(&self.desktop);
        let config = self.config.clone();
        let window = window.clone();
        tokio::task::spawn_blocking(move || {
            run_sequence(desktop.as_ref(), &config, &window, action, &screen_points)
        })
        .await
        .map_err(|e| ResolveError::Join(e.to_string()))?
    }
}

fn run_sequence(
    desktop: &dyn Desktop,
    config: &ResolverConfig,
    window: &GameWindow,
    action: ResolveAction,
    points: &[ScreenPoint],
) -> ResolveResult<()> {
    desktop.focus(window)?;
    pause(config.focus_settle_ms);

    let step = config.login_step_delay_ms;
    match action {
        ResolveAction::SingleClick => desktop.click(points[0])?,
        ResolveAction::DragAround => {
            let d = config.drag_distance;
            for (dx, dy) in [(0, -d), (0, d), (d, 0), (-d, 0)] {
                desktop.drag(points[0], dx, dy)?;
            }
        }
        ResolveAction::Login => {
            desktop.click(points[0])?;
            log::info!("Clicked login button");
            pause(step);
            desktop.click(points[1])?;
            log::info!("Clicked server icon");
            pause(step);
            desktop.double_click(points[2])?;
            log::info!("Double-clicked character avatar");
        }
        ResolveAction::SelectServer => {
            desktop.click(points[1])?;
            log::info!("Clicked server icon");
            pause(step);
            desktop.double_click(points[2])?;
            log::info!("Double-clicked character avatar");
        }
        ResolveAction::SelectCharacter => {
            desktop.double_click(points[2])?;
            log::info!("Double-clicked character avatar");
        }
        ResolveAction::ReopenGame => {
            for (i, point) in points.iter().enumerate() {
                if i > 0 {
                    pause(config.reopen_step_delay_ms);
                }
                desktop.click(*point)?;
            }
        }
    }
    Ok(())
}

fn pause(ms: u64) {
    if ms > 0 {
        sleep(Duration::from_millis(ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::WindowHandle;
    use crate::desktop::fake::{FakeDesktop, InputEvent};

    fn window() -> GameWindow {
        GameWindow {
            handle: WindowHandle(11),
            title: "A1 test".into(),
            left: 100,
            top: 50,
            width: 800,
            height: 600,
        }
    }

    fn fast_config() -> ResolverConfig {
        ResolverConfig {
            focus_settle_ms: 0,
            login_step_delay_ms: 1,
            reopen_step_delay_ms: 0,
            drag_distance: 60,
        }
    }

    fn login_points() -> Vec<WindowPoint> {
        vec![
            WindowPoint::new(276, 370),
            WindowPoint::new(315, 223),
            WindowPoint::new(153, 321),
        ]
    }

    #[tokio::test]
    async fn test_single_click_focuses_then_clicks_screen_point() {
        let desktop = Arc::new(FakeDesktop::new());
        let resolver = Resolver::new(desktop.clone(), fast_config());

        resolver
            .resolve(&window(), ResolveAction::SingleClick, &[WindowPoint::new(10, 20)])
            .await
            .unwrap();

        assert_eq!(
            desktop.events(),
            vec![
                InputEvent::Focus(WindowHandle(11)),
                InputEvent::Click(ScreenPoint::new(110, 70)),
            ]
        );
    }

    #[tokio::test]
    async fn test_login_sequence_order() {
        let desktop = Arc::new(FakeDesktop::new());
        let resolver = Resolver::new(desktop.clone(), fast_config());

        resolver
            .resolve(&window(), ResolveAction::Login, &login_points())
            .await
            .unwrap();

        assert_eq!(
            desktop.clicks(),
            vec![
                InputEvent::Click(ScreenPoint::new(376, 420)),
                InputEvent::Click(ScreenPoint::new(415, 273)),
                InputEvent::DoubleClick(ScreenPoint::new(253, 371)),
            ]
        );
    }

    #[tokio::test]
    async fn test_select_server_and_character() {
        let desktop = Arc::new(FakeDesktop::new());
        let resolver = Resolver::new(desktop.clone(), fast_config());

        resolver
            .resolve(&window(), ResolveAction::SelectServer, &login_points())
            .await
            .unwrap();
        assert_eq!(
            desktop.clicks(),
            vec![
                InputEvent::Click(ScreenPoint::new(415, 273)),
                InputEvent::DoubleClick(ScreenPoint::new(253, 371)),
            ]
        );

        desktop.clear_events();
        resolver
            .resolve(&window(), ResolveAction::SelectCharacter, &login_points())
            .await
            .unwrap();
        assert_eq!(desktop.clicks(), vec![InputEvent::DoubleClick(ScreenPoint::new(253, 371))]);
    }

    #[tokio::test]
    async fn test_drag_around_moves_in_four_directions() {
        let desktop = Arc::new(FakeDesktop::new());
        let resolver = Resolver::new(desktop.clone(), fast_config());

        resolver
            .resolve(&window(), ResolveAction::DragAround, &[WindowPoint::new(400, 380)])
            .await
            .unwrap();

        let from = ScreenPoint::new(500, 430);
        assert_eq!(
            desktop.clicks(),
            vec![
                InputEvent::Drag { from, dx: 0, dy: -60 },
                InputEvent::Drag { from, dx: 0, dy: 60 },
                InputEvent::Drag { from, dx: 60, dy: 0 },
                InputEvent::Drag { from, dx: -60, dy: 0 },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_points_rejected_before_input() {
        let desktop = Arc::new(FakeDesktop::new());
        let resolver = Resolver::new(desktop.clone(), fast_config());

        let err = resolver
            .resolve(&window(), ResolveAction::Login, &login_points()[..2])
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::MissingPoint { index: 2, available: 2, .. }));
        assert!(desktop.events().is_empty());
    }

    #[tokio::test]
    async fn test_focus_failure_sends_no_input() {
        let desktop = Arc::new(FakeDesktop::new());
        desktop.fail_focus(WindowHandle(11));
        let resolver = Resolver::new(desktop.clone(), fast_config());

        let err = resolver
            .resolve(&window(), ResolveAction::SingleClick, &[WindowPoint::new(1, 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::Desktop(DesktopError::FocusFailed { .. })));
        assert!(desktop.clicks().is_empty());
    }
}
