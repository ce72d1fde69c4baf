use super::{Outcome, ScenarioContext, ScenarioResult};
use crate::desktop::WindowPoint;
use crate::game_automation::resolver::ResolveAction;
use crate::matching::{PixelPattern, check_pixel_pattern};
use std::time::Duration;
use tokio::time::Instant;

/// Login screen that stays up.
///
/// Scene transitions briefly show the login screen too, so the full login
/// sequence only runs once the screen has been seen continuously for `confirm`.
pub struct LoginScenario {
    points: PixelPattern,
    tolerance: u8,
    confirm: Duration,
    /// Login button, server icon, character avatar
    login_points: Vec<WindowPoint>,
}

impl LoginScenario {
    pub fn new(points: PixelPattern, tolerance: u8, confirm: Duration, login_points: Vec<WindowPoint>) -> Self {
        Self {
            points,
            tolerance,
            confirm,
            login_points,
        }
    }

    pub async fn detect_and_solve(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<Outcome> {
        let visible = check_pixel_pattern(ctx.screenshot, &self.points, self.tolerance)?;
        let key = ctx.tab.key;
        let timers = ctx.state.entry(key);

        if !visible {
            if timers.last_seen_login.take().is_some() {
                log::debug!("{} login screen gone", ctx.tab);
            }
            return Ok(Outcome::NoOp);
        }

        let now = Instant::now();
        let Some(seen) = timers.last_seen_login else {
            timers.last_seen_login = Some(now);
            log::info!("{} login screen seen, waiting {}s to confirm", ctx.tab, self.confirm.as_secs());
            return Ok(Outcome::NoOp);
        };

        let elapsed = now - seen;
        if elapsed < self.confirm {
            log::debug!("{} login screen for {:.1}s", ctx.tab, elapsed.as_secs_f32());
            return Ok(Outcome::NoOp);
        }

        log::info!("{} login confirmed on '{}', logging in", ctx.tab, ctx.window.title);
        ctx.resolve(ResolveAction::Login, &self.login_points).await?;
        ctx.state.entry(key).last_seen_login = None;
        Ok(Outcome::LoginConfirmed)
    }
}
