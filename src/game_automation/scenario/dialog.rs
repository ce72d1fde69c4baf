use super::{Outcome, ScenarioContext, ScenarioResult};
use crate::config::DialogConfig;
use crate::desktop::WindowPoint;
use crate::game_automation::resolver::ResolveAction;
use crate::matching::{PixelPattern, check_pixel_pattern};

/// Stateless dialog detector: match now, resolve now.
pub struct OneShotScenario {
    pub name: &'static str,
    points: PixelPattern,
    tolerance: u8,
    action: ResolveAction,
    action_points: Vec<WindowPoint>,
}

impl OneShotScenario {
    pub fn new(
        name: &'static str,
        points: PixelPattern,
        tolerance: u8,
        action: ResolveAction,
        action_points: Vec<WindowPoint>,
    ) -> Self {
        Self {
            name,
            points,
            tolerance,
            action,
            action_points,
        }
    }

    /// Single click on the last pattern point, the dialog's confirm or close button.
    pub fn close_button(name: &'static str, config: &DialogConfig) -> Self {
        let button = config
            .points
            .last()
            .map(|p| WindowPoint::new(p.x, p.y))
            .into_iter()
            .collect();
        Self::new(name, config.points.clone(), config.tolerance, ResolveAction::SingleClick, button)
    }

    pub fn with_action(
        name: &'static str,
        config: &DialogConfig,
        action: ResolveAction,
        action_points: Vec<WindowPoint>,
    ) -> Self {
        Self::new(name, config.points.clone(), config.tolerance, action, action_points)
    }

    pub async fn detect_and_solve(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<Outcome> {
        if !check_pixel_pattern(ctx.screenshot, &self.points, self.tolerance)? {
            return Ok(Outcome::NoOp);
        }
        log::info!("{} detected on '{}' ({})", self.name, ctx.window.title, ctx.tab);
        ctx.resolve(self.action, &self.action_points).await?;
        Ok(Outcome::Resolved)
    }
}
