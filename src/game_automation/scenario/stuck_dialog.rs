use super::{Outcome, ScenarioContext, ScenarioResult};
use crate::config::{ConfigError, StuckDialogConfig};
use crate::desktop::WindowPoint;
use crate::game_automation::resolver::ResolveAction;
use crate::matching::{
    HsvRange, MatchOptions, PixelPattern, SearchRegion, TemplateImage, check_pixel_pattern,
    detect_with_retry,
};

pub enum DialogDetector {
    /// Close button at a fraction of the matched box
    Template {
        template: TemplateImage,
        range: HsvRange,
        threshold: f32,
        click_fraction: (f32, f32),
        search_region: Option<SearchRegion>,
        retries: u32,
    },
    /// Close button at the last pattern point
    Pixels { points: PixelPattern, tolerance: u8 },
}

/// Shop or bag window left open. Fires on every visit while the dialog is visible.
pub struct StuckDialogScenario {
    pub name: &'static str,
    detector: DialogDetector,
}

impl StuckDialogScenario {
    pub fn new(name: &'static str, detector: DialogDetector) -> Self {
        Self { name, detector }
    }

    pub(super) fn from_config(
        name: &'static str,
        config: &StuckDialogConfig,
        default_fraction: (f32, f32),
        retries: u32,
    ) -> Result<Self, ConfigError> {
        let detector = match config {
            StuckDialogConfig::Template {
                image,
                already_masked,
                range,
                threshold,
                click_fraction,
                search_region,
            } => DialogDetector::Template {
                template: TemplateImage::load(image, range, *already_masked)
                    .map_err(|source| ConfigError::Template { scenario: name, source })?,
                range: *range,
                threshold: *threshold,
                click_fraction: click_fraction.unwrap_or(default_fraction),
                search_region: *search_region,
                retries,
            },
            StuckDialogConfig::Pixels { points, tolerance } => DialogDetector::Pixels {
                points: points.clone(),
                tolerance: *tolerance,
            },
        };
        Ok(Self::new(name, detector))
    }

    fn close_point(&self, ctx: &ScenarioContext<'_>) -> ScenarioResult<Option<WindowPoint>> {
        match &self.detector {
            DialogDetector::Template {
                template,
                range,
                threshold,
                click_fraction,
                search_region,
                retries,
            } => {
                let options = MatchOptions {
                    range,
                    threshold: *threshold,
                    screenshot_is_masked: false,
                    search_region: *search_region,
                };
                let found = detect_with_retry(template, ctx.screenshot, &options, *retries)?;
                Ok(found.map(|m| {
                    let (x, y) = m.point_at_fraction(click_fraction.0, click_fraction.1);
                    WindowPoint::new(x, y)
                }))
            }
            DialogDetector::Pixels { points, tolerance } => {
                if !check_pixel_pattern(ctx.screenshot, points, *tolerance)? {
                    return Ok(None);
                }
                Ok(points.last().map(|p| WindowPoint::new(p.x, p.y)))
            }
        }
    }

    pub async fn detect_and_solve(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<Outcome> {
        let Some(point) = self.close_point(ctx)? else {
            return Ok(Outcome::NoOp);
        };
        log::info!("{} detected on '{}' ({}), closing", self.name, ctx.window.title, ctx.tab);
        ctx.resolve(ResolveAction::SingleClick, &[point]).await?;
        Ok(Outcome::Resolved)
    }
}
