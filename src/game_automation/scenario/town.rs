use super::{Outcome, ScenarioContext, ScenarioResult};
use crate::config::{ConfigError, TownStuckConfig};
use crate::desktop::WindowPoint;
use crate::game_automation::resolver::ResolveAction;
use crate::matching::{HsvRange, MatchOptions, SearchRegion, TemplateImage, detect_with_retry};
use std::time::Duration;
use tokio::time::Instant;

/// Character idling in town.
///
/// A town-name template must stay visible for `stuck_timeout` of continuous
/// observation before the character is moved. Any visit without a match
/// restarts the clock, and nothing fires within `cooldown` of the first sighting
/// or of the previous move.
pub struct TownStuckScenario {
    templates: Vec<TemplateImage>,
    range: HsvRange,
    threshold: f32,
    search_region: Option<SearchRegion>,
    retries: u32,
    stuck_timeout: Duration,
    cooldown: Duration,
    move_offset: WindowPoint,
}

impl TownStuckScenario {
    pub fn new(
        templates: Vec<TemplateImage>,
        range: HsvRange,
        threshold: f32,
        stuck_timeout: Duration,
        cooldown: Duration,
        move_offset: WindowPoint,
    ) -> Self {
        Self {
            templates,
            range,
            threshold,
            search_region: None,
            retries: 1,
            stuck_timeout,
            cooldown,
            move_offset,
        }
    }

    pub fn with_search_region(mut self, region: Option<SearchRegion>) -> Self {
        self.search_region = region;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub(super) fn from_config(config: &TownStuckConfig, retries: u32) -> Result<Self, ConfigError> {
        let templates = config
            .images
            .iter()
            .map(|path| TemplateImage::load(path, &config.range, config.images_masked))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| ConfigError::Template {
                scenario: "town_stuck",
                source,
            })?;
        Ok(Self::new(
            templates,
            config.range,
            config.threshold,
            Duration::from_secs(config.stuck_timeout_secs),
            Duration::from_secs(config.cooldown_secs),
            config.move_offset,
        )
        .with_search_region(config.search_region)
        .with_retries(retries))
    }

    fn in_town(&self, ctx: &ScenarioContext<'_>) -> ScenarioResult<bool> {
        let options = MatchOptions {
            range: &self.range,
            threshold: self.threshold,
            screenshot_is_masked: false,
            search_region: self.search_region,
        };
        for template in &self.templates {
            if detect_with_retry(template, ctx.screenshot, &options, self.retries)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn detect_and_solve(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<Outcome> {
        let in_town = self.in_town(ctx)?;
        let key = ctx.tab.key;
        let timers = ctx.state.entry(key);

        if !in_town {
            if timers.first_seen_stuck.take().is_some() {
                log::debug!("{} left town, stuck timer reset", ctx.tab);
            }
            return Ok(Outcome::NoOp);
        }

        let now = Instant::now();
        let Some(first_seen) = timers.first_seen_stuck else {
            timers.first_seen_stuck = Some(now);
            log::debug!("{} seen in town, stuck timer started", ctx.tab);
            return Ok(Outcome::NoOp);
        };

        let elapsed = now - first_seen;
        let cooling = timers
            .last_solved
            .is_some_and(|solved| now - solved < self.cooldown);
        if elapsed < self.cooldown || cooling || elapsed < self.stuck_timeout {
            log::debug!("{} in town for {:.1}s", ctx.tab, elapsed.as_secs_f32());
            return Ok(Outcome::NoOp);
        }

        log::info!(
            "{} stuck in town for {:.1}s on '{}', moving around",
            ctx.tab,
            elapsed.as_secs_f32(),
            ctx.window.title
        );
        ctx.resolve(ResolveAction::DragAround, &[self.move_offset]).await?;

        let timers = ctx.state.entry(key);
        timers.first_seen_stuck = None;
        timers.last_solved = Some(now);
        Ok(Outcome::Resolved)
    }
}
