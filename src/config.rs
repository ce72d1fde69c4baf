//! Detection configuration
//!
//! Every threshold, point list, colour range and timeout used by the engine is a
//! field here. The engine receives a [`DetectionConfig`] at construction time and
//! never reads files itself; [`DetectionConfig::load`] exists for the binary.
//!
//! Pattern points are written `[x, y, r, g, b]` and click points `[x, y]`, both
//! relative to the game window's top-left corner.

use crate::desktop::WindowPoint;
use crate::matching::{HsvRange, PixelPattern, SearchRegion};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {source}")]
    Parse {
        #[from]
        source: serde_json::Error,
    },

    #[error("Invalid config value '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to load template for '{scenario}': {source}")]
    Template {
        scenario: &'static str,
        source: crate::matching::MatchError,
    },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Substring matched against top-level window titles
    pub window_title_pattern: String,
    /// Seconds between detection ticks
    pub check_interval_secs: u64,
    /// Attempts per template check before reporting no match
    pub detect_retry: u32,
    pub tabs: TabConfig,
    pub resolver: ResolverConfig,
    /// Login button, server icon, character avatar
    pub login_points: Vec<WindowPoint>,
    pub stuck_shop: Option<StuckDialogConfig>,
    pub stuck_bag: Option<StuckDialogConfig>,
    pub town_stuck: Option<TownStuckConfig>,
    pub login: Option<LoginConfig>,
    pub account_warning: Option<DialogConfig>,
    pub select_server: Option<DialogConfig>,
    pub select_character: Option<DialogConfig>,
    pub server_connect_warning: Option<DialogConfig>,
    pub crash_dialog: Option<DialogConfig>,
    pub auto_mode: Option<AutoModeConfig>,
    pub reopen: Option<ReopenConfig>,
    /// Screenshots of positive detections are written here when set
    pub artifacts_dir: Option<PathBuf>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_title_pattern: "A1".to_string(),
            check_interval_secs: 60,
            detect_retry: crate::matching::DETECT_RETRY,
            tabs: TabConfig::default(),
            resolver: ResolverConfig::default(),
            login_points: Vec::new(),
            stuck_shop: None,
            stuck_bag: None,
            town_stuck: None,
            login: None,
            account_warning: None,
            select_server: None,
            select_character: None,
            server_connect_warning: None,
            crash_dialog: None,
            auto_mode: None,
            reopen: None,
            artifacts_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TabConfig {
    /// Fingerprint of the home tab
    pub home_points: PixelPattern,
    pub home_tolerance: u8,
    /// Tab-cycle presses while looking for the home tab
    pub max_initial_attempts: u32,
    /// Tabs visited per window before giving up on seeing home again
    pub max_sweep_iterations: u32,
    pub focus_settle_ms: u64,
    pub home_search_settle_ms: u64,
    pub tab_settle_ms: u64,
}

impl Default for TabConfig {
    fn default() -> Self {
        Self {
            home_points: Vec::new(),
            home_tolerance: 5,
            max_initial_attempts: 10,
            max_sweep_iterations: 20,
            focus_settle_ms: 1000,
            home_search_settle_ms: 100,
            tab_settle_ms: 3000,
        }
    }
}

impl TabConfig {
    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }

    pub fn home_search_settle(&self) -> Duration {
        Duration::from_millis(self.home_search_settle_ms)
    }

    pub fn tab_settle(&self) -> Duration {
        Duration::from_millis(self.tab_settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub focus_settle_ms: u64,
    /// Hard wait between the steps of the login sequence
    pub login_step_delay_ms: u64,
    pub reopen_step_delay_ms: u64,
    /// Pixels moved by each of the four drags of the move-around action
    pub drag_distance: i32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            focus_settle_ms: 1000,
            login_step_delay_ms: 5000,
            reopen_step_delay_ms: 200,
            drag_distance: 60,
        }
    }
}

/// Shop or bag dialog left open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StuckDialogConfig {
    /// Masked template; the close button sits at a fraction of the match box.
    Template {
        image: PathBuf,
        #[serde(default = "default_true")]
        already_masked: bool,
        #[serde(default)]
        range: HsvRange,
        #[serde(default = "default_threshold")]
        threshold: f32,
        /// Defaults to (0.25, 0.5) for the shop and (0.75, 0.5) for the bag
        #[serde(default)]
        click_fraction: Option<(f32, f32)>,
        #[serde(default)]
        search_region: Option<SearchRegion>,
    },
    /// Pixel pattern; the last point is the close button.
    Pixels {
        points: PixelPattern,
        #[serde(default = "default_tolerance")]
        tolerance: u8,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TownStuckConfig {
    pub images: Vec<PathBuf>,
    pub images_masked: bool,
    pub range: HsvRange,
    pub threshold: f32,
    pub search_region: Option<SearchRegion>,
    /// Continuous time in town before moving the character
    pub stuck_timeout_secs: u64,
    /// Quiet period after a move before the next one may fire
    pub cooldown_secs: u64,
    pub move_offset: WindowPoint,
}

impl Default for TownStuckConfig {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            images_masked: true,
            range: HsvRange::TOWN_NAME_GREEN,
            threshold: 0.7,
            search_region: None,
            stuck_timeout_secs: 20,
            cooldown_secs: 5,
            move_offset: WindowPoint::new(400, 380),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub points: PixelPattern,
    pub tolerance: u8,
    /// How long the login screen must stay visible before logging in
    pub confirm_secs: u64,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            tolerance: default_tolerance(),
            confirm_secs: 60,
        }
    }
}

/// A dialog recognised by a pixel pattern whose last point is its button.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogConfig {
    pub points: PixelPattern,
    #[serde(default = "default_tolerance")]
    pub tolerance: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoModeConfig {
    pub off_points: PixelPattern,
    #[serde(default = "default_auto_tolerance")]
    pub tolerance: u8,
    pub toggle_point: WindowPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReopenConfig {
    #[serde(default = "default_reopen_period")]
    pub check_period_secs: u64,
    pub shortcut_points: Vec<WindowPoint>,
    #[serde(default = "default_shortcut_indexes")]
    pub shortcut_indexes: Vec<usize>,
    pub home_tab_point: WindowPoint,
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> f32 {
    0.7
}

fn default_tolerance() -> u8 {
    crate::matching::pixel::DEFAULT_TOLERANCE
}

fn default_auto_tolerance() -> u8 {
    5
}

fn default_reopen_period() -> u64 {
    60
}

fn default_shortcut_indexes() -> Vec<usize> {
    vec![0]
}

impl DetectionConfig {
    /// Read and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_title_pattern.is_empty() {
            return Err(invalid("window_title_pattern", "must not be empty"));
        }
        if self.check_interval_secs == 0 {
            return Err(invalid("check_interval_secs", "must be at least 1"));
        }
        if self.tabs.home_points.is_empty() {
            return Err(invalid("tabs.home_points", "home tab fingerprint is required"));
        }
        if self.tabs.max_initial_attempts == 0 {
            return Err(invalid("tabs.max_initial_attempts", "must be at least 1"));
        }
        if self.tabs.max_sweep_iterations == 0 {
            return Err(invalid("tabs.max_sweep_iterations", "must be at least 1"));
        }

        let needs_login_points =
            self.login.is_some() || self.select_server.is_some() || self.select_character.is_some();
        if needs_login_points && self.login_points.len() < 3 {
            return Err(invalid(
                "login_points",
                format!(
                    "login, server and character points are required, got {}",
                    self.login_points.len()
                ),
            ));
        }

        for (field, shop) in [("stuck_shop", &self.stuck_shop), ("stuck_bag", &self.stuck_bag)] {
            match shop {
                Some(StuckDialogConfig::Template { threshold, .. }) => check_threshold(field, *threshold)?,
                Some(StuckDialogConfig::Pixels { points, .. }) if points.is_empty() => {
                    return Err(invalid(field, "pixel pattern must not be empty"));
                }
                _ => {}
            }
        }

        if let Some(town) = &self.town_stuck {
            if town.images.is_empty() {
                return Err(invalid("town_stuck.images", "at least one town image is required"));
            }
            check_threshold("town_stuck.threshold", town.threshold)?;
        }

        if let Some(login) = &self.login
            && login.points.is_empty()
        {
            return Err(invalid("login.points", "pixel pattern must not be empty"));
        }

        for (field, dialog) in [
            ("account_warning", &self.account_warning),
            ("select_server", &self.select_server),
            ("select_character", &self.select_character),
            ("server_connect_warning", &self.server_connect_warning),
            ("crash_dialog", &self.crash_dialog),
        ] {
            if let Some(dialog) = dialog
                && dialog.points.is_empty()
            {
                return Err(invalid(field, "pixel pattern must not be empty"));
            }
        }

        if let Some(auto) = &self.auto_mode
            && auto.off_points.is_empty()
        {
            return Err(invalid("auto_mode.off_points", "pixel pattern must not be empty"));
        }

        if let Some(reopen) = &self.reopen
            && let Some(bad) = reopen
                .shortcut_indexes
                .iter()
                .find(|&&i| i >= reopen.shortcut_points.len())
        {
            return Err(invalid(
                "reopen.shortcut_indexes",
                format!(
                    "index {bad} out of range for {} shortcut points",
                    reopen.shortcut_points.len()
                ),
            ));
        }

        Ok(())
    }
}

fn check_threshold(field: &'static str, threshold: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(invalid(field, format!("threshold {threshold} outside 0..=1")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::PatternPoint;

    fn minimal() -> DetectionConfig {
        DetectionConfig {
            tabs: TabConfig {
                home_points: vec![PatternPoint::new(1, 1, 10, 10, 10)],
                ..TabConfig::default()
            },
            ..DetectionConfig::default()
        }
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = DetectionConfig::default();
        assert_eq!(config.check_interval_secs, 60);
        assert_eq!(config.detect_retry, 3);
        assert_eq!(config.tabs.max_initial_attempts, 10);
        assert_eq!(config.tabs.max_sweep_iterations, 20);
        assert_eq!(config.resolver.login_step_delay_ms, 5000);

        let town = TownStuckConfig::default();
        assert_eq!(town.stuck_timeout_secs, 20);
        assert_eq!(town.cooldown_secs, 5);
        assert_eq!(town.threshold, 0.7);
        assert_eq!(LoginConfig::default().confirm_secs, 60);
    }

    #[test]
    fn test_minimal_config_is_valid() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn test_home_fingerprint_is_required() {
        let err = DetectionConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "tabs.home_points", .. }));
    }

    #[test]
    fn test_login_requires_three_points() {
        let mut config = minimal();
        config.login = Some(LoginConfig {
            points: vec![PatternPoint::new(1, 1, 0, 0, 0)],
            ..LoginConfig::default()
        });
        config.login_points = vec![WindowPoint::new(1, 1), WindowPoint::new(2, 2)];
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "login_points", .. }));
    }

    #[test]
    fn test_reopen_index_out_of_range() {
        let mut config = minimal();
        config.reopen = Some(ReopenConfig {
            check_period_secs: 60,
            shortcut_points: vec![WindowPoint::new(5, 5)],
            shortcut_indexes: vec![0, 1],
            home_tab_point: WindowPoint::new(1, 1),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parses_partial_json() {
        let json = r#"{
            "window_title_pattern": "MuMu",
            "tabs": { "home_points": [[10, 20, 1, 2, 3]], "tab_settle_ms": 500 },
            "login_points": [[276, 370], [315, 223], [153, 321]],
            "stuck_shop": { "kind": "pixels", "points": [[5, 5, 9, 9, 9], [30, 40, 1, 1, 1]] },
            "stuck_bag": { "kind": "template", "image": "bag.png", "click_fraction": [0.75, 0.5] },
            "login": { "points": [[1, 2, 3, 4, 5]] },
            "auto_mode": { "off_points": [[3, 3, 200, 0, 0]], "toggle_point": [700, 40] }
        }"#;
        let config: DetectionConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.window_title_pattern, "MuMu");
        assert_eq!(config.tabs.tab_settle_ms, 500);
        assert_eq!(config.tabs.max_sweep_iterations, 20);
        assert_eq!(config.login_points[1], WindowPoint::new(315, 223));
        assert_eq!(config.login.as_ref().unwrap().confirm_secs, 60);
        assert_eq!(config.auto_mode.as_ref().unwrap().tolerance, 5);
        match config.stuck_bag.unwrap() {
            StuckDialogConfig::Template {
                already_masked,
                threshold,
                click_fraction,
                ..
            } => {
                assert!(already_masked);
                assert_eq!(threshold, 0.7);
                assert_eq!(click_fraction, Some((0.75, 0.5)));
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = DetectionConfig::load(Path::new("/nonexistent/tab-warden.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "tabs": { "home_points": [[0, 0, 0, 0, 0]] } }"#).unwrap();
        let config = DetectionConfig::load(&path).unwrap();
        assert_eq!(config.window_title_pattern, "A1");
    }
}
