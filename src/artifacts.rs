//! Optional screenshot archive for positive detections

use crate::desktop::Screenshot;
use std::path::{Path, PathBuf};

/// Writes `<dir>/<tab id>__<scenario>.png`; a later hit on the same tab overwrites it.
#[derive(Debug, Clone)]
pub struct ScreenshotArchive {
    dir: PathBuf,
}

impl ScreenshotArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, tab_id: &str, scenario: &str) -> PathBuf {
        let name: String = format!("{tab_id}__{scenario}")
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c => c,
            })
            .collect();
        self.dir.join(format!("{name}.png"))
    }

    /// Save a screenshot. Failures are logged and otherwise ignored.
    pub fn save(&self, screenshot: &Screenshot, tab_id: &str, scenario: &str) -> Option<PathBuf> {
        let path = self.path_for(tab_id, scenario);
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            log::warn!("Could not create artifact dir {:?}: {e}", self.dir);
            return None;
        }
        match screenshot.save(&path) {
            Ok(()) => {
                log::debug!("Saved detection screenshot to {path:?}");
                Some(path)
            }
            Err(e) => {
                log::warn!("Could not save detection screenshot {path:?}: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_path_sanitizes_title() {
        let archive = ScreenshotArchive::new("/tmp/hits");
        let path = archive.path_for("12__A1: main/1__3", "stuck_shop");
        assert_eq!(path, PathBuf::from("/tmp/hits/12__A1_ main_1__3__stuck_shop.png"));
    }

    #[test]
    fn test_save_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ScreenshotArchive::new(dir.path().join("nested"));
        let saved = archive
            .save(&RgbImage::new(4, 4), "1__A1__1", "login")
            .unwrap();
        assert!(saved.exists());
        assert_eq!(image::open(&saved).unwrap().width(), 4);
    }

    #[test]
    fn test_save_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let archive = ScreenshotArchive::new(&blocker);
        assert!(archive.save(&RgbImage::new(2, 2), "t", "s").is_none());
    }
}
