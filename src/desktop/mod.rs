//! OS-facing collaborators
//!
//! The engine never talks to the operating system directly. Window enumeration,
//! focus, capture and input synthesis all go through the [`Desktop`] trait so the
//! detection logic can run against a scripted fake in tests.

pub mod error;
#[cfg(test)]
pub(crate) mod fake;
#[cfg(feature = "desktop")]
pub mod xcap_impl;

pub use error::{DesktopError, DesktopResult};
#[cfg(feature = "desktop")]
pub use xcap_impl::XcapDesktop;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A captured window client area. Pixel coordinates are window-relative.
pub type Screenshot = RgbImage;

/// Opaque OS window identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowHandle(pub u64);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Absolute screen coordinate, only produced when input is about to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Window-relative click target, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct WindowPoint {
    pub x: u32,
    pub y: u32,
}

impl WindowPoint {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl From<(u32, u32)> for WindowPoint {
    fn from((x, y): (u32, u32)) -> Self {
        Self::new(x, y)
    }
}

impl From<WindowPoint> for (u32, u32) {
    fn from(p: WindowPoint) -> Self {
        (p.x, p.y)
    }
}

/// A top-level game window and its geometry at discovery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameWindow {
    pub handle: WindowHandle,
    pub title: String,
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl GameWindow {
    /// Convert a window-relative point to screen coordinates.
    pub fn to_screen(&self, point: WindowPoint) -> ScreenPoint {
        ScreenPoint::new(self.left + point.x as i32, self.top + point.y as i32)
    }
}

/// Everything the engine needs from the operating system.
///
/// Calls block; the engine only ever issues one at a time.
pub trait Desktop: Send + Sync {
    /// Live windows whose title contains `title_pattern`, in a stable order.
    fn find_windows(&self, title_pattern: &str) -> DesktopResult<Vec<GameWindow>>;

    /// Raise and activate a window.
    fn focus(&self, window: &GameWindow) -> DesktopResult<()>;

    /// Send the global tab-cycle shortcut to whatever window has focus.
    fn send_tab_cycle(&self) -> DesktopResult<()>;

    fn screenshot(&self, window: &GameWindow) -> DesktopResult<Screenshot>;

    fn click(&self, at: ScreenPoint) -> DesktopResult<()>;

    fn double_click(&self, at: ScreenPoint) -> DesktopResult<()>;

    /// Press at `from`, move by (`dx`, `dy`), release.
    fn drag(&self, from: ScreenPoint, dx: i32, dy: i32) -> DesktopResult<()>;
}

/// Stand-in used when the binary is built without an OS backend.
///
/// Every call fails with [`DesktopError::Unsupported`], so configs can still be
/// loaded and checked.
#[derive(Debug, Default)]
pub struct NoDesktop;

impl NoDesktop {
    fn unsupported<T>(operation: &str) -> DesktopResult<T> {
        Err(DesktopError::Unsupported {
            operation: operation.to_string(),
        })
    }
}

impl Desktop for NoDesktop {
    fn find_windows(&self, _title_pattern: &str) -> DesktopResult<Vec<GameWindow>> {
        Self::unsupported("window enumeration")
    }

    fn focus(&self, _window: &GameWindow) -> DesktopResult<()> {
        Self::unsupported("window focus")
    }

    fn send_tab_cycle(&self) -> DesktopResult<()> {
        Self::unsupported("keyboard input")
    }

    fn screenshot(&self, _window: &GameWindow) -> DesktopResult<Screenshot> {
        Self::unsupported("screen capture")
    }

    fn click(&self, _at: ScreenPoint) -> DesktopResult<()> {
        Self::unsupported("mouse input")
    }

    fn double_click(&self, _at: ScreenPoint) -> DesktopResult<()> {
        Self::unsupported("mouse input")
    }

    fn drag(&self, _from: ScreenPoint, _dx: i32, _dy: i32) -> DesktopResult<()> {
        Self::unsupported("mouse input")
    }
}
