//! Real desktop backend
//!
//! Windows are enumerated and captured with `xcap`, mouse and keyboard input is
//! synthesized with `enigo`. Raising a window uses the Win32 API directly, since
//! the emulator this tool drives only runs on Windows.

use super::{Desktop, DesktopError, DesktopResult, GameWindow, ScreenPoint, Screenshot, WindowHandle};
use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use image::{Rgb, RgbImage};
use std::thread::sleep;
use std::time::Duration;

const DOUBLE_CLICK_GAP: Duration = Duration::from_millis(10);
const DRAG_PRESS_HOLD: Duration = Duration::from_secs(1);
const DRAG_MOVE_DURATION: Duration = Duration::from_millis(500);
const DRAG_RELEASE_HOLD: Duration = Duration::from_millis(200);
const DRAG_STEPS: i32 = 10;

#[derive(Debug, Default)]
pub struct XcapDesktop;

impl XcapDesktop {
    pub fn new() -> Self {
        Self
    }

    // A fresh connection per sequence keeps the backend Send + Sync on every platform
    fn enigo(&self) -> DesktopResult<Enigo> {
        Enigo::new(&Settings::default()).map_err(|e| DesktopError::InputFailed {
            description: format!("could not open input connection: {e}"),
        })
    }

    fn find_xcap_window(&self, window: &GameWindow) -> DesktopResult<xcap::Window> {
        let all = xcap::Window::all().map_err(|e| DesktopError::EnumerationFailed {
            description: e.to_string(),
        })?;
        all.into_iter()
            .find(|w| w.id().ok().map(u64::from) == Some(window.handle.0))
            .ok_or_else(|| DesktopError::WindowGone {
                title: window.title.clone(),
            })
    }

    fn describe(window: &xcap::Window) -> Result<GameWindow, xcap::XCapError> {
        Ok(GameWindow {
            handle: WindowHandle(u64::from(window.id()?)),
            title: window.title()?,
            left: window.x()?,
            top: window.y()?,
            width: window.width()?,
            height: window.height()?,
        })
    }
}

fn input_error(e: enigo::InputError) -> DesktopError {
    DesktopError::InputFailed {
        description: e.to_string(),
    }
}

impl Desktop for XcapDesktop {
    fn find_windows(&self, title_pattern: &str) -> DesktopResult<Vec<GameWindow>> {
        let all = xcap::Window::all().map_err(|e| DesktopError::EnumerationFailed {
            description: e.to_string(),
        })?;

        let mut windows = Vec::new();
        for window in &all {
            match Self::describe(window) {
                Ok(described) if described.title.contains(title_pattern) => windows.push(described),
                Ok(_) => {}
                Err(e) => log::debug!("Skipping window that could not be described: {e}"),
            }
        }
        windows.sort_by_key(|w| w.handle);
        Ok(windows)
    }

    #[cfg(target_os = "windows")]
    fn focus(&self, window: &GameWindow) -> DesktopResult<()> {
        use windows_sys::Win32::UI::WindowsAndMessaging::{SW_RESTORE, SetForegroundWindow, ShowWindow};

        // xcap reports the HWND pointer value as the window id
        let hwnd = window.handle.0 as usize as *mut core::ffi::c_void;
        let raised = unsafe {
            ShowWindow(hwnd, SW_RESTORE);
            SetForegroundWindow(hwnd)
        };
        if raised == 0 {
            return Err(DesktopError::FocusFailed {
                title: window.title.clone(),
                description: "SetForegroundWindow refused".to_string(),
            });
        }
        Ok(())
    }

    #[cfg(not(target_os = "windows"))]
    fn focus(&self, _window: &GameWindow) -> DesktopResult<()> {
        Err(DesktopError::Unsupported {
            operation: "window focus".to_string(),
        })
    }

    fn send_tab_cycle(&self) -> DesktopResult<()> {
        let mut enigo = self.enigo()?;
        enigo.key(Key::Control, Direction::Press).map_err(input_error)?;
        let tab = enigo.key(Key::Tab, Direction::Click).map_err(input_error);
        // Always release the modifier, even when the tab press failed
        enigo.key(Key::Control, Direction::Release).map_err(input_error)?;
        tab
    }

    fn screenshot(&self, window: &GameWindow) -> DesktopResult<Screenshot> {
        let captured = self
            .find_xcap_window(window)?
            .capture_image()
            .map_err(|e| DesktopError::CaptureFailed {
                title: window.title.clone(),
                description: e.to_string(),
            })?;
        Ok(RgbImage::from_fn(captured.width(), captured.height(), |x, y| {
            let p = captured.get_pixel(x, y);
            Rgb([p[0], p[1], p[2]])
        }))
    }

    fn click(&self, at: ScreenPoint) -> DesktopResult<()> {
        let mut enigo = self.enigo()?;
        enigo.move_mouse(at.x, at.y, Coordinate::Abs).map_err(input_error)?;
        enigo.button(Button::Left, Direction::Click).map_err(input_error)?;
        log::debug!("Clicked at ({}, {})", at.x, at.y);
        Ok(())
    }

    fn double_click(&self, at: ScreenPoint) -> DesktopResult<()> {
        let mut enigo = self.enigo()?;
        enigo.move_mouse(at.x, at.y, Coordinate::Abs).map_err(input_error)?;
        enigo.button(Button::Left, Direction::Click).map_err(input_error)?;
        sleep(DOUBLE_CLICK_GAP);
        enigo.button(Button::Left, Direction::Click).map_err(input_error)?;
        log::debug!("Double-clicked at ({}, {})", at.x, at.y);
        Ok(())
    }

    fn drag(&self, from: ScreenPoint, dx: i32, dy: i32) -> DesktopResult<()> {
        let mut enigo = self.enigo()?;
        enigo.move_mouse(from.x, from.y, Coordinate::Abs).map_err(input_error)?;
        enigo.button(Button::Left, Direction::Press).map_err(input_error)?;
        sleep(DRAG_PRESS_HOLD);

        let step_delay = DRAG_MOVE_DURATION / DRAG_STEPS as u32;
        let mut moved = Ok(());
        for step in 1..=DRAG_STEPS {
            let x = from.x + dx * step / DRAG_STEPS;
            let y = from.y + dy * step / DRAG_STEPS;
            moved = enigo.move_mouse(x, y, Coordinate::Abs).map_err(input_error);
            if moved.is_err() {
                break;
            }
            sleep(step_delay);
        }
        sleep(DRAG_RELEASE_HOLD);
        enigo.button(Button::Left, Direction::Release).map_err(input_error)?;
        log::debug!("Dragged from ({}, {}) by ({dx}, {dy})", from.x, from.y);
        moved
    }
}
