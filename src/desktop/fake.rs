//! Scripted in-memory desktop used by the engine tests

use super::{Desktop, DesktopError, DesktopResult, GameWindow, ScreenPoint, Screenshot, WindowHandle};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Focus(WindowHandle),
    TabCycle,
    Click(ScreenPoint),
    DoubleClick(ScreenPoint),
    Drag { from: ScreenPoint, dx: i32, dy: i32 },
}

#[derive(Default)]
struct FakeState {
    windows: Vec<GameWindow>,
    frames: HashMap<WindowHandle, VecDeque<Screenshot>>,
    fallback: HashMap<WindowHandle, Screenshot>,
    unfocusable: HashSet<WindowHandle>,
    events: Vec<InputEvent>,
    captures: usize,
}

/// Replays queued screenshots per window and records every input event.
#[derive(Default)]
pub struct FakeDesktop {
    state: Mutex<FakeState>,
}

impl FakeDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_window(&self, window: GameWindow) {
        self.state.lock().unwrap().windows.push(window);
    }

    pub fn remove_window(&self, handle: WindowHandle) {
        self.state.lock().unwrap().windows.retain(|w| w.handle != handle);
    }

    /// Queue frames returned by successive captures of `handle`.
    pub fn push_frames(&self, handle: WindowHandle, frames: impl IntoIterator<Item = Screenshot>) {
        self.state
            .lock()
            .unwrap()
            .frames
            .entry(handle)
            .or_default()
            .extend(frames);
    }

    /// Frame returned once the queue for `handle` is empty.
    pub fn set_fallback(&self, handle: WindowHandle, frame: Screenshot) {
        self.state.lock().unwrap().fallback.insert(handle, frame);
    }

    pub fn fail_focus(&self, handle: WindowHandle) {
        self.state.lock().unwrap().unfocusable.insert(handle);
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn clicks(&self) -> Vec<InputEvent> {
        self.events()
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    InputEvent::Click(_) | InputEvent::DoubleClick(_) | InputEvent::Drag { .. }
                )
            })
            .collect()
    }

    pub fn tab_cycles(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == InputEvent::TabCycle)
            .count()
    }

    pub fn captures(&self) -> usize {
        self.state.lock().unwrap().captures
    }

    pub fn clear_events(&self) {
        self.state.lock().unwrap().events.clear();
    }

    fn record(&self, event: InputEvent) {
        self.state.lock().unwrap().events.push(event);
    }
}

impl Desktop for FakeDesktop {
    fn find_windows(&self, title_pattern: &str) -> DesktopResult<Vec<GameWindow>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .windows
            .iter()
            .filter(|w| w.title.contains(title_pattern))
            .cloned()
            .collect())
    }

    fn focus(&self, window: &GameWindow) -> DesktopResult<()> {
        if self.state.lock().unwrap().unfocusable.contains(&window.handle) {
            return Err(DesktopError::FocusFailed {
                title: window.title.clone(),
                description: "scripted failure".into(),
            });
        }
        self.record(InputEvent::Focus(window.handle));
        Ok(())
    }

    fn send_tab_cycle(&self) -> DesktopResult<()> {
        self.record(InputEvent::TabCycle);
        Ok(())
    }

    fn screenshot(&self, window: &GameWindow) -> DesktopResult<Screenshot> {
        let mut state = self.state.lock().unwrap();
        state.captures += 1;
        if let Some(frame) = state.frames.get_mut(&window.handle).and_then(|q| q.pop_front()) {
            return Ok(frame);
        }
        state
            .fallback
            .get(&window.handle)
            .cloned()
            .ok_or_else(|| DesktopError::CaptureFailed {
                title: window.title.clone(),
                description: "no scripted frame".into(),
            })
    }

    fn click(&self, at: ScreenPoint) -> DesktopResult<()> {
        self.record(InputEvent::Click(at));
        Ok(())
    }

    fn double_click(&self, at: ScreenPoint) -> DesktopResult<()> {
        self.record(InputEvent::DoubleClick(at));
        Ok(())
    }

    fn drag(&self, from: ScreenPoint, dx: i32, dy: i32) -> DesktopResult<()> {
        self.record(InputEvent::Drag { from, dx, dy });
        Ok(())
    }
}
