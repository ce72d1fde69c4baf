//! Per-tab timers shared by the debounced scenarios

use crate::desktop::{GameWindow, WindowHandle};
use std::collections::HashMap;
use std::fmt;
use tokio::time::Instant;

/// Composite key of one tab visit: the window plus the sweep-local sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabKey {
    pub window: WindowHandle,
    pub seq: u32,
}

/// Identity of the tab currently being inspected.
///
/// Displayed as `{handle}__{title}__{seq}`. Sequence numbers restart every
/// sweep, so the same key may refer to a different tab on the next tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabId {
    pub key: TabKey,
    pub title: String,
}

impl TabId {
    pub fn new(window: &GameWindow, seq: u32) -> Self {
        Self {
            key: TabKey {
                window: window.handle,
                seq,
            },
            title: window.title.clone(),
        }
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}__{}__{}", self.key.window, self.title, self.key.seq)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabTimers {
    pub first_seen_stuck: Option<Instant>,
    pub last_solved: Option<Instant>,
    pub last_seen_login: Option<Instant>,
}

impl TabTimers {
    fn is_empty(&self) -> bool {
        self.first_seen_stuck.is_none() && self.last_solved.is_none() && self.last_seen_login.is_none()
    }
}

/// Lazily populated timer map. Only the detection task touches it.
#[derive(Debug, Default)]
pub struct ScenarioState {
    tabs: HashMap<TabKey, TabTimers>,
}

impl ScenarioState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &TabKey) -> TabTimers {
        self.tabs.get(key).copied().unwrap_or_default()
    }

    /// Mutable timers for `key`, created on first use.
    pub fn entry(&mut self, key: TabKey) -> &mut TabTimers {
        self.tabs.entry(key).or_default()
    }

    /// Drop entries whose timers were all cleared.
    pub fn compact(&mut self) {
        self.tabs.retain(|_, timers| !timers.is_empty());
    }

    /// Evict every tab of windows that are no longer present.
    pub fn retain_windows(&mut self, live: &[WindowHandle]) -> usize {
        let before = self.tabs.len();
        self.tabs.retain(|key, _| live.contains(&key.window));
        before - self.tabs.len()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Sorted copy of the non-empty timers, for reporting outside the detection task.
    pub fn snapshot(&self) -> Vec<(TabKey, TabTimers)> {
        let mut entries: Vec<_> = self
            .tabs
            .iter()
            .filter(|(_, timers)| !timers.is_empty())
            .map(|(key, timers)| (*key, *timers))
            .collect();
        entries.sort_by_key(|(key, _)| *key);
        entries
    }
}
