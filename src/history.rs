//! Navigation history management
//!
//! A bounded record of committed navigations with a cursor for
//! back/forward. Once the bound is exceeded the oldest entries are evicted
//! first. Pushing while the cursor is behind the end discards the forward
//! entries.

use std::time::SystemTime;

/// Default maximum number of entries.
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Navigation history entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Committed path, including its query if there was one
    pub path: String,
    pub timestamp: SystemTime,
    /// Name of the route the path resolved to
    pub resolved_name: String,
}

impl HistoryEntry {
    pub fn new(path: impl Into<String>, resolved_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            timestamp: SystemTime::now(),
            resolved_name: resolved_name.into(),
        }
    }
}

/// How a history operation moved the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDirection {
    Push,
    Replace,
    Back,
    Forward,
    Pop,
}

/// Navigation event from history operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    /// Previous path
    pub from: Option<String>,
    /// New path
    pub to: String,
    pub direction: NavigationDirection,
}

/// Navigation history stack
#[derive(Debug, Clone)]
pub struct NavigationHistory {
    entries: Vec<HistoryEntry>,
    /// Index of the current entry; meaningless while `entries` is empty
    cursor: usize,
    max_size: usize,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_HISTORY)
    }

    /// Bounded history. A bound of zero is raised to one.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            max_size: max_size.max(1),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
    }

    pub fn current_path(&self) -> Option<&str> {
        self.current().map(|entry| entry.path.as_str())
    }

    /// Path of the entry behind the cursor.
    pub fn previous_path(&self) -> Option<&str> {
        let index = self.cursor.checked_sub(1)?;
        self.entries.get(index).map(|entry| entry.path.as_str())
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor > 0 && !self.entries.is_empty()
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Append an entry after the cursor, dropping any forward entries.
    pub fn push(&mut self, entry: HistoryEntry) -> NavigationEvent {
        let from = self.current_path().map(str::to_string);
        let to = entry.path.clone();

        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(entry);
        self.cursor = self.entries.len() - 1;
        self.enforce_size_limit();

        NavigationEvent {
            from,
            to,
            direction: NavigationDirection::Push,
        }
    }

    /// Overwrite the current entry. Behaves as [`push`](Self::push) on an
    /// empty history.
    pub fn replace(&mut self, entry: HistoryEntry) -> NavigationEvent {
        if self.entries.is_empty() {
            let mut event = self.push(entry);
            event.direction = NavigationDirection::Replace;
            return event;
        }

        let from = self.current_path().map(str::to_string);
        let to = entry.path.clone();
        self.entries[self.cursor] = entry;

        NavigationEvent {
            from,
            to,
            direction: NavigationDirection::Replace,
        }
    }

    pub fn back(&mut self) -> Option<NavigationEvent> {
        if !self.can_go_back() {
            return None;
        }
        let from = self.current_path().map(str::to_string);
        self.cursor -= 1;
        Some(NavigationEvent {
            from,
            to: self.entries[self.cursor].path.clone(),
            direction: NavigationDirection::Back,
        })
    }

    pub fn forward(&mut self) -> Option<NavigationEvent> {
        if !self.can_go_forward() {
            return None;
        }
        let from = self.current_path().map(str::to_string);
        self.cursor += 1;
        Some(NavigationEvent {
            from,
            to: self.entries[self.cursor].path.clone(),
            direction: NavigationDirection::Forward,
        })
    }

    /// Remove the current entry and step back onto the one before it.
    ///
    /// Forward entries are discarded. The last remaining entry is never
    /// popped.
    pub fn pop(&mut self) -> Option<HistoryEntry> {
        self.pop_until(|_| false).into_iter().next()
    }

    /// Pop entries until the top satisfies `predicate` or one entry is left.
    ///
    /// Forward entries are discarded first. Returns the popped entries, most
    /// recent first.
    pub fn pop_until<F>(&mut self, mut predicate: F) -> Vec<HistoryEntry>
    where
        F: FnMut(&HistoryEntry) -> bool,
    {
        if self.entries.is_empty() {
            return Vec::new();
        }
        self.entries.truncate(self.cursor + 1);

        let mut popped = Vec::new();
        while self.entries.len() > 1 {
            match self.entries.last() {
                Some(top) if !predicate(top) => {
                    if let Some(entry) = self.entries.pop() {
                        popped.push(entry);
                    }
                }
                _ => break,
            }
        }
        self.cursor = self.entries.len() - 1;
        popped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn enforce_size_limit(&mut self) {
        if self.entries.len() > self.max_size {
            let excess = self.entries.len() - self.max_size;
            self.entries.drain(0..excess);
            self.cursor = self.cursor.saturating_sub(excess);
        }
    }
}

impl Default for NavigationHistory {
    fn default() -> Self {
        Self::new()
    }
}
