//! Location and history abstraction

use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// The client's current location and page title
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;

    /// Navigate to `path`, adding a history entry
    fn push(&self, path: &str);

    /// Navigate to `path`, replacing the current history entry
    fn replace(&self, path: &str);

    fn set_title(&self, title: &str);
}

#[derive(Debug)]
struct History {
    entries: Vec<String>,
    title: Option<String>,
}

/// Navigator that keeps its whole history in memory
#[derive(Debug)]
pub struct MemoryNavigator {
    history: Mutex<History>,
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new(crate::HOME_PATH)
    }
}

impl MemoryNavigator {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(History {
                entries: vec![start.into()],
                title: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every visited path, oldest first
    pub fn history(&self) -> Vec<String> {
        self.lock().entries.clone()
    }

    pub fn title(&self) -> Option<String> {
        self.lock().title.clone()
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.lock().entries.last().cloned().unwrap_or_default()
    }

    fn push(&self, path: &str) {
        debug!(path, "push");
        self.lock().entries.push(path.to_string());
    }

    fn replace(&self, path: &str) {
        debug!(path, "replace");
        let mut history = self.lock();
        history.entries.pop();
        history.entries.push(path.to_string());
    }

    fn set_title(&self, title: &str) {
        self.lock().title = Some(title.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_replace() {
        let nav = MemoryNavigator::new("/posts");
        nav.push("/login");
        nav.replace("/");

        assert_eq!(nav.current_path(), "/");
        assert_eq!(nav.history(), vec!["/posts".to_string(), "/".to_string()]);
    }
}
