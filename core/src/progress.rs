//! Progress reporting contract.
//!
//! The core emits a [`ProgressEvent`] after each scanned, stored or restored
//! file. Observers are called inline on the working task and only render or
//! log; nothing in the core depends on them.

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub processed: u64,
    /// `None` while the total is still unknown (scanning).
    pub total: Option<u64>,
    pub label: String,
}

impl ProgressEvent {
    pub fn new(processed: u64, total: Option<u64>, label: impl Into<String>) -> Self {
        Self {
            processed,
            total,
            label: label.into(),
        }
    }

    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(100.0),
            Some(total) => Some(self.processed as f64 * 100.0 / total as f64),
            None => None,
        }
    }
}

/// Receives progress events. Implementations must not panic.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

pub type SharedProgress = Arc<dyn ProgressObserver>;

pub fn no_progress() -> SharedProgress {
    Arc::new(NoProgress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(ProgressEvent::new(1, Some(4), "a").percent(), Some(25.0));
        assert_eq!(ProgressEvent::new(0, Some(0), "a").percent(), Some(100.0));
        assert_eq!(ProgressEvent::new(3, None, "a").percent(), None);
    }
}
