//! Upward notification registry for a session.

use serde::{Deserialize, Serialize};

use super::state::LogEntry;
use crate::metrics::MetricsSnapshot;
use crate::segments::TimelineSnapshot;

/// Playback position reported to `on_playback` observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackPosition {
    pub current_time: f64,
    pub duration: Option<f64>,
}

/// Ordered list of observers for one notification type.
pub struct ObserverList<T: ?Sized> {
    observers: Vec<Box<dyn Fn(&T) + Send>>,
}

impl<T: ?Sized> Default for ObserverList<T> {
    fn default() -> Self {
        Self {
            observers: Vec::new(),
        }
    }
}

impl<T: ?Sized> ObserverList<T> {
    pub fn register(&mut self, observer: Box<dyn Fn(&T) + Send>) {
        self.observers.push(observer);
    }

    /// Invokes every observer in registration order.
    pub fn notify(&self, value: &T) {
        for observer in &self.observers {
            observer(value);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

/// Every observer list owned by a session.
#[derive(Default)]
pub struct Observers {
    pub metrics: ObserverList<MetricsSnapshot>,
    pub logs: ObserverList<LogEntry>,
    /// Pretty-printed JSON manifest diagnostic
    pub manifest: ObserverList<str>,
    pub segments: ObserverList<TimelineSnapshot>,
    pub playback: ObserverList<PlaybackPosition>,
}

impl Observers {
    /// Deregisters everything.
    pub fn clear(&mut self) {
        self.metrics.clear();
        self.logs.clear();
        self.manifest.clear();
        self.segments.clear();
        self.playback.clear();
    }

    pub fn total(&self) -> usize {
        self.metrics.len()
            + self.logs.len()
            + self.manifest.len()
            + self.segments.len()
            + self.playback.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_notify_and_clear() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut observers = Observers::default();

        let counter = Arc::clone(&calls);
        observers.manifest.register(Box::new(move |text: &str| {
            assert!(text.contains("levels"));
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        observers.manifest.notify("{\"levels\": []}");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(observers.total(), 1);

        observers.clear();
        observers.manifest.notify("{\"levels\": []}");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(observers.total(), 0);
    }
}
