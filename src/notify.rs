//! Notifications from the request pipeline to the presentation layer
//!
//! The client reports two things outward:
//! - a busy signal while any request is in flight
//! - backend-supplied messages meant to be shown to the user
//!
//! The presentation layer decides how (or whether) to render them.

use std::sync::Mutex;

use tokio::sync::{broadcast, watch};

/// Sink for request lifecycle notifications
pub trait Notifier: Send + Sync {
    /// A request has started
    fn request_started(&self);

    /// A request has finished, successfully or not
    fn request_finished(&self);

    /// Show a user-facing message
    fn show_message(&self, message: &str);
}

/// A no-op notifier used when nothing is listening.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn request_started(&self) {}
    fn request_finished(&self) {}
    fn show_message(&self, _message: &str) {}
}

/// Reference-counted "is anything in flight" signal.
///
/// Not a queue: only the count matters, and the indicator is visible while
/// the count is above zero.
pub struct BusyIndicator {
    count: Mutex<usize>,
    busy_tx: watch::Sender<bool>,
}

impl BusyIndicator {
    pub fn new() -> Self {
        let (busy_tx, _) = watch::channel(false);
        Self {
            count: Mutex::new(0),
            busy_tx,
        }
    }

    pub fn increment(&self) {
        let mut count = self.lock_count();
        *count += 1;
        self.publish(*count);
    }

    /// Saturates at zero
    pub fn decrement(&self) {
        let mut count = self.lock_count();
        *count = count.saturating_sub(1);
        self.publish(*count);
    }

    pub fn reset(&self) {
        let mut count = self.lock_count();
        *count = 0;
        self.publish(0);
    }

    pub fn is_busy(&self) -> bool {
        *self.lock_count() > 0
    }

    pub fn in_flight(&self) -> usize {
        *self.lock_count()
    }

    /// Observe busy/idle transitions
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.busy_tx.subscribe()
    }

    fn lock_count(&self) -> std::sync::MutexGuard<'_, usize> {
        // A poisoned counter is still a valid counter.
        self.count.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, count: usize) {
        self.busy_tx.send_if_modified(|busy| {
            let next = count > 0;
            let changed = *busy != next;
            *busy = next;
            changed
        });
    }
}

impl Default for BusyIndicator {
    fn default() -> Self {
        Self::new()
    }
}

/// Notifier that drives a [`BusyIndicator`] and broadcasts messages.
pub struct ActivityNotifier {
    busy: BusyIndicator,
    messages: broadcast::Sender<String>,
}

impl ActivityNotifier {
    pub fn new() -> Self {
        let (messages, _) = broadcast::channel(32);
        Self {
            busy: BusyIndicator::new(),
            messages,
        }
    }

    pub fn busy(&self) -> &BusyIndicator {
        &self.busy
    }

    /// Receive messages shown from now on
    pub fn messages(&self) -> broadcast::Receiver<String> {
        self.messages.subscribe()
    }
}

impl Default for ActivityNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ActivityNotifier {
    fn request_started(&self) {
        self.busy.increment();
    }

    fn request_finished(&self) {
        self.busy.decrement();
    }

    fn show_message(&self, message: &str) {
        tracing::debug!(message = message, "user message");
        // No receivers is fine: nobody is rendering messages.
        let _ = self.messages.send(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_calls_leave_idle() {
        let busy = BusyIndicator::new();
        for _ in 0..5 {
            busy.increment();
        }
        assert!(busy.is_busy());
        assert_eq!(busy.in_flight(), 5);

        for _ in 0..5 {
            busy.decrement();
        }
        assert!(!busy.is_busy());
    }

    #[test]
    fn test_decrement_saturates() {
        let busy = BusyIndicator::new();
        busy.decrement();
        busy.decrement();
        assert_eq!(busy.in_flight(), 0);

        busy.increment();
        assert!(busy.is_busy());
    }

    #[test]
    fn test_reset_clears_count() {
        let busy = BusyIndicator::new();
        busy.increment();
        busy.increment();
        busy.reset();
        assert!(!busy.is_busy());

        busy.increment();
        busy.decrement();
        assert!(!busy.is_busy());
    }

    #[test]
    fn test_watch_reports_transitions() {
        let busy = BusyIndicator::new();
        let rx = busy.subscribe();
        assert!(!*rx.borrow());

        busy.increment();
        busy.increment();
        assert!(*rx.borrow());

        busy.decrement();
        assert!(*rx.borrow());

        busy.decrement();
        assert!(!*rx.borrow());
    }

    #[tokio::test]
    async fn test_messages_broadcast() {
        let notifier = ActivityNotifier::new();
        let mut rx = notifier.messages();

        notifier.show_message("Неверный пароль");
        assert_eq!(rx.recv().await.unwrap(), "Неверный пароль");
    }
}
