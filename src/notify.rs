//! Fire-and-forget OS notifications on approved signing events.
//!
//! Errors are swallowed at the call site of signing operations (§4.7) — a
//! failed notification must never fail a signing request.

use std::time::Duration;

/// `on_close` mirrors the original's `onclose func()` parameter (§4.7):
/// every platform backend in this codebase's lineage accepts it for
/// signature parity across backends, but none of them actually wires it up
/// to a close event, so it is accepted here and otherwise unused.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        title: &str,
        body: &str,
        action_name: &str,
        timeout: Duration,
        on_close: Option<Box<dyn FnOnce() + Send>>,
    );
}

/// Desktop toast/D-Bus notifications, best-effort.
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for DesktopNotifier {
    fn notify(
        &self,
        title: &str,
        body: &str,
        action_name: &str,
        timeout: Duration,
        _on_close: Option<Box<dyn FnOnce() + Send>>,
    ) {
        let mut notification = notify_rust::Notification::new();
        notification
            .summary(title)
            .body(body)
            .timeout(notify_rust::Timeout::Milliseconds(
                timeout.as_millis() as u32
            ));
        if !action_name.is_empty() {
            notification.action(action_name, action_name);
        }
        if let Err(e) = notification.show() {
            log::warn!("notification dispatch failed: {e}");
        }
    }
}

/// Logs instead of popping a toast — used on headless hosts and in tests.
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(
        &self,
        title: &str,
        body: &str,
        _action_name: &str,
        _timeout: Duration,
        _on_close: Option<Box<dyn FnOnce() + Send>>,
    ) {
        log::info!("notification (silent backend): {title}: {body}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingNotifier {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(
            &self,
            title: &str,
            body: &str,
            _action_name: &str,
            _timeout: Duration,
            on_close: Option<Box<dyn FnOnce() + Send>>,
        ) {
            self.calls
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
            if let Some(f) = on_close {
                f();
            }
        }
    }

    #[test]
    fn silent_notifier_does_not_panic() {
        let n = SilentNotifier;
        n.notify("title", "body", "", Duration::from_secs(1), None);
    }

    #[test]
    fn recording_notifier_captures_calls() {
        let n = RecordingNotifier {
            calls: Mutex::new(Vec::new()),
        };
        n.notify(
            "SSH Signing Request Approved for work",
            "body",
            "",
            Duration::from_secs(10),
            None,
        );
        let calls = n.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "SSH Signing Request Approved for work");
    }

    #[test]
    fn on_close_callback_runs_when_provided() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let n = RecordingNotifier {
            calls: Mutex::new(Vec::new()),
        };
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        n.notify(
            "t",
            "b",
            "",
            Duration::from_secs(1),
            Some(Box::new(move || ran_clone.store(true, Ordering::SeqCst))),
        );
        assert!(ran.load(Ordering::SeqCst));
    }
}
