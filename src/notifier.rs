//! Admin notifier port (optional collaborator).

use async_trait::async_trait;
use std::time::Duration;

/// Decoupled from the callback's own deadline so a slow notifier never
/// blocks callback acknowledgement.
pub const NOTIFIER_DEADLINE: Duration = Duration::from_secs(30);

#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), NotifierError>;
}

#[derive(thiserror::Error, Debug)]
pub enum NotifierError {
    #[error("notifier transport error: {0}")]
    Transport(String),
}

/// Fires `notifier` best-effort with its own 30-second budget. A missing
/// notifier, a transport failure, or a timeout are all silently tolerated
/// (warn-logged) — admin/email notification never causes a business
/// failure.
pub async fn notify_best_effort(notifier: Option<&(dyn AdminNotifier)>, message: &str) {
    let Some(notifier) = notifier else {
        return;
    };
    match tokio::time::timeout(NOTIFIER_DEADLINE, notifier.notify(message)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "admin notification failed"),
        Err(_) => tracing::warn!(
            deadline_secs = NOTIFIER_DEADLINE.as_secs(),
            "admin notification timed out"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingNotifier {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl AdminNotifier for CountingNotifier {
        async fn notify(&self, _message: &str) -> Result<(), NotifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotifierError::Transport("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn missing_notifier_is_a_silent_no_op() {
        notify_best_effort(None, "hello").await;
    }

    #[tokio::test]
    async fn notifier_failure_does_not_propagate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = CountingNotifier {
            calls: calls.clone(),
            fail: true,
        };
        notify_best_effort(Some(&notifier), "hello").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn successful_notify_is_invoked_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = CountingNotifier {
            calls: calls.clone(),
            fail: false,
        };
        notify_best_effort(Some(&notifier), "hello").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
