//! Transient operator notifications.
//!
//! Each notification replaces the previous one and clears itself after a
//! fixed delay unless a newer one arrived in the meantime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;

pub const FEEDBACK_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    message: String,
    kind: FeedbackKind,
}

impl Feedback {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> FeedbackKind {
        self.kind
    }
}

#[derive(Clone)]
pub struct FeedbackCenter {
    tx: Arc<watch::Sender<Option<Feedback>>>,
    generation: Arc<AtomicU64>,
}

impl Default for FeedbackCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackCenter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Feedback>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<Feedback> {
        self.tx.borrow().clone()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(message.into(), FeedbackKind::Info);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notify(message.into(), FeedbackKind::Warning);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(message.into(), FeedbackKind::Error);
    }

    fn notify(&self, message: String, kind: FeedbackKind) {
        match kind {
            FeedbackKind::Info => tracing::info!("feedback: {}", message),
            FeedbackKind::Warning => tracing::warn!("feedback: {}", message),
            FeedbackKind::Error => tracing::error!("feedback: {}", message),
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_replace(Some(Feedback { message, kind }));

        // Outside a runtime the notification simply stays until replaced.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let tx = self.tx.clone();
        let current = self.generation.clone();
        runtime.spawn(async move {
            tokio::time::sleep(FEEDBACK_TTL).await;
            if current.load(Ordering::SeqCst) == generation {
                tx.send_replace(None);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_feedback_expires_after_ttl() {
        // Arrange
        let center = FeedbackCenter::new();
        let rx = center.subscribe();

        // Act
        center.error("MIC_ACCESS_DENIED");

        // Assert
        let shown = rx.borrow().clone().unwrap();
        assert_eq!(shown.message(), "MIC_ACCESS_DENIED");
        assert_eq!(shown.kind(), FeedbackKind::Error);

        tokio::time::sleep(FEEDBACK_TTL + Duration::from_millis(10)).await;
        assert!(center.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_feedback_outlives_older_timer() {
        let center = FeedbackCenter::new();

        center.info("BUFFER_CLEARED");
        tokio::time::sleep(Duration::from_secs(3)).await;
        center.warning("INVALID_TASK_REQUEST");
        tokio::time::sleep(Duration::from_secs(2)).await;

        // The first timer fired at 4s but a newer notification was showing.
        assert_eq!(
            center.current().map(|f| f.message().to_string()),
            Some("INVALID_TASK_REQUEST".to_string())
        );

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(center.current().is_none());
    }
}
