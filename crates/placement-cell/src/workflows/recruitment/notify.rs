use std::sync::Mutex;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::repository::{DispatchError, Notification, NotificationDispatcher};

/// Hands notifications to a background task so the enrollment request never waits on delivery.
///
/// The worker only logs each delivery; an e-mail or SMS transport would sit behind it.
#[derive(Debug, Clone)]
pub struct QueuedNotificationDispatcher {
    sender: UnboundedSender<Notification>,
}

impl QueuedNotificationDispatcher {
    /// Spawn the delivery worker on the current tokio runtime.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (sender, receiver) = unbounded_channel();
        let worker = tokio::spawn(deliver(receiver));
        (Self { sender }, worker)
    }
}

async fn deliver(mut receiver: UnboundedReceiver<Notification>) {
    while let Some(notification) = receiver.recv().await {
        tracing::info!(
            target: "notifications",
            student = %notification.student,
            enrollment_no = %notification.enrollment_no,
            session = %notification.session,
            event = ?notification.event,
            message = %notification.message,
            "notification delivered"
        );
    }
    tracing::debug!(target: "notifications", "notification queue drained");
}

impl NotificationDispatcher for QueuedNotificationDispatcher {
    fn dispatch(&self, notification: Notification) -> Result<(), DispatchError> {
        self.sender
            .send(notification)
            .map_err(|_| DispatchError::Closed)
    }
}

/// Keeps every notification in memory. Used by tests and the CLI demo.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn dispatch(&self, notification: Notification) -> Result<(), DispatchError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| DispatchError::Transport("recorder mutex poisoned".to_string()))?;
        sent.push(notification);
        Ok(())
    }
}
