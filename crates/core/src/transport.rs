use interview_types::ServerEvent;
use tokio::sync::mpsc;

/// Outbound half of a session's connection.
///
/// Delivery is best effort: a closed connection is logged, never an error.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ServerEvent>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn send(&self, event: ServerEvent) {
        let kind = event.kind();
        if let Err(e) = self.tx.send(event).await {
            tracing::warn!("failed to send {} event: {}", kind, e);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
