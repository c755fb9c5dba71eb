use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::obs::metrics::GatewayMetrics;

use super::PresenceStore;

/// Presence mutation issued by the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceOp {
    Add { room: String, user: String },
    Remove { room: String, user: String },
}

impl PresenceOp {
    fn name(&self) -> &'static str {
        match self {
            PresenceOp::Add { .. } => "add",
            PresenceOp::Remove { .. } => "remove",
        }
    }
}

/// Handle to the presence writer task.
///
/// Enqueueing never blocks. Operations are applied one at a time in the order
/// they were issued, so an add for a room always lands before the matching
/// remove. The task exits once every handle has been dropped and the queue
/// is drained.
#[derive(Clone)]
pub struct PresenceWriter {
    tx: mpsc::UnboundedSender<PresenceOp>,
}

impl PresenceWriter {
    pub fn spawn(
        store: Arc<dyn PresenceStore>,
        op_timeout: Duration,
        metrics: Arc<GatewayMetrics>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(store, rx, op_timeout, metrics));
        (Self { tx }, handle)
    }

    pub fn add(&self, room: &str, user: &str) {
        self.send(PresenceOp::Add {
            room: room.to_string(),
            user: user.to_string(),
        });
    }

    pub fn remove(&self, room: &str, user: &str) {
        self.send(PresenceOp::Remove {
            room: room.to_string(),
            user: user.to_string(),
        });
    }

    fn send(&self, op: PresenceOp) {
        if let Err(e) = self.tx.send(op) {
            tracing::error!(op = ?e.0, "presence writer is gone; op dropped");
        }
    }
}

async fn run(
    store: Arc<dyn PresenceStore>,
    mut rx: mpsc::UnboundedReceiver<PresenceOp>,
    op_timeout: Duration,
    metrics: Arc<GatewayMetrics>,
) {
    while let Some(op) = rx.recv().await {
        let name = op.name();
        let fut = async {
            match &op {
                PresenceOp::Add { room, user } => store.add(room, user).await,
                PresenceOp::Remove { room, user } => store.remove(room, user).await,
            }
        };

        match tokio::time::timeout(op_timeout, fut).await {
            Ok(Ok(())) => tracing::trace!(?op, "presence applied"),
            Ok(Err(e)) => {
                metrics.presence_errors.inc(&[("op", name)]);
                tracing::warn!(?op, error = %e, "presence op failed");
            }
            Err(_) => {
                metrics.presence_errors.inc(&[("op", name)]);
                tracing::warn!(?op, timeout_ms = op_timeout.as_millis() as u64, "presence op timed out");
            }
        }
    }
    tracing::debug!("presence writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::MemoryPresence;

    #[tokio::test]
    async fn ops_apply_in_issue_order() {
        let store = Arc::new(MemoryPresence::new());
        let metrics = Arc::new(GatewayMetrics::default());
        let (writer, handle) =
            PresenceWriter::spawn(store.clone(), Duration::from_secs(1), metrics.clone());

        writer.add("42", "u1");
        writer.remove("42", "u1");
        writer.add("43", "u1");
        drop(writer);
        handle.await.unwrap();

        assert!(store.list_online("42").await.unwrap().is_empty());
        assert!(store.list_online("43").await.unwrap().contains("u1"));
        assert_eq!(metrics.presence_errors.get(&[("op", "add")]), 0);
    }
}
