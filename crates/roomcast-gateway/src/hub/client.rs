//! Per-connection state shared between the hub, bridges and pumps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::ws::Message;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Process-unique connection id, assigned in increasing order.
pub type ClientId = u64;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Raw outbound payload, forwarded to the socket as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Bytes);

impl Frame {
    pub fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Text frame when the payload is valid UTF-8, binary otherwise.
    pub fn to_ws_message(&self) -> Message {
        match std::str::from_utf8(&self.0) {
            Ok(s) => Message::Text(s.to_owned()),
            Err(_) => Message::Binary(self.0.to_vec()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// Queue at capacity; the frame was not enqueued.
    Full,
    /// Queue already closed by the hub.
    Closed,
}

/// Bounded outbound queue. Producers never block; only the hub closes it.
pub struct OutboundQueue {
    tx: Mutex<Option<mpsc::Sender<Frame>>>,
}

impl OutboundQueue {
    fn new(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    pub fn push(&self, frame: Frame) -> Result<(), PushError> {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = guard.as_ref() else {
            return Err(PushError::Closed);
        };
        tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PushError::Full,
            mpsc::error::TrySendError::Closed(_) => PushError::Closed,
        })
    }

    /// Close the queue. Returns `true` only for the call that actually closed it.
    ///
    /// Frames already enqueued stay readable; the receiver sees `None` after them.
    pub fn close(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }
}

/// One authenticated connection.
pub struct Client {
    id: ClientId,
    user_id: String,
    scope: CancellationToken,
    outbound: OutboundQueue,
}

impl Client {
    /// Build a client and the receiving end of its outbound queue.
    ///
    /// `scope` is the client's lifetime; cancelling it ends the write pump and
    /// every bridge feeding this client.
    pub fn new(
        user_id: impl Into<String>,
        scope: CancellationToken,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (outbound, rx) = OutboundQueue::new(capacity);
        let client = Arc::new(Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            user_id: user_id.into(),
            scope,
            outbound,
        });
        (client, rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    pub fn outbound(&self) -> &OutboundQueue {
        &self.outbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase() {
        let (a, _rx_a) = Client::new("u1", CancellationToken::new(), 1);
        let (b, _rx_b) = Client::new("u1", CancellationToken::new(), 1);
        assert!(b.id() > a.id());
    }

    #[test]
    fn full_queue_rejects_without_blocking() {
        let (c, _rx) = Client::new("u1", CancellationToken::new(), 1);
        assert_eq!(c.outbound().push(Frame::new(Bytes::from_static(b"a"))), Ok(()));
        assert_eq!(
            c.outbound().push(Frame::new(Bytes::from_static(b"b"))),
            Err(PushError::Full)
        );
    }

    #[tokio::test]
    async fn close_happens_once_and_drains() {
        let (c, mut rx) = Client::new("u1", CancellationToken::new(), 4);
        c.outbound().push(Frame::new(Bytes::from_static(b"x"))).unwrap();

        assert!(c.outbound().close());
        assert!(!c.outbound().close());
        assert!(c.outbound().is_closed());
        assert_eq!(
            c.outbound().push(Frame::new(Bytes::from_static(b"y"))),
            Err(PushError::Closed)
        );

        assert_eq!(rx.recv().await.unwrap().as_bytes().as_ref(), b"x");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn utf8_goes_out_as_text() {
        let text = Frame::new(Bytes::from_static(b"{\"a\":1}")).to_ws_message();
        assert!(matches!(text, Message::Text(s) if s == "{\"a\":1}"));

        let bin = Frame::new(Bytes::from_static(&[0xff, 0x00])).to_ws_message();
        assert!(matches!(bin, Message::Binary(b) if b == vec![0xff, 0x00]));
    }
}
