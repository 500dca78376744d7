//! In-memory transport for connecting two peers inside one process.

use std::io;

use tokio::sync::mpsc;

use crate::driver::{Transport, TransportEvent};

enum MemFrame {
    Text(String),
    Binary,
    Close,
}

/// One side of an in-memory transport pair.
///
/// Opens immediately; closing one side closes both. Mostly useful for
/// tests and for wiring two engine instances together without a socket.
pub struct MemTransport {
    tx: mpsc::UnboundedSender<MemFrame>,
    rx: mpsc::UnboundedReceiver<MemFrame>,
    opened: bool,
    closed: bool,
}

/// Creates two cross-wired transports: frames sent on one side arrive as
/// events on the other.
pub fn pair() -> (MemTransport, MemTransport) {
    let (left_tx, right_rx) = mpsc::unbounded_channel();
    let (right_tx, left_rx) = mpsc::unbounded_channel();
    (
        MemTransport {
            tx: left_tx,
            rx: left_rx,
            opened: false,
            closed: false,
        },
        MemTransport {
            tx: right_tx,
            rx: right_rx,
            opened: false,
            closed: false,
        },
    )
}

impl MemTransport {
    /// Delivers a binary frame to the remote side. The engine rejects
    /// binary traffic, so this exists to exercise that path.
    pub fn send_binary(&self) {
        let _ = self.tx.send(MemFrame::Binary);
    }
}

impl Transport for MemTransport {
    fn send(&mut self, text: String) -> impl std::future::Future<Output = io::Result<()>> + Send {
        let outcome = if self.closed {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "transport closed"))
        } else {
            self.tx
                .send(MemFrame::Text(text))
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "remote side gone"))
        };
        async move { outcome }
    }

    fn event(&mut self) -> impl std::future::Future<Output = TransportEvent> + Send {
        async move {
            if !self.opened {
                self.opened = true;
                return TransportEvent::Opened;
            }
            if self.closed {
                return TransportEvent::Closed { reason: None };
            }
            match self.rx.recv().await {
                Some(MemFrame::Text(text)) => TransportEvent::Text(text),
                Some(MemFrame::Binary) => TransportEvent::Binary,
                Some(MemFrame::Close) | None => {
                    self.closed = true;
                    TransportEvent::Closed { reason: None }
                }
            }
        }
    }

    fn close(&mut self) -> impl std::future::Future<Output = ()> + Send {
        if !self.closed {
            self.closed = true;
            let _ = self.tx.send(MemFrame::Close);
        }
        std::future::ready(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_cross_between_the_sides() {
        let (mut a, mut b) = pair();
        assert_eq!(a.event().await, TransportEvent::Opened);
        assert_eq!(b.event().await, TransportEvent::Opened);

        a.send("hello".to_string()).await.unwrap();
        assert_eq!(b.event().await, TransportEvent::Text("hello".to_string()));

        b.send("back".to_string()).await.unwrap();
        assert_eq!(a.event().await, TransportEvent::Text("back".to_string()));
    }

    #[tokio::test]
    async fn close_propagates_to_both_sides() {
        let (mut a, mut b) = pair();
        assert_eq!(a.event().await, TransportEvent::Opened);
        assert_eq!(b.event().await, TransportEvent::Opened);

        a.close().await;
        assert_eq!(b.event().await, TransportEvent::Closed { reason: None });
        assert_eq!(a.event().await, TransportEvent::Closed { reason: None });

        // Send after close fails without reaching the other side.
        assert!(a.send("late".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn binary_frames_pass_through() {
        let (a, mut b) = pair();
        a.send_binary();
        assert_eq!(b.event().await, TransportEvent::Opened);
        assert_eq!(b.event().await, TransportEvent::Binary);
    }
}
