//! Transport abstraction and the connection driver task.

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::peer::Shared;

/// Event delivered by a transport to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The underlying connection finished opening. Delivered once, before
    /// any text event.
    Opened,
    /// One complete inbound text frame.
    Text(String),
    /// A binary frame arrived. The engine treats this as fatal.
    Binary,
    /// The connection closed or failed. Terminal; no further events follow.
    Closed { reason: Option<String> },
}

/// A bidirectional, message-framed transport.
///
/// The engine spawns one driver task per connection which owns the
/// transport exclusively, so implementations never see concurrent calls.
/// Framing, encryption and reconnection live below this trait; the engine
/// only ever exchanges whole text frames.
pub trait Transport: Send + 'static {
    /// Sends one text frame.
    fn send(&mut self, text: String) -> impl Future<Output = io::Result<()>> + Send;

    /// Waits for the next event. [`TransportEvent::Closed`] is terminal;
    /// implementations may keep returning it afterwards.
    fn event(&mut self) -> impl Future<Output = TransportEvent> + Send;

    /// Closes the connection. The matching [`TransportEvent::Closed`] is
    /// still delivered through [`event`](Transport::event).
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Outbound instruction queued for the driver task.
pub(crate) enum Directive {
    Send(String),
    Close,
}

/// Drives one connection: drains queued directives and dispatches inbound
/// events until the transport reports closure.
///
/// Directives are handled before events so locally queued frames keep their
/// send order relative to close requests.
pub(crate) async fn run<T: Transport>(
    mut transport: T,
    shared: Arc<Shared>,
    mut directives: mpsc::UnboundedReceiver<Directive>,
) {
    let mut accepting = true;
    loop {
        tokio::select! {
            biased;

            directive = directives.recv(), if accepting => match directive {
                Some(Directive::Send(text)) => {
                    if let Err(e) = transport.send(text).await {
                        tracing::warn!("Transport send failed: {}", e);
                        accepting = false;
                        transport.close().await;
                    }
                }
                Some(Directive::Close) => {
                    accepting = false;
                    transport.close().await;
                }
                None => {
                    // Every peer handle is gone; nothing can queue frames
                    // anymore, so shut the connection down.
                    accepting = false;
                    transport.close().await;
                }
            },

            event = transport.event() => match event {
                TransportEvent::Opened => shared.handle_opened(),
                TransportEvent::Text(frame) => shared.handle_frame(&frame),
                TransportEvent::Binary => shared.handle_binary(),
                TransportEvent::Closed { reason } => {
                    shared.handle_closed(reason);
                    return;
                }
            },
        }
    }
}
