//! Symmetric peer engine: request/response, one-shot callbacks, topic
//! streams and shared variables over any message-framed transport.
//!
//! Both ends of a connection run the same [`Peer`] type; there is no client
//! or server role. A peer is attached to a [`Transport`] and driven by a
//! background task that owns the transport, serializes all outbound frames
//! and dispatches inbound ones. Method and callback handlers run as their
//! own tasks, so handlers are free to call back into the peer, including
//! issuing nested calls to other peers.
//!
//! Payloads are opaque text end to end; the engine moves them without
//! interpreting them.

pub mod discover;
pub mod driver;
pub mod error;
pub mod mem;
pub mod methods;
pub mod peer;
pub mod topics;

mod dispatch;
mod pending;
mod vars;

pub use discover::DiscoverReply;
pub use driver::{Transport, TransportEvent};
pub use error::{CallResult, PeerError};
pub use methods::Request;
pub use peer::{Peer, Phase};
pub use topics::Publisher;
