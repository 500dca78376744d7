//! Symmetric peer-to-peer messaging over one socket.
//!
//! A [`Peer`] multiplexes four interaction styles over a single framed
//! text protocol: request/response calls, one-shot callbacks, topic
//! publish/subscribe, and key-value variables mirrored to the other
//! side. Both ends of a link are equals; there is no client or server
//! role above the transport.
//!
//! The workspace splits into three crates, re-exported here:
//!
//! - `peermux-protocol` - message types and text framing
//! - `peermux-core` - the engine: handshake, request correlation,
//!   dispatch, topics, variables
//! - `peermux-net` - TCP/TLS transport with CRC-checked binary framing
//!
//! # Example
//!
//! Two peers joined by an in-memory link:
//!
//! ```
//! use peermux::{mem, Peer};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (left, right) = mem::pair();
//!
//! let answering = Peer::attach(left);
//! answering.on_hello(|name| format!("welcome, {name}"));
//! answering.register_method("greet", "Greets the caller.", |req| async move {
//!     Ok(format!("hello, {}", req.args()))
//! });
//!
//! let calling = Peer::attach(right);
//! let greeting = calling.init("caller").await.unwrap();
//! assert_eq!(greeting, "welcome, caller");
//!
//! let reply = calling.call("greet", "peer").await.unwrap();
//! assert_eq!(reply, "hello, peer");
//! # }
//! ```
//!
//! Over the network, dial with [`TcpTransport`] or accept with
//! [`PeerListener`] and hand the transport to [`Peer::attach`].

pub use peermux_core::mem;
pub use peermux_core::{
    CallResult, DiscoverReply, Peer, PeerError, Phase, Publisher, Request, Transport,
    TransportEvent,
};
pub use peermux_net::{NetConfig, NetError, PeerListener, TcpTransport};
pub use peermux_protocol::{DecodeError, Message, MsgType, WireError, PROTOCOL_VERSION};
