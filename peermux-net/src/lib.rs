//! TCP and TLS transport for the peermux engine.
//!
//! Messages from the engine are carried as CRC-checked binary frames
//! over a plain or TLS-wrapped TCP stream. The crate provides the
//! framing ([`frame`], [`codec`]), the [`Transport`] implementation
//! ([`conn::TcpTransport`]), a listener for the accepting side, and
//! file/env configuration.
//!
//! [`Transport`]: peermux_core::Transport

pub mod codec;
pub mod config;
pub mod conn;
pub mod error;
pub mod frame;
pub mod listener;
pub mod stream;
pub mod tls;

pub use codec::{Encoder, FrameDecoder};
pub use config::{ConfigError, ConnectConfig, ListenConfig, NetConfig, TlsSettings};
pub use conn::TcpTransport;
pub use error::NetError;
pub use frame::{FrameKind, WireFrame, FRAME_HEADER_SIZE, MAX_FRAME_SIZE};
pub use listener::PeerListener;
pub use stream::NetStream;
