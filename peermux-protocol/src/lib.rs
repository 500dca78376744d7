//! # peermux-protocol
//!
//! Wire protocol shared by peermux peers.
//!
//! This crate provides:
//! - The line-oriented text message format (`<type-char><id>\n<payload>`)
//! - The message type table and encode/decode
//! - Stable error codes and the "code message" error payload form
//!
//! Payload bodies are opaque text. The codec splits structure on the first
//! `\n` only and performs no escaping; see [`message::split_field`].

pub mod error;
pub mod message;

pub use error::{error_message, DecodeError, ErrorCode, WireError};
pub use message::{split_field, Message, MsgType};

/// Protocol version exchanged in `hello`/`welcome` frames.
pub const PROTOCOL_VERSION: &str = "1.0.0";
