//! Transport-level error types.

use thiserror::Error;

/// Errors raised while framing, connecting, or securing a peer link.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid frame magic: {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("unsupported frame version: {0}")]
    UnsupportedVersion(u16),

    #[error("invalid frame flags: {0:#06x}")]
    InvalidFlags(u16),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("frame checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("text frame payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("no remote address configured")]
    NoRemoteAddr,

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),
}

pub type Result<T> = std::result::Result<T, NetError>;
