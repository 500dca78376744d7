//! Protocol error codes and the "code message" error payload form.

use std::fmt;
use thiserror::Error;

/// Errors produced while decoding a wire message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,

    #[error("unknown message type: {0:?}")]
    UnknownType(char),
}

/// Stable protocol error codes.
///
/// These numeric values and their message strings travel on the wire inside
/// `exception`/`execution_error` payloads and must remain stable across
/// versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Local-only code used to reject pending work at teardown.
    Disconnected = -1,
    NoError = 0,
    UnexpectedBinaryFrame = 1,
    MessageParseError = 2,
    UnknownMessageType = 3,
    MessageProcessingError = 4,
    UnsupportedVersion = 5,
    UnhandledException = 6,
    MethodNotFound = 7,
    CallbackNotRegistered = 8,
}

impl ErrorCode {
    /// The numeric wire code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Canonical message text for this code.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::Disconnected => "Peer disconnected",
            ErrorCode::NoError => "No error",
            ErrorCode::UnexpectedBinaryFrame => "Unexpected binary frame",
            ErrorCode::MessageParseError => "Message parse error",
            ErrorCode::UnknownMessageType => "Unknown message type",
            ErrorCode::MessageProcessingError => {
                "Internal node error while processing a message"
            }
            ErrorCode::UnsupportedVersion => "Unsupported version",
            ErrorCode::UnhandledException => "Unhandled exception",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::CallbackNotRegistered => "Callback not registered",
        }
    }

    /// Looks up a code by its numeric value.
    pub fn from_code(code: i32) -> Option<ErrorCode> {
        match code {
            -1 => Some(ErrorCode::Disconnected),
            0 => Some(ErrorCode::NoError),
            1 => Some(ErrorCode::UnexpectedBinaryFrame),
            2 => Some(ErrorCode::MessageParseError),
            3 => Some(ErrorCode::UnknownMessageType),
            4 => Some(ErrorCode::MessageProcessingError),
            5 => Some(ErrorCode::UnsupportedVersion),
            6 => Some(ErrorCode::UnhandledException),
            7 => Some(ErrorCode::MethodNotFound),
            8 => Some(ErrorCode::CallbackNotRegistered),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Canonical message text for an arbitrary numeric code.
pub fn error_message(code: i32) -> &'static str {
    match ErrorCode::from_code(code) {
        Some(c) => c.message(),
        None => "Undetermined error",
    }
}

/// An error as carried in `exception`/`execution_error` payloads:
/// a numeric code, a single space, then a free-form message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireError {
    pub code: i32,
    pub message: String,
}

impl WireError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Parses a "code message" payload.
    ///
    /// A payload whose leading field is not numeric yields code 0 with the
    /// whole payload as the message; a bare numeric payload yields an empty
    /// message.
    pub fn parse(payload: &str) -> Self {
        match payload.split_once(' ') {
            Some((code, message)) => match code.parse::<i32>() {
                Ok(code) => Self::new(code, message),
                Err(_) => Self::new(0, payload),
            },
            None => match payload.parse::<i32>() {
                Ok(code) => Self::new(code, ""),
                Err(_) => Self::new(0, payload),
            },
        }
    }
}

impl From<ErrorCode> for WireError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code.code(), code.message())
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values_stable() {
        assert_eq!(ErrorCode::Disconnected.code(), -1);
        assert_eq!(ErrorCode::NoError.code(), 0);
        assert_eq!(ErrorCode::UnexpectedBinaryFrame.code(), 1);
        assert_eq!(ErrorCode::MessageParseError.code(), 2);
        assert_eq!(ErrorCode::UnknownMessageType.code(), 3);
        assert_eq!(ErrorCode::MessageProcessingError.code(), 4);
        assert_eq!(ErrorCode::UnsupportedVersion.code(), 5);
        assert_eq!(ErrorCode::UnhandledException.code(), 6);
        assert_eq!(ErrorCode::MethodNotFound.code(), 7);
        assert_eq!(ErrorCode::CallbackNotRegistered.code(), 8);
    }

    #[test]
    fn test_error_code_messages_stable() {
        assert_eq!(ErrorCode::UnexpectedBinaryFrame.message(), "Unexpected binary frame");
        assert_eq!(ErrorCode::MethodNotFound.message(), "Method not found");
        assert_eq!(ErrorCode::CallbackNotRegistered.message(), "Callback not registered");
        assert_eq!(
            ErrorCode::MessageProcessingError.message(),
            "Internal node error while processing a message"
        );
        assert_eq!(ErrorCode::Disconnected.message(), "Peer disconnected");
    }

    #[test]
    fn test_from_code_round_trip() {
        for code in -1..=8 {
            let parsed = ErrorCode::from_code(code).unwrap();
            assert_eq!(parsed.code(), code);
        }
        assert_eq!(ErrorCode::from_code(99), None);
        assert_eq!(error_message(99), "Undetermined error");
    }

    #[test]
    fn test_wire_error_render() {
        let err = WireError::from(ErrorCode::MethodNotFound);
        assert_eq!(err.to_string(), "7 Method not found");

        let err = WireError::from(ErrorCode::Disconnected);
        assert_eq!(err.to_string(), "-1 Peer disconnected");
    }

    #[test]
    fn test_wire_error_parse() {
        let err = WireError::parse("7 Method not found");
        assert_eq!(err.code, 7);
        assert_eq!(err.message, "Method not found");

        let err = WireError::parse("-1 Peer disconnected");
        assert_eq!(err.code, -1);
        assert_eq!(err.message, "Peer disconnected");
    }

    #[test]
    fn test_wire_error_parse_degenerate() {
        // Non-numeric leading field: the whole payload becomes the message.
        let err = WireError::parse("something went wrong");
        assert_eq!(err.code, 0);
        assert_eq!(err.message, "something went wrong");

        // Bare code with no message.
        let err = WireError::parse("12");
        assert_eq!(err.code, 12);
        assert_eq!(err.message, "");

        let err = WireError::parse("");
        assert_eq!(err.code, 0);
        assert_eq!(err.message, "");
    }
}
