//! Text message types and codec.
//!
//! A frame is `<type-char><id>\n<payload>`. The id is empty for
//! connection-scoped messages; the `\n` and payload are omitted entirely for
//! no-payload types. Two-field payloads (method name + arguments) reuse the
//! same first-`\n` split. Bodies are opaque: the codec never looks past the
//! splits it performs, and it performs no escaping — a payload that embeds a
//! `\n` in a position the receiver splits on will corrupt framing. Producing
//! unambiguous payloads is the application's contract.

use crate::error::{DecodeError, WireError};
use crate::PROTOCOL_VERSION;
use std::fmt;

/// Message type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    /// `H` — handshake request; id carries the protocol version.
    Hello,
    /// `W` — handshake reply; id carries the protocol version.
    Welcome,
    /// `M` — method invocation; payload = name + arguments.
    MethodCall,
    /// `C` — one-shot callback invocation; payload = token + arguments.
    Callback,
    /// `R` — successful response.
    Result,
    /// `E` — application-level error response; empty id = connection-level.
    Exception,
    /// `!` — dispatch-level error response.
    ExecutionError,
    /// `?` — introspection query.
    Discover,
    /// `T` — topic value update.
    TopicUpdate,
    /// `U` — subscriber cancels a topic; no payload.
    Unsubscribe,
    /// `Z` — publisher closes a topic; no payload.
    TopicClose,
    /// `S` — shared variable write; id carries the variable name.
    VarSet,
    /// `X` — shared variable removal; no payload.
    VarUnset,
}

impl MsgType {
    pub fn as_char(self) -> char {
        match self {
            MsgType::Hello => 'H',
            MsgType::Welcome => 'W',
            MsgType::MethodCall => 'M',
            MsgType::Callback => 'C',
            MsgType::Result => 'R',
            MsgType::Exception => 'E',
            MsgType::ExecutionError => '!',
            MsgType::Discover => '?',
            MsgType::TopicUpdate => 'T',
            MsgType::Unsubscribe => 'U',
            MsgType::TopicClose => 'Z',
            MsgType::VarSet => 'S',
            MsgType::VarUnset => 'X',
        }
    }

    pub fn from_char(c: char) -> Option<MsgType> {
        match c {
            'H' => Some(MsgType::Hello),
            'W' => Some(MsgType::Welcome),
            'M' => Some(MsgType::MethodCall),
            'C' => Some(MsgType::Callback),
            'R' => Some(MsgType::Result),
            'E' => Some(MsgType::Exception),
            '!' => Some(MsgType::ExecutionError),
            '?' => Some(MsgType::Discover),
            'T' => Some(MsgType::TopicUpdate),
            'U' => Some(MsgType::Unsubscribe),
            'Z' => Some(MsgType::TopicClose),
            'S' => Some(MsgType::VarSet),
            'X' => Some(MsgType::VarUnset),
            _ => None,
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Splits at the first `\n`, the protocol's only structural separator.
///
/// Returns the text before the separator and, when one exists, the remainder
/// after it. This single primitive carries all framing: header from payload,
/// then name from arguments inside two-field payloads.
pub fn split_field(s: &str) -> (&str, Option<&str>) {
    match s.split_once('\n') {
        Some((head, rest)) => (head, Some(rest)),
        None => (s, None),
    }
}

/// A decoded wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MsgType,
    pub id: String,
    /// `None` when the frame had no `\n` separator at all.
    pub payload: Option<String>,
}

impl Message {
    pub fn new(kind: MsgType, id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            payload: Some(payload.into()),
        }
    }

    /// A message with no payload section (`U`, `Z`, `X`).
    pub fn bare(kind: MsgType, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            payload: None,
        }
    }

    pub fn hello(data: &str) -> Self {
        Self::new(MsgType::Hello, PROTOCOL_VERSION, data)
    }

    pub fn welcome(data: &str) -> Self {
        Self::new(MsgType::Welcome, PROTOCOL_VERSION, data)
    }

    pub fn method_call(id: &str, method: &str, args: &str) -> Self {
        Self::new(MsgType::MethodCall, id, format!("{}\n{}", method, args))
    }

    pub fn callback(id: &str, token: &str, args: &str) -> Self {
        Self::new(MsgType::Callback, id, format!("{}\n{}", token, args))
    }

    pub fn result(id: &str, data: &str) -> Self {
        Self::new(MsgType::Result, id, data)
    }

    pub fn exception(id: &str, err: &WireError) -> Self {
        Self::new(MsgType::Exception, id, err.to_string())
    }

    pub fn execution_error(id: &str, err: &WireError) -> Self {
        Self::new(MsgType::ExecutionError, id, err.to_string())
    }

    /// A connection-level exception: `E` with an empty id.
    pub fn node_error(err: &WireError) -> Self {
        Self::exception("", err)
    }

    pub fn discover(id: &str, query: &str) -> Self {
        Self::new(MsgType::Discover, id, query)
    }

    pub fn topic_update(topic: &str, data: &str) -> Self {
        Self::new(MsgType::TopicUpdate, topic, data)
    }

    pub fn unsubscribe(topic: &str) -> Self {
        Self::bare(MsgType::Unsubscribe, topic)
    }

    pub fn topic_close(topic: &str) -> Self {
        Self::bare(MsgType::TopicClose, topic)
    }

    pub fn var_set(name: &str, value: &str) -> Self {
        Self::new(MsgType::VarSet, name, value)
    }

    pub fn var_unset(name: &str) -> Self {
        Self::bare(MsgType::VarUnset, name)
    }

    /// Renders the message into its wire form.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(
            2 + self.id.len() + self.payload.as_ref().map_or(0, |p| p.len() + 1),
        );
        out.push(self.kind.as_char());
        out.push_str(&self.id);
        if let Some(payload) = &self.payload {
            out.push('\n');
            out.push_str(payload);
        }
        out
    }

    /// Decodes one frame.
    ///
    /// The payload is kept opaque; callers split two-field payloads with
    /// [`split_field`] themselves.
    pub fn decode(raw: &str) -> Result<Message, DecodeError> {
        let (header, payload) = split_field(raw);
        let mut chars = header.chars();
        let type_char = chars.next().ok_or(DecodeError::Empty)?;
        let kind = MsgType::from_char(type_char).ok_or(DecodeError::UnknownType(type_char))?;
        Ok(Message {
            kind,
            id: chars.as_str().to_string(),
            payload: payload.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use proptest::prelude::*;

    #[test]
    fn test_encode_method_call() {
        let msg = Message::method_call("5", "add", "1 2");
        assert_eq!(msg.encode(), "M5\nadd\n1 2");
    }

    #[test]
    fn test_encode_method_call_empty_args() {
        let msg = Message::method_call("0", "ping", "");
        assert_eq!(msg.encode(), "M0\nping\n");
    }

    #[test]
    fn test_encode_no_payload_types() {
        assert_eq!(Message::unsubscribe("news").encode(), "Unews");
        assert_eq!(Message::topic_close("news").encode(), "Znews");
        assert_eq!(Message::var_unset("foo").encode(), "Xfoo");
    }

    #[test]
    fn test_encode_handshake_carries_version_as_id() {
        assert_eq!(Message::hello("hi").encode(), "H1.0.0\nhi");
        assert_eq!(Message::welcome("").encode(), "W1.0.0\n");
    }

    #[test]
    fn test_encode_var_set() {
        assert_eq!(Message::var_set("foo", "bar").encode(), "Sfoo\nbar");
    }

    #[test]
    fn test_encode_errors() {
        let err = WireError::from(ErrorCode::MethodNotFound);
        assert_eq!(
            Message::execution_error("3", &err).encode(),
            "!3\n7 Method not found"
        );
        assert_eq!(
            Message::node_error(&WireError::from(ErrorCode::UnsupportedVersion)).encode(),
            "E\n5 Unsupported version"
        );
    }

    #[test]
    fn test_decode_method_call() {
        let msg = Message::decode("M5\nadd\n1 2").unwrap();
        assert_eq!(msg.kind, MsgType::MethodCall);
        assert_eq!(msg.id, "5");
        let (name, args) = split_field(msg.payload.as_deref().unwrap());
        assert_eq!(name, "add");
        assert_eq!(args, Some("1 2"));
    }

    #[test]
    fn test_decode_result_without_separator() {
        let msg = Message::decode("R5").unwrap();
        assert_eq!(msg.kind, MsgType::Result);
        assert_eq!(msg.id, "5");
        assert_eq!(msg.payload, None);
    }

    #[test]
    fn test_decode_connection_level_exception() {
        let msg = Message::decode("E\n5 Unsupported version").unwrap();
        assert_eq!(msg.kind, MsgType::Exception);
        assert_eq!(msg.id, "");
        assert_eq!(msg.payload.as_deref(), Some("5 Unsupported version"));
    }

    #[test]
    fn test_decode_empty_frame() {
        assert_eq!(Message::decode(""), Err(DecodeError::Empty));
        // A frame that begins with the separator has no type character either.
        assert_eq!(Message::decode("\nrest"), Err(DecodeError::Empty));
    }

    #[test]
    fn test_decode_unknown_type() {
        assert_eq!(Message::decode("Q1\nx"), Err(DecodeError::UnknownType('Q')));
    }

    #[test]
    fn test_split_field() {
        assert_eq!(split_field("a\nb\nc"), ("a", Some("b\nc")));
        assert_eq!(split_field("plain"), ("plain", None));
        assert_eq!(split_field("head\n"), ("head", Some("")));
        assert_eq!(split_field(""), ("", None));
    }

    proptest! {
        #[test]
        fn prop_payload_round_trip(
            id in "[A-Za-z0-9_.-]{0,12}",
            payload in "(?s).*",
        ) {
            // Payload bodies may contain anything, including newlines: the
            // decoder only consumes the first separator.
            let msg = Message::new(MsgType::Result, id, payload);
            let decoded = Message::decode(&msg.encode()).unwrap();
            prop_assert_eq!(decoded, msg);
        }

        #[test]
        fn prop_bare_round_trip(id in "[^\n]{0,16}") {
            let msg = Message::bare(MsgType::Unsubscribe, id);
            let decoded = Message::decode(&msg.encode()).unwrap();
            prop_assert_eq!(decoded, msg);
        }

        #[test]
        fn prop_decode_never_panics(raw in "(?s).*") {
            let _ = Message::decode(&raw);
        }
    }
}
