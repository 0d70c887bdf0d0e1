//! Payload decoding
//!
//! Publishers serialize a YAML mapping. Some emit symbol-style keys, so
//! `:type` and `type` are treated the same. JSON payloads parse as well since
//! JSON is a YAML subset.

use super::{Event, EventKind};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeSet;
use thiserror::Error;

const PREVIEW_LIMIT: usize = 512;

/// Payload decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Malformed(String),
    #[error("{kind} event is missing required field '{field}'")]
    MissingField {
        kind: EventKind,
        field: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(rename = "type", alias = ":type")]
    kind: Option<Scalar>,
    #[serde(alias = ":server")]
    server: Option<Scalar>,
    #[serde(alias = ":channel")]
    channel: Option<Scalar>,
    #[serde(alias = ":message")]
    message: Option<Scalar>,
    #[serde(alias = ":tags")]
    tags: Option<RawTags>,
}

/// Any YAML scalar, kept in its text form. Nested sequences and mappings
/// do not match and make the payload malformed.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_yaml::Number),
    Flag(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Text(text) => text,
            Scalar::Number(number) => number.to_string(),
            Scalar::Flag(flag) => flag.to_string(),
        }
    }
}

/// Tags arrive either as a sequence or in the chat client's native
/// comma-joined form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTags {
    List(Vec<Option<Scalar>>),
    Joined(Scalar),
}

impl RawTags {
    fn into_set(self) -> BTreeSet<String> {
        let items: Vec<String> = match self {
            RawTags::List(items) => items.into_iter().flatten().map(Scalar::into_text).collect(),
            RawTags::Joined(joined) => joined
                .into_text()
                .split(',')
                .map(str::to_string)
                .collect(),
        };

        items
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

/// Decode a raw delivery body into an [`Event`]
pub fn decode(raw: &[u8]) -> Result<Event, DecodeError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| DecodeError::Malformed(format!("payload is not valid UTF-8: {e}")))?;

    let value: Value = serde_yaml::from_str(text)
        .map_err(|e| DecodeError::Malformed(format!("unparseable payload: {e}")))?;

    if !value.is_mapping() {
        return Err(DecodeError::Malformed(format!(
            "expected a mapping, got {}",
            describe_value(&value)
        )));
    }

    let payload: RawPayload = serde_yaml::from_value(value)
        .map_err(|e| DecodeError::Malformed(format!("unexpected field shape: {e}")))?;

    let declared_type = payload.kind.map(Scalar::into_text);
    let message = payload.message.map(Scalar::into_text);
    let kind = EventKind::from_declared(declared_type.as_deref());

    if matches!(kind, EventKind::Channel | EventKind::Private) && message.is_none() {
        return Err(DecodeError::MissingField {
            kind,
            field: "message",
        });
    }

    Ok(Event {
        kind,
        declared_type,
        server: payload.server.map(Scalar::into_text),
        channel: payload.channel.map(Scalar::into_text),
        message,
        tags: payload.tags.map(RawTags::into_set).unwrap_or_default(),
    })
}

/// Lossy, length-limited rendering of a payload for log lines
pub fn payload_preview(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if text.chars().count() <= PREVIEW_LIMIT {
        return text.into_owned();
    }
    let mut preview: String = text.chars().take(PREVIEW_LIMIT).collect();
    preview.push_str("...[truncated]");
    preview
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "an empty document",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_channel_event() {
        let raw = br##"
type: channel
server: freenode
channel: "#test"
message: hello
tags: [nick_alice, irc_privmsg]
"##;
        let event = decode(raw).unwrap();

        assert_eq!(event.kind, EventKind::Channel);
        assert_eq!(event.declared_type.as_deref(), Some("channel"));
        assert_eq!(event.server.as_deref(), Some("freenode"));
        assert_eq!(event.channel.as_deref(), Some("#test"));
        assert_eq!(event.message.as_deref(), Some("hello"));
        assert!(event.has_tag("nick_alice"));
        assert!(event.has_tag("irc_privmsg"));
    }

    #[test]
    fn test_decode_colon_prefixed_keys() {
        let raw = br##"
:type: private
:server: freenode
:channel: bob
:message: ping
:tags:
  - notify_private
"##;
        let event = decode(raw).unwrap();

        assert_eq!(event.kind, EventKind::Private);
        assert_eq!(event.channel.as_deref(), Some("bob"));
        assert!(event.has_tag("notify_private"));
    }

    #[test]
    fn test_decode_json_payload() {
        let raw = br##"{"type": "channel", "server": "x", "channel": "#y", "message": "hi", "tags": ["nick_z"]}"##;
        let event = decode(raw).unwrap();
        assert_eq!(event.kind, EventKind::Channel);
        assert!(event.has_tag("nick_z"));
    }

    #[test]
    fn test_decode_comma_joined_tags() {
        let raw = b"type: channel\nmessage: hi\ntags: 'irc_privmsg,nick_alice,,log1'\n";
        let event = decode(raw).unwrap();

        let tags: Vec<&str> = event.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["irc_privmsg", "log1", "nick_alice"]);
    }

    #[test]
    fn test_decode_missing_tags_is_empty_set() {
        let event = decode(b"type: private\nmessage: hi\n").unwrap();
        assert!(event.tags.is_empty());
        assert!(event.server.is_none());
        assert!(event.channel.is_none());
    }

    #[test]
    fn test_unknown_type_tolerates_missing_message() {
        let event = decode(b"type: join\nserver: freenode\n").unwrap();
        assert_eq!(event.kind, EventKind::Unknown);
        assert_eq!(event.declared_type.as_deref(), Some("join"));
        assert!(event.message.is_none());
    }

    #[test]
    fn test_missing_type_is_unknown() {
        let event = decode(b"message: hi\n").unwrap();
        assert_eq!(event.kind, EventKind::Unknown);
        assert!(event.declared_type.is_none());
    }

    #[test]
    fn test_channel_without_message_is_rejected() {
        let err = decode(b"type: channel\ntags: [nick_alice]\n").unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField {
                kind: EventKind::Channel,
                field: "message"
            }
        );
        assert_eq!(
            err.to_string(),
            "channel event is missing required field 'message'"
        );
    }

    #[test]
    fn test_non_mapping_payloads_are_malformed() {
        for raw in [&b""[..], b"just a string", b"- a\n- b\n", b"42", b"~"] {
            let err = decode(raw).unwrap_err();
            assert!(
                matches!(err, DecodeError::Malformed(_)),
                "expected Malformed for {:?}",
                String::from_utf8_lossy(raw)
            );
        }
    }

    #[test]
    fn test_unparseable_payload_is_malformed() {
        let err = decode(b"type: [unclosed").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let err = decode(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_wrong_field_shape_is_malformed() {
        let err = decode(b"type: channel\nmessage: [1, 2]\n").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));

        let err = decode(b"type: channel\nmessage: hi\ntags: {a: b}\n").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_non_string_type_is_unknown() {
        let event = decode(b"{type: 5, server: s, channel: c, message: hi}").unwrap();
        assert_eq!(event.kind, EventKind::Unknown);
        assert_eq!(event.declared_type.as_deref(), Some("5"));

        let event = decode(b"type: true\nmessage: hi\n").unwrap();
        assert_eq!(event.kind, EventKind::Unknown);
        assert_eq!(event.declared_type.as_deref(), Some("true"));
    }

    #[test]
    fn test_scalar_fields_keep_their_text() {
        let event = decode(b"type: private\nserver: 1\nchannel: bob\nmessage: 42\n").unwrap();
        assert_eq!(event.kind, EventKind::Private);
        assert_eq!(event.server.as_deref(), Some("1"));
        assert_eq!(event.message.as_deref(), Some("42"));

        let event = decode(b"type: channel\nmessage: true\ntags: [nick_alice]\n").unwrap();
        assert_eq!(event.message.as_deref(), Some("true"));
    }

    #[test]
    fn test_scalar_tags_are_kept() {
        let event = decode(b"type: channel\nmessage: hi\ntags: [notify_none, 7, ~]\n").unwrap();
        let tags: Vec<&str> = event.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["7", "notify_none"]);
    }

    #[test]
    fn test_payload_preview_truncates() {
        let raw = "x".repeat(600);
        let preview = payload_preview(raw.as_bytes());
        assert!(preview.ends_with("...[truncated]"));
        assert_eq!(preview.len(), PREVIEW_LIMIT + "...[truncated]".len());

        assert_eq!(payload_preview(b"short"), "short");
    }
}
