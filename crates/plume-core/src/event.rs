//! Inbound stream event model.
//!
//! The generation service delivers a line-oriented sequence of JSON envelopes.
//! Each server-delivered line decodes to exactly one [`StreamEvent`]; delivery
//! order is preserved and events are never coalesced. Unknown fields are
//! ignorable and unrecognized envelope shapes decode to `None` so the reader
//! can skip them without aborting the stream.

use serde::{Deserialize, Serialize};

/// Channel a delta belongs to.
///
/// The default channel carries the committed answer; the analysis channel
/// carries a reasoning trace rendered separately while the answer accumulates
/// underneath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// The default channel for final answer content.
    Final,
    /// Side channel for analysis/reasoning content.
    Analysis,
}

impl Default for Channel {
    fn default() -> Self {
        Self::Final
    }
}

/// Terminal payload carried by a `done` envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DonePayload {
    /// Full answer text, when the service echoes it on completion.
    #[serde(default)]
    pub text: Option<String>,
    /// Tabular rows (capability-matrix responses). Some service versions name
    /// this field `matrix`.
    #[serde(default, alias = "matrix")]
    pub rows: Option<Vec<serde_json::Value>>,
}

/// A single decoded event from a generation stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Stream opened; payload is informational only.
    Init,
    /// Incremental text on the given channel.
    Delta { content: String, channel: Channel },
    /// One tabular row (capability-matrix generation).
    Row { row: serde_json::Value },
    /// A file reference produced by the generation.
    File { name: String },
    /// In-band error reported by the service.
    Error { message: String },
    /// Terminal event; absence of this before end-of-stream is an error.
    Done(DonePayload),
}

/// Raw envelope as delivered on the wire.
///
/// Delta and error envelopes carry no `type` discriminator, so the wire shape
/// is a bag of optional fields classified after parsing.
#[derive(Debug, Default, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    row: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "matrix")]
    rows: Option<Vec<serde_json::Value>>,
}

impl StreamEvent {
    /// Decodes one wire line into an event.
    ///
    /// Returns `None` for blank lines, lines that are not valid JSON, and
    /// envelopes of an unrecognized shape. Callers skip those and keep
    /// reading.
    pub fn parse_line(line: &[u8]) -> Option<Self> {
        if line.iter().all(|byte| byte.is_ascii_whitespace()) {
            return None;
        }

        let raw: RawEnvelope = serde_json::from_slice(line).ok()?;
        Self::classify(raw)
    }

    fn classify(raw: RawEnvelope) -> Option<Self> {
        match raw.kind.as_deref() {
            Some("init") => return Some(Self::Init),
            Some("row") => return raw.row.map(|row| Self::Row { row }),
            Some("file") => return raw.name.map(|name| Self::File { name }),
            Some("done") => {
                return Some(Self::Done(DonePayload {
                    text: raw.text,
                    rows: raw.rows,
                }));
            }
            Some(_) => return None,
            None => {}
        }

        if let Some(message) = raw.error {
            return Some(Self::Error { message });
        }

        raw.delta.map(|content| Self::Delta {
            content,
            channel: match raw.channel.as_deref() {
                Some("analysis") => Channel::Analysis,
                _ => Channel::Final,
            },
        })
    }

    /// Returns true for the events that end a stream's useful life.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_channel_delta() {
        let event = StreamEvent::parse_line(br#"{"delta":"Hello"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Delta {
                content: "Hello".to_string(),
                channel: Channel::Final,
            }
        );
    }

    #[test]
    fn test_parse_analysis_channel_delta() {
        let event = StreamEvent::parse_line(br#"{"delta":"Hmm","channel":"analysis"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Delta {
                content: "Hmm".to_string(),
                channel: Channel::Analysis,
            }
        );
    }

    #[test]
    fn test_parse_error_envelope() {
        let event = StreamEvent::parse_line(br#"{"error":"quota exceeded"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Error {
                message: "quota exceeded".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_done_with_matrix_alias() {
        let event = StreamEvent::parse_line(br#"{"type":"done","matrix":[{"a":1}]}"#).unwrap();
        match event {
            StreamEvent::Done(payload) => {
                assert!(payload.text.is_none());
                assert_eq!(payload.rows.unwrap().len(), 1);
            }
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let event =
            StreamEvent::parse_line(br#"{"delta":"x","requestId":"r-1","seq":42}"#).unwrap();
        assert!(matches!(event, StreamEvent::Delta { .. }));
    }

    #[test]
    fn test_parse_skips_garbage_and_blank_lines() {
        assert!(StreamEvent::parse_line(b"").is_none());
        assert!(StreamEvent::parse_line(b"   ").is_none());
        assert!(StreamEvent::parse_line(b"not json").is_none());
        assert!(StreamEvent::parse_line(br#"{"type":"heartbeat"}"#).is_none());
    }

    #[test]
    fn test_parse_file_and_row() {
        assert_eq!(
            StreamEvent::parse_line(br#"{"type":"file","name":"summary.docx"}"#).unwrap(),
            StreamEvent::File {
                name: "summary.docx".to_string(),
            }
        );
        assert!(matches!(
            StreamEvent::parse_line(br#"{"type":"row","row":{"capability":"SSO"}}"#).unwrap(),
            StreamEvent::Row { .. }
        ));
    }
}
