//! # Protocol Codec
//!
//! Encodes and decodes the wire envelopes of the voice protocol. Control
//! traffic and outgoing envelopes are closed sets of serde-tagged variants,
//! so an unknown `type` is a decode error here rather than a string
//! comparison scattered through the session code.

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};

/// Control message from the client. Carries no payload beyond its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Begin (or restart) an utterance capture span
    Start,
    /// End the current capture span and flush the terminal transcript
    Stop,
}

/// One inbound WebSocket frame, as handed to the session task.
///
/// Binary frames are always treated as raw PCM; content validation, if any,
/// is the decoder's responsibility.
#[derive(Debug)]
pub enum InboundFrame {
    Text(String),
    Audio(Vec<u8>),
}

/// Outgoing envelope sent to the client as JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// Model and recognizer initialized; the session accepts control traffic
    Ready { message: String },

    /// Fatal or local error description
    Error { message: String },

    /// Utterance capture begun
    Started { message: String },

    /// In-progress hypothesis
    Partial { transcript: String },

    /// Completed utterance within a listening span
    Result { transcript: String },

    /// Terminal transcript at stop (only sent when non-empty)
    Final { transcript: String },

    /// Listening span ended
    Stopped { message: String },
}

impl Envelope {
    pub fn ready() -> Self {
        Envelope::Ready {
            message: "speech recognition ready".to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error {
            message: message.into(),
        }
    }

    pub fn started() -> Self {
        Envelope::Started {
            message: "recognition started".to_string(),
        }
    }

    pub fn stopped() -> Self {
        Envelope::Stopped {
            message: "recognition stopped".to_string(),
        }
    }

    pub fn partial(transcript: impl Into<String>) -> Self {
        Envelope::Partial {
            transcript: transcript.into(),
        }
    }

    pub fn result(transcript: impl Into<String>) -> Self {
        Envelope::Result {
            transcript: transcript.into(),
        }
    }

    pub fn final_transcript(transcript: impl Into<String>) -> Self {
        Envelope::Final {
            transcript: transcript.into(),
        }
    }
}

/// Decode a text frame into a control message.
///
/// Unknown `type` values and malformed JSON are both `BridgeError::Protocol`;
/// policy for those lives in the lifecycle loop (log and ignore).
pub fn decode_control(text: &str) -> Result<ControlMessage, BridgeError> {
    serde_json::from_str(text)
        .map_err(|err| BridgeError::Protocol(format!("invalid control frame: {}", err)))
}

/// Encode an outgoing envelope as JSON text.
pub fn encode_envelope(envelope: &Envelope) -> String {
    // These variants hold only strings; serialization has no failure mode,
    // but a hand-built error envelope is still safer than a panic.
    serde_json::to_string(envelope).unwrap_or_else(|err| {
        format!(r#"{{"type":"error","message":"envelope encoding failed: {}"}}"#, err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_start_and_stop() {
        assert_eq!(
            decode_control(r#"{"type": "start"}"#).unwrap(),
            ControlMessage::Start
        );
        assert_eq!(
            decode_control(r#"{"type": "stop"}"#).unwrap(),
            ControlMessage::Stop
        );
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let err = decode_control(r#"{"type": "pause"}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        assert!(decode_control("start please").is_err());
        assert!(decode_control(r#"{"kind": "start"}"#).is_err());
        assert!(decode_control("").is_err());
    }

    #[test]
    fn test_envelope_wire_format() {
        assert_eq!(
            encode_envelope(&Envelope::partial("hola")),
            r#"{"type":"partial","transcript":"hola"}"#
        );
        assert_eq!(
            encode_envelope(&Envelope::result("hola mundo")),
            r#"{"type":"result","transcript":"hola mundo"}"#
        );
        assert_eq!(
            encode_envelope(&Envelope::final_transcript("adios")),
            r#"{"type":"final","transcript":"adios"}"#
        );

        let ready = encode_envelope(&Envelope::ready());
        assert!(ready.starts_with(r#"{"type":"ready","#));

        let stopped = encode_envelope(&Envelope::stopped());
        assert!(stopped.contains(r#""type":"stopped""#));
        assert!(stopped.contains(r#""message""#));
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = Envelope::error("model directory not found");
        let decoded: Envelope = serde_json::from_str(&encode_envelope(&envelope)).unwrap();
        assert_eq!(decoded, envelope);
    }
}
