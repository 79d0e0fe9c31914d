//! Feed Codec
//!
//! JSON encoding and decoding for the live feed. Decoding failures are
//! reported, never panicked on: a malformed frame is the sender's
//! problem and must not take the connection down with it.

use super::messages::{FeedDirective, FeedFrame};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload parsed but was not an object frame.
    #[error("invalid frame format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for feed frames and directives.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text payload into a [`FeedFrame`].
    ///
    /// # Errors
    ///
    /// Returns an error for anything that is not a well-formed tagged
    /// frame object.
    pub fn decode(&self, text: &str) -> Result<FeedFrame, CodecError> {
        let trimmed = text.trim();
        if !trimmed.starts_with('{') {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}...",
                &trimmed[..trimmed.len().min(50)]
            )));
        }
        Ok(serde_json::from_str(trimmed)?)
    }

    /// Encode a directive to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self, directive: &FeedDirective) -> Result<String, CodecError> {
        Ok(serde_json::to_string(directive)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_valid_frame() {
        let codec = JsonCodec::new();
        let frame = codec.decode(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(frame, FeedFrame::Heartbeat);
    }

    #[test]
    fn decode_tolerates_surrounding_whitespace() {
        let codec = JsonCodec::new();
        let frame = codec.decode("  {\"type\":\"connection-ack\"}\n").unwrap();
        assert_eq!(frame, FeedFrame::ConnectionAck);
    }

    #[test]
    fn decode_rejects_non_object() {
        let codec = JsonCodec::new();
        assert!(matches!(
            codec.decode("[1,2,3]"),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn decode_rejects_bad_json() {
        let codec = JsonCodec::new();
        assert!(matches!(
            codec.decode(r#"{"type":"price-update""#),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let codec = JsonCodec::new();
        assert!(codec.decode(r#"{"type":"mystery"}"#).is_err());
    }

    #[test]
    fn encode_round_trips_through_decode_types() {
        let codec = JsonCodec::new();
        let json = codec
            .encode(&FeedDirective::Unsubscribe {
                symbols: vec!["TSLA".to_string()],
            })
            .unwrap();
        assert!(json.contains("\"unsubscribe\""));
    }
}
