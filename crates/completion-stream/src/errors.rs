/// Reasons a single frame could not be turned into an event.
///
/// Only surfaced by [`crate::frame::try_decode_line`]; the regular decode path
/// drops malformed frames and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload after the frame prefix was not a valid event record.
    #[error("malformed frame: {reason}")]
    Malformed { reason: String },
    /// The payload was JSON but carried no `type` discriminator.
    #[error("frame payload has no type discriminator")]
    MissingType,
}

impl DecodeError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Errors returned by the stream driver and configuration helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Reading the underlying chunk stream failed.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The frame source ended before a terminal `message_delta` arrived.
    #[error(
        "stream ended before completion (message={message_id:?}, {} bytes of text)",
        received_text.len()
    )]
    Truncated {
        message_id: Option<String>,
        received_text: String,
    },
    /// Invalid decoder configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl StreamError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns true when the session was cut off rather than failed.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_display_reports_text_length() {
        let err = StreamError::Truncated {
            message_id: Some("m-1".into()),
            received_text: "abc".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("m-1"));
        assert!(rendered.contains("3 bytes"));
        assert!(err.is_truncated());
    }

    #[test]
    fn transport_error_is_not_truncation() {
        let err = StreamError::transport("reset by peer");
        assert!(!err.is_truncated());
        assert_eq!(err.to_string(), "transport error: reset by peer");
    }
}
