use tracing::debug;

use crate::config::DEFAULT_FRAME_PREFIX;
use crate::errors::DecodeError;
use crate::event::StreamEvent;

/// Splits arbitrary byte chunks into complete lines.
///
/// A trailing partial line stays buffered until the next chunk completes it,
/// so multi-byte UTF-8 sequences split across chunks decode correctly.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed, without the
    /// `\n` / `\r\n` terminator.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(idx) = self.buf.iter().position(|b| *b == b'\n') {
            let line_bytes: Vec<u8> = self.buf.drain(..=idx).collect();
            lines.push(line_from_bytes(&line_bytes[..idx]));
        }
        lines
    }

    /// Flushes whatever is left once the source has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(line_from_bytes(&rest))
    }

    /// Number of buffered bytes that do not yet form a full line.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

fn line_from_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Decodes one line using the default `data: ` prefix.
///
/// Lines without the prefix and malformed payloads both yield `None`.
pub fn decode_line(line: &str) -> Option<StreamEvent> {
    decode_line_with_prefix(line, DEFAULT_FRAME_PREFIX)
}

/// Decodes one line, dropping (and logging) malformed payloads.
pub fn decode_line_with_prefix(line: &str, prefix: &str) -> Option<StreamEvent> {
    match try_decode_line_with_prefix(line, prefix) {
        Ok(event) => event,
        Err(err) => {
            debug!(error = %err, "dropping malformed frame");
            None
        }
    }
}

/// Decodes one line using the default prefix and reports malformed payloads.
///
/// `Ok(None)` means the line carried no frame prefix.
pub fn try_decode_line(line: &str) -> Result<Option<StreamEvent>, DecodeError> {
    try_decode_line_with_prefix(line, DEFAULT_FRAME_PREFIX)
}

pub fn try_decode_line_with_prefix(
    line: &str,
    prefix: &str,
) -> Result<Option<StreamEvent>, DecodeError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(payload) = line.strip_prefix(prefix) else {
        return Ok(None);
    };
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| DecodeError::malformed(e.to_string()))?;
    if value.get("type").and_then(|v| v.as_str()).is_none() {
        return Err(DecodeError::MissingType);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| DecodeError::malformed(e.to_string()))
}
