use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::errors::StreamError;
use crate::frame::LineBuffer;
use crate::session::StreamSession;
use crate::sink::{Completion, NotificationSink};

/// Reads a response body to completion.
///
/// Chunks are split into lines and applied to `session` as they arrive;
/// notifications reach `sink` before the next chunk is awaited. Returns as
/// soon as the terminal event has been applied, leaving any remaining body
/// unread. Dropping the future cancels the read and leaves `session` holding
/// whatever was applied so far.
pub async fn drive<St, E, N>(
    mut stream: St,
    session: &mut StreamSession,
    sink: &mut N,
) -> Result<Completion, StreamError>
where
    St: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
    N: NotificationSink + ?Sized,
{
    let mut lines = LineBuffer::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| {
            warn!(session_id = %session.session_id(), error = %err, "response stream failed");
            StreamError::transport(err.to_string())
        })?;
        for line in lines.push_chunk(&chunk) {
            if let Some(completion) = session.feed_line(&line, sink) {
                return Ok(completion);
            }
        }
    }

    if let Some(line) = lines.finish()
        && let Some(completion) = session.feed_line(&line, sink)
    {
        return Ok(completion);
    }

    debug!(
        session_id = %session.session_id(),
        received = session.full_text().len(),
        "response stream ended without a stop reason"
    );
    Err(StreamError::Truncated {
        message_id: session.last_message_id().map(str::to_string),
        received_text: session.full_text().to_string(),
    })
}
