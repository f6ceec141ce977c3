//! Incremental decoder for streamed chat completions.
//!
//! The completion endpoint pushes newline-delimited `data: {json}` frames.
//! [`StreamSession`] applies them one at a time to per-index content blocks
//! (text, thinking, tool use, tool result), reports progress through a
//! [`NotificationSink`], and on the stop reason projects the blocks into the
//! render-ready [`Step`] list.
//!
//! # Feeding frames
//!
//! ```
//! use completion_stream::prelude::*;
//!
//! let mut session = StreamSession::new();
//! let mut sink: Vec<Notification> = Vec::new();
//!
//! let body = concat!(
//!     "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\"}}\n",
//!     "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n",
//!     "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n",
//! );
//! let completion = session.feed_chunk(body, &mut sink).expect("stop reason seen");
//!
//! assert_eq!(completion.full_text, "Hello");
//! assert_eq!(completion.steps.len(), 1);
//! ```
//!
//! # Driving a byte stream
//!
//! ```no_run
//! use bytes::Bytes;
//! use completion_stream::prelude::*;
//!
//! # async fn run(body: impl futures::Stream<Item = Result<Bytes, std::io::Error>> + Unpin) -> Result<(), StreamError> {
//! let mut session = StreamSession::new();
//! let completion = drive(body, &mut session, &mut ()).await?;
//! println!("{}", completion.full_text);
//! # Ok(())
//! # }
//! ```

/// Per-index content block records and their lifecycle state.
pub mod block;
/// Decoder configuration.
pub mod config;
/// Async driver that reads a response body into a session.
pub mod drive;
/// Public error types.
pub mod errors;
/// Typed wire events.
pub mod event;
/// Line splitting and frame decoding.
pub mod frame;
/// Tool-result shape normalization.
pub mod normalize;
/// Tracing subscriber setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Stream session state machine.
pub mod session;
/// Notification sink trait and provided sinks.
pub mod sink;
/// Step projection from content blocks.
pub mod step;
/// Step projection for persisted transcripts.
pub mod stored;

pub use block::{BlockArena, BlockBody, BlockState, Citation, ContentBlock};
pub use config::{DecoderConfig, LogConfig, LogOutput, DEFAULT_FRAME_PREFIX};
pub use drive::drive;
pub use errors::{DecodeError, StreamError};
pub use event::{BlockDelta, BlockKind, StreamEvent, SummaryFragment};
pub use frame::{decode_line, try_decode_line, LineBuffer};
pub use normalize::{normalize, normalize_fragment, JsonBlock, ToolResultShape};
pub use observability::init_observability;
pub use session::{SessionStatus, StreamSession};
pub use sink::{ChannelSink, Completion, Notification, NotificationSink};
pub use step::{project_steps, Step, TextStep, ThinkingStep, ToolStep};
pub use stored::steps_from_stored_content;
