//! Common imports for typical decoder usage.
//!
//! Hosts that only feed frames and render the result need nothing else.
pub use crate::{
    drive, ChannelSink, Completion, DecoderConfig, Notification, NotificationSink, Step,
    StreamError, StreamSession, ToolResultShape,
};
