//! Notification delivery.
//!
//! The session calls [`NotificationSink`] methods synchronously, in event
//! order, while it applies frames. Every method has a no-op default so hosts
//! only implement what they render.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::block::Citation;
use crate::event::SummaryFragment;
use crate::normalize::ToolResultShape;
use crate::step::Step;

/// Final payload of a completed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub full_text: String,
    pub steps: Vec<Step>,
    /// Identifier from `message_start`; `None` if the stream never sent one.
    #[serde(rename = "messageUuid")]
    pub message_id: Option<String>,
}

/// Consumer of incremental decoder updates.
#[allow(unused_variables)]
pub trait NotificationSink {
    fn message_start(&mut self, message_id: &str) {}

    fn text_delta(&mut self, fragment: &str, full_text: &str, index: usize) {}

    fn thinking_start(&mut self, index: usize) {}

    /// `thinking` is the cumulative reasoning text of the block.
    fn thinking_delta(&mut self, thinking: &str, index: usize) {}

    fn thinking_stop(&mut self, thinking: &str, summaries: &[SummaryFragment], index: usize) {}

    /// Also re-sent when the block's status message changes.
    fn tool_start(&mut self, tool_name: &str, message: Option<&str>, index: usize) {}

    fn tool_stop(&mut self, tool_name: &str, input: &str, index: usize) {}

    fn tool_result(
        &mut self,
        tool_name: &str,
        result: &ToolResultShape,
        is_error: bool,
        index: usize,
    ) {
    }

    fn citation(&mut self, citation: &Citation, index: usize) {}

    fn tool_approval(&mut self, tool_name: &str, approval_key: &str, input: &Value) {}

    fn compaction_status(&mut self, status: &str, message: Option<&str>) {}

    fn complete(&mut self, completion: &Completion) {}
}

/// Discards every notification.
impl NotificationSink for () {}

/// Owned form of one notification, for hosts that prefer messages to callbacks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    MessageStart {
        message_id: String,
    },
    TextDelta {
        fragment: String,
        full_text: String,
        index: usize,
    },
    ThinkingStart {
        index: usize,
    },
    ThinkingDelta {
        thinking: String,
        index: usize,
    },
    ThinkingStop {
        thinking: String,
        summaries: Vec<SummaryFragment>,
        index: usize,
    },
    ToolStart {
        tool_name: String,
        message: Option<String>,
        index: usize,
    },
    ToolStop {
        tool_name: String,
        input: String,
        index: usize,
    },
    ToolResult {
        tool_name: String,
        result: ToolResultShape,
        is_error: bool,
        index: usize,
    },
    Citation {
        citation: Citation,
        index: usize,
    },
    ToolApproval {
        tool_name: String,
        approval_key: String,
        input: Value,
    },
    CompactionStatus {
        status: String,
        message: Option<String>,
    },
    Complete(Completion),
}

/// Implements [`NotificationSink`] for a type by converting each callback into
/// an owned [`Notification`] and handing it to `$push`.
macro_rules! sink_via_notifications {
    ($ty:ty, |$this:ident, $n:ident| $push:expr) => {
        impl NotificationSink for $ty {
            fn message_start(&mut self, message_id: &str) {
                let $this = self;
                let $n = Notification::MessageStart {
                    message_id: message_id.to_string(),
                };
                $push
            }

            fn text_delta(&mut self, fragment: &str, full_text: &str, index: usize) {
                let $this = self;
                let $n = Notification::TextDelta {
                    fragment: fragment.to_string(),
                    full_text: full_text.to_string(),
                    index,
                };
                $push
            }

            fn thinking_start(&mut self, index: usize) {
                let $this = self;
                let $n = Notification::ThinkingStart { index };
                $push
            }

            fn thinking_delta(&mut self, thinking: &str, index: usize) {
                let $this = self;
                let $n = Notification::ThinkingDelta {
                    thinking: thinking.to_string(),
                    index,
                };
                $push
            }

            fn thinking_stop(
                &mut self,
                thinking: &str,
                summaries: &[SummaryFragment],
                index: usize,
            ) {
                let $this = self;
                let $n = Notification::ThinkingStop {
                    thinking: thinking.to_string(),
                    summaries: summaries.to_vec(),
                    index,
                };
                $push
            }

            fn tool_start(&mut self, tool_name: &str, message: Option<&str>, index: usize) {
                let $this = self;
                let $n = Notification::ToolStart {
                    tool_name: tool_name.to_string(),
                    message: message.map(ToOwned::to_owned),
                    index,
                };
                $push
            }

            fn tool_stop(&mut self, tool_name: &str, input: &str, index: usize) {
                let $this = self;
                let $n = Notification::ToolStop {
                    tool_name: tool_name.to_string(),
                    input: input.to_string(),
                    index,
                };
                $push
            }

            fn tool_result(
                &mut self,
                tool_name: &str,
                result: &ToolResultShape,
                is_error: bool,
                index: usize,
            ) {
                let $this = self;
                let $n = Notification::ToolResult {
                    tool_name: tool_name.to_string(),
                    result: result.clone(),
                    is_error,
                    index,
                };
                $push
            }

            fn citation(&mut self, citation: &Citation, index: usize) {
                let $this = self;
                let $n = Notification::Citation {
                    citation: citation.clone(),
                    index,
                };
                $push
            }

            fn tool_approval(&mut self, tool_name: &str, approval_key: &str, input: &Value) {
                let $this = self;
                let $n = Notification::ToolApproval {
                    tool_name: tool_name.to_string(),
                    approval_key: approval_key.to_string(),
                    input: input.clone(),
                };
                $push
            }

            fn compaction_status(&mut self, status: &str, message: Option<&str>) {
                let $this = self;
                let $n = Notification::CompactionStatus {
                    status: status.to_string(),
                    message: message.map(ToOwned::to_owned),
                };
                $push
            }

            fn complete(&mut self, completion: &Completion) {
                let $this = self;
                let $n = Notification::Complete(completion.clone());
                $push
            }
        }
    };
}

// Records notifications in arrival order.
sink_via_notifications!(Vec<Notification>, |this, n| this.push(n));

/// Forwards notifications over an unbounded tokio channel.
///
/// Sending never suspends, so delivery stays synchronous and ordered. A closed
/// receiver is not an error for the decoder; later notifications are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    /// Creates a sink together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ChannelSink {
    fn forward(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::trace!("notification receiver dropped");
        }
    }
}

sink_via_notifications!(ChannelSink, |this, n| this.forward(n));
