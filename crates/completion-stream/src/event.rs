//! Typed records for the frames pushed by the completion endpoint.
//!
//! Only the fields the decoder reads are modelled; everything else in a frame
//! is ignored by serde. Unknown `type` tags decode to [`StreamEvent::Unknown`]
//! so new server events never break a session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        #[serde(default)]
        message: MessageInfo,
    },
    ContentBlockStart {
        index: usize,
        #[serde(default)]
        content_block: BlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: usize,
        #[serde(default)]
        stop_timestamp: Option<String>,
        #[serde(default)]
        buffered_input: Option<String>,
    },
    ToolUseBlockUpdateDelta {
        index: usize,
        #[serde(default)]
        message: Option<String>,
    },
    ThinkingSummaryDelta {
        index: usize,
        #[serde(default)]
        summary: Option<SummaryFragment>,
    },
    ToolApproval {
        #[serde(default)]
        tool_name: String,
        #[serde(default)]
        approval_key: String,
        #[serde(default)]
        input: Value,
    },
    CompactionStatus {
        #[serde(default)]
        status: String,
        #[serde(default)]
        message: Option<String>,
    },
    MessageDelta {
        #[serde(default)]
        delta: MessageDelta,
    },
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Wire name of the event, used for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageStart { .. } => "message_start",
            Self::ContentBlockStart { .. } => "content_block_start",
            Self::ContentBlockDelta { .. } => "content_block_delta",
            Self::ContentBlockStop { .. } => "content_block_stop",
            Self::ToolUseBlockUpdateDelta { .. } => "tool_use_block_update_delta",
            Self::ThinkingSummaryDelta { .. } => "thinking_summary_delta",
            Self::ToolApproval { .. } => "tool_approval",
            Self::CompactionStatus { .. } => "compaction_status",
            Self::MessageDelta { .. } => "message_delta",
            Self::Unknown => "unknown",
        }
    }
}

/// The `message` object carried by `message_start`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageInfo {
    #[serde(default)]
    pub uuid: Option<String>,
}

/// The `delta` object carried by `message_delta`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// The `content_block` object carried by `content_block_start`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BlockStart {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub approval_key: Option<String>,
    #[serde(default)]
    pub tool_use_id: Option<String>,
    #[serde(default)]
    pub is_error: Option<bool>,
    #[serde(default)]
    pub display_content: Option<Value>,
}

/// Declared kind of a content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Thinking,
    ToolUse,
    ToolResult,
}

impl BlockKind {
    /// Parses a wire tag. A missing tag means text; unknown tags yield `None`.
    pub fn from_tag(tag: Option<&str>) -> Option<Self> {
        match tag.unwrap_or("text") {
            "text" => Some(Self::Text),
            "thinking" => Some(Self::Thinking),
            "tool_use" => Some(Self::ToolUse),
            "tool_result" => Some(Self::ToolResult),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Thinking => "thinking",
            Self::ToolUse => "tool_use",
            Self::ToolResult => "tool_result",
        }
    }
}

/// Incremental update targeting one content block.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta {
        #[serde(default)]
        text: String,
    },
    CitationStartDelta {
        citation: CitationStart,
    },
    CitationEndDelta {
        citation_uuid: String,
    },
    FlagDelta {
        #[serde(default)]
        flag: Option<String>,
    },
    ThinkingDelta {
        #[serde(default)]
        thinking: String,
    },
    ThinkingSummaryDelta {
        #[serde(default)]
        summary: Option<SummaryFragment>,
    },
    ThinkingCutOffDelta {
        #[serde(default)]
        cut_off: Option<bool>,
    },
    InputJsonDelta {
        #[serde(default)]
        partial_json: String,
    },
    #[serde(other)]
    Unknown,
}

/// Source reference opened by `citation_start_delta`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CitationStart {
    pub uuid: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
}

/// One entry of a thinking block's summary list.
///
/// The server sends either a bare string or a `{ "summary": ... }` record; the
/// original shape is kept so it serializes back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SummaryFragment {
    Text(String),
    Labeled { summary: String },
}

impl SummaryFragment {
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Labeled { summary } => summary,
        }
    }
}
