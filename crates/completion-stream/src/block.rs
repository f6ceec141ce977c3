//! Per-index content block records.
//!
//! Each block carries an explicit [`BlockState`] and a kind-specific body.
//! Blocks live in an arena keyed by their stream index, owned by one
//! [`crate::session::StreamSession`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::{BlockKind, SummaryFragment};
use crate::normalize::ToolResultShape;

/// Lifecycle of a content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockState {
    /// Started and still accepting deltas.
    Open,
    /// `content_block_stop` seen; further deltas are ignored.
    Closed,
}

/// A source-annotated span of a text block.
///
/// Offsets are byte offsets into the owning block's text. They always fall on
/// fragment boundaries, which are valid `char` boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
}

impl Citation {
    /// The cited slice of `text`, once the citation is closed and in range.
    pub fn span<'a>(&self, text: &'a str) -> Option<&'a str> {
        let end = self.end_index?;
        text.get(self.start_index..end)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub citations: Vec<Citation>,
    pub flags: Vec<String>,
}

impl TextBlock {
    /// Adds a transient flag unless it is already set.
    pub fn add_flag(&mut self, flag: String) -> bool {
        if self.flags.contains(&flag) {
            return false;
        }
        self.flags.push(flag);
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThinkingBlock {
    pub thinking: String,
    pub summaries: Vec<SummaryFragment>,
    pub latest_summary: Option<String>,
    pub cut_off: bool,
    pub start_timestamp: String,
    pub stop_timestamp: Option<String>,
}

impl ThinkingBlock {
    pub fn push_summary(&mut self, summary: SummaryFragment) {
        self.latest_summary = Some(summary.text().to_string());
        self.summaries.push(summary);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolUseBlock {
    pub name: String,
    /// Concatenated argument fragments; not valid JSON until the block closes.
    pub partial_json: String,
    /// Final input captured at `content_block_stop`.
    pub buffered_input: Option<String>,
    pub message: Option<String>,
    pub approval_key: Option<String>,
}

impl ToolUseBlock {
    /// Raw input as best known: the snapshot if closed, else the partial buffer.
    pub fn raw_input(&self) -> &str {
        self.buffered_input.as_deref().unwrap_or(&self.partial_json)
    }

    /// Parsed input, when the raw text is valid JSON.
    pub fn input(&self) -> Option<serde_json::Value> {
        serde_json::from_str(self.raw_input()).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResultBlock {
    pub name: String,
    pub tool_use_id: Option<String>,
    pub is_error: bool,
    pub result: Option<ToolResultShape>,
    /// Concatenated result fragments, re-parsed after every append.
    pub partial_json: String,
    /// Set while `result` only wraps the unparseable fragment buffer.
    pub raw_fallback: bool,
}

/// Kind-specific payload of a block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockBody {
    Text(TextBlock),
    Thinking(ThinkingBlock),
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
}

impl BlockBody {
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Text(_) => BlockKind::Text,
            Self::Thinking(_) => BlockKind::Thinking,
            Self::ToolUse(_) => BlockKind::ToolUse,
            Self::ToolResult(_) => BlockKind::ToolResult,
        }
    }
}

/// One addressable unit of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    pub index: usize,
    pub state: BlockState,
    pub body: BlockBody,
}

impl ContentBlock {
    pub fn open(index: usize, body: BlockBody) -> Self {
        Self {
            index,
            state: BlockState::Open,
            body,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.body.kind()
    }

    pub fn is_open(&self) -> bool {
        self.state == BlockState::Open
    }

    pub fn close(&mut self) {
        self.state = BlockState::Closed;
    }

    pub fn as_text(&self) -> Option<&TextBlock> {
        match &self.body {
            BlockBody::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_thinking(&self) -> Option<&ThinkingBlock> {
        match &self.body {
            BlockBody::Thinking(thinking) => Some(thinking),
            _ => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUseBlock> {
        match &self.body {
            BlockBody::ToolUse(tool) => Some(tool),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResultBlock> {
        match &self.body {
            BlockBody::ToolResult(result) => Some(result),
            _ => None,
        }
    }
}

/// Blocks keyed by stream index; iteration is always index-ascending.
pub type BlockArena = BTreeMap<usize, ContentBlock>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_have_set_semantics() {
        let mut text = TextBlock::default();
        assert!(text.add_flag("streaming".into()));
        assert!(!text.add_flag("streaming".into()));
        assert!(text.add_flag("edited".into()));
        assert_eq!(text.flags, vec!["streaming", "edited"]);
    }

    #[test]
    fn citation_span_requires_closed_range() {
        let mut citation = Citation {
            uuid: "c1".into(),
            start_index: 4,
            ..Citation::default()
        };
        assert_eq!(citation.span("See this page."), None);
        citation.end_index = Some(8);
        assert_eq!(citation.span("See this page."), Some("this"));
        citation.end_index = Some(99);
        assert_eq!(citation.span("See this page."), None);
    }

    #[test]
    fn tool_use_input_prefers_snapshot() {
        let mut tool = ToolUseBlock {
            name: "web_search".into(),
            partial_json: "{\"query\":\"ru".into(),
            ..ToolUseBlock::default()
        };
        assert_eq!(tool.input(), None);
        tool.buffered_input = Some("{\"query\":\"rust\"}".into());
        assert_eq!(tool.input(), Some(serde_json::json!({"query": "rust"})));
    }

    #[test]
    fn latest_summary_tracks_last_fragment() {
        let mut thinking = ThinkingBlock::default();
        thinking.push_summary(SummaryFragment::Text("first".into()));
        thinking.push_summary(SummaryFragment::Labeled {
            summary: "second".into(),
        });
        assert_eq!(thinking.latest_summary.as_deref(), Some("second"));
        assert_eq!(thinking.summaries.len(), 2);
    }

    #[test]
    fn closing_a_block_changes_state_only() {
        let mut block = ContentBlock::open(3, BlockBody::Text(TextBlock::default()));
        assert!(block.is_open());
        block.close();
        assert_eq!(block.state, BlockState::Closed);
        assert_eq!(block.kind(), BlockKind::Text);
        assert_eq!(block.index, 3);
    }
}
