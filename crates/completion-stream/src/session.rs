use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::block::{
    BlockArena, BlockBody, Citation, ContentBlock, TextBlock, ThinkingBlock, ToolResultBlock,
    ToolUseBlock,
};
use crate::config::DecoderConfig;
use crate::event::{BlockDelta, BlockKind, BlockStart, StreamEvent};
use crate::frame::decode_line_with_prefix;
use crate::normalize::{normalize, normalize_fragment, ToolResultShape};
use crate::sink::{Completion, NotificationSink};
use crate::step::{project_steps, Step};

/// Whether a session still accepts events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Streaming,
    Complete,
}

/// Decoder state for one in-flight response.
///
/// A session is driven by a single reader; it holds no locks and shares
/// nothing with other sessions. Events must be applied in arrival order since
/// citation offsets are taken from the text accumulated so far.
#[derive(Debug)]
pub struct StreamSession {
    session_id: uuid::Uuid,
    config: DecoderConfig,
    full_text: String,
    last_message_id: Option<String>,
    blocks: BlockArena,
    pending_citations: HashMap<String, Citation>,
    status: SessionStatus,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4(),
            config,
            full_text: String::new(),
            last_message_id: None,
            blocks: BlockArena::new(),
            pending_citations: HashMap::new(),
            status: SessionStatus::Streaming,
        }
    }

    /// Log correlation id; never sent anywhere.
    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    /// Plain text of every text block, in delta-arrival order.
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn last_message_id(&self) -> Option<&str> {
        self.last_message_id.as_deref()
    }

    pub fn blocks(&self) -> &BlockArena {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&ContentBlock> {
        self.blocks.get(&index)
    }

    /// Citations opened but not yet closed.
    pub fn pending_citations(&self) -> impl Iterator<Item = &Citation> {
        self.pending_citations.values()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Complete
    }

    /// Projects the blocks seen so far, e.g. to render a partial transcript.
    pub fn steps(&self) -> Vec<Step> {
        project_steps(&self.blocks)
    }

    /// Decodes and applies one line. Lines without the frame prefix and
    /// malformed payloads are ignored.
    pub fn feed_line<S>(&mut self, line: &str, sink: &mut S) -> Option<Completion>
    where
        S: NotificationSink + ?Sized,
    {
        let event = decode_line_with_prefix(line, &self.config.frame_prefix)?;
        self.apply(event, sink)
    }

    /// Splits a text chunk of complete lines and applies each of them.
    pub fn feed_chunk<S>(&mut self, chunk: &str, sink: &mut S) -> Option<Completion>
    where
        S: NotificationSink + ?Sized,
    {
        let mut completion = None;
        for line in chunk.split('\n') {
            if let Some(done) = self.feed_line(line, sink) {
                completion = Some(done);
            }
        }
        completion
    }

    /// Applies one decoded event.
    ///
    /// Returns the completion when this event ended the session.
    pub fn apply<S>(&mut self, event: StreamEvent, sink: &mut S) -> Option<Completion>
    where
        S: NotificationSink + ?Sized,
    {
        if self.is_complete() {
            debug!(
                session_id = %self.session_id,
                event = event.kind(),
                "event after completion ignored"
            );
            return None;
        }

        match event {
            StreamEvent::MessageStart { message } => {
                if let Some(uuid) = message.uuid.filter(|id| !id.is_empty()) {
                    if self.last_message_id.is_none() {
                        self.last_message_id = Some(uuid.clone());
                    }
                    sink.message_start(&uuid);
                }
            }
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => self.start_block(index, content_block, sink),
            StreamEvent::ContentBlockDelta { index, delta } => {
                self.apply_delta(index, delta, sink)
            }
            StreamEvent::ContentBlockStop {
                index,
                stop_timestamp,
                buffered_input,
            } => self.stop_block(index, stop_timestamp, buffered_input, sink),
            StreamEvent::ToolUseBlockUpdateDelta { index, message } => {
                let Some(message) = message.filter(|m| !m.is_empty()) else {
                    return None;
                };
                if let Some(BlockBody::ToolUse(tool)) =
                    self.blocks.get_mut(&index).map(|b| &mut b.body)
                {
                    tool.message = Some(message);
                    sink.tool_start(&tool.name, tool.message.as_deref(), index);
                } else {
                    debug!(
                        session_id = %self.session_id,
                        index,
                        "status update for missing tool block"
                    );
                }
            }
            StreamEvent::ThinkingSummaryDelta { index, summary } => {
                if let (Some(summary), Some(BlockBody::Thinking(thinking))) =
                    (summary, self.blocks.get_mut(&index).map(|b| &mut b.body))
                {
                    thinking.push_summary(summary);
                }
            }
            StreamEvent::ToolApproval {
                tool_name,
                approval_key,
                input,
            } => sink.tool_approval(&tool_name, &approval_key, &input),
            StreamEvent::CompactionStatus { status, message } => {
                sink.compaction_status(&status, message.as_deref())
            }
            StreamEvent::MessageDelta { delta } => {
                if let Some(stop_reason) = delta.stop_reason {
                    return Some(self.complete(&stop_reason, sink));
                }
            }
            StreamEvent::Unknown => {
                debug!(session_id = %self.session_id, "unknown event ignored");
            }
        }
        None
    }

    fn start_block<S>(&mut self, index: usize, start: BlockStart, sink: &mut S)
    where
        S: NotificationSink + ?Sized,
    {
        let Some(kind) = BlockKind::from_tag(start.kind.as_deref()) else {
            debug!(
                session_id = %self.session_id,
                index,
                kind = ?start.kind,
                "unsupported block kind ignored"
            );
            return;
        };

        let body = match kind {
            BlockKind::Text => BlockBody::Text(TextBlock::default()),
            BlockKind::Thinking => {
                sink.thinking_start(index);
                BlockBody::Thinking(ThinkingBlock {
                    start_timestamp: now_timestamp(),
                    ..ThinkingBlock::default()
                })
            }
            BlockKind::ToolUse => {
                let tool = ToolUseBlock {
                    name: start
                        .name
                        .filter(|n| !n.is_empty())
                        .unwrap_or_else(|| "unknown".to_string()),
                    message: start.message.filter(|m| !m.is_empty()),
                    approval_key: start.approval_key,
                    ..ToolUseBlock::default()
                };
                sink.tool_start(&tool.name, tool.message.as_deref(), index);
                BlockBody::ToolUse(tool)
            }
            BlockKind::ToolResult => {
                let result = ToolResultBlock {
                    name: start.name.unwrap_or_default(),
                    tool_use_id: start.tool_use_id,
                    is_error: start.is_error.unwrap_or(false),
                    result: start.display_content.as_ref().and_then(normalize),
                    partial_json: String::new(),
                    raw_fallback: false,
                };
                if let Some(shape) = &result.result {
                    sink.tool_result(&result.name, shape, result.is_error, index);
                }
                BlockBody::ToolResult(result)
            }
        };

        if self
            .blocks
            .insert(index, ContentBlock::open(index, body))
            .is_some()
        {
            warn!(
                session_id = %self.session_id,
                index,
                "content block restarted at existing index"
            );
        }
    }

    fn stop_block<S>(
        &mut self,
        index: usize,
        stop_timestamp: Option<String>,
        buffered_input: Option<String>,
        sink: &mut S,
    ) where
        S: NotificationSink + ?Sized,
    {
        let Some(block) = self.blocks.get_mut(&index) else {
            debug!(session_id = %self.session_id, index, "stop for missing block ignored");
            return;
        };
        block.close();
        match &mut block.body {
            BlockBody::Thinking(thinking) => {
                thinking.stop_timestamp = Some(
                    stop_timestamp
                        .filter(|s| !s.is_empty())
                        .unwrap_or_else(now_timestamp),
                );
                sink.thinking_stop(&thinking.thinking, &thinking.summaries, index);
            }
            BlockBody::ToolUse(tool) => {
                let input = buffered_input
                    .filter(|s| !s.is_empty())
                    .or_else(|| (!tool.partial_json.is_empty()).then(|| tool.partial_json.clone()))
                    .unwrap_or_else(|| "{}".to_string());
                sink.tool_stop(&tool.name, &input, index);
                tool.buffered_input = Some(input);
            }
            BlockBody::Text(_) | BlockBody::ToolResult(_) => {}
        }
    }

    fn apply_delta<S>(&mut self, index: usize, delta: BlockDelta, sink: &mut S)
    where
        S: NotificationSink + ?Sized,
    {
        let Some(block) = self.blocks.get_mut(&index) else {
            debug!(session_id = %self.session_id, index, "delta for missing block ignored");
            return;
        };
        if !block.is_open() {
            debug!(session_id = %self.session_id, index, "delta for closed block ignored");
            return;
        }

        match (&mut block.body, delta) {
            (BlockBody::Text(text), delta) => apply_text_delta(
                text,
                index,
                delta,
                &mut self.full_text,
                &mut self.pending_citations,
                sink,
            ),
            (BlockBody::Thinking(thinking), delta) => {
                apply_thinking_delta(thinking, index, delta, sink)
            }
            (BlockBody::ToolUse(tool), BlockDelta::InputJsonDelta { partial_json }) => {
                tool.partial_json.push_str(&partial_json);
            }
            (BlockBody::ToolResult(result), BlockDelta::InputJsonDelta { partial_json }) => {
                if partial_json.is_empty() {
                    return;
                }
                result.partial_json.push_str(&partial_json);
                match normalize_fragment(&result.partial_json) {
                    Some(shape) => {
                        sink.tool_result(&result.name, &shape, result.is_error, index);
                        result.result = Some(shape);
                        result.raw_fallback = false;
                    }
                    None if result.result.is_none() || result.raw_fallback => {
                        result.result = Some(ToolResultShape::text(result.partial_json.clone()));
                        result.raw_fallback = true;
                    }
                    None => {}
                }
            }
            (body, delta) => {
                debug!(
                    session_id = %self.session_id,
                    index,
                    block = body.kind().as_str(),
                    delta = ?delta,
                    "delta does not apply to block kind"
                );
            }
        }
    }

    fn complete<S>(&mut self, stop_reason: &str, sink: &mut S) -> Completion
    where
        S: NotificationSink + ?Sized,
    {
        let dangling = self.pending_citations.len();
        if dangling > 0 {
            debug!(session_id = %self.session_id, dangling, "discarding unclosed citations");
        }
        self.pending_citations.clear();
        self.status = SessionStatus::Complete;

        let completion = Completion {
            full_text: self.full_text.clone(),
            steps: project_steps(&self.blocks),
            message_id: self.last_message_id.clone(),
        };
        debug!(
            session_id = %self.session_id,
            stop_reason,
            steps = completion.steps.len(),
            "stream session complete"
        );
        sink.complete(&completion);
        completion
    }
}

fn apply_text_delta<S>(
    block: &mut TextBlock,
    index: usize,
    delta: BlockDelta,
    full_text: &mut String,
    pending_citations: &mut HashMap<String, Citation>,
    sink: &mut S,
) where
    S: NotificationSink + ?Sized,
{
    match delta {
        BlockDelta::TextDelta { text } => {
            if text.is_empty() {
                return;
            }
            block.text.push_str(&text);
            full_text.push_str(&text);
            sink.text_delta(&text, full_text, index);
        }
        BlockDelta::CitationStartDelta { citation } => {
            pending_citations.insert(
                citation.uuid.clone(),
                Citation {
                    uuid: citation.uuid,
                    start_index: block.text.len(),
                    end_index: None,
                    url: citation.url,
                    title: citation.title,
                    source_type: citation.source_type,
                },
            );
        }
        BlockDelta::CitationEndDelta { citation_uuid } => {
            let Some(mut citation) = pending_citations.remove(&citation_uuid) else {
                debug!(index, citation = %citation_uuid, "citation end without start ignored");
                return;
            };
            // Offsets are taken against this block; clamp if the start was
            // recorded against a longer block.
            let end = block.text.len();
            citation.start_index = citation.start_index.min(end);
            citation.end_index = Some(end);
            sink.citation(&citation, index);
            block.citations.push(citation);
        }
        BlockDelta::FlagDelta { flag } => {
            if let Some(flag) = flag.filter(|f| !f.is_empty()) {
                block.add_flag(flag);
            }
        }
        other => {
            debug!(index, delta = ?other, "delta does not apply to text block");
        }
    }
}

fn apply_thinking_delta<S>(block: &mut ThinkingBlock, index: usize, delta: BlockDelta, sink: &mut S)
where
    S: NotificationSink + ?Sized,
{
    match delta {
        BlockDelta::ThinkingDelta { thinking } => {
            if thinking.is_empty() {
                return;
            }
            block.thinking.push_str(&thinking);
            sink.thinking_delta(&block.thinking, index);
        }
        BlockDelta::ThinkingSummaryDelta {
            summary: Some(summary),
        } => block.push_summary(summary),
        BlockDelta::ThinkingCutOffDelta { cut_off } => {
            block.cut_off = cut_off.unwrap_or(true);
        }
        other => {
            debug!(index, delta = ?other, "delta does not apply to thinking block");
        }
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
