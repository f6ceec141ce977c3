use serde::Serialize;

use crate::block::{BlockArena, BlockBody, Citation};
use crate::event::SummaryFragment;
use crate::normalize::ToolResultShape;

/// A render-ready unit of the final transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Text(TextStep),
    Thinking(ThinkingStep),
    Tool(ToolStep),
}

impl Step {
    /// Stream index of the block the step came from, when known.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Text(step) => step.index,
            Self::Thinking(step) => step.index,
            Self::Tool(step) => step.index,
        }
    }

    pub fn as_tool(&self) -> Option<&ToolStep> {
        match self {
            Self::Tool(step) => Some(step),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStep {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub text: String,
    pub citations: Vec<Citation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
}

/// Timing and cut-off fields keep their wire names; the rest are camelCase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingStep {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub thinking_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_summary: Option<String>,
    pub summaries: Vec<SummaryFragment>,
    #[serde(rename = "cut_off")]
    pub cut_off: bool,
    #[serde(rename = "start_timestamp", skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<String>,
    #[serde(rename = "stop_timestamp", skip_serializing_if = "Option::is_none")]
    pub stop_timestamp: Option<String>,
}

/// A tool invocation, merged with its result once one was correlated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStep {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResultShape>,
    pub is_error: bool,
    /// False while no tool result has been matched; render as still running.
    pub resolved: bool,
}

impl ToolStep {
    pub(crate) fn pending(
        index: Option<usize>,
        tool_name: String,
        tool_message: Option<String>,
        tool_input: Option<String>,
    ) -> Self {
        Self {
            index,
            tool_name,
            tool_message,
            tool_input,
            tool_result: None,
            is_error: false,
            resolved: false,
        }
    }

    pub(crate) fn resolve(&mut self, result: Option<ToolResultShape>, is_error: bool) {
        self.tool_result = result;
        self.is_error = is_error;
        self.resolved = true;
    }
}

/// Positions of unresolved tool steps inside a step list being built.
///
/// Results correlate to the most recent unresolved tool step with the same
/// name. Two concurrent calls of one tool within a response can therefore pair
/// up crosswise; the stream carries no shared call id to do better.
#[derive(Debug, Default)]
pub(crate) struct PendingTools {
    positions: Vec<usize>,
}

impl PendingTools {
    pub(crate) fn push(&mut self, steps: &mut Vec<Step>, step: ToolStep) {
        self.positions.push(steps.len());
        steps.push(Step::Tool(step));
    }

    /// Removes and returns the most recent unresolved tool step named `name`.
    pub(crate) fn take_matching<'a>(
        &mut self,
        steps: &'a mut [Step],
        name: &str,
    ) -> Option<&'a mut ToolStep> {
        let slot = self.positions.iter().rposition(|&pos| {
            steps
                .get(pos)
                .and_then(Step::as_tool)
                .is_some_and(|tool| tool.tool_name == name)
        })?;
        let pos = self.positions.remove(slot);
        match steps.get_mut(pos) {
            Some(Step::Tool(tool)) => Some(tool),
            _ => None,
        }
    }
}

/// Flattens the block arena into an index-ascending step list.
pub fn project_steps(blocks: &BlockArena) -> Vec<Step> {
    let mut steps = Vec::with_capacity(blocks.len());
    let mut pending = PendingTools::default();

    for (&index, block) in blocks {
        match &block.body {
            BlockBody::Text(text) => {
                if text.text.is_empty() {
                    continue;
                }
                steps.push(Step::Text(TextStep {
                    index: Some(index),
                    text: text.text.clone(),
                    citations: text.citations.clone(),
                    flags: text.flags.clone(),
                }));
            }
            BlockBody::Thinking(thinking) => {
                if thinking.thinking.is_empty() && thinking.summaries.is_empty() {
                    continue;
                }
                let thinking_summary = thinking
                    .summaries
                    .first()
                    .map(|s| s.text().to_string())
                    .filter(|s| !s.is_empty())
                    .or_else(|| thinking.latest_summary.clone());
                steps.push(Step::Thinking(ThinkingStep {
                    index: Some(index),
                    thinking_text: thinking.thinking.clone(),
                    thinking_summary,
                    summaries: thinking.summaries.clone(),
                    cut_off: thinking.cut_off,
                    start_timestamp: Some(thinking.start_timestamp.clone()),
                    stop_timestamp: thinking.stop_timestamp.clone(),
                }));
            }
            BlockBody::ToolUse(tool) => {
                let input = tool.raw_input();
                pending.push(
                    &mut steps,
                    ToolStep::pending(
                        Some(index),
                        tool.name.clone(),
                        tool.message.clone(),
                        (!input.is_empty()).then(|| input.to_string()),
                    ),
                );
            }
            BlockBody::ToolResult(result) => {
                if let Some(step) = pending.take_matching(&mut steps, &result.name) {
                    step.resolve(result.result.clone(), result.is_error);
                } else {
                    tracing::debug!(
                        index,
                        tool = %result.name,
                        "tool result without matching tool use"
                    );
                }
            }
        }
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{
        ContentBlock, TextBlock, ThinkingBlock, ToolResultBlock, ToolUseBlock,
    };

    fn arena(blocks: Vec<(usize, BlockBody)>) -> BlockArena {
        blocks
            .into_iter()
            .map(|(index, body)| (index, ContentBlock::open(index, body)))
            .collect()
    }

    fn text(value: &str) -> BlockBody {
        BlockBody::Text(TextBlock {
            text: value.into(),
            ..TextBlock::default()
        })
    }

    fn tool_use(name: &str, message: &str) -> BlockBody {
        BlockBody::ToolUse(ToolUseBlock {
            name: name.into(),
            message: Some(message.into()),
            ..ToolUseBlock::default()
        })
    }

    fn tool_result(name: &str, text: &str) -> BlockBody {
        BlockBody::ToolResult(ToolResultBlock {
            name: name.into(),
            result: Some(ToolResultShape::text(text)),
            ..ToolResultBlock::default()
        })
    }

    #[test]
    fn merges_tool_use_with_same_named_result() {
        let steps = project_steps(&arena(vec![
            (0, tool_use("web_search", "Searching the web")),
            (1, tool_result("web_search", "found")),
            (2, text("Done.")),
        ]));
        assert_eq!(steps.len(), 2);
        let tool = steps[0].as_tool().expect("tool step");
        assert!(tool.resolved);
        assert_eq!(tool.tool_message.as_deref(), Some("Searching the web"));
        assert_eq!(tool.tool_result, Some(ToolResultShape::text("found")));
        assert!(matches!(&steps[1], Step::Text(t) if t.text == "Done."));
    }

    #[test]
    fn unresolved_tool_use_stays_pending_in_place() {
        let steps = project_steps(&arena(vec![
            (0, text("Let me check.")),
            (1, tool_use("repl", "Running code")),
            (2, text("Still going.")),
        ]));
        assert_eq!(steps.len(), 3);
        let tool = steps[1].as_tool().expect("tool step");
        assert!(!tool.resolved);
        assert_eq!(tool.tool_result, None);
    }

    #[test]
    fn result_matches_most_recent_unresolved_use_of_that_name() {
        let steps = project_steps(&arena(vec![
            (0, tool_use("web_search", "first")),
            (1, tool_use("repl", "code")),
            (2, tool_use("web_search", "second")),
            (3, tool_result("web_search", "r1")),
            (4, tool_result("web_search", "r2")),
        ]));
        assert_eq!(steps.len(), 3);
        let first = steps[0].as_tool().expect("tool");
        let repl = steps[1].as_tool().expect("tool");
        let second = steps[2].as_tool().expect("tool");
        assert_eq!(second.tool_result, Some(ToolResultShape::text("r1")));
        assert_eq!(first.tool_result, Some(ToolResultShape::text("r2")));
        assert!(!repl.resolved);
    }

    #[test]
    fn orphan_result_and_empty_blocks_are_skipped() {
        let steps = project_steps(&arena(vec![
            (0, text("")),
            (1, BlockBody::Thinking(ThinkingBlock::default())),
            (2, tool_result("web_search", "orphan")),
        ]));
        assert!(steps.is_empty());
    }

    #[test]
    fn thinking_summary_prefers_first_fragment() {
        let mut thinking = ThinkingBlock {
            thinking: "step by step".into(),
            start_timestamp: "2026-01-01T00:00:00.000Z".into(),
            ..ThinkingBlock::default()
        };
        thinking.push_summary(SummaryFragment::Text("outline".into()));
        thinking.push_summary(SummaryFragment::Text("refine".into()));
        let steps = project_steps(&arena(vec![(0, BlockBody::Thinking(thinking))]));
        let Step::Thinking(step) = &steps[0] else {
            panic!("expected thinking step");
        };
        assert_eq!(step.thinking_summary.as_deref(), Some("outline"));
        assert_eq!(step.summaries.len(), 2);
    }

    #[test]
    fn steps_are_index_ascending() {
        let steps = project_steps(&arena(vec![
            (5, text("last")),
            (1, text("first")),
            (3, tool_use("repl", "run")),
        ]));
        let indices: Vec<_> = steps.iter().filter_map(Step::index).collect();
        assert_eq!(indices, vec![1, 3, 5]);
    }

    #[test]
    fn text_step_serializes_with_type_tag() {
        let steps = project_steps(&arena(vec![(0, text("Hello world"))]));
        let value = serde_json::to_value(&steps).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!([{
                "type": "text",
                "index": 0,
                "text": "Hello world",
                "citations": []
            }])
        );
    }

    #[test]
    fn tool_and_thinking_steps_serialize_for_the_renderer() {
        let thinking = ThinkingBlock {
            thinking: "hmm".into(),
            cut_off: true,
            start_timestamp: "2026-01-01T00:00:00.000Z".into(),
            ..ThinkingBlock::default()
        };
        let steps = project_steps(&arena(vec![
            (0, BlockBody::Thinking(thinking)),
            (1, tool_use("web_search", "Searching the web")),
            (2, tool_result("web_search", "found")),
        ]));
        let value = serde_json::to_value(&steps).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!([
                {
                    "type": "thinking",
                    "index": 0,
                    "thinkingText": "hmm",
                    "summaries": [],
                    "cut_off": true,
                    "start_timestamp": "2026-01-01T00:00:00.000Z"
                },
                {
                    "type": "tool",
                    "index": 1,
                    "toolName": "web_search",
                    "toolMessage": "Searching the web",
                    "toolResult": {"type": "text", "text": "found"},
                    "isError": false,
                    "resolved": true
                }
            ])
        );
    }
}
