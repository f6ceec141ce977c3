//! Steps for transcripts loaded from history.
//!
//! A persisted message stores its final content blocks as a JSON array, so no
//! deltas are involved. Projection follows the live rules with two
//! differences: a tool step is emitted where its result appears, and only the
//! immediately pending tool call can be resolved.

use serde_json::Value;

use crate::block::Citation;
use crate::event::SummaryFragment;
use crate::normalize::{normalize, ToolResultShape};
use crate::step::{Step, TextStep, ThinkingStep, ToolStep};

/// Projects a persisted content array into render-ready steps.
///
/// Unknown block types are skipped. A tool call still pending when a new one
/// starts, or at the end of the array, is emitted unresolved.
pub fn steps_from_stored_content(content: &[Value]) -> Vec<Step> {
    let mut steps = Vec::new();
    let mut pending: Option<ToolStep> = None;

    for block in content {
        match block.get("type").and_then(Value::as_str) {
            Some("thinking") => steps.push(Step::Thinking(stored_thinking(block))),
            Some("tool_use") => {
                if let Some(previous) = pending.replace(stored_tool_use(block)) {
                    tracing::debug!(
                        tool = %previous.tool_name,
                        "stored tool use superseded before its result"
                    );
                    steps.push(Step::Tool(previous));
                }
            }
            Some("tool_result") => {
                let name = str_field(block, "name").unwrap_or_default();
                match pending.take() {
                    Some(mut tool) if tool.tool_name == name => {
                        let is_error = block
                            .get("is_error")
                            .and_then(Value::as_bool)
                            .unwrap_or(false);
                        tool.resolve(stored_result(block, name), is_error);
                        steps.push(Step::Tool(tool));
                    }
                    other => {
                        tracing::debug!(
                            tool = name,
                            "stored tool result without matching tool use"
                        );
                        pending = other;
                    }
                }
            }
            Some("text") => steps.push(Step::Text(TextStep {
                index: None,
                text: str_field(block, "text").unwrap_or_default().to_string(),
                citations: stored_citations(block),
                flags: Vec::new(),
            })),
            _ => {}
        }
    }

    if let Some(tool) = pending {
        steps.push(Step::Tool(tool));
    }
    steps
}

fn str_field<'a>(block: &'a Value, key: &str) -> Option<&'a str> {
    block.get(key).and_then(Value::as_str)
}

fn stored_thinking(block: &Value) -> ThinkingStep {
    let summaries: Vec<SummaryFragment> = block
        .get("summaries")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default();
    ThinkingStep {
        index: None,
        thinking_text: str_field(block, "thinking").unwrap_or_default().to_string(),
        thinking_summary: summaries.last().map(|s| s.text().to_string()),
        summaries,
        cut_off: block
            .get("cut_off")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        start_timestamp: str_field(block, "start_timestamp").map(str::to_string),
        stop_timestamp: str_field(block, "stop_timestamp").map(str::to_string),
    }
}

fn stored_tool_use(block: &Value) -> ToolStep {
    let message = str_field(block, "message")
        .filter(|m| !m.is_empty())
        .or_else(|| {
            block
                .get("display_content")
                .and_then(|d| d.get("text"))
                .and_then(Value::as_str)
        })
        .map(str::to_string);
    let input = block
        .get("input")
        .filter(|v| !v.is_null())
        .map(Value::to_string);
    ToolStep::pending(
        None,
        str_field(block, "name").unwrap_or_default().to_string(),
        message,
        input,
    )
}

fn stored_result(block: &Value, name: &str) -> Option<ToolResultShape> {
    if let Some(display) = block.get("display_content").filter(|v| !v.is_null()) {
        return normalize(display);
    }
    let items = block.get("content")?.as_array()?;
    if name == "web_search" {
        let knowledge = items
            .iter()
            .filter(|item| item.get("type").and_then(Value::as_str) == Some("knowledge"))
            .map(|item| {
                serde_json::json!({
                    "title": item.get("title").cloned().unwrap_or(Value::Null),
                    "url": item.get("url").cloned().unwrap_or(Value::Null),
                    "metadata": item.get("metadata").cloned().unwrap_or(Value::Null),
                })
            })
            .collect();
        return Some(ToolResultShape::List(knowledge));
    }
    items
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        .map(|item| ToolResultShape::text(str_field(item, "text").unwrap_or_default()))
}

fn stored_citations(block: &Value) -> Vec<Citation> {
    block
        .get("citations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn projects_a_full_stored_message() {
        let content = vec![
            json!({
                "type": "thinking",
                "thinking": "Need a search.",
                "summaries": [{"summary": "Planning"}, {"summary": "Deciding to search"}]
            }),
            json!({
                "type": "tool_use",
                "name": "web_search",
                "input": {"query": "rust streams"},
                "display_content": {"type": "text", "text": "Searching the web"}
            }),
            json!({
                "type": "tool_result",
                "name": "web_search",
                "content": [
                    {
                        "type": "knowledge",
                        "title": "Streams",
                        "url": "https://a",
                        "metadata": {"site": "a"},
                        "text": "long"
                    },
                    {"type": "text", "text": "ignored"}
                ]
            }),
            json!({
                "type": "text",
                "text": "Here you go.",
                "citations": [{"uuid": "c1", "start_index": 0, "end_index": 4, "url": "https://a"}]
            }),
        ];

        let steps = steps_from_stored_content(&content);
        assert_eq!(steps.len(), 3);

        let Step::Thinking(thinking) = &steps[0] else {
            panic!("expected thinking step");
        };
        assert_eq!(thinking.thinking_summary.as_deref(), Some("Deciding to search"));

        let tool = steps[1].as_tool().expect("tool step");
        assert!(tool.resolved);
        assert_eq!(tool.tool_message.as_deref(), Some("Searching the web"));
        assert_eq!(tool.tool_input.as_deref(), Some("{\"query\":\"rust streams\"}"));
        assert_eq!(
            tool.tool_result,
            Some(ToolResultShape::List(vec![json!({
                "title": "Streams",
                "url": "https://a",
                "metadata": {"site": "a"}
            })]))
        );

        let Step::Text(text) = &steps[2] else {
            panic!("expected text step");
        };
        assert_eq!(text.citations[0].span(&text.text), Some("Here"));
    }

    #[test]
    fn display_content_wins_over_raw_content() {
        let content = vec![
            json!({"type": "tool_use", "name": "repl", "message": "Running"}),
            json!({
                "type": "tool_result",
                "name": "repl",
                "is_error": true,
                "display_content": {
                    "type": "json_block",
                    "json_block": "{\"stderr\":\"boom\",\"returncode\":1}"
                },
                "content": [{"type": "text", "text": "raw"}]
            }),
        ];
        let steps = steps_from_stored_content(&content);
        let tool = steps[0].as_tool().expect("tool step");
        assert!(tool.is_error);
        let Some(ToolResultShape::JsonBlock(block)) = &tool.tool_result else {
            panic!("expected json block");
        };
        assert!(block.command_failed());
        assert_eq!(block.stderr(), Some("boom"));
    }

    #[test]
    fn non_search_results_use_first_text_item() {
        let content = vec![
            json!({"type": "tool_use", "name": "fetch"}),
            json!({"type": "tool_result", "name": "fetch", "content": [
                {"type": "image"},
                {"type": "text", "text": "page body"}
            ]}),
        ];
        let steps = steps_from_stored_content(&content);
        let tool = steps[0].as_tool().expect("tool step");
        assert_eq!(tool.tool_result, Some(ToolResultShape::text("page body")));
        assert_eq!(tool.tool_input, None);
    }

    #[test]
    fn mismatched_result_keeps_tool_pending() {
        let content = vec![
            json!({"type": "tool_use", "name": "web_search", "message": "Searching"}),
            json!({"type": "tool_result", "name": "repl", "content": []}),
            json!({"type": "server_tool_marker"}),
        ];
        let steps = steps_from_stored_content(&content);
        assert_eq!(steps.len(), 1);
        let tool = steps[0].as_tool().expect("tool step");
        assert_eq!(tool.tool_name, "web_search");
        assert!(!tool.resolved);
    }

    #[test]
    fn superseded_tool_use_is_emitted_unresolved() {
        let content = vec![
            json!({"type": "tool_use", "name": "web_search"}),
            json!({"type": "tool_use", "name": "repl"}),
            json!({
                "type": "tool_result",
                "name": "repl",
                "content": [{"type": "text", "text": "2"}]
            }),
        ];
        let steps = steps_from_stored_content(&content);
        let names: Vec<_> = steps
            .iter()
            .filter_map(Step::as_tool)
            .map(|t| (t.tool_name.as_str(), t.resolved))
            .collect();
        assert_eq!(names, vec![("web_search", false), ("repl", true)]);
    }
}
