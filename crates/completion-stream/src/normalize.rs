//! Tool-result normalization.
//!
//! Tool results arrive in many loosely-typed shapes. [`normalize`] maps them to
//! the closed [`ToolResultShape`] set by running an ordered list of predicates:
//! explicit `type` tags first, then structural probing, then bare arrays and
//! strings. Normalizing the serialized form of a shape yields the same shape.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Canonical renderable tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResultShape {
    /// A single link record (`url`, `title`, optional icon).
    RichLink { link: Value },
    /// A list of linked items, used for cross-conversation references.
    RichContent { content: Value },
    /// Arbitrary structured output.
    JsonBlock(JsonBlock),
    /// Plain text.
    Text { text: String },
    /// Search-result-like records kept as an ordered list.
    List(Vec<Value>),
}

/// Structured tool output.
///
/// Two well-known layouts are recognised: file previews (`code`, `filename`)
/// and command execution (`stdout`, `stderr`, `returncode`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonBlock {
    pub fields: Map<String, Value>,
}

impl JsonBlock {
    /// Wraps an object's fields. A `type` key is dropped since the shape
    /// carries its own tag, and a nested `json_block` payload is unwrapped
    /// into the outer fields so the block never holds that key.
    fn from_object(mut fields: Map<String, Value>) -> Self {
        fields.remove("type");
        if let Some(nested) = fields.remove("json_block")
            && present(Some(&nested)).is_some()
        {
            for (key, value) in json_block_from_payload(&nested).fields {
                fields.entry(key).or_insert(value);
            }
        }
        Self { fields }
    }

    fn code_only(raw: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("code".into(), Value::String(raw.into()));
        Self { fields }
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn code(&self) -> Option<&str> {
        self.str_field("code")
    }

    pub fn filename(&self) -> Option<&str> {
        self.str_field("filename")
    }

    pub fn stdout(&self) -> Option<&str> {
        self.str_field("stdout")
    }

    pub fn stderr(&self) -> Option<&str> {
        self.str_field("stderr")
    }

    pub fn returncode(&self) -> Option<i64> {
        self.fields.get("returncode").and_then(Value::as_i64)
    }

    /// True when the block looks like the output of a shell command.
    pub fn is_command_output(&self) -> bool {
        ["stdout", "stderr", "returncode"]
            .iter()
            .any(|key| self.fields.contains_key(*key))
    }

    /// True when the block looks like a file preview.
    pub fn is_file_preview(&self) -> bool {
        self.fields.contains_key("code") && !self.is_command_output()
    }

    /// Command output that should render as failed: a non-zero exit code.
    pub fn command_failed(&self) -> bool {
        self.returncode().is_some_and(|code| code != 0)
    }
}

impl ToolResultShape {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Wire tag of the shape; lists have none and report `"list"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RichLink { .. } => "rich_link",
            Self::RichContent { .. } => "rich_content",
            Self::JsonBlock(_) => "json_block",
            Self::Text { .. } => "text",
            Self::List(_) => "list",
        }
    }

    /// JSON form consumed by the renderer.
    pub fn to_value(&self) -> Value {
        match self {
            Self::RichLink { link } => tagged("rich_link", [("link", link.clone())]),
            Self::RichContent { content } => {
                tagged("rich_content", [("content", content.clone())])
            }
            Self::JsonBlock(block) => {
                let mut map = block.fields.clone();
                map.insert("type".into(), Value::String("json_block".into()));
                Value::Object(map)
            }
            Self::Text { text } => tagged("text", [("text", Value::String(text.clone()))]),
            Self::List(items) => Value::Array(items.clone()),
        }
    }
}

impl Serialize for ToolResultShape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn tagged<const N: usize>(kind: &str, fields: [(&str, Value); N]) -> Value {
    let mut map = Map::with_capacity(N + 1);
    map.insert("type".into(), Value::String(kind.into()));
    for (key, value) in fields {
        map.insert(key.into(), value);
    }
    Value::Object(map)
}

/// Loose truthiness used by the shape matchers: null, `false`, `0` and `""` are
/// absent; everything else (including empty arrays and objects) is present.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn json_block_from_payload(payload: &Value) -> JsonBlock {
    match payload {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(fields)) => JsonBlock::from_object(fields),
            _ => JsonBlock::code_only(raw.clone()),
        },
        Value::Object(fields) => JsonBlock::from_object(fields.clone()),
        other => JsonBlock::code_only(other.to_string()),
    }
}

type ShapeMatcher = fn(&Map<String, Value>) -> Option<ToolResultShape>;

fn by_tag(obj: &Map<String, Value>) -> Option<ToolResultShape> {
    match obj.get("type").and_then(Value::as_str)? {
        "rich_link" => present(obj.get("link")).map(|link| ToolResultShape::RichLink {
            link: link.clone(),
        }),
        "rich_content" => {
            present(obj.get("content")).map(|content| ToolResultShape::RichContent {
                content: content.clone(),
            })
        }
        "json_block" => Some(ToolResultShape::JsonBlock(
            match present(obj.get("json_block")) {
                Some(payload) => json_block_from_payload(payload),
                None => JsonBlock::from_object(obj.clone()),
            },
        )),
        "text" => Some(ToolResultShape::text(text_of(obj.get("text")))),
        _ => None,
    }
}

fn by_json_block_field(obj: &Map<String, Value>) -> Option<ToolResultShape> {
    present(obj.get("json_block"))
        .map(|payload| ToolResultShape::JsonBlock(json_block_from_payload(payload)))
}

fn by_rich_content_field(obj: &Map<String, Value>) -> Option<ToolResultShape> {
    present(obj.get("rich_content")).map(|content| ToolResultShape::RichContent {
        content: content.clone(),
    })
}

fn by_link_field(obj: &Map<String, Value>) -> Option<ToolResultShape> {
    present(obj.get("link")).map(|link| ToolResultShape::RichLink { link: link.clone() })
}

fn by_text_field(obj: &Map<String, Value>) -> Option<ToolResultShape> {
    present(obj.get("text")).map(|text| ToolResultShape::text(text_of(Some(text))))
}

const SHAPE_MATCHERS: [ShapeMatcher; 5] = [
    by_tag,
    by_json_block_field,
    by_rich_content_field,
    by_link_field,
    by_text_field,
];

/// Maps a loosely-typed payload to a renderable shape.
///
/// `None` means "no renderable result", which is not a failure.
pub fn normalize(payload: &Value) -> Option<ToolResultShape> {
    match payload {
        Value::Object(obj) => SHAPE_MATCHERS.iter().find_map(|matcher| matcher(obj)),
        Value::Array(items) => Some(ToolResultShape::List(items.clone())),
        Value::String(text) if !text.is_empty() => Some(ToolResultShape::text(text.clone())),
        _ => None,
    }
}

/// Interprets the accumulated fragment buffer of a tool-result block.
///
/// Returns `None` while the buffer is not yet valid JSON.
pub fn normalize_fragment(raw: &str) -> Option<ToolResultShape> {
    let parsed: Value = serde_json::from_str(raw).ok()?;
    let shape = match &parsed {
        Value::Array(items) => ToolResultShape::List(items.clone()),
        Value::Object(fields) => normalize(&parsed)
            .unwrap_or_else(|| ToolResultShape::JsonBlock(JsonBlock::from_object(fields.clone()))),
        _ => normalize(&parsed).unwrap_or_else(|| ToolResultShape::text(raw)),
    };
    Some(shape)
}
