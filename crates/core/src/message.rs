//! Message and Conversation domain types.
//!
//! These are the canonical, provider-neutral values that flow through a turn:
//! the user prompt goes in, the adapter returns an assistant message, the
//! router produces one tool message per round of tool calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Literal marker that separates results inside a combined tool message.
pub const RESULT_MARKER: &str = "\n\nTool ";

/// Separator between per-call signatures of one turn.
pub const SIGNATURE_SEPARATOR: &str = "|";

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
///
/// There is no system role: instruction preambles belong to adapter
/// configuration and are injected per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Assistant,
    /// Results of the previous assistant message's tool calls
    Tool,
}

/// A tool invocation requested by the model.
///
/// Parameters are opaque here; validating them is the tool's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON object
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// Build a call from any JSON value. Non-object values are kept under `"value"`.
    pub fn from_value(name: impl Into<String>, value: Value) -> Self {
        let parameters = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };
        Self::new(name, parameters)
    }

    /// `name(<canonical json>)`, used for loop detection only.
    pub fn signature(&self) -> String {
        let params = canonicalize(&Value::Object(self.parameters.clone()));
        format!("{}({})", self.name, params)
    }
}

/// Signature of a whole round of tool calls.
pub fn turn_signature(calls: &[ToolCall]) -> String {
    calls
        .iter()
        .map(ToolCall::signature)
        .collect::<Vec<_>>()
        .join(SIGNATURE_SEPARATOR)
}

/// Key-sorted copy of a JSON value, so equal parameters always print the same.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Join per-call results into one tool message body.
///
/// The first result is unlabeled; result `i` (1-based, i ≥ 2) is prefixed
/// with `Tool i result: `. Results are separated by a blank line.
pub fn combine_results(results: &[String]) -> String {
    let mut combined = String::new();
    for (i, result) in results.iter().enumerate() {
        if i == 0 {
            combined.push_str(result);
        } else {
            combined.push_str(&format!("{RESULT_MARKER}{} result: {result}", i + 1));
        }
    }
    combined
}

/// Recover per-call results from a combined tool message body.
///
/// This splits on [`RESULT_MARKER`] and strips the `N result: ` labels. A
/// result whose own text contains the marker is split as well, which
/// misattributes everything after it. Messages built with
/// [`Message::tool_results`] carry the structured list and never come here.
pub fn split_combined_results(content: &str) -> Vec<String> {
    content
        .split(RESULT_MARKER)
        .enumerate()
        .map(|(i, piece)| {
            if i == 0 {
                piece.to_string()
            } else {
                strip_result_label(piece).to_string()
            }
        })
        .collect()
}

fn strip_result_label(piece: &str) -> &str {
    let digits = piece.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return piece;
    }
    piece[digits..].strip_prefix(" result: ").unwrap_or(piece)
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content. For tool messages, the combined result text.
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Per-call results of a tool message, in call order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create an assistant message carrying tool calls.
    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::assistant(content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create the tool message for one round of calls.
    pub fn tool_results(results: Vec<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, combine_results(&results));
        msg.tool_results = results;
        msg
    }

    /// Create a tool message from an already-combined body.
    pub fn tool_output(content: impl Into<String>) -> Self {
        Self::with_role(Role::Tool, content.into())
    }

    /// Exactly `expected` per-call results for this tool message.
    ///
    /// Missing results become `(no result)`; surplus pieces (from the text
    /// split) are folded into the last slot so nothing is dropped.
    pub fn result_parts(&self, expected: usize) -> Vec<String> {
        let mut parts = if self.tool_results.is_empty() {
            split_combined_results(&self.content)
        } else {
            self.tool_results.clone()
        };

        if expected == 0 {
            return parts;
        }
        if parts.len() > expected {
            let overflow = parts.split_off(expected);
            if let Some(last) = parts.last_mut() {
                for piece in overflow {
                    last.push_str("\n\n");
                    last.push_str(&piece);
                }
            }
        }
        while parts.len() < expected {
            parts.push("(no result)".into());
        }
        parts
    }
}

/// A conversation is an ordered, append-only sequence of messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered messages
    pub messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, params: Value) -> ToolCall {
        ToolCall::from_value(name, params)
    }

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, agent!");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn conversation_tracks_updates() {
        let mut conv = Conversation::new();
        let created = conv.created_at;

        conv.push(Message::user("First message"));
        assert_eq!(conv.len(), 1);
        assert!(conv.updated_at >= created);
    }

    #[test]
    fn signature_ignores_key_order() {
        let a = call("edit", json!({"path": "a.rs", "line": 3, "opts": {"z": 1, "a": 2}}));
        let b = call("edit", json!({"opts": {"a": 2, "z": 1}, "line": 3, "path": "a.rs"}));
        assert_eq!(a.signature(), b.signature());
        assert_eq!(
            a.signature(),
            r#"edit({"line":3,"opts":{"a":2,"z":1},"path":"a.rs"})"#
        );
    }

    #[test]
    fn turn_signature_joins_calls() {
        let calls = vec![
            call("read_directory", json!({"dir": "."})),
            call("read_file", json!({"path": "main.rs"})),
        ];
        assert_eq!(
            turn_signature(&calls),
            r#"read_directory({"dir":"."})|read_file({"path":"main.rs"})"#
        );
    }

    #[test]
    fn non_object_parameters_are_wrapped() {
        let c = call("echo", json!("hi"));
        assert_eq!(c.parameters["value"], "hi");
        assert!(call("noop", Value::Null).parameters.is_empty());
    }

    #[test]
    fn combine_labels_all_but_first() {
        let combined = combine_results(&["one".into(), "two".into(), "three".into()]);
        assert_eq!(
            combined,
            "one\n\nTool 2 result: two\n\nTool 3 result: three"
        );
        assert_eq!(combine_results(&["solo".into()]), "solo");
    }

    #[test]
    fn split_reverses_combine_for_plain_output() {
        let results = vec!["a.txt\nb.txt".to_string(), "fn main() {}".to_string()];
        let msg = Message::tool_output(combine_results(&results));
        assert_eq!(msg.result_parts(2), results);
    }

    #[test]
    fn structured_results_survive_marker_in_output() {
        let tricky = "log line\n\nTool 2 result: not really".to_string();
        let msg = Message::tool_results(vec![tricky.clone(), "second".into()]);
        assert_eq!(msg.result_parts(2), vec![tricky, "second".to_string()]);
    }

    #[test]
    fn text_split_misattributes_marker_in_output() {
        // Known fragility of the string protocol: a result containing the
        // marker shifts every later result by one slot.
        let tricky = "log line\n\nTool 2 result: not really";
        let msg = Message::tool_output(combine_results(&[tricky.into(), "second".into()]));
        let parts = msg.result_parts(2);
        assert_eq!(parts[0], "log line");
        assert_eq!(parts[1], "not really\n\nsecond");
    }

    #[test]
    fn result_parts_pads_missing() {
        let msg = Message::tool_output("only one");
        assert_eq!(
            msg.result_parts(3),
            vec!["only one".to_string(), "(no result)".into(), "(no result)".into()]
        );
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::assistant_with_calls(
            "Let me look",
            vec![call("read_directory", json!({"dir": "."}))],
        );
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, Role::Assistant);
        assert_eq!(back.tool_calls, msg.tool_calls);
        assert!(back.tool_results.is_empty());
    }
}
