//! Claude's `--output-format stream-json` event stream.
//!
//! Each stdout line is one JSON event. Markers are parsed from plain text, so
//! the stream is flattened to assistant text with [`StreamText`] before the
//! phase driver sees it. Lines that are not JSON are kept verbatim.

use serde::Deserialize;
use serde_json::Value;

/// Events from Claude CLI's stream-json output format
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "assistant")]
    Assistant {
        message: AssistantMessage,
        #[serde(default)]
        session_id: String,
    },

    #[serde(rename = "user")]
    User {},

    #[serde(rename = "result")]
    Result {
        #[serde(default)]
        subtype: String,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        is_error: bool,
    },

    #[serde(rename = "system")]
    System {
        #[serde(default)]
        subtype: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        input: Value,
        #[serde(default)]
        id: String,
    },

    #[serde(rename = "text")]
    Text { text: String },

    #[serde(other)]
    Other,
}

/// What a single stdout line turned into.
#[derive(Debug, PartialEq)]
pub enum StreamLine {
    /// Assistant text to show as a thinking snippet.
    Text(String),
    /// A tool invocation, already described for display.
    ToolUse { emoji: &'static str, description: String },
    /// Plain, non-JSON output.
    Raw(String),
    /// Bookkeeping events with nothing to show.
    Ignored,
}

/// Accumulates a stream-json transcript into plain text.
#[derive(Debug, Default)]
pub struct StreamText {
    text: String,
    final_result: Option<String>,
    is_error: bool,
}

impl StreamText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one stdout line in and report what it was, for live display.
    pub fn push_line(&mut self, line: &str) -> Vec<StreamLine> {
        if line.trim().is_empty() {
            return vec![StreamLine::Ignored];
        }

        match serde_json::from_str::<StreamEvent>(line) {
            Ok(StreamEvent::Assistant { message, .. }) => message
                .content
                .into_iter()
                .map(|block| match block {
                    ContentBlock::ToolUse { name, input, .. } => StreamLine::ToolUse {
                        emoji: tool_emoji(&name),
                        description: describe_tool_use(&name, &input),
                    },
                    ContentBlock::Text { text } => {
                        self.text.push_str(&text);
                        self.text.push('\n');
                        StreamLine::Text(text)
                    }
                    ContentBlock::Other => StreamLine::Ignored,
                })
                .collect(),
            Ok(StreamEvent::Result {
                result, is_error, ..
            }) => {
                self.final_result = result;
                self.is_error = is_error;
                vec![StreamLine::Ignored]
            }
            Ok(StreamEvent::User { .. }) | Ok(StreamEvent::System { .. }) => {
                vec![StreamLine::Ignored]
            }
            Err(_) => {
                self.text.push_str(line);
                self.text.push('\n');
                vec![StreamLine::Raw(line.to_string())]
            }
        }
    }

    /// Whether the final `result` event reported an error.
    pub fn is_error(&self) -> bool {
        self.is_error
    }

    /// The flattened transcript. The final result is appended unless the
    /// assistant text already contains it, so markers from earlier turns survive.
    pub fn finish(self) -> String {
        match self.final_result {
            Some(result) if !self.text.contains(result.trim()) => {
                let mut text = self.text;
                text.push_str(&result);
                if !result.ends_with('\n') {
                    text.push('\n');
                }
                text
            }
            _ => self.text,
        }
    }
}

/// Flatten a complete stream-json transcript.
pub fn flatten(stdout: &str) -> String {
    let mut acc = StreamText::new();
    for line in stdout.lines() {
        acc.push_line(line);
    }
    acc.finish()
}

/// Extract a human-readable description from a tool use event
pub fn describe_tool_use(name: &str, input: &Value) -> String {
    let field = |key: &str| input.get(key).and_then(|v| v.as_str());

    match name {
        "Read" => format!("Reading: {}", field("file_path").map(shorten_path).unwrap_or_else(|| "file".into())),
        "Write" => format!("Creating: {}", field("file_path").map(shorten_path).unwrap_or_else(|| "file".into())),
        "Edit" => format!("Editing: {}", field("file_path").map(shorten_path).unwrap_or_else(|| "file".into())),
        "Bash" => format!(
            "Running: {}",
            field("command").map(|s| truncate_str(s, 40)).unwrap_or_else(|| "command".into())
        ),
        "Glob" => format!("Searching: {}", field("pattern").unwrap_or("*")),
        "Grep" => format!(
            "Grep: {}",
            field("pattern").map(|s| truncate_str(s, 30)).unwrap_or_else(|| "pattern".into())
        ),
        "Task" => format!("Agent: {}", field("description").unwrap_or("subagent")),
        _ => name.to_string(),
    }
}

/// Get an emoji for a tool
pub fn tool_emoji(name: &str) -> &'static str {
    match name {
        "Read" => "\u{1F4D6}",
        "Write" => "\u{1F4DD}",
        "Edit" => "\u{270F}\u{FE0F}",
        "Bash" => "\u{2699}\u{FE0F}",
        "Glob" => "\u{1F50D}",
        "Grep" => "\u{1F50E}",
        "Task" => "\u{1F916}",
        _ => "\u{1F527}",
    }
}

/// Shorten a file path to just the last 2 components
fn shorten_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() <= 2 {
        path.to_string()
    } else {
        parts[parts.len() - 2..].join("/")
    }
}

/// Truncate on a char boundary, with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// First line of a text block, truncated for a one-line status display
pub fn truncate_thinking(text: &str, max_len: usize) -> String {
    let first_line = text.lines().next().unwrap_or(text);
    truncate_str(first_line.trim(), max_len)
}
