//! Line-oriented `KEY: value` tokenizer.
//!
//! A line is a token when, after trimming, it has the shape
//! `KEY: value` where KEY is upper-case ASCII letters and underscores.
//! Markdown decoration the agents like to add is tolerated: a leading list
//! bullet or quote (`- `, `* `, `> `) and backticks or asterisks around the
//! key or value (`**TASK_COMPLETED**: \`T1\``). Everything else is ignored.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::{ALL_COMPLETE_SENTINEL, MarkerSet};

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*>]\s+)?[`*]*([A-Z][A-Z_]*)[`*]*\s*:\s*(.*?)\s*$").unwrap()
});

/// One `KEY: value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub key: &'a str,
    pub value: &'a str,
    /// 1-based line number in the scanned text.
    pub line: usize,
}

/// Every `KEY: value` token in `text`, in order. Tokens with an empty value are skipped.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    text.lines()
        .enumerate()
        .filter_map(|(index, raw)| {
            let caps = TOKEN_REGEX.captures(raw.trim())?;
            let key = caps.get(1)?.as_str();
            let value = caps.get(2)?.as_str().trim_matches(|c| c == '`' || c == '*').trim();
            (!value.is_empty()).then_some(Token {
                key,
                value,
                line: index + 1,
            })
        })
        .collect()
}

/// Parse the marker vocabulary out of agent output.
pub fn parse_markers(text: &str) -> MarkerSet {
    let mut markers = MarkerSet {
        all_complete: text.contains(ALL_COMPLETE_SENTINEL),
        ..MarkerSet::default()
    };

    for token in tokenize(text) {
        match token.key {
            "TASK_COMPLETED" => markers.task_completed.push(token.value.to_string()),
            "FINALIZED" => markers.finalized.push(token.value.to_string()),
            _ => continue,
        }
        debug!(key = token.key, value = token.value, line = token.line, "marker");
    }

    markers
}
