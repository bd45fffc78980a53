//! Phase prompt templates.
//!
//! Built-in templates live in `prompts/` and are embedded into the binary. A
//! project can replace any of them by dropping a file with the same name into
//! `.tasksmith/prompts/`. Templates use `{{name}}` placeholders; a placeholder
//! with no value in the context is left as written.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use rust_embed::RustEmbed;

use crate::phase::Phase;
use crate::plan::{WorkItem, WorkSet};

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/prompts/"]
struct BuiltinPrompts;

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").unwrap());

/// Values available to templates.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub project_dir: String,
    pub feature: String,
    pub prd: Option<String>,
    pub task_id: String,
    pub task_title: String,
    pub task_description: String,
    pub acceptance_criteria: Vec<String>,
    /// `id - title` of each dependency.
    pub dependencies: Vec<String>,
    pub feedback_commands: Vec<String>,
    pub progress: Vec<String>,
    /// Implement phase output, shown to the reviewer.
    pub implement_output: Option<String>,
    /// Review phase output, threaded verbatim into finalize.
    pub review_feedback: Option<String>,
}

impl PromptContext {
    /// Context for `item`; phase outputs are filled in by the driver as they arrive.
    pub fn for_item(workset: &WorkSet, item: &WorkItem) -> Self {
        let dependencies = item
            .dependencies
            .iter()
            .map(|dep| match workset.get(dep) {
                Some(found) => format!("{} - {}", found.id, found.title),
                None => dep.clone(),
            })
            .collect();

        Self {
            feature: workset.feature.clone(),
            task_id: item.id.clone(),
            task_title: item.title.clone(),
            task_description: item.description.clone(),
            acceptance_criteria: item.acceptance_criteria.clone(),
            dependencies,
            ..Default::default()
        }
    }

    fn value(&self, name: &str) -> Option<Cow<'_, str>> {
        Some(match name {
            "project_dir" => Cow::Borrowed(self.project_dir.as_str()),
            "feature" => Cow::Borrowed(self.feature.as_str()),
            "task_id" => Cow::Borrowed(self.task_id.as_str()),
            "task_title" => Cow::Borrowed(self.task_title.as_str()),
            "task_description" => text(&self.task_description, "(no description)"),
            "prd" => text(self.prd.as_deref().unwrap_or(""), "(no PRD available)"),
            "acceptance_criteria" => bullets(&self.acceptance_criteria, "(none listed)"),
            "dependencies" => bullets(&self.dependencies, "(none)"),
            "feedback_commands" => {
                if self.feedback_commands.is_empty() {
                    Cow::Borrowed("   - (no checks configured)")
                } else {
                    Cow::Owned(
                        self.feedback_commands
                            .iter()
                            .map(|cmd| format!("   - `{}`", cmd))
                            .collect::<Vec<_>>()
                            .join("\n"),
                    )
                }
            }
            "progress" => bullets(&self.progress, "(nothing recorded yet)"),
            "implement_output" => text(
                self.implement_output.as_deref().unwrap_or(""),
                "(the implementer printed nothing)",
            ),
            "review_feedback" => match &self.review_feedback {
                Some(feedback) => text(feedback, "(the reviewer printed nothing)"),
                None => Cow::Borrowed("(review was skipped)"),
            },
            _ => return None,
        })
    }
}

fn text<'a>(s: &str, empty: &'static str) -> Cow<'a, str> {
    if s.trim().is_empty() {
        Cow::Borrowed(empty)
    } else {
        Cow::Owned(s.trim_end().to_string())
    }
}

fn bullets<'a>(items: &[String], empty: &'static str) -> Cow<'a, str> {
    if items.is_empty() {
        Cow::Borrowed(empty)
    } else {
        Cow::Owned(
            items
                .iter()
                .map(|item| format!("- {}", item))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

/// Substitute `{{name}}` placeholders. Pure; unknown names stay verbatim.
pub fn render_template(template: &str, ctx: &PromptContext) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| match ctx.value(&caps[1]) {
            Some(value) => value.into_owned(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// The built-in template for `phase`.
pub fn builtin_template(phase: Phase) -> Result<String> {
    let file = BuiltinPrompts::get(&phase.template_name())
        .with_context(|| format!("Built-in template {} is missing", phase.template_name()))?;
    String::from_utf8(file.data.into_owned())
        .with_context(|| format!("Built-in template {} is not UTF-8", phase.template_name()))
}

/// Looks up templates, preferring project overrides.
#[derive(Debug, Clone)]
pub struct PromptRenderer {
    override_dir: PathBuf,
}

impl PromptRenderer {
    pub fn new(override_dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: override_dir.into(),
        }
    }

    pub fn template(&self, phase: Phase) -> Result<String> {
        let path = self.override_dir.join(phase.template_name());
        if path.exists() {
            return std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt override {}", path.display()));
        }
        builtin_template(phase)
    }

    pub fn render(&self, phase: Phase, ctx: &PromptContext) -> Result<String> {
        Ok(render_template(&self.template(phase)?, ctx))
    }
}
