//! Command-line profiles for the supported coding agents.

use serde::{Deserialize, Serialize};

/// Which agent CLI drives the phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    #[default]
    Claude,
    Codex,
    Opencode,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [AgentKind::Claude, AgentKind::Codex, AgentKind::Opencode];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Claude => "claude",
            AgentKind::Codex => "codex",
            AgentKind::Opencode => "opencode",
        }
    }

    /// Executable name used when no override is configured.
    pub fn default_program(&self) -> &'static str {
        self.as_str()
    }

    /// Whether stdout is Claude's stream-json format and needs flattening.
    pub fn streams_json(&self) -> bool {
        matches!(self, AgentKind::Claude)
    }

    /// Build the command for one invocation. The prompt is always written to stdin.
    pub fn command(
        &self,
        program: Option<&str>,
        model: Option<&str>,
        skip_permissions: bool,
    ) -> CommandSpec {
        let program = program.unwrap_or(self.default_program()).to_string();
        let mut args: Vec<String> = Vec::new();

        match self {
            AgentKind::Claude => {
                args.push("--print".into());
                if skip_permissions {
                    args.push("--dangerously-skip-permissions".into());
                }
                args.extend(["--output-format", "stream-json", "--verbose"].map(String::from));
                if let Some(model) = model {
                    args.push("--model".into());
                    args.push(model.into());
                }
            }
            AgentKind::Codex => {
                args.push("exec".into());
                if skip_permissions {
                    args.push("--full-auto".into());
                }
                if let Some(model) = model {
                    args.push("-m".into());
                    args.push(model.into());
                }
                // read the prompt from stdin
                args.push("-".into());
            }
            AgentKind::Opencode => {
                args.push("run".into());
                if let Some(model) = model {
                    args.push("--model".into());
                    args.push(model.into());
                }
            }
        }

        CommandSpec { program, args }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" => Ok(AgentKind::Claude),
            "codex" => Ok(AgentKind::Codex),
            "opencode" => Ok(AgentKind::Opencode),
            _ => anyhow::bail!(
                "Invalid agent '{}'. Valid values: claude, codex, opencode",
                s
            ),
        }
    }
}

/// A resolved program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}
