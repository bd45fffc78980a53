//! Spawning agent processes.
//!
//! The prompt goes to stdin; stdout and stderr are drained concurrently with
//! the wait for exit so a chatty agent can never fill a pipe and deadlock.
//! Failures never escape as `Err`: a binary that cannot be spawned becomes
//! exit code 127 with a descriptive stderr, which the classifier recognises.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::agent::CommandSpec;
use crate::stream::{StreamLine, StreamText, truncate_thinking};
use crate::ui::OrchestratorUI;

/// Exit code reported when the program could not be started at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// One agent invocation.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub command: CommandSpec,
    /// Written to the child's stdin, then stdin is closed.
    pub input: String,
    /// Working directory for the child. Never inherited from this process.
    pub cwd: PathBuf,
    /// Flatten Claude stream-json stdout into `AgentOutput::text`.
    pub stream_json: bool,
}

/// Exit code plus captured output of a finished invocation.
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    pub exit_code: i32,
    /// Raw stdout as produced by the agent.
    pub stdout: String,
    pub stderr: String,
    /// Agent text used for marker parsing: flattened stream-json, or stdout.
    pub text: String,
    pub duration: Duration,
}

impl AgentOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// A finished run with exit code 0 whose text equals its stdout.
    pub fn ok(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            exit_code: 0,
            stdout: text.clone(),
            text,
            ..Default::default()
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    fn spawn_failed(program: &str, err: &std::io::Error) -> Self {
        Self::failed(
            SPAWN_FAILURE_EXIT_CODE,
            format!("failed to spawn `{}`: {}", program, err),
        )
    }
}

/// Runs agent invocations. Real implementation: `ProcessInvoker`.
/// Test double: `MockInvoker`.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, request: &InvocationRequest) -> AgentOutput;
}

/// Spawns the agent as a child process.
#[derive(Default)]
pub struct ProcessInvoker {
    ui: Option<Arc<OrchestratorUI>>,
}

impl ProcessInvoker {
    pub fn new(ui: Option<Arc<OrchestratorUI>>) -> Self {
        Self { ui }
    }

    fn display(&self, line: StreamLine) {
        let Some(ref ui) = self.ui else {
            return;
        };
        match line {
            StreamLine::ToolUse { emoji, description } => ui.show_tool_use(emoji, &description),
            StreamLine::Text(text) | StreamLine::Raw(text) => {
                let snippet = truncate_thinking(&text, 60);
                if !snippet.is_empty() {
                    ui.show_thinking(&snippet);
                }
            }
            StreamLine::Ignored => {}
        }
    }

    async fn run(&self, request: &InvocationRequest) -> std::io::Result<AgentOutput> {
        let start = Instant::now();
        let program = &request.command.program;

        let mut child = match Command::new(program)
            .args(&request.command.args)
            .current_dir(&request.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return Ok(AgentOutput::spawn_failed(program, &e)),
        };

        debug!(pid = child.id().unwrap_or(0), command = %request.command.display(), "agent spawned");
        if let Some(ref ui) = self.ui {
            ui.log_step(&format!("Spawned {} (PID: {})", program, child.id().unwrap_or(0)));
        }

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let input = request.input.as_bytes();
        let write_stdin = async move {
            if let Some(mut stdin) = stdin {
                // An agent that exits without reading its prompt closes the pipe;
                // its exit code tells the real story.
                if let Err(e) = stdin.write_all(input).await {
                    debug!(error = %e, "agent did not consume stdin");
                    return;
                }
                let _ = stdin.shutdown().await;
            }
        };

        let read_stdout = async {
            let mut raw = String::new();
            let mut text = StreamText::new();
            if let Some(stdout) = stdout {
                let mut reader = BufReader::new(stdout);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    if reader.read_until(b'\n', &mut buf).await? == 0 {
                        break;
                    }
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    raw.push_str(line);
                    raw.push('\n');
                    if request.stream_json {
                        for event in text.push_line(line) {
                            self.display(event);
                        }
                    } else {
                        self.display(StreamLine::Raw(line.to_string()));
                    }
                }
            }
            Ok::<_, std::io::Error>((raw, text))
        };

        let read_stderr = async {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                stderr.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
        };

        let ui_clone = self.ui.clone();
        let elapsed_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Some(ref ui) = ui_clone {
                    ui.update_elapsed(start.elapsed());
                }
            }
        });

        let (_, stdout_res, stderr_res, status) =
            tokio::join!(write_stdin, read_stdout, read_stderr, child.wait());
        elapsed_task.abort();

        let (stdout, text) = stdout_res?;
        let stderr = stderr_res?;
        let exit_code = status?.code().unwrap_or(-1);
        let duration = start.elapsed();

        info!(
            program = %program,
            exit_code,
            duration_ms = duration.as_millis() as u64,
            "agent exited"
        );

        let text = if request.stream_json {
            text.finish()
        } else {
            stdout.clone()
        };

        Ok(AgentOutput {
            exit_code,
            stdout,
            stderr,
            text,
            duration,
        })
    }
}

#[async_trait]
impl AgentInvoker for ProcessInvoker {
    async fn invoke(&self, request: &InvocationRequest) -> AgentOutput {
        match self.run(request).await {
            Ok(output) => output,
            Err(e) => AgentOutput::failed(
                -1,
                format!("I/O error while running `{}`: {}", request.command.program, e),
            ),
        }
    }
}
