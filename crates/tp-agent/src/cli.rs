// cli.rs — CliAgent: drive an agent executable as a child process.
//
// stdout is read line by line and forwarded to the context's observer while
// it streams; stderr is drained concurrently so a chatty agent can't block
// on a full pipe. The whole invocation is bounded by `context.timeout` and
// the child is killed if the future is dropped.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::error::{AgentError, Result};
use crate::launch::{AgentLaunchConfig, OutputFormat};
use crate::session::{AgentContext, AgentResult, AgentSession};

/// Backoff suggested when the agent reports rate limiting or overload.
const TRANSIENT_BACKOFF: Duration = Duration::from_secs(30);

/// Markers in agent output that indicate a transient failure.
const TRANSIENT_MARKERS: &[&str] = &["rate limit", "rate_limit", "overloaded", "529", "try again"];

/// Markers meaning the agent could not find the session to resume.
const UNKNOWN_SESSION_MARKERS: &[&str] = &["no conversation found", "session not found"];

/// Agent session backed by an external executable.
pub struct CliAgent {
    config: AgentLaunchConfig,
}

/// Raw result of one child process run.
struct ProcessOutput {
    success: bool,
    code: Option<i32>,
    stdout_lines: Vec<String>,
    stderr: String,
}

impl CliAgent {
    pub fn new(config: AgentLaunchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AgentLaunchConfig {
        &self.config
    }

    async fn run_process(&self, argv: &[String], context: &AgentContext) -> Result<ProcessOutput> {
        let mut child = Command::new(&self.config.command)
            .args(argv)
            .current_dir(&context.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AgentError::fatal(format!("failed to launch {}: {}", self.config.command, e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::fatal("agent stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::fatal("agent stderr was not captured"))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let collect = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut collected = Vec::new();
            while let Some(line) = lines.next_line().await? {
                context.observe(&line);
                collected.push(line);
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, collected))
        };

        let (status, stdout_lines) = match tokio::time::timeout(context.timeout, collect).await {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                return Err(AgentError::fatal(format!(
                    "reading {} output failed: {}",
                    self.config.command, e
                )))
            }
            Err(_) => {
                return Err(AgentError::fatal(format!(
                    "{} timed out after {}s",
                    self.config.command,
                    context.timeout.as_secs()
                )))
            }
        };

        let stderr = stderr_task.await.unwrap_or_default();
        Ok(ProcessOutput {
            success: status.success(),
            code: status.code(),
            stdout_lines,
            stderr,
        })
    }

    /// Turn a finished process into a result or a typed failure.
    fn interpret(&self, output: ProcessOutput) -> Result<AgentResult> {
        let parsed = match self.config.output {
            OutputFormat::StreamJson => parse_stream_json(&output.stdout_lines),
            OutputFormat::Text => ParsedOutput {
                text: output.stdout_lines.join("\n"),
                session_id: None,
                is_error: false,
            },
        };

        if !output.success || parsed.is_error {
            let detail = if output.stderr.trim().is_empty() {
                parsed.text.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            let message = match output.code {
                Some(code) if !output.success => {
                    format!("{} exited with status {}: {}", self.config.command, code, detail)
                }
                _ => format!("{} reported an error: {}", self.config.command, detail),
            };
            return Err(classify_failure(message));
        }

        Ok(AgentResult {
            output: parsed.text,
            session_handle: parsed.session_id,
        })
    }
}

#[async_trait]
impl AgentSession for CliAgent {
    async fn start(&self, prompt: &str, context: &AgentContext) -> Result<AgentResult> {
        tracing::info!(
            agent = %self.config.agent_id,
            dir = %context.working_directory.display(),
            "starting agent session"
        );
        let argv = self.config.start_argv(prompt);
        let output = self.run_process(&argv, context).await?;
        self.interpret(output)
    }

    async fn continue_session(
        &self,
        session_handle: &str,
        prompt: &str,
        context: &AgentContext,
    ) -> Result<AgentResult> {
        let argv = self
            .config
            .resume_argv(session_handle, prompt)
            .ok_or_else(|| AgentError::SessionNotContinuable(session_handle.to_string()))?;

        tracing::info!(
            agent = %self.config.agent_id,
            session = %session_handle,
            "continuing agent session"
        );
        let output = self.run_process(&argv, context).await?;

        if !output.success {
            let text = format!("{}\n{}", output.stderr, output.stdout_lines.join("\n")).to_lowercase();
            if UNKNOWN_SESSION_MARKERS.iter().any(|m| text.contains(m)) {
                return Err(AgentError::SessionNotContinuable(session_handle.to_string()));
            }
        }
        self.interpret(output)
    }

    fn is_available(&self) -> bool {
        which::which(&self.config.command).is_ok()
    }

    fn name(&self) -> &str {
        &self.config.agent_id
    }
}

fn classify_failure(message: String) -> AgentError {
    let lower = message.to_lowercase();
    if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        AgentError::transient(message, Some(TRANSIENT_BACKOFF))
    } else {
        AgentError::fatal(message)
    }
}

struct ParsedOutput {
    text: String,
    session_id: Option<String>,
    is_error: bool,
}

/// Read a stream-json transcript.
///
/// The last `result` event wins. Without one, non-JSON lines are kept as
/// the output so nothing the agent printed is lost.
fn parse_stream_json(lines: &[String]) -> ParsedOutput {
    let mut session_id = None;
    let mut result_text = None;
    let mut is_error = false;
    let mut loose = Vec::new();

    for line in lines {
        let Ok(event) = serde_json::from_str::<serde_json::Value>(line) else {
            if !line.trim().is_empty() {
                loose.push(line.as_str());
            }
            continue;
        };
        if let Some(id) = event.get("session_id").and_then(|v| v.as_str()) {
            session_id = Some(id.to_string());
        }
        if event.get("type").and_then(|v| v.as_str()) == Some("result") {
            result_text = event
                .get("result")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            is_error = event
                .get("is_error")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
        }
    }

    ParsedOutput {
        text: result_text.unwrap_or_else(|| loose.join("\n")),
        session_id,
        is_error,
    }
}
