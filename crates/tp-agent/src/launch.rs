// launch.rs — Per-agent launch descriptors.
//
// Describes how to invoke each supported agent non-interactively, how to
// resume a session, and how to read its output. `{prompt}` and `{session}`
// in argument templates are substituted at launch time.

use serde::{Deserialize, Serialize};

/// How the agent reports results on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// One JSON event per line; a final `{"type":"result"}` event carries
    /// the summary text and session id.
    StreamJson,
    /// Plain text; everything printed is the output, no session id.
    Text,
}

/// How to launch one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentLaunchConfig {
    /// Agent identity (e.g., "claude-code").
    pub agent_id: String,
    /// The command to execute (e.g., "claude", "codex").
    pub command: String,
    /// Arguments for a new session. `{prompt}` is replaced with the prompt.
    pub start_args: Vec<String>,
    /// Arguments to resume a session, with `{session}` and `{prompt}`.
    /// `None` when the agent cannot continue a conversation.
    pub resume_args: Option<Vec<String>>,
    pub output: OutputFormat,
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl AgentLaunchConfig {
    /// Look up the built-in launch config for an agent.
    ///
    /// Unknown agent ids are treated as a command that takes the prompt as
    /// its only argument and cannot be resumed.
    pub fn for_agent(agent_id: &str) -> Self {
        match agent_id {
            "claude-code" => Self {
                agent_id: agent_id.to_string(),
                command: "claude".to_string(),
                start_args: args(&[
                    "-p",
                    "{prompt}",
                    "--output-format",
                    "stream-json",
                    "--verbose",
                    "--permission-mode",
                    "acceptEdits",
                ]),
                resume_args: Some(args(&[
                    "-p",
                    "{prompt}",
                    "--resume",
                    "{session}",
                    "--output-format",
                    "stream-json",
                    "--verbose",
                    "--permission-mode",
                    "acceptEdits",
                ])),
                output: OutputFormat::StreamJson,
            },
            "codex" => Self {
                agent_id: agent_id.to_string(),
                command: "codex".to_string(),
                start_args: args(&["exec", "--full-auto", "{prompt}"]),
                resume_args: None,
                output: OutputFormat::Text,
            },
            _ => Self {
                agent_id: agent_id.to_string(),
                command: agent_id.to_string(),
                start_args: args(&["{prompt}"]),
                resume_args: None,
                output: OutputFormat::Text,
            },
        }
    }

    /// Override the executable (e.g., an absolute path to `claude`).
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Start arguments with the prompt substituted.
    pub fn start_argv(&self, prompt: &str) -> Vec<String> {
        self.start_args
            .iter()
            .map(|a| a.replace("{prompt}", prompt))
            .collect()
    }

    /// Resume arguments with session and prompt substituted, if supported.
    pub fn resume_argv(&self, session: &str, prompt: &str) -> Option<Vec<String>> {
        self.resume_args.as_ref().map(|template| {
            template
                .iter()
                .map(|a| a.replace("{session}", session).replace("{prompt}", prompt))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_code_supports_resume() {
        let config = AgentLaunchConfig::for_agent("claude-code");
        assert_eq!(config.command, "claude");
        let argv = config.resume_argv("abc-123", "fix tests").unwrap();
        assert!(argv.windows(2).any(|w| w == ["--resume", "abc-123"]));
        assert!(argv.windows(2).any(|w| w == ["-p", "fix tests"]));
    }

    #[test]
    fn codex_cannot_resume() {
        let config = AgentLaunchConfig::for_agent("codex");
        assert!(config.resume_argv("abc", "x").is_none());
        assert_eq!(config.start_argv("do it").last().unwrap(), "do it");
    }

    #[test]
    fn unknown_agent_runs_command_with_prompt() {
        let config = AgentLaunchConfig::for_agent("my-agent");
        assert_eq!(config.command, "my-agent");
        assert_eq!(config.start_argv("hello"), vec!["hello"]);
        assert_eq!(config.output, OutputFormat::Text);
    }

    #[test]
    fn prompt_with_braces_is_not_resubstituted() {
        let config = AgentLaunchConfig::for_agent("claude-code");
        let argv = config.resume_argv("s1", "literal {session} text").unwrap();
        assert!(argv.contains(&"literal {session} text".to_string()));
    }
}
