//! Core AgentSession trait and invocation types

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default bound on a single agent invocation.
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Receives agent output lines as they are produced.
pub type OutputObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Where and how long an invocation may run.
#[derive(Clone)]
pub struct AgentContext {
    /// Directory the agent edits (the pipeline's worktree).
    pub working_directory: PathBuf,
    /// Hard bound on one invocation; exceeding it is a failure.
    pub timeout: Duration,
    /// Optional live feed of output lines.
    pub observer: Option<OutputObserver>,
}

impl AgentContext {
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            timeout: DEFAULT_AGENT_TIMEOUT,
            observer: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_observer(mut self, observer: OutputObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Forward one line to the observer, if any.
    pub fn observe(&self, line: &str) {
        if let Some(observer) = &self.observer {
            observer(line);
        }
    }
}

impl fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("working_directory", &self.working_directory)
            .field("timeout", &self.timeout)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Collected result of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Final text the agent reported.
    pub output: String,
    /// Handle for continuing this conversation; `None` if the agent
    /// cannot be resumed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_handle: Option<String>,
}

/// A conversational AI coding agent.
///
/// The agent mutates files under `context.working_directory`; callers
/// inspect those changes themselves. Implementations never retry.
#[async_trait]
pub trait AgentSession: Send + Sync {
    /// Start a new conversation.
    async fn start(&self, prompt: &str, context: &AgentContext) -> Result<AgentResult>;

    /// Continue an existing conversation.
    ///
    /// Fails with `AgentError::SessionNotContinuable` if the handle is
    /// invalid or the agent cannot resume it.
    async fn continue_session(
        &self,
        session_handle: &str,
        prompt: &str,
        context: &AgentContext,
    ) -> Result<AgentResult>;

    /// Whether the agent executable can be found. Pre-flight only.
    fn is_available(&self) -> bool;

    /// Agent display name (for CLI output)
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn observer_receives_lines() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let ctx = AgentContext::new("/tmp/wt").with_observer(Arc::new(move |line: &str| {
            sink.lock().unwrap().push(line.to_string());
        }));

        ctx.observe("one");
        ctx.observe("two");
        assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn context_defaults() {
        let ctx = AgentContext::new("/tmp/wt");
        assert_eq!(ctx.timeout, DEFAULT_AGENT_TIMEOUT);
        assert!(ctx.observer.is_none());
        ctx.observe("ignored");
    }
}
