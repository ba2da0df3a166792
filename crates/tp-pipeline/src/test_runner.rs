// test_runner.rs — Run a workspace's tests and classify the outcome.
//
// The project type is detected from the build manifest in the workspace
// root. An explicit command (from `[tests] command` in the config) always
// wins over detection. Outcomes combine the exit status with failure
// markers in the captured output, since some toolchains exit 0 on failed
// suites or only expose combined text.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::RegexSet;
use thiserror::Error;
use tokio::process::Command;

/// Default bound on a single test run.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Result of one test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub passed: bool,
    /// Combined stdout and stderr.
    pub output: String,
}

#[derive(Debug, Error)]
pub enum TestRunError {
    /// No recognized build manifest and no explicit command.
    #[error("no recognized build manifest in {0}")]
    ProjectTypeUnknown(PathBuf),

    /// The test command could not be launched.
    #[error("failed to launch `{command}`: {source}")]
    LaunchFailed {
        command: String,
        source: std::io::Error,
    },
}

/// Runs a workspace's test suite. Never retries.
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run(&self, workspace: &Path) -> Result<TestOutcome, TestRunError>;
}

/// Project types recognized by their manifest file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Cargo,
    SwiftPackage,
    Xcode,
    Node,
    Go,
    Python,
    Gradle,
    Maven,
    Make,
}

impl ProjectKind {
    /// Inspect `dir` for a known manifest. First match wins.
    pub fn detect(dir: &Path) -> Option<ProjectKind> {
        let has = |name: &str| dir.join(name).exists();

        if has("Cargo.toml") {
            return Some(ProjectKind::Cargo);
        }
        if has("Package.swift") {
            return Some(ProjectKind::SwiftPackage);
        }
        if has_extension(dir, "xcworkspace") || has_extension(dir, "xcodeproj") {
            return Some(ProjectKind::Xcode);
        }
        if has("package.json") {
            return Some(ProjectKind::Node);
        }
        if has("go.mod") {
            return Some(ProjectKind::Go);
        }
        if has("pyproject.toml") || has("setup.py") || has("pytest.ini") {
            return Some(ProjectKind::Python);
        }
        if has("build.gradle") || has("build.gradle.kts") {
            return Some(ProjectKind::Gradle);
        }
        if has("pom.xml") {
            return Some(ProjectKind::Maven);
        }
        if has("Makefile") {
            return Some(ProjectKind::Make);
        }
        None
    }

    /// Program and arguments that run this project's tests.
    pub fn test_command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            ProjectKind::Cargo => ("cargo", &["test"]),
            ProjectKind::SwiftPackage => ("swift", &["test"]),
            ProjectKind::Xcode => ("xcodebuild", &["test", "-quiet"]),
            ProjectKind::Node => ("npm", &["test"]),
            ProjectKind::Go => ("go", &["test", "./..."]),
            ProjectKind::Python => ("python3", &["-m", "pytest"]),
            ProjectKind::Gradle => ("gradle", &["test"]),
            ProjectKind::Maven => ("mvn", &["-q", "test"]),
            ProjectKind::Make => ("make", &["test"]),
        }
    }
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProjectKind::Cargo => "cargo",
            ProjectKind::SwiftPackage => "swift-package",
            ProjectKind::Xcode => "xcode",
            ProjectKind::Node => "node",
            ProjectKind::Go => "go",
            ProjectKind::Python => "python",
            ProjectKind::Gradle => "gradle",
            ProjectKind::Maven => "maven",
            ProjectKind::Make => "make",
        };
        write!(f, "{}", name)
    }
}

fn has_extension(dir: &Path, ext: &str) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .any(|e| e.path().extension().is_some_and(|x| x == ext))
        })
        .unwrap_or(false)
}

/// Substrings that mean a test run failed regardless of exit status.
fn failure_markers() -> &'static RegexSet {
    static MARKERS: OnceLock<RegexSet> = OnceLock::new();
    MARKERS.get_or_init(|| {
        RegexSet::new([
            // cargo
            r"(?m)^test result: FAILED",
            // rustc, swiftc, clang, tsc: `error:` / `error[E0425]:` / `file:1:2: error:`
            r"(?m)(^|: )error(\[E\d+\])?: ",
            // xcodebuild
            r"\*\* (TEST|BUILD) FAILED \*\*",
            // XCTest
            r"Test Suite '[^']*' failed",
            r"with [1-9]\d* failures?",
            // go
            r"(?m)^(--- )?FAIL[:\s]",
            // jest, mocha, pytest, junit summaries with a non-zero count
            r"\b[1-9]\d* (failed|failing)\b",
            r"Failures: [1-9]\d*",
        ])
        .unwrap_or_else(|_| RegexSet::empty())
    })
}

/// Classify captured output.
///
/// `exit_ok` is `None` when the process ended without an exit code
/// (killed by a signal); that counts as a failure.
pub fn classify(exit_ok: Option<bool>, output: &str) -> bool {
    let marker = failure_markers().is_match(output);
    exit_ok.unwrap_or(false) && !marker
}

/// Runs tests as a child process.
pub struct CommandTestRunner {
    command: Option<String>,
    timeout: Duration,
}

impl CommandTestRunner {
    pub fn new() -> Self {
        Self {
            command: None,
            timeout: DEFAULT_TEST_TIMEOUT,
        }
    }

    /// Shell command that replaces manifest detection.
    pub fn with_command(mut self, command: Option<String>) -> Self {
        self.command = command.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The command line that would run in `workspace`.
    pub fn describe(&self, workspace: &Path) -> Option<String> {
        if let Some(cmd) = &self.command {
            return Some(cmd.clone());
        }
        ProjectKind::detect(workspace).map(|kind| {
            let (program, args) = kind.test_command();
            std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ")
        })
    }

    fn build_command(&self, workspace: &Path) -> Result<(String, Command), TestRunError> {
        let (command_line, mut cmd) = match &self.command {
            Some(shell) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(shell);
                (shell.clone(), cmd)
            }
            None => {
                let kind = ProjectKind::detect(workspace)
                    .ok_or_else(|| TestRunError::ProjectTypeUnknown(workspace.to_path_buf()))?;
                let (program, args) = kind.test_command();
                tracing::debug!(project = %kind, dir = %workspace.display(), "detected project type");
                let mut cmd = Command::new(program);
                cmd.args(args);
                (format!("{} {}", program, args.join(" ")), cmd)
            }
        };
        cmd.current_dir(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok((command_line, cmd))
    }
}

impl Default for CommandTestRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestRunner for CommandTestRunner {
    async fn run(&self, workspace: &Path) -> Result<TestOutcome, TestRunError> {
        let (command_line, mut cmd) = self.build_command(workspace)?;
        tracing::info!(dir = %workspace.display(), command = %command_line, "running tests");

        let child = cmd.spawn().map_err(|source| TestRunError::LaunchFailed {
            command: command_line.clone(),
            source,
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(TestRunError::LaunchFailed {
                    command: command_line,
                    source,
                })
            }
            Err(_) => {
                return Ok(TestOutcome {
                    passed: false,
                    output: format!(
                        "`{}` timed out after {}s",
                        command_line,
                        self.timeout.as_secs()
                    ),
                })
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        let exit_ok = output.status.code().map(|code| code == 0);
        let passed = classify(exit_ok, &combined);
        tracing::info!(dir = %workspace.display(), passed, "tests finished");
        Ok(TestOutcome {
            passed,
            output: combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn detects_manifests() {
        let dir = tempdir().unwrap();
        assert_eq!(ProjectKind::detect(dir.path()), None);

        fs::write(dir.path().join("Package.swift"), "// swift-tools-version:5.9").unwrap();
        assert_eq!(ProjectKind::detect(dir.path()), Some(ProjectKind::SwiftPackage));

        fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        assert_eq!(ProjectKind::detect(dir.path()), Some(ProjectKind::Cargo));
    }

    #[test]
    fn detects_xcode_project_by_extension() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("App.xcodeproj")).unwrap();
        assert_eq!(ProjectKind::detect(dir.path()), Some(ProjectKind::Xcode));
    }

    #[test]
    fn cargo_success_summary_is_not_a_failure() {
        let out = "running 3 tests\ntest result: ok. 3 passed; 0 failed; 0 ignored";
        assert!(classify(Some(true), out));
    }

    #[test]
    fn markers_fail_even_with_clean_exit() {
        assert!(!classify(Some(true), "test result: FAILED. 1 passed; 2 failed"));
        assert!(!classify(Some(true), "src/lib.rs:3:5: error: cannot find value"));
        assert!(!classify(Some(true), "error[E0425]: cannot find value `x`"));
        assert!(!classify(Some(true), "** TEST FAILED **"));
        assert!(!classify(Some(true), "Executed 4 tests, with 1 failure (0 unexpected)"));
        assert!(!classify(Some(true), "--- FAIL: TestParse (0.00s)"));
        assert!(!classify(Some(true), "Tests:       2 failed, 10 passed"));
    }

    #[test]
    fn zero_counts_do_not_trip_markers() {
        assert!(classify(Some(true), "Executed 4 tests, with 0 failures"));
        assert!(classify(Some(true), "10 passed, 0 failed"));
    }

    #[test]
    fn non_zero_exit_or_signal_fails() {
        assert!(!classify(Some(false), "all good"));
        assert!(!classify(None, ""));
    }

    #[tokio::test]
    async fn unknown_project_is_an_error() {
        let dir = tempdir().unwrap();
        let err = CommandTestRunner::new().run(dir.path()).await.unwrap_err();
        assert!(matches!(err, TestRunError::ProjectTypeUnknown(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn explicit_command_overrides_detection() {
        let dir = tempdir().unwrap();
        let runner = CommandTestRunner::new().with_command(Some("echo ok; echo warn >&2".to_string()));
        let outcome = runner.run(dir.path()).await.unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.output, "ok\nwarn\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_surfaces_output() {
        let dir = tempdir().unwrap();
        let runner = CommandTestRunner::new()
            .with_command(Some("echo 'assertion failed: left == right'; exit 1".to_string()));
        let outcome = runner.run(dir.path()).await.unwrap();
        assert!(!outcome.passed);
        assert!(outcome.output.contains("assertion failed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_is_a_failed_outcome() {
        let dir = tempdir().unwrap();
        let runner = CommandTestRunner::new()
            .with_command(Some("sleep 5".to_string()))
            .with_timeout(Duration::from_millis(200));
        let outcome = runner.run(dir.path()).await.unwrap();
        assert!(!outcome.passed);
        assert!(outcome.output.contains("`sleep 5` timed out"));
    }

    #[test]
    fn blank_command_falls_back_to_detection() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module x").unwrap();
        let runner = CommandTestRunner::new().with_command(Some("  ".to_string()));
        assert_eq!(runner.describe(dir.path()).as_deref(), Some("go test ./..."));
    }
}
