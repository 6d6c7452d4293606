use super::types::{AttemptOutcome, AttemptStatus, Strategy};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Captured streams are kept as tails so a chatty tool cannot balloon the
/// verdict; yt-dlp puts its final error lines at the end of stderr.
const EXCERPT_LIMIT: usize = 8 * 1024;

/// Runs one strategy to completion. The seam exists so the orchestrator can
/// be exercised with a scripted runner in tests.
#[async_trait]
pub trait AttemptRunner: Send + Sync {
    async fn run(&self, strategy: &Strategy, cancel: &CancellationToken) -> AttemptOutcome;
}

/// Invokes the external extraction tool as a subprocess, enforcing the
/// strategy's timeout as a hard wall-clock bound on the child's lifetime.
pub struct ToolRunner {
    tool: String,
}

impl ToolRunner {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    /// Checks that the tool answers `--version`. Advisory only; the spawn
    /// error path during a real attempt remains the authority.
    pub async fn probe(&self) -> bool {
        match Command::new(&self.tool).arg("--version").output().await {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("{} is available, version: {}", self.tool, version.trim());
                true
            }
            Ok(_) => {
                warn!("{} --version exited non-zero", self.tool);
                false
            }
            Err(e) => {
                warn!("{} not found: {}", self.tool, e);
                false
            }
        }
    }
}

#[async_trait]
impl AttemptRunner for ToolRunner {
    async fn run(&self, strategy: &Strategy, cancel: &CancellationToken) -> AttemptOutcome {
        debug!(
            "Running {} with strategy '{}' (timeout {:?}, output pattern {})",
            self.tool, strategy.name, strategy.per_attempt_timeout, strategy.output_name_pattern
        );

        let mut command = Command::new(&self.tool);
        command
            .args(&strategy.tool_arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the in-flight future (timeout or cancellation) must
            // take the child down with it.
            .kill_on_drop(true);

        let waited = tokio::select! {
            _ = cancel.cancelled() => {
                warn!("Attempt '{}' cancelled, terminating child", strategy.name);
                return AttemptOutcome {
                    strategy_name: strategy.name.to_string(),
                    status: AttemptStatus::Timeout,
                    exit_code: None,
                    stdout_excerpt: String::new(),
                    stderr_excerpt: "cancelled before completion".to_string(),
                };
            }
            waited = tokio::time::timeout(strategy.per_attempt_timeout, command.output()) => waited,
        };

        match waited {
            Err(_) => {
                warn!(
                    "Attempt '{}' exceeded its {:?} timeout, child terminated",
                    strategy.name, strategy.per_attempt_timeout
                );
                AttemptOutcome {
                    strategy_name: strategy.name.to_string(),
                    status: AttemptStatus::Timeout,
                    exit_code: None,
                    stdout_excerpt: String::new(),
                    stderr_excerpt: String::new(),
                }
            }
            Ok(Err(e)) => {
                warn!("Failed to spawn {}: {}", self.tool, e);
                AttemptOutcome {
                    strategy_name: strategy.name.to_string(),
                    status: AttemptStatus::SpawnError,
                    exit_code: None,
                    stdout_excerpt: String::new(),
                    stderr_excerpt: e.to_string(),
                }
            }
            Ok(Ok(output)) => {
                let status = if output.status.success() {
                    AttemptStatus::Success
                } else {
                    AttemptStatus::ToolError
                };
                AttemptOutcome {
                    strategy_name: strategy.name.to_string(),
                    status,
                    exit_code: output.status.code(),
                    stdout_excerpt: tail_excerpt(&output.stdout),
                    stderr_excerpt: tail_excerpt(&output.stderr),
                }
            }
        }
    }
}

/// Maps known failure phrasings in the tool's stderr to a human hint.
///
/// Purely cosmetic: the hint decorates log lines and is never consulted for
/// control flow, since upstream wording changes without notice.
pub fn stderr_hint(stderr: &str) -> Option<&'static str> {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("cookies") && (lower.contains("expired") || lower.contains("invalid")) {
        Some("cookies look expired or invalid")
    } else if lower.contains("sign in to confirm")
        || lower.contains("not a bot")
        || lower.contains("captcha")
    {
        Some("remote bot detection likely triggered")
    } else if lower.contains("http error 403") || lower.contains("forbidden") {
        Some("access denied by the remote service")
    } else {
        None
    }
}

fn tail_excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= EXCERPT_LIMIT {
        return text.into_owned();
    }
    let mut start = text.len() - EXCERPT_LIMIT;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
