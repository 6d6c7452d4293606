mod chain;
mod executor;
mod types;
mod verify;

pub use chain::ChainBuilder;
pub use executor::{stderr_hint, AttemptRunner, ToolRunner};
pub use types::{
    AttemptOutcome, AttemptStatus, Artifact, CredentialBundle, DownloadVerdict, MediaKind,
    MediaRequest, Strategy,
};
pub use verify::verify;

use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Chain progress. Terminal states are `Succeeded`, `Exhausted`, `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainState {
    Pending,
    Attempting,
    Succeeded,
    Exhausted,
    Aborted,
}

/// Drives the strategy chain: one attempt at a time, in order, stopping at
/// the first verified success. Tool failures and timeouts advance the chain;
/// a spawn failure aborts it, since no alternate configuration works around
/// a missing tool.
pub struct Orchestrator<R: AttemptRunner> {
    runner: R,
}

impl<R: AttemptRunner> Orchestrator<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub async fn run(
        &self,
        request: &MediaRequest,
        chain: Vec<Strategy>,
        cancel: &CancellationToken,
    ) -> DownloadVerdict {
        info!(
            "Starting download for {} with {} strategies",
            request.source_url,
            chain.len()
        );

        let mut state = ChainState::Pending;
        let mut attempts: Vec<AttemptOutcome> = Vec::new();
        let mut successful_strategy = None;
        let mut artifacts = BTreeSet::new();

        for strategy in &chain {
            if cancel.is_cancelled() {
                info!("Cancelled, not starting strategy '{}'", strategy.name);
                break;
            }

            state = ChainState::Attempting;
            info!("Attempting strategy '{}'", strategy.name);
            let outcome = self.runner.run(strategy, cancel).await;

            match outcome.status {
                AttemptStatus::Success => {
                    let found = verify(&request.destination_dir).unwrap_or_else(|e| {
                        warn!("Could not inspect destination directory: {}", e);
                        BTreeSet::new()
                    });
                    if found.is_empty() {
                        // A zero exit with nothing on disk is a misleading
                        // success signal; keep going down the chain.
                        warn!(
                            "Strategy '{}' exited zero but left no artifacts, continuing",
                            strategy.name
                        );
                        attempts.push(outcome);
                    } else {
                        info!(
                            "Strategy '{}' succeeded with {} artifact(s)",
                            strategy.name,
                            found.len()
                        );
                        successful_strategy = Some(outcome.strategy_name.clone());
                        attempts.push(outcome);
                        artifacts = found;
                        state = ChainState::Succeeded;
                        break;
                    }
                }
                AttemptStatus::ToolError | AttemptStatus::Timeout => {
                    if !outcome.stdout_excerpt.is_empty() {
                        debug!("stdout tail from '{}': {}", strategy.name, outcome.stdout_excerpt);
                    }
                    match stderr_hint(&outcome.stderr_excerpt) {
                        Some(hint) => warn!(
                            "Strategy '{}' failed ({:?}, exit {:?}): {}",
                            strategy.name, outcome.status, outcome.exit_code, hint
                        ),
                        None => warn!(
                            "Strategy '{}' failed ({:?}, exit {:?})",
                            strategy.name, outcome.status, outcome.exit_code
                        ),
                    }
                    attempts.push(outcome);
                }
                AttemptStatus::SpawnError => {
                    error!(
                        "Extraction tool could not be started ({}), aborting remaining strategies",
                        outcome.stderr_excerpt
                    );
                    attempts.push(outcome);
                    state = ChainState::Aborted;
                    break;
                }
            }
        }

        let state = match state {
            ChainState::Succeeded | ChainState::Aborted => state,
            ChainState::Pending | ChainState::Attempting | ChainState::Exhausted => {
                ChainState::Exhausted
            }
        };

        if state == ChainState::Exhausted {
            warn!("Every strategy failed for {}", request.source_url);
        }

        DownloadVerdict {
            succeeded: state == ChainState::Succeeded,
            successful_strategy,
            attempts,
            artifacts,
        }
    }
}
