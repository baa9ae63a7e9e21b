use crate::apply::Applier;
use crate::audit::{AuditError, Auditor};
use crate::backup::{BackupError, BackupManager};
use crate::config::RunConfig;
use crate::confirm::Confirm;
use crate::filter::{self, Thresholds};
use crate::pipeline::{Artifact, Pipeline, StageError};
use crate::report::{self, Reporter};
use crate::types::{Iteration, Violation};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Run-level failure. Surfaces immediately to the caller and stops the
/// loop; never retried within a single run.
#[derive(Debug)]
pub enum RunError {
    Audit(AuditError),
    Pipeline(StageError),
    Backup(BackupError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Audit(e) => write!(f, "{}", e),
            RunError::Pipeline(e) => write!(f, "{}", e),
            RunError::Backup(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RunError {}

impl From<AuditError> for RunError {
    fn from(e: AuditError) -> Self {
        RunError::Audit(e)
    }
}

impl From<StageError> for RunError {
    fn from(e: StageError) -> Self {
        RunError::Pipeline(e)
    }
}

/// Terminal state of a completed (non-errored) run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Done,
    Aborted,
}

/// End-of-run report handed back to the caller
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub outcome: Outcome,
    pub reason: String,
    /// Iterations entered, including ones that terminated early
    pub iterations_run: u32,
    /// Iterations that reached the apply step
    pub iterations: Vec<Iteration>,
    pub fixes_applied: usize,
    pub fixes_failed: usize,
    pub dry_run: bool,
    /// Admitted count of the final iteration when dry-running
    pub would_apply: usize,
}

/// Loop phase, for progress logging
#[derive(Debug, Clone, Copy)]
enum State {
    Auditing,
    Pipeline,
    Filtering,
    AwaitingConfirmation,
    Applying,
    Verifying,
}

/// Drives the remediation loop: audit, pipeline, filter, confirm, backup,
/// apply, re-audit, until convergence or a stop condition.
///
/// Strictly sequential; assumes exclusive single-writer access to the
/// working tree for the duration of the run.
pub struct Orchestrator {
    run: RunConfig,
    root: PathBuf,
    auditor: Box<dyn Auditor>,
    pipeline: Pipeline,
    applier: Applier,
    backup: Option<BackupManager>,
    confirm: Box<dyn Confirm>,
    reporter: Reporter,
}

impl Orchestrator {
    pub fn new(
        root: impl Into<PathBuf>,
        run: RunConfig,
        auditor: Box<dyn Auditor>,
        pipeline: Pipeline,
        applier: Applier,
        backup: Option<BackupManager>,
        confirm: Box<dyn Confirm>,
        reporter: Reporter,
    ) -> Self {
        Self {
            run,
            root: root.into(),
            auditor,
            pipeline,
            applier,
            backup,
            confirm,
            reporter,
        }
    }

    /// Run to convergence. Artifacts are written even when the run errors.
    pub async fn run(mut self) -> Result<RunSummary, RunError> {
        info!(
            "Starting remediation run (max {} iterations, batch size {})",
            self.run.max_iterations, self.run.batch_size
        );
        let result = self.run_loop().await;

        match self.reporter.write_all() {
            Ok(dir) => info!("Run artifacts written to {}", dir.display()),
            Err(e) => warn!("Failed to write run artifacts: {}", e),
        }

        if let Ok(summary) = &result {
            for line in report::format_summary(summary).lines() {
                info!("{}", line);
            }
        }
        result
    }

    async fn run_loop(&mut self) -> Result<RunSummary, RunError> {
        let thresholds = Thresholds {
            min_confidence: self.run.min_confidence,
            min_score: self.run.min_security_score,
            require_all_gates: self.run.require_all_gates,
        };

        let mut iterations = Vec::new();
        let mut fixes_applied = 0;
        let mut fixes_failed = 0;
        // Re-audit results carry into the next iteration so each audit pass
        // runs exactly once
        let mut pending: Option<Vec<Violation>> = None;
        let mut iterations_run = 0;

        for index in 1..=self.run.max_iterations {
            iterations_run = index;

            self.transition(index, State::Auditing);
            let violations = match pending.take() {
                Some(v) => v,
                None => self.auditor.audit_once().await?,
            };
            self.reporter.record_audit(index, &violations);
            if violations.is_empty() {
                return Ok(self.summary(
                    Outcome::Done,
                    "no violations remain",
                    iterations_run,
                    iterations,
                    fixes_applied,
                    fixes_failed,
                    0,
                ));
            }
            let before = violations.len();
            info!("[iteration {}] {} violations to remediate", index, before);

            self.transition(index, State::Pipeline);
            let artifact = self
                .pipeline
                .run(Artifact::from_violations(violations))
                .await?;

            self.transition(index, State::Filtering);
            let selection = filter::select(artifact.candidates.clone(), &thresholds);
            self.reporter.record_pipeline(index, &artifact, &selection);
            if !selection.needs_review.is_empty() {
                warn!(
                    "[iteration {}] {} candidate(s) need manual review and will not be applied:",
                    index,
                    selection.needs_review.len()
                );
                for candidate in &selection.needs_review {
                    warn!("[iteration {}]   {}", index, candidate.describe());
                }
            }
            if selection.admitted.is_empty() {
                return Ok(self.summary(
                    Outcome::Done,
                    "no admissible fixes",
                    iterations_run,
                    iterations,
                    fixes_applied,
                    fixes_failed,
                    0,
                ));
            }
            info!(
                "[iteration {}] {} fix(es) admitted by the safety filter",
                index,
                selection.admitted.len()
            );

            if self.run.dry_run {
                for candidate in &selection.admitted {
                    info!("[iteration {}] would apply {}", index, candidate.describe());
                }
                return Ok(self.summary(
                    Outcome::Done,
                    &format!("dry run: would apply {} fixes", selection.admitted.len()),
                    iterations_run,
                    iterations,
                    fixes_applied,
                    fixes_failed,
                    selection.admitted.len(),
                ));
            }

            if !self.run.auto_apply {
                self.transition(index, State::AwaitingConfirmation);
                if !self.confirm.confirm(selection.admitted.len(), index) {
                    info!("[iteration {}] confirmation declined", index);
                    return Ok(self.summary(
                        Outcome::Aborted,
                        "confirmation declined",
                        iterations_run,
                        iterations,
                        fixes_applied,
                        fixes_failed,
                        0,
                    ));
                }
            }

            if self.run.create_backups {
                if let Some(backup) = &self.backup {
                    match backup.snapshot(&self.root) {
                        Ok(handle) => info!(
                            "[iteration {}] backed up {} files to {}",
                            index,
                            handle.files_copied,
                            handle.path.display()
                        ),
                        Err(e) if self.run.apply_without_backup => {
                            warn!(
                                "[iteration {}] {} - continuing without backup \
                                 (apply_without_backup is set)",
                                index, e
                            );
                        }
                        Err(e) => return Err(RunError::Backup(e)),
                    }
                } else if !self.run.apply_without_backup {
                    return Err(RunError::Backup(BackupError(
                        "backups requested but no backup manager configured".into(),
                    )));
                }
            }

            self.transition(index, State::Applying);
            let results: Vec<_> = selection
                .admitted
                .iter()
                .map(|candidate| self.applier.apply(candidate))
                .collect();
            let attempted = results.len();
            let succeeded = results.iter().filter(|r| r.success).count();
            self.reporter.record_apply(index, &results);
            fixes_applied += succeeded;
            fixes_failed += attempted - succeeded;
            info!(
                "[iteration {}] applied {}/{} fixes",
                index, succeeded, attempted
            );

            self.transition(index, State::Verifying);
            // Let the filesystem settle before re-auditing
            tokio::time::sleep(tokio::time::Duration::from_millis(self.run.settle_ms)).await;
            let remaining = self.auditor.audit_once().await?;
            let after = remaining.len();

            iterations.push(Iteration {
                index,
                violations_before: before,
                violations_after: after,
                fixes_attempted: attempted,
                fixes_succeeded: succeeded,
            });

            if after == 0 {
                return Ok(self.summary(
                    Outcome::Done,
                    "no violations remain",
                    iterations_run,
                    iterations,
                    fixes_applied,
                    fixes_failed,
                    0,
                ));
            }
            if after >= before {
                return Ok(self.summary(
                    Outcome::Done,
                    "no progress, stopping to avoid an infinite loop",
                    iterations_run,
                    iterations,
                    fixes_applied,
                    fixes_failed,
                    0,
                ));
            }

            info!(
                "[iteration {}] progress: {} -> {} violations, continuing",
                index, before, after
            );
            pending = Some(remaining);
            tokio::time::sleep(tokio::time::Duration::from_millis(
                self.run.iteration_pause_ms,
            ))
            .await;
        }

        Ok(self.summary(
            Outcome::Done,
            "iteration limit reached",
            iterations_run,
            iterations,
            fixes_applied,
            fixes_failed,
            0,
        ))
    }

    fn transition(&self, iteration: u32, state: State) {
        debug!("[iteration {}] -> {:?}", iteration, state);
    }

    fn summary(
        &self,
        outcome: Outcome,
        reason: &str,
        iterations_run: u32,
        iterations: Vec<Iteration>,
        fixes_applied: usize,
        fixes_failed: usize,
        would_apply: usize,
    ) -> RunSummary {
        RunSummary {
            outcome,
            reason: reason.to_string(),
            iterations_run,
            iterations,
            fixes_applied,
            fixes_failed,
            dry_run: self.run.dry_run,
            would_apply,
        }
    }
}
