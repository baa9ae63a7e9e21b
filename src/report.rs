use crate::filter::Selection;
use crate::orchestrator::RunSummary;
use crate::pipeline::Artifact;
use crate::types::{ApplyResult, FixCandidate, Violation};
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One audit pass, as persisted in audit.json
#[derive(Debug, Serialize)]
struct AuditRecord {
    iteration: u32,
    violations: Vec<Violation>,
}

/// One pipeline pass with its filter outcome, as persisted in pipeline.json
#[derive(Debug, Serialize)]
struct PipelineRecord {
    iteration: u32,
    candidates: Vec<FixCandidate>,
    admitted: Vec<String>,
    needs_review: Vec<String>,
}

/// One apply pass, as persisted in apply-log.json
#[derive(Debug, Serialize)]
struct ApplyRecord {
    iteration: u32,
    results: Vec<ApplyResult>,
}

/// Accumulates the run's audit trail and writes it into a timestamped
/// directory at the end of the run (success or failure).
pub struct Reporter {
    run_dir: PathBuf,
    audits: Vec<AuditRecord>,
    pipelines: Vec<PipelineRecord>,
    applies: Vec<ApplyRecord>,
}

impl Reporter {
    pub fn new(report_root: impl Into<PathBuf>) -> Self {
        let run_dir = report_root
            .into()
            .join(Local::now().format("run-%Y%m%d-%H%M%S%.3f").to_string());
        Self {
            run_dir,
            audits: Vec::new(),
            pipelines: Vec::new(),
            applies: Vec::new(),
        }
    }

    pub fn record_audit(&mut self, iteration: u32, violations: &[Violation]) {
        self.audits.push(AuditRecord {
            iteration,
            violations: violations.to_vec(),
        });
    }

    pub fn record_pipeline(&mut self, iteration: u32, artifact: &Artifact, selection: &Selection) {
        self.pipelines.push(PipelineRecord {
            iteration,
            candidates: artifact.candidates.clone(),
            admitted: selection.admitted.iter().map(|c| c.describe()).collect(),
            needs_review: selection.needs_review.iter().map(|c| c.describe()).collect(),
        });
    }

    pub fn record_apply(&mut self, iteration: u32, results: &[ApplyResult]) {
        self.applies.push(ApplyRecord {
            iteration,
            results: results.to_vec(),
        });
    }

    /// Write audit.json, pipeline.json and apply-log.json for this run.
    /// Returns the run directory.
    pub fn write_all(&self) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.run_dir)?;
        write_json(&self.run_dir.join("audit.json"), &self.audits)?;
        write_json(&self.run_dir.join("pipeline.json"), &self.pipelines)?;
        write_json(&self.run_dir.join("apply-log.json"), &self.applies)?;
        Ok(self.run_dir.clone())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    fs::write(path, content)
}

/// Render the end-of-run summary as printable lines
pub fn format_summary(summary: &RunSummary) -> String {
    let mut output = String::new();
    output.push_str(&format!("Outcome: {:?}\n", summary.outcome));
    output.push_str(&format!("Reason: {}\n", summary.reason));
    output.push_str(&format!("Iterations executed: {}\n", summary.iterations_run));
    if summary.dry_run {
        output.push_str(&format!(
            "Dry run (simulated, no files modified): would apply {} fixes\n",
            summary.would_apply
        ));
    } else {
        output.push_str(&format!(
            "Fixes applied: {} succeeded, {} failed\n",
            summary.fixes_applied, summary.fixes_failed
        ));
    }
    for iteration in &summary.iterations {
        output.push_str(&format!(
            "  Iteration {}: {} -> {} violations ({} attempted, {} succeeded)\n",
            iteration.index,
            iteration.violations_before,
            iteration.violations_after,
            iteration.fixes_attempted,
            iteration.fixes_succeeded
        ));
    }
    output.trim_end().to_string()
}
