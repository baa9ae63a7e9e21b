use serde::{Deserialize, Serialize};

/// Priority assigned to a violation by the auditor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

/// A rule violation at a specific file and line, as reported by the auditor.
/// Immutable once audited; a fresh set is produced by every audit pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// File path relative to the project root
    pub file: String,
    /// Line number (1-indexed)
    pub line: u32,
    /// Identifier of the violated rule
    pub rule: String,
    /// The offending line content recorded at audit time
    pub snippet: String,
    /// Priority assigned by the auditor
    pub priority: Priority,
}

/// Validator verdict on a fix candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Approve,
    NeedsRevision,
}

/// Security checker rating for a fix candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityRating {
    Secure,
    ModerateRisk,
    HighRisk,
    Critical,
}

/// Severity of a single vulnerability found by the security checker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// A vulnerability attached to a fix candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub description: String,
    pub severity: Severity,
}

/// An additional file the fix generator wants written alongside the line fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Path relative to the project root
    pub path: String,
    pub content: String,
}

/// A proposed remediation for exactly one violation, annotated by the
/// analysis pipeline. Lives only within the iteration that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixCandidate {
    /// The violation this candidate remediates (1:1)
    pub violation: Violation,
    /// Replacement text for the violating line
    pub replacement: String,
    /// Additional files to create, if any
    #[serde(default)]
    pub extra_files: Vec<GeneratedFile>,
    /// Fix generator confidence in [0, 1]
    pub confidence: f64,
    /// Validator verdict
    pub verdict: Verdict,
    /// Validator overall-quality score in [0, 100]
    pub validation_score: f64,
    /// Security checker rating
    pub security_rating: SecurityRating,
    /// Vulnerabilities the security checker found in the proposed fix
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
}

impl FixCandidate {
    /// Short identity string for logs and the apply log
    pub fn describe(&self) -> String {
        format!(
            "{}:{} [{}]",
            self.violation.file, self.violation.line, self.violation.rule
        )
    }
}

/// Outcome of one loop iteration, persisted in the run summary
#[derive(Debug, Clone, Serialize)]
pub struct Iteration {
    /// Iteration index (1-indexed)
    pub index: u32,
    /// Violation count before fixes were applied
    pub violations_before: usize,
    /// Violation count after re-audit
    pub violations_after: usize,
    /// Number of admitted fixes attempted
    pub fixes_attempted: usize,
    /// Number of fixes that applied successfully
    pub fixes_succeeded: usize,
}

/// Per-candidate apply outcome, persisted in the apply log
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    pub file: String,
    pub line: u32,
    pub rule: String,
    pub success: bool,
    /// Error detail when success is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
