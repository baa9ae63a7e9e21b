use anyhow::Context;
use serde::Deserialize;
use std::fs;

/// Default config file content written by `fixpoint init`
pub const DEFAULT_CONFIG: &str = r#"# fixpoint configuration

[run]
# Maximum remediation loop iterations before giving up
max_iterations = 5
# Informational batch size echoed in the run summary
batch_size = 10
# Apply admitted fixes without asking for confirmation
auto_apply = false
# Snapshot the working tree before each apply pass
create_backups = true
# Compute and report fixes without mutating any file
dry_run = false
# Minimum fix generator confidence (0 to 1) for admission
min_confidence = 0.8
# Minimum validator score (0 to 100) for admission in strict mode
min_security_score = 80.0
# Strict mode: verdict, score, confidence, rating and vulnerabilities
# must all pass. When false only verdict and confidence are checked.
require_all_gates = true
# Continue applying fixes even when the backup snapshot failed
apply_without_backup = false
# Pause after applying fixes, before re-auditing (filesystem settle)
settle_ms = 500
# Pause between loop iterations
iteration_pause_ms = 1000
# Hard timeout for the auditor and each pipeline stage
stage_timeout_secs = 300

[audit]
# External auditor command; must print a JSON violation array on stdout
command = ["audit-tool", "--format", "json"]

# Analysis stages, run in order. Each receives the artifact as JSON on
# stdin and must print the transformed artifact on stdout.
[[pipeline.stages]]
name = "analyzer"
command = ["fixpoint-analyze"]

[[pipeline.stages]]
name = "fix-generator"
command = ["fixpoint-generate"]

[[pipeline.stages]]
name = "validator"
command = ["fixpoint-validate"]

[[pipeline.stages]]
name = "security-checker"
command = ["fixpoint-security"]

[[pipeline.stages]]
name = "report-integrator"
command = ["fixpoint-report"]

[backup]
# Where snapshots land, relative to the project root
dir = ".fixpoint/backups"
# Paths never carried into snapshots
exclude = ["target/**", "node_modules/**", ".git/**", ".fixpoint/**"]

[report]
# Where per-run artifacts (audit.json, pipeline.json, apply-log.json) land
dir = ".fixpoint/reports"
"#;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    pub audit: AuditConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RunConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Informational only; echoed in the run summary
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub auto_apply: bool,
    #[serde(default = "default_create_backups")]
    pub create_backups: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_min_security_score")]
    pub min_security_score: f64,
    #[serde(default = "default_require_all_gates")]
    pub require_all_gates: bool,
    /// Opt-in to the legacy behavior of continuing after a failed backup
    #[serde(default)]
    pub apply_without_backup: bool,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_iteration_pause_ms")]
    pub iteration_pause_ms: u64,
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            batch_size: default_batch_size(),
            auto_apply: false,
            create_backups: default_create_backups(),
            dry_run: false,
            min_confidence: default_min_confidence(),
            min_security_score: default_min_security_score(),
            require_all_gates: default_require_all_gates(),
            apply_without_backup: false,
            settle_ms: default_settle_ms(),
            iteration_pause_ms: default_iteration_pause_ms(),
            stage_timeout_secs: default_stage_timeout_secs(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct AuditConfig {
    /// Auditor argv; must print a JSON violation array on stdout
    pub command: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PipelineConfig {
    pub stages: Vec<StageConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StageConfig {
    pub name: String,
    pub command: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BackupConfig {
    #[serde(default = "default_backup_dir")]
    pub dir: String,
    #[serde(default = "default_backup_exclude")]
    pub exclude: Vec<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            exclude: default_backup_exclude(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_report_dir")]
    pub dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: default_report_dir(),
        }
    }
}

fn default_max_iterations() -> u32 {
    5
}

fn default_batch_size() -> usize {
    10
}

fn default_create_backups() -> bool {
    true
}

fn default_min_confidence() -> f64 {
    0.8
}

fn default_min_security_score() -> f64 {
    80.0
}

fn default_require_all_gates() -> bool {
    true
}

fn default_settle_ms() -> u64 {
    500
}

fn default_iteration_pause_ms() -> u64 {
    1000
}

fn default_stage_timeout_secs() -> u64 {
    300
}

fn default_backup_dir() -> String {
    ".fixpoint/backups".into()
}

fn default_backup_exclude() -> Vec<String> {
    vec![
        "target/**".into(),
        "node_modules/**".into(),
        ".git/**".into(),
        ".fixpoint/**".into(),
    ]
}

fn default_report_dir() -> String {
    ".fixpoint/reports".into()
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
        let config = toml::from_str(&content).with_context(|| format!("parsing {}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.run.max_iterations, 5);
        assert_eq!(config.pipeline.stages.len(), 5);
        assert_eq!(config.pipeline.stages[0].name, "analyzer");
        assert!(config.run.create_backups);
        assert!(!config.run.apply_without_backup);
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
            [audit]
            command = ["audit-tool"]

            [[pipeline.stages]]
            name = "analyzer"
            command = ["analyze"]
            "#,
        )
        .unwrap();
        assert_eq!(config.run.max_iterations, 5);
        assert_eq!(config.run.min_confidence, 0.8);
        assert_eq!(config.run.min_security_score, 80.0);
        assert!(config.run.require_all_gates);
        assert_eq!(config.backup.dir, ".fixpoint/backups");
        assert_eq!(config.report.dir, ".fixpoint/reports");
        assert!(config.backup.exclude.contains(&".git/**".to_string()));
    }

    #[test]
    fn test_missing_audit_section_is_an_error() {
        let result: Result<Config, _> = toml::from_str("[run]\nmax_iterations = 3\n");
        assert!(result.is_err());
    }
}
