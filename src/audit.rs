use crate::types::Violation;
use crate::util::{self, CommandError};
use async_trait::async_trait;
use tracing::{debug, info};

/// Audit stage failure. Fatal to the run.
#[derive(Debug)]
pub struct AuditError(pub String);

impl std::fmt::Display for AuditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "audit failed: {}", self.0)
    }
}

impl std::error::Error for AuditError {}

/// Scans the codebase and reports current rule violations.
/// The detection rules themselves are the collaborator's business.
#[async_trait]
pub trait Auditor: Send + Sync {
    async fn audit_once(&self) -> Result<Vec<Violation>, AuditError>;
}

/// Auditor backed by an external command printing a JSON violation array
/// on stdout.
pub struct CommandAuditor {
    command: Vec<String>,
    timeout_secs: u64,
}

impl CommandAuditor {
    pub fn new(command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            command,
            timeout_secs,
        }
    }
}

#[async_trait]
impl Auditor for CommandAuditor {
    async fn audit_once(&self) -> Result<Vec<Violation>, AuditError> {
        debug!("Running auditor: {:?}", self.command);
        let stdout = util::run_command(&self.command, None, self.timeout_secs)
            .await
            .map_err(|e| match e {
                CommandError::Timeout(secs) => {
                    AuditError(format!("auditor timed out after {} seconds", secs))
                }
                other => AuditError(other.to_string()),
            })?;

        let violations: Vec<Violation> = serde_json::from_str(&stdout)
            .map_err(|e| AuditError(format!("malformed auditor output: {}", e)))?;
        info!("Audit found {} violations", violations.len());
        Ok(violations)
    }
}
