use crate::config::StageConfig;
use crate::types::{FixCandidate, Violation};
use crate::util::{self, CommandError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Typed hand-off flowing through the analysis pipeline. Each stage reads
/// the artifact and returns an enriched one; the last stage is expected to
/// have populated `candidates`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub candidates: Vec<FixCandidate>,
}

impl Artifact {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            violations,
            candidates: Vec::new(),
        }
    }
}

/// Pipeline stage failure. Fatal to the run; the controller never retries
/// and never applies that iteration's candidates.
#[derive(Debug)]
pub enum StageError {
    Failed { stage: String, detail: String },
    Timeout { stage: String, secs: u64 },
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageError::Failed { stage, detail } => {
                write!(f, "stage '{}' failed: {}", stage, detail)
            }
            StageError::Timeout { stage, secs } => {
                write!(f, "stage '{}' timed out after {} seconds", stage, secs)
            }
        }
    }
}

impl std::error::Error for StageError {}

/// One opaque analysis capability (analyzer, fix generator, validator,
/// security checker, report integrator, ...). Stages can run in-process or
/// out-of-process behind this seam.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, artifact: Artifact) -> Result<Artifact, StageError>;
}

/// Stage backed by an external command: the artifact goes in as JSON on
/// stdin, the transformed artifact comes back as JSON on stdout.
pub struct CommandStage {
    name: String,
    command: Vec<String>,
    timeout_secs: u64,
}

impl CommandStage {
    pub fn new(name: impl Into<String>, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            command,
            timeout_secs,
        }
    }
}

#[async_trait]
impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, artifact: Artifact) -> Result<Artifact, StageError> {
        let payload = serde_json::to_vec(&artifact).map_err(|e| StageError::Failed {
            stage: self.name.clone(),
            detail: format!("serializing artifact: {}", e),
        })?;

        let stdout = util::run_command(&self.command, Some(&payload), self.timeout_secs)
            .await
            .map_err(|e| match e {
                CommandError::Timeout(secs) => StageError::Timeout {
                    stage: self.name.clone(),
                    secs,
                },
                other => StageError::Failed {
                    stage: self.name.clone(),
                    detail: other.to_string(),
                },
            })?;

        serde_json::from_str(&stdout).map_err(|e| StageError::Failed {
            stage: self.name.clone(),
            detail: format!("malformed stage output: {}", e),
        })
    }
}

/// Runs stages strictly sequentially, in configured order
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Build command-backed stages from configuration
    pub fn from_config(stages: &[StageConfig], timeout_secs: u64) -> Self {
        let stages = stages
            .iter()
            .map(|s| {
                Box::new(CommandStage::new(s.name.as_str(), s.command.clone(), timeout_secs))
                    as Box<dyn Stage>
            })
            .collect();
        Self::new(stages)
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Feed the artifact through every stage. The first failure stops the
    /// pipeline and surfaces to the caller.
    pub async fn run(&self, mut artifact: Artifact) -> Result<Artifact, StageError> {
        for stage in &self.stages {
            debug!("Running stage '{}'", stage.name());
            let start = std::time::Instant::now();
            artifact = stage.run(artifact).await?;
            info!(
                "Stage '{}' done ({:.2}s): {} violations, {} candidates",
                stage.name(),
                start.elapsed().as_secs_f64(),
                artifact.violations.len(),
                artifact.candidates.len()
            );
        }
        Ok(artifact)
    }
}
