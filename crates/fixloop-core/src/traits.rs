use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::ToolKind;
use crate::model::{Candidate, ErrorReport};

/// Errors a generator can report. The loop treats all of them as "no response".
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Generator timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Generator unavailable: {0}")]
    Unavailable(String),

    #[error("Generator failed: {0}")]
    Failed(String),
}

/// Errors a validator can report. The loop records them as a synthetic failure.
#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("Validation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Failed to run validation: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation failed to start: {0}")]
    Setup(String),
}

/// Everything a generator is given for one attempt
#[derive(Debug, Clone)]
pub struct FixRequest<'a> {
    /// The best candidate so far
    pub candidate: &'a Candidate,
    /// Its validation report
    pub report: &'a ErrorReport,
    /// Up to `max_examples` previously working artifacts, oldest first
    pub examples: &'a [Candidate],
    /// Diagnosis attached to the best candidate, if any
    pub diagnosis: Option<&'a str>,
    /// 1-based attempt index
    pub attempt: usize,
    pub max_attempts: usize,
}

/// A generator's proposed replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub content: String,
    #[serde(default)]
    pub diagnosis: Option<String>,
}

impl Proposal {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            diagnosis: None,
        }
    }

    pub fn with_diagnosis(mut self, diagnosis: impl Into<String>) -> Self {
        self.diagnosis = Some(diagnosis.into());
        self
    }

    /// Produce the candidate for the given attempt
    pub fn apply(&self, attempt: usize) -> Candidate {
        Candidate::from_attempt(self.content.clone(), attempt)
    }
}

/// Generator output: a proposal, or nothing usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorResponse {
    Proposal(Proposal),
    NoResponse,
}

/// Raw result of one validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutcome {
    pub exit_indicates_success: bool,
    pub raw_text: String,
}

impl RawOutcome {
    pub fn new(exit_indicates_success: bool, raw_text: impl Into<String>) -> Self {
        Self {
            exit_indicates_success,
            raw_text: raw_text.into(),
        }
    }
}

/// Proposes fixes for a failing candidate
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable name (e.g., "Claude Code", "Ollama")
    fn name(&self) -> &str;

    async fn propose(&self, request: FixRequest<'_>) -> Result<GeneratorResponse, GeneratorError>;
}

/// Compiles or runs a candidate
#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    /// Extractor rules for this validator's output
    fn tool_kind(&self) -> ToolKind;

    async fn validate(&self, candidate: &Candidate) -> Result<RawOutcome, ValidatorError>;
}
