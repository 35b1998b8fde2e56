use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The artifact under repair.
///
/// The loop never interprets the content. Each attempt produces a new value;
/// `attempt` records where it came from (0 for the seed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    content: String,
    attempt: usize,
}

impl Candidate {
    /// The caller-supplied starting artifact
    pub fn seed(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attempt: 0,
        }
    }

    /// A candidate produced by the given attempt
    pub fn from_attempt(content: impl Into<String>, attempt: usize) -> Self {
        Self {
            content: content.into(),
            attempt,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Attempt index that produced this candidate (0 = seed)
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    pub fn is_seed(&self) -> bool {
        self.attempt == 0
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

/// Normalized outcome of one validation.
///
/// Only the extractor (and the synthetic failure constructors below) build
/// these. `succeeded` holds exactly when `count == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    count: usize,
    messages: Vec<String>,
    succeeded: bool,
}

/// Error count used for validations that could not produce a real report
pub const SYNTHETIC_FAILURE_COUNT: usize = usize::MAX;

impl ErrorReport {
    pub fn success() -> Self {
        Self {
            count: 0,
            messages: Vec::new(),
            succeeded: true,
        }
    }

    /// Build a failed report from distinct messages.
    ///
    /// `count` is raised to at least the number of messages and at least 1,
    /// so a failed run can never look like a success.
    pub fn failed(messages: Vec<String>, count: usize) -> Self {
        let mut distinct: Vec<String> = Vec::with_capacity(messages.len());
        for message in messages {
            if !distinct.contains(&message) {
                distinct.push(message);
            }
        }
        let count = count.max(distinct.len()).max(1);
        Self {
            count,
            messages: distinct,
            succeeded: false,
        }
    }

    /// Report for a validation that timed out or could not run at all
    pub fn synthetic_failure(reason: impl Into<String>) -> Self {
        Self {
            count: SYNTHETIC_FAILURE_COUNT,
            messages: vec![reason.into()],
            succeeded: false,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn is_synthetic(&self) -> bool {
        self.count == SYNTHETIC_FAILURE_COUNT
    }

    /// Compare by error count only. Lower is better; equal counts compare equal.
    pub fn compare(&self, other: &ErrorReport) -> Ordering {
        self.count.cmp(&other.count)
    }

    pub fn is_better_than(&self, other: &ErrorReport) -> bool {
        self.compare(other) == Ordering::Less
    }

    /// Short human-readable count for logs
    pub fn describe_count(&self) -> String {
        if self.succeeded {
            "0 errors".to_string()
        } else if self.is_synthetic() {
            "no result".to_string()
        } else if self.count == 1 {
            "1 error".to_string()
        } else {
            format!("{} errors", self.count)
        }
    }
}

/// How an attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Generator produced nothing usable; no validation ran
    NoResponse,
    /// Strictly fewer errors than the best so far
    Improved,
    /// Equal or more errors than the best so far
    Rejected,
    /// Validation passed
    Succeeded,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::NoResponse => "no_response",
            AttemptOutcome::Improved => "improved",
            AttemptOutcome::Rejected => "rejected",
            AttemptOutcome::Succeeded => "succeeded",
        }
    }
}

/// Audit record of one loop iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based attempt index
    pub index: usize,
    /// Candidate produced by the generator, if any
    pub candidate: Option<Candidate>,
    /// Report of validating `candidate`, if it was validated
    pub report: Option<ErrorReport>,
    /// Whether the tracker took this candidate as its new best
    pub generator_accepted: bool,
    pub outcome: AttemptOutcome,
    /// Free-form note the generator attached to its proposal
    pub diagnosis: Option<String>,
    pub duration_secs: f64,
}
