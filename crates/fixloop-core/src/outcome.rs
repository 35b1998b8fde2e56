use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::{Attempt, Candidate, ErrorReport};

/// Terminal status of a repair run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStatus {
    /// The returned candidate passed validation
    Succeeded,
    /// The attempt budget ran out; the returned candidate is the least broken
    Exhausted,
    /// Stopped by the caller between attempts
    Cancelled,
}

impl FixStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixStatus::Succeeded => "succeeded",
            FixStatus::Exhausted => "exhausted",
            FixStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FixStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The final outcome of a repair run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixResult {
    pub status: FixStatus,
    pub candidate: Candidate,
    pub report: ErrorReport,
    pub attempts_used: usize,
    pub baseline: ErrorReport,
    #[serde(skip)]
    pub attempts: Vec<Attempt>,
    pub total_duration_secs: f64,
}

impl FixResult {
    pub fn new(
        status: FixStatus,
        candidate: Candidate,
        report: ErrorReport,
        attempts_used: usize,
        baseline: ErrorReport,
        attempts: Vec<Attempt>,
        duration: Duration,
    ) -> Self {
        Self {
            status,
            candidate,
            report,
            attempts_used,
            baseline,
            attempts,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FixStatus::Succeeded
    }

    pub fn exit_code(&self) -> i32 {
        match self.status {
            FixStatus::Succeeded => 0,
            FixStatus::Exhausted => 1,
            FixStatus::Cancelled => 130,
        }
    }
}
