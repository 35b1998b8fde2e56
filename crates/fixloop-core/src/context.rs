use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::model::{Attempt, Candidate, ErrorReport};
use crate::tracker::CandidateTracker;

pub const DEFAULT_MAX_ATTEMPTS: usize = 7;
pub const DEFAULT_MAX_EXAMPLES: usize = 3;

/// Per-run limits for the repair loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixLoopConfig {
    /// Attempt budget; must be at least 1
    pub max_attempts: usize,
    /// How many prior examples accompany each generator request
    pub max_examples: usize,
    /// Upper bound on a single generator call (None = no limit)
    pub generator_timeout: Option<Duration>,
    /// Upper bound on a single validation (None = no limit)
    pub validator_timeout: Option<Duration>,
}

impl Default for FixLoopConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_examples: DEFAULT_MAX_EXAMPLES,
            generator_timeout: None,
            validator_timeout: None,
        }
    }
}

impl FixLoopConfig {
    pub fn new(max_attempts: usize, max_examples: usize) -> Self {
        Self {
            max_attempts,
            max_examples,
            ..Default::default()
        }
    }

    pub fn with_generator_timeout(mut self, timeout: Duration) -> Self {
        self.generator_timeout = Some(timeout);
        self
    }

    pub fn with_validator_timeout(mut self, timeout: Duration) -> Self {
        self.validator_timeout = Some(timeout);
        self
    }
}

/// State owned by a single `run()` call
#[derive(Debug)]
pub struct LoopState {
    pub tracker: CandidateTracker,
    pub attempts_used: usize,
    pub max_attempts: usize,
    /// Audit trail of every attempt
    pub history: Vec<Attempt>,
    started_at: Instant,
}

impl LoopState {
    pub fn new(seed: Candidate, baseline: ErrorReport, max_attempts: usize) -> Self {
        Self {
            tracker: CandidateTracker::new(seed, baseline),
            attempts_used: 0,
            max_attempts,
            history: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn push_attempt(&mut self, attempt: Attempt) {
        self.attempts_used = attempt.index;
        self.history.push(attempt);
    }

    pub fn has_budget(&self) -> bool {
        self.attempts_used < self.max_attempts
    }

    pub fn next_attempt(&self) -> usize {
        self.attempts_used + 1
    }

    pub fn total_duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}
