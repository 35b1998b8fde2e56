//! # fixloop-core
//!
//! The bounded repair loop: validate a seed, ask a [`Generator`] for fixes,
//! validate each proposal with a [`Validator`] and keep the least broken
//! candidate seen.
//!
//! ## Key Types
//!
//! - [`LoopRunner`] - Drives one repair session
//! - [`ErrorExtractor`] - Turns raw build/test output into an [`ErrorReport`]
//! - [`CandidateTracker`] - Best-so-far with strict-improvement replacement
//! - [`FixResult`] - Final status, candidate and attempts used

mod context;
mod error;
mod extract;
mod loop_runner;
mod model;
mod outcome;
mod tracker;
mod traits;

pub use context::{FixLoopConfig, LoopState, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_EXAMPLES};
pub use error::LoopError;
pub use extract::{
    categorize_failure, is_compilation_failure, strip_ansi, BuildTool, ErrorExtractor,
    FailureKind, ToolKind, GENERIC_FAILURE_MESSAGE,
};
pub use loop_runner::LoopRunner;
pub use model::{Attempt, AttemptOutcome, Candidate, ErrorReport, SYNTHETIC_FAILURE_COUNT};
pub use outcome::{FixResult, FixStatus};
pub use tracker::CandidateTracker;
pub use traits::{
    FixRequest, Generator, GeneratorError, GeneratorResponse, Proposal, RawOutcome, Validator,
    ValidatorError,
};
