use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use fixloop_logging::{AttemptEntry, LogEvent, Logger, SessionHeader, SessionWriter};

use crate::context::{FixLoopConfig, LoopState};
use crate::error::LoopError;
use crate::extract::ErrorExtractor;
use crate::model::{Attempt, AttemptOutcome, Candidate, ErrorReport};
use crate::outcome::{FixResult, FixStatus};
use crate::traits::{
    FixRequest, Generator, GeneratorError, GeneratorResponse, Proposal, Validator,
    ValidatorError,
};

/// Orchestrates the bounded generate / validate / evaluate loop
pub struct LoopRunner<'a> {
    generator: &'a dyn Generator,
    validator: &'a dyn Validator,
    logger: Arc<Logger>,
    session: Option<Arc<SessionWriter>>,
    examples: Vec<Candidate>,
    interrupted: Arc<AtomicBool>,
}

impl<'a> LoopRunner<'a> {
    pub fn new(
        generator: &'a dyn Generator,
        validator: &'a dyn Validator,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            generator,
            validator,
            logger,
            session: None,
            examples: Vec::new(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Prior working artifacts, most recent last
    pub fn with_examples(mut self, examples: Vec<Candidate>) -> Self {
        self.examples = examples;
        self
    }

    /// Record every attempt to a JSONL session file
    pub fn with_session_writer(mut self, session: Arc<SessionWriter>) -> Self {
        self.session = Some(session);
        self
    }

    /// Get a handle to signal interruption
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Run the repair loop for one seed candidate
    pub async fn run(
        &self,
        seed: Candidate,
        config: &FixLoopConfig,
    ) -> Result<FixResult, LoopError> {
        if config.max_attempts == 0 {
            return Err(LoopError::InvalidConfiguration(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let tool = self.validator.tool_kind();
        self.logger.log(&LogEvent::LoopStarted {
            generator: self.generator.name().to_string(),
            validator: self.validator.name().to_string(),
            tool: tool.to_string(),
            max_attempts: config.max_attempts,
            max_examples: config.max_examples,
        });

        let baseline = self.validate(&seed, config, 0).await;
        self.logger.log(&LogEvent::BaselineValidated {
            error_count: baseline.count(),
            succeeded: baseline.succeeded(),
            first_message: baseline.messages().first().cloned(),
        });
        if let Some(session) = &self.session {
            session.write_start(SessionHeader {
                seed: seed.content(),
                tool: &tool.to_string(),
                generator: self.generator.name(),
                validator: self.validator.name(),
                max_attempts: config.max_attempts,
                max_examples: config.max_examples,
                baseline_error_count: baseline.count(),
            });
        }

        let mut state = LoopState::new(seed, baseline.clone(), config.max_attempts);

        if baseline.succeeded() {
            info!("Seed already passes validation");
            self.logger.log(&LogEvent::LoopSucceeded {
                attempts: 0,
                duration_secs: state.total_duration().as_secs_f64(),
            });
            return Ok(self.finish(state, baseline, FixStatus::Succeeded));
        }

        while state.has_budget() {
            if self.interrupted.load(Ordering::SeqCst) {
                info!(attempts = state.attempts_used, "Loop interrupted by user");
                self.logger.log(&LogEvent::LoopCancelled {
                    attempts: state.attempts_used,
                });
                return Ok(self.finish(state, baseline, FixStatus::Cancelled));
            }

            let attempt = state.next_attempt();
            self.logger.log(&LogEvent::AttemptStarted {
                attempt,
                max_attempts: state.max_attempts,
                best_error_count: state.tracker.best_report().count(),
            });

            let started = Instant::now();
            let Some(proposal) = self.generate(&state, config, attempt).await else {
                self.record(
                    &mut state,
                    Attempt {
                        index: attempt,
                        candidate: None,
                        report: None,
                        generator_accepted: false,
                        outcome: AttemptOutcome::NoResponse,
                        diagnosis: None,
                        duration_secs: started.elapsed().as_secs_f64(),
                    },
                );
                continue;
            };

            let candidate = proposal.apply(attempt);
            let validation_started = Instant::now();
            let report = self.validate(&candidate, config, attempt).await;
            self.logger.log(&LogEvent::CandidateValidated {
                attempt,
                error_count: report.count(),
                succeeded: report.succeeded(),
                duration_secs: validation_started.elapsed().as_secs_f64(),
            });

            let accepted = state.tracker.offer_with_diagnosis(
                candidate.clone(),
                report.clone(),
                proposal.diagnosis.clone(),
            );
            let outcome = if report.succeeded() {
                AttemptOutcome::Succeeded
            } else if accepted {
                AttemptOutcome::Improved
            } else {
                AttemptOutcome::Rejected
            };

            self.logger.log(&LogEvent::AttemptEvaluated {
                attempt,
                outcome: outcome.as_str().to_string(),
                error_count: report.count(),
                best_error_count: state.tracker.best_report().count(),
            });

            self.record(
                &mut state,
                Attempt {
                    index: attempt,
                    candidate: Some(candidate),
                    report: Some(report),
                    generator_accepted: accepted,
                    outcome,
                    diagnosis: proposal.diagnosis,
                    duration_secs: started.elapsed().as_secs_f64(),
                },
            );

            if outcome == AttemptOutcome::Succeeded {
                self.logger.log(&LogEvent::LoopSucceeded {
                    attempts: attempt,
                    duration_secs: state.total_duration().as_secs_f64(),
                });
                return Ok(self.finish(state, baseline, FixStatus::Succeeded));
            }
        }

        self.logger.log(&LogEvent::AttemptsExhausted {
            attempts: state.attempts_used,
            best_error_count: state.tracker.best_report().count(),
        });
        Ok(self.finish(state, baseline, FixStatus::Exhausted))
    }

    /// Ask the generator for a fix of the current best.
    /// Returns None for anything that cannot be validated.
    async fn generate(
        &self,
        state: &LoopState,
        config: &FixLoopConfig,
        attempt: usize,
    ) -> Option<Proposal> {
        let (best, best_report) = state.tracker.best();
        let window_start = self.examples.len().saturating_sub(config.max_examples);
        let request = FixRequest {
            candidate: best,
            report: best_report,
            examples: &self.examples[window_start..],
            diagnosis: state.tracker.best_diagnosis(),
            attempt,
            max_attempts: state.max_attempts,
        };

        debug!(
            attempt,
            basis = best.attempt(),
            best_count = best_report.count(),
            examples = request.examples.len(),
            "Requesting fix"
        );

        let call = self.generator.propose(request);
        let result = match config.generator_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(GeneratorError::Timeout(limit)),
            },
            None => call.await,
        };

        let reason = match result {
            Ok(GeneratorResponse::Proposal(proposal)) if !proposal.content.trim().is_empty() => {
                return Some(proposal);
            }
            Ok(GeneratorResponse::Proposal(_)) => "empty proposal".to_string(),
            Ok(GeneratorResponse::NoResponse) => "no usable response".to_string(),
            Err(e) => {
                warn!(attempt, error = %e, "Generator call failed");
                e.to_string()
            }
        };

        self.logger
            .log(&LogEvent::GeneratorNoResponse { attempt, reason });
        None
    }

    /// Validate a candidate and extract its report. Failures to validate at
    /// all become a synthetic report that never beats a real one.
    async fn validate(
        &self,
        candidate: &Candidate,
        config: &FixLoopConfig,
        attempt: usize,
    ) -> ErrorReport {
        let call = self.validator.validate(candidate);
        let result = match config.validator_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(ValidatorError::Timeout(limit)),
            },
            None => call.await,
        };

        match result {
            Ok(raw) => {
                let report = ErrorExtractor::extract(&raw, self.validator.tool_kind());
                debug!(attempt, count = report.count(), "Candidate validated");
                report
            }
            Err(e) => {
                warn!(attempt, error = %e, "Validation did not complete");
                self.logger.log(&LogEvent::ErrorEncountered {
                    attempt,
                    error: e.to_string(),
                });
                ErrorReport::synthetic_failure(e.to_string())
            }
        }
    }

    fn record(&self, state: &mut LoopState, attempt: Attempt) {
        if let Some(session) = &self.session {
            session.write_attempt(AttemptEntry {
                attempt: attempt.index,
                outcome: attempt.outcome.as_str(),
                accepted: attempt.generator_accepted,
                candidate: attempt.candidate.as_ref().map(|c| c.content()),
                error_count: attempt.report.as_ref().map(|r| r.count()),
                messages: attempt
                    .report
                    .as_ref()
                    .map(|r| r.messages())
                    .unwrap_or_default(),
                diagnosis: attempt.diagnosis.as_deref(),
                duration_secs: attempt.duration_secs,
            });
        }
        state.push_attempt(attempt);
    }

    fn finish(&self, state: LoopState, baseline: ErrorReport, status: FixStatus) -> FixResult {
        let duration = state.total_duration();
        let attempts_used = state.attempts_used;
        let history = state.history;
        let (candidate, report) = state.tracker.into_best();

        if let Some(session) = &self.session {
            session.write_end(
                status.as_str(),
                attempts_used,
                report.count(),
                duration.as_secs_f64(),
            );
        }

        FixResult::new(
            status,
            candidate,
            report,
            attempts_used,
            baseline,
            history,
            duration,
        )
    }
}
