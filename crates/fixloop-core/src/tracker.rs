use tracing::debug;

use crate::model::{Candidate, ErrorReport};

/// Holds the best candidate seen so far.
///
/// A candidate replaces the current best only with strictly fewer errors, or
/// when it passed validation. Among equal counts the earliest one is kept.
///
/// The diagnosis handed to the generator is the one from the latest accepted
/// candidate that had one. Until such a candidate exists, the first diagnosis
/// offered is kept, even when its candidate was rejected.
#[derive(Debug, Clone)]
pub struct CandidateTracker {
    best: Candidate,
    best_report: ErrorReport,
    best_diagnosis: Option<String>,
}

impl CandidateTracker {
    pub fn new(seed: Candidate, seed_report: ErrorReport) -> Self {
        Self {
            best: seed,
            best_report: seed_report,
            best_diagnosis: None,
        }
    }

    /// Offer a validated candidate. Returns whether it became the new best.
    pub fn offer(&mut self, candidate: Candidate, report: ErrorReport) -> bool {
        self.offer_with_diagnosis(candidate, report, None)
    }

    pub fn offer_with_diagnosis(
        &mut self,
        candidate: Candidate,
        report: ErrorReport,
        diagnosis: Option<String>,
    ) -> bool {
        let accepted = report.succeeded() || report.is_better_than(&self.best_report);
        debug!(
            attempt = candidate.attempt(),
            count = report.count(),
            best_count = self.best_report.count(),
            accepted,
            "Candidate offered"
        );
        if accepted {
            self.best = candidate;
            self.best_report = report;
            if diagnosis.is_some() {
                self.best_diagnosis = diagnosis;
            }
        } else if self.best_diagnosis.is_none() {
            // First diagnosis seen, even from a rejected candidate
            self.best_diagnosis = diagnosis;
        }
        accepted
    }

    pub fn best(&self) -> (&Candidate, &ErrorReport) {
        (&self.best, &self.best_report)
    }

    pub fn best_report(&self) -> &ErrorReport {
        &self.best_report
    }

    pub fn best_diagnosis(&self) -> Option<&str> {
        self.best_diagnosis.as_deref()
    }

    pub fn into_best(self) -> (Candidate, ErrorReport) {
        (self.best, self.best_report)
    }
}
