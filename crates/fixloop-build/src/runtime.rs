use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use fixloop_core::{
    categorize_failure, is_compilation_failure, strip_ansi, BuildTool, Candidate, FailureKind,
    RawOutcome, ToolKind, Validator, ValidatorError,
};

use crate::command::BuildProject;
use crate::scaffold::{PlacedTestFile, TestScaffold};
use crate::BuildError;

lazy_static! {
    static ref MAVEN_SUMMARY: Regex =
        Regex::new(r"Tests run: (?P<run>\d+), Failures: (?P<f>\d+), Errors: (?P<e>\d+)").unwrap();
    static ref GRADLE_SUMMARY: Regex =
        Regex::new(r"(?P<run>\d+) tests? completed, (?P<f>\d+) failed").unwrap();
    static ref GRADLE_TEST_FAILED: Regex = Regex::new(r"^\S+\s+>\s+.+\s+FAILED$").unwrap();
}

/// Runs the test class with the candidate method inserted
pub struct RuntimeValidator {
    project: BuildProject,
    scaffold: TestScaffold,
    assertion_failure_passes: bool,
}

impl RuntimeValidator {
    pub fn new(project: BuildProject, scaffold: TestScaffold) -> Self {
        Self {
            project,
            scaffold,
            assertion_failure_passes: true,
        }
    }

    /// When set (the default), a test that runs and only fails an assertion
    /// counts as passing: the assertion may have found a real bug.
    pub fn with_assertion_failure_passes(mut self, passes: bool) -> Self {
        self.assertion_failure_passes = passes;
        self
    }

    fn accepts_assertion_failure(&self, text: &str) -> bool {
        let tool = self.project.tool();
        self.assertion_failure_passes
            && test_failure_reported(text, tool)
            && !is_compilation_failure(text, tool)
            && categorize_failure(text, tool) == FailureKind::AssertionFailure
    }
}

/// Whether the output shows a test that actually ran and failed, as opposed
/// to a build that stopped before running any test
fn test_failure_reported(output: &str, tool: BuildTool) -> bool {
    let output = strip_ansi(output);
    match tool {
        BuildTool::Gradle => output
            .lines()
            .any(|line| GRADLE_TEST_FAILED.is_match(line.trim())),
        BuildTool::Maven => MAVEN_SUMMARY
            .captures_iter(&output)
            .any(|caps| caps["f"].parse::<usize>().is_ok_and(|f| f > 0)),
    }
}

/// Decide whether a single-class test run passed from its exit status and summary lines
pub fn test_run_passed(exit_ok: bool, output: &str, tool: BuildTool) -> bool {
    let output = strip_ansi(output);
    match tool {
        BuildTool::Gradle => {
            if output.contains("BUILD SUCCESSFUL") && !output.contains("FAILED") {
                return true;
            }
            if let Some(caps) = GRADLE_SUMMARY.captures(&output) {
                return caps["f"].parse::<usize>().map(|f| f == 0).unwrap_or(false);
            }
            if output.contains(" > ") && output.contains(" FAILED") {
                return false;
            }
            exit_ok
        }
        BuildTool::Maven => {
            let mut summaries = MAVEN_SUMMARY.captures_iter(&output).peekable();
            if summaries.peek().is_none() {
                return exit_ok;
            }
            summaries.all(|caps| &caps["f"] == "0" && &caps["e"] == "0")
        }
    }
}

#[async_trait]
impl Validator for RuntimeValidator {
    fn name(&self) -> &str {
        "runtime"
    }

    fn tool_kind(&self) -> ToolKind {
        ToolKind::Runtime
    }

    async fn validate(&self, candidate: &Candidate) -> Result<RawOutcome, ValidatorError> {
        let source = self.scaffold.assemble(candidate.content())?;
        let path = self.project.resolve(self.scaffold.test_file());
        let _placed = PlacedTestFile::write(path, &source)?;

        let (program, args) = self.project.test_command(&self.scaffold);
        let output = match self.project.run(&program, &args).await {
            Ok(output) => output,
            Err(BuildError::Timeout(limit)) => {
                // A hanging test is a failed run, reported like any other
                return Ok(RawOutcome::new(
                    false,
                    format!("Test execution timed out after {} seconds", limit.as_secs()),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let text = output.combined();
        let mut passed = test_run_passed(output.success(), &text, self.project.tool());
        if !passed && self.accepts_assertion_failure(&text) {
            info!(
                attempt = candidate.attempt(),
                "Test runs but fails an assertion, keeping it"
            );
            passed = true;
        }

        debug!(
            attempt = candidate.attempt(),
            exit_code = output.exit_code,
            passed,
            "Test run finished"
        );
        Ok(RawOutcome::new(passed, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradle_build_successful() {
        assert!(test_run_passed(true, "> Task :test\nBUILD SUCCESSFUL in 4s", BuildTool::Gradle));
    }

    #[test]
    fn test_gradle_summary_with_failures() {
        let output = "StackTest > testPop FAILED\n    java.lang.NullPointerException\n1 test completed, 1 failed\nBUILD FAILED in 3s";
        assert!(!test_run_passed(false, output, BuildTool::Gradle));
    }

    #[test]
    fn test_gradle_falls_back_to_exit_status() {
        assert!(!test_run_passed(false, "Could not resolve dependencies", BuildTool::Gradle));
        assert!(test_run_passed(true, "", BuildTool::Gradle));
    }

    #[test]
    fn test_maven_summary() {
        let clean = "[INFO] Tests run: 1, Failures: 0, Errors: 0, Skipped: 0\n[INFO] BUILD SUCCESS";
        assert!(test_run_passed(true, clean, BuildTool::Maven));

        let errored = "[ERROR] Tests run: 1, Failures: 0, Errors: 1, Skipped: 0\n[INFO] BUILD FAILURE";
        assert!(!test_run_passed(false, errored, BuildTool::Maven));
    }

    #[test]
    fn test_failure_reported_needs_a_failed_test() {
        let gradle_failed = "StackTest > testPop FAILED\n    java.lang.AssertionError\nBUILD FAILED";
        assert!(test_failure_reported(gradle_failed, BuildTool::Gradle));

        let no_tests = "FAILURE: Build failed with an exception.\n* What went wrong:\nExecution failed for task ':test'.\n> No tests found for given includes: [com.example.StackTest](--tests filter)\nBUILD FAILED in 1s";
        assert!(!test_failure_reported(no_tests, BuildTool::Gradle));

        let maven_failed = "[ERROR] Tests run: 1, Failures: 1, Errors: 0, Skipped: 0\n[INFO] BUILD FAILURE";
        assert!(test_failure_reported(maven_failed, BuildTool::Maven));

        let maven_deps = "[ERROR] Failed to execute goal on project stack: Could not resolve dependencies\n[INFO] BUILD FAILURE";
        assert!(!test_failure_reported(maven_deps, BuildTool::Maven));
    }

    #[test]
    fn test_maven_without_summary_uses_exit_status() {
        assert!(!test_run_passed(false, "[ERROR] COMPILATION ERROR :", BuildTool::Maven));
    }
}
