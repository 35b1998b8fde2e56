//! Turns raw build/test tool output into an [`ErrorReport`].
//!
//! Three output formats are recognized: Maven compiler output, Gradle (javac)
//! compiler output, and test-execution failures from either tool. Everything
//! here is a pure function of its inputs.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::model::ErrorReport;
use crate::traits::RawOutcome;

/// Which parsing rules apply to a validator's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Maven compiler plugin output
    Maven,
    /// Gradle / javac output
    Gradle,
    /// Test execution output (either build tool)
    Runtime,
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolKind::Maven => write!(f, "maven"),
            ToolKind::Gradle => write!(f, "gradle"),
            ToolKind::Runtime => write!(f, "runtime"),
        }
    }
}

/// Supported build systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildTool {
    Maven,
    Gradle,
}

impl BuildTool {
    /// Extractor rules for this tool's compiler output
    pub fn compile_kind(&self) -> ToolKind {
        match self {
            BuildTool::Maven => ToolKind::Maven,
            BuildTool::Gradle => ToolKind::Gradle,
        }
    }
}

impl std::fmt::Display for BuildTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildTool::Maven => write!(f, "maven"),
            BuildTool::Gradle => write!(f, "gradle"),
        }
    }
}

impl std::str::FromStr for BuildTool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "maven" | "mvn" => Ok(BuildTool::Maven),
            "gradle" | "gradlew" => Ok(BuildTool::Gradle),
            _ => Err(format!("Unknown build tool: {}", s)),
        }
    }
}

/// Category of a failed test execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The test ran and an assertion did not hold
    AssertionFailure,
    /// The test threw before reaching its assertions
    RuntimeError,
}

/// Message used when a failed run has no recognizable diagnostics at all
pub const GENERIC_FAILURE_MESSAGE: &str = "validation failed without recognizable diagnostics";

lazy_static! {
    static ref ANSI_ESCAPE: Regex = Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").unwrap();
    static ref MAVEN_DIAGNOSTIC: Regex = Regex::new(
        r"^\[ERROR\]\s+(?P<path>\S+?\.java):\[(?P<line>\d+),(?P<col>\d+)\]\s+(?:error:\s+)?(?P<msg>.+)$"
    )
    .unwrap();
    static ref GRADLE_DIAGNOSTIC: Regex =
        Regex::new(r"^(?P<path>\S+?\.java):(?P<line>\d+):\s+error:\s+(?P<msg>.+)$").unwrap();
    static ref ERROR_SUMMARY: Regex =
        Regex::new(r"(?mi)^(?:\[(?:INFO|ERROR)\]\s+)?(?P<n>\d+)\s+errors?\s*$").unwrap();
    static ref MAVEN_COMPILATION_ERROR: Regex =
        Regex::new(r"(?m)^\[ERROR\] COMPILATION ERROR :\s*$").unwrap();
    static ref EXCEPTION_LINE: Regex = Regex::new(
        r"^(?:Caused by:\s+)?(?P<exc>(?:[A-Za-z_$][\w$]*\.)+[A-Z][\w$]*(?:Exception|Error|Failure|Throwable))(?P<rest>:\s.*|\s+at\s+\S+)?$"
    )
    .unwrap();
    static ref GRADLE_TEST_FAILED: Regex = Regex::new(r"^\S+\s+>\s+.+\s+FAILED$").unwrap();
    static ref MAVEN_TEST_FAILED: Regex = Regex::new(r"<<<\s+(?:ERROR|FAILURE)!").unwrap();
    static ref MAVEN_TEST_SUMMARY: Regex =
        Regex::new(r"(?i)tests run:\s*\d+,\s*failures:\s*(?P<f>\d+),\s*errors:\s*(?P<e>\d+)").unwrap();
}

/// Stateless parser for validator output
pub struct ErrorExtractor;

impl ErrorExtractor {
    /// Normalize one validation outcome.
    ///
    /// A successful exit short-circuits to a clean report. A failed exit
    /// always yields a failed report, falling back to a generic message when
    /// nothing recognizable is found.
    pub fn extract(outcome: &RawOutcome, kind: ToolKind) -> ErrorReport {
        if outcome.exit_indicates_success {
            return ErrorReport::success();
        }

        let text = strip_ansi(&outcome.raw_text);
        let messages = match kind {
            ToolKind::Maven => maven_diagnostics(&text),
            ToolKind::Gradle => gradle_diagnostics(&text),
            ToolKind::Runtime => runtime_diagnostics(&text),
        };

        if !messages.is_empty() {
            debug!(kind = %kind, count = messages.len(), "Extracted diagnostics");
            let count = messages.len();
            return ErrorReport::failed(messages, count);
        }

        let summary = error_summary_count(&text).unwrap_or(1);
        let fallback = fallback_line(&text).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
        debug!(kind = %kind, summary, "No recognizable diagnostics, using fallback");
        ErrorReport::failed(vec![fallback], summary)
    }
}

/// Remove ANSI colour and cursor sequences
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn maven_diagnostics(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for line in text.lines().map(str::trim_end) {
        let Some(caps) = MAVEN_DIAGNOSTIC.captures(line) else {
            continue;
        };
        let message = format!(
            "{}:[{},{}] {}",
            file_name(&caps["path"]),
            &caps["line"],
            &caps["col"],
            caps["msg"].trim()
        );
        if seen.insert(message.clone()) {
            out.push(message);
        }
    }
    out
}

fn gradle_diagnostics(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for line in text.lines().map(str::trim) {
        let Some(caps) = GRADLE_DIAGNOSTIC.captures(line) else {
            continue;
        };
        let message = format!(
            "{}:{}: {}",
            file_name(&caps["path"]),
            &caps["line"],
            caps["msg"].trim()
        );
        if seen.insert(message.clone()) {
            out.push(message);
        }
    }
    out
}

fn runtime_diagnostics(text: &str) -> Vec<String> {
    // A runtime validation whose edit no longer compiles reports compiler errors
    if looks_like_compilation_failure(text) {
        let mut compile = maven_diagnostics(text);
        compile.extend(gradle_diagnostics(text));
        if !compile.is_empty() {
            return compile;
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut in_failure = false;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        let line = line.strip_prefix("[ERROR]").map(str::trim).unwrap_or(line);

        // Maven's own goal failure and `-e` trace follow the test report
        if line.starts_with("Failed to execute goal") || line.ends_with("BUILD FAILURE") {
            in_failure = false;
            continue;
        }

        if GRADLE_TEST_FAILED.is_match(line)
            || (MAVEN_TEST_FAILED.is_match(line) && !MAVEN_TEST_SUMMARY.is_match(line))
        {
            in_failure = true;
            continue;
        }

        // Stack frames repeat across identical failures
        if line.starts_with("at ") || line.starts_with("...") {
            continue;
        }

        let is_cause = line.starts_with("Caused by:");
        if !(in_failure || is_cause) {
            continue;
        }

        if let Some(caps) = EXCEPTION_LINE.captures(line) {
            if is_build_tool_exception(&caps["exc"]) {
                continue;
            }
            let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
            let message = format!("{}{}", &caps["exc"], rest.trim_end());
            if seen.insert(message.clone()) {
                out.push(message);
            }
        }
    }

    if out.is_empty() {
        if let Some(line) = text
            .lines()
            .map(str::trim)
            .find(|l| l.to_lowercase().contains("timed out after"))
        {
            out.push(line.to_string());
        }
    }

    out
}

fn is_build_tool_exception(name: &str) -> bool {
    name.starts_with("org.apache.maven.") || name.starts_with("org.gradle.")
}

fn looks_like_compilation_failure(text: &str) -> bool {
    let lower = text.to_lowercase();
    MAVEN_COMPILATION_ERROR.is_match(text)
        || lower.contains("compilation failure")
        || lower.contains("compilation failed")
        || lower.contains("compilation error")
}

fn error_summary_count(text: &str) -> Option<usize> {
    ERROR_SUMMARY
        .captures(text)
        .and_then(|caps| caps["n"].parse::<usize>().ok())
}

fn fallback_line(text: &str) -> Option<String> {
    for line in text.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("[ERROR]") {
            let rest = rest.trim();
            if rest.is_empty() || rest.starts_with("->") || rest.starts_with("Re-run Maven") {
                continue;
            }
            return Some(rest.to_string());
        }
        if line.starts_with("FAILURE:") || line.to_lowercase().contains("error:") {
            return Some(line.to_string());
        }
    }
    None
}

/// Whether build output shows a compiler failure rather than a test failure
pub fn is_compilation_failure(raw_text: &str, build: BuildTool) -> bool {
    let text = strip_ansi(raw_text);
    match build {
        BuildTool::Maven => {
            if text.contains("BUILD SUCCESS") {
                return false;
            }
            if looks_like_compilation_failure(&text) || !maven_diagnostics(&text).is_empty() {
                return true;
            }
        }
        BuildTool::Gradle => {
            if text.contains("BUILD SUCCESSFUL") {
                return false;
            }
            if looks_like_compilation_failure(&text) || !gradle_diagnostics(&text).is_empty() {
                return true;
            }
        }
    }
    error_summary_count(&text).is_some_and(|n| n > 0)
}

fn is_assertion_exception(name: &str) -> bool {
    name.ends_with("AssertionError")
        || name.ends_with("AssertionFailedError")
        || name.ends_with("ComparisonFailure")
}

/// Classify a failed test run.
///
/// Maven separates the two cases in its `Failures:` / `Errors:` counters.
/// Gradle prints the thrown exception under the `FAILED` line; an assertion
/// error only counts as a runtime error when a non-assertion cause follows.
pub fn categorize_failure(raw_text: &str, build: BuildTool) -> FailureKind {
    let text = strip_ansi(raw_text);
    let lines: Vec<&str> = text.lines().collect();

    match build {
        BuildTool::Maven => {
            for line in &lines {
                if let Some(caps) = MAVEN_TEST_SUMMARY.captures(line) {
                    let failures: usize = caps["f"].parse().unwrap_or(0);
                    let errors: usize = caps["e"].parse().unwrap_or(0);
                    if errors > 0 {
                        return FailureKind::RuntimeError;
                    }
                    if failures > 0 {
                        return FailureKind::AssertionFailure;
                    }
                }
            }
        }
        BuildTool::Gradle => {
            for (i, line) in lines.iter().enumerate() {
                if !GRADLE_TEST_FAILED.is_match(line.trim()) {
                    continue;
                }
                let Some(next) = lines.get(i + 1).map(|l| l.trim()) else {
                    return FailureKind::AssertionFailure;
                };
                let Some(caps) = EXCEPTION_LINE.captures(next) else {
                    return FailureKind::AssertionFailure;
                };
                let exc = &caps["exc"];
                if !is_assertion_exception(exc) {
                    return FailureKind::RuntimeError;
                }
                let runtime_cause = lines
                    .iter()
                    .skip(i + 2)
                    .take(2)
                    .map(|l| l.trim())
                    .filter(|l| l.starts_with("Caused by:"))
                    .filter_map(|l| EXCEPTION_LINE.captures(l))
                    .any(|c| !is_assertion_exception(&c["exc"]));
                return if runtime_cause {
                    FailureKind::RuntimeError
                } else {
                    FailureKind::AssertionFailure
                };
            }
        }
    }

    let lower = text.to_lowercase();
    if lower.contains("assertionerror") || lower.contains("expected:") || lower.contains("but was:") {
        return FailureKind::AssertionFailure;
    }
    let runtime_markers = [
        "nullpointerexception",
        "illegalargumentexception",
        "illegalstateexception",
        "runtimeexception",
        "parseexception",
        "missingmethodinvocationexception",
    ];
    if runtime_markers.iter().any(|m| lower.contains(m)) {
        return FailureKind::RuntimeError;
    }
    FailureKind::AssertionFailure
}
