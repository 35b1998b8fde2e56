#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use fixloop_build::{BuildProject, CompileValidator, RuntimeValidator, TestScaffold};
use fixloop_core::{
    BuildTool, Candidate, ErrorExtractor, ToolKind, Validator, ValidatorError,
};
use tempfile::TempDir;

const TEST_FILE: &str = "src/test/java/com/example/StackTest.java";

const SCAFFOLD: &str = "package com.example;\n\nimport org.junit.Test;\n\npublic class StackTest {\n}\n";

/// A Gradle wrapper stand-in that inspects the placed test file
const FAKE_GRADLEW: &str = r#"#!/bin/sh
FILE=src/test/java/com/example/StackTest.java
if [ ! -f "$FILE" ]; then
  echo "test file missing" >&2
  exit 2
fi
case "$1" in
  compileTestJava)
    if grep -q BROKEN "$FILE"; then
      echo "> Task :compileTestJava FAILED"
      echo "$FILE:7: error: cannot find symbol BROKEN" >&2
      echo "$FILE:8: error: ';' expected" >&2
      echo "2 errors" >&2
      echo "BUILD FAILED in 1s"
      exit 1
    fi
    echo "BUILD SUCCESSFUL in 1s"
    ;;
  test)
    if grep -q ASSERT "$FILE"; then
      echo "StackTest > testPop FAILED"
      echo "    java.lang.AssertionError: expected:<1> but was:<2>"
      echo "1 test completed, 1 failed"
      echo "BUILD FAILED in 2s"
      exit 1
    fi
    if grep -q NPE "$FILE"; then
      echo "StackTest > testPop FAILED"
      echo "    java.lang.NullPointerException: Cannot invoke \"Stack.pop()\" because \"stack\" is null"
      echo "        at com.example.StackTest.testPop(StackTest.java:9)"
      echo "1 test completed, 1 failed"
      echo "BUILD FAILED in 2s"
      exit 1
    fi
    if grep -q NOTESTS "$FILE"; then
      echo "FAILURE: Build failed with an exception." >&2
      echo "* What went wrong:" >&2
      echo "Execution failed for task ':test'." >&2
      echo "> No tests found for given includes: [com.example.StackTest](--tests filter)" >&2
      echo "BUILD FAILED in 1s"
      exit 1
    fi
    if grep -q SLOW "$FILE"; then
      sleep 10
    fi
    echo "BUILD SUCCESSFUL in 2s"
    ;;
esac
"#;

fn gradle_project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("build.gradle"), "plugins { id 'java' }\n").unwrap();
    let wrapper = dir.path().join("gradlew");
    std::fs::write(&wrapper, FAKE_GRADLEW).unwrap();
    std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755)).unwrap();
    dir
}

fn scaffold() -> TestScaffold {
    TestScaffold::new(SCAFFOLD, TEST_FILE).unwrap()
}

fn method(body: &str) -> Candidate {
    Candidate::seed(format!(
        "    @Test\n    public void testPop() {{\n        {}\n    }}",
        body
    ))
}

fn test_file_exists(root: &Path) -> bool {
    root.join(TEST_FILE).exists()
}

#[tokio::test]
async fn test_compile_validator_reports_diagnostics() {
    let dir = gradle_project();
    let project = BuildProject::detect(dir.path()).unwrap();
    assert_eq!(project.tool(), BuildTool::Gradle);
    let validator = CompileValidator::new(project, scaffold());
    assert_eq!(validator.tool_kind(), ToolKind::Gradle);

    let raw = validator.validate(&method("BROKEN;")).await.unwrap();

    assert!(!raw.exit_indicates_success);
    assert!(raw.raw_text.starts_with("STDOUT:\n"));
    let report = ErrorExtractor::extract(&raw, validator.tool_kind());
    assert_eq!(report.count(), 2);
    assert_eq!(
        report.messages()[0],
        "StackTest.java:7: cannot find symbol BROKEN"
    );
    assert!(!test_file_exists(dir.path()));
}

#[tokio::test]
async fn test_compile_validator_success_removes_file() {
    let dir = gradle_project();
    let project = BuildProject::detect(dir.path()).unwrap();
    let validator = CompileValidator::new(project, scaffold());

    let raw = validator.validate(&method("stack.push(1);")).await.unwrap();

    assert!(raw.exit_indicates_success);
    assert!(ErrorExtractor::extract(&raw, ToolKind::Gradle).succeeded());
    assert!(!test_file_exists(dir.path()));
}

#[tokio::test]
async fn test_runtime_validator_assertion_failure_counts_as_pass() {
    let dir = gradle_project();
    let project = BuildProject::detect(dir.path()).unwrap();
    let validator = RuntimeValidator::new(project, scaffold());

    let raw = validator.validate(&method("// ASSERT")).await.unwrap();

    assert!(raw.exit_indicates_success);
    assert!(!test_file_exists(dir.path()));
}

#[tokio::test]
async fn test_runtime_validator_no_tests_run_is_failure() {
    let dir = gradle_project();
    let project = BuildProject::detect(dir.path()).unwrap();
    let validator = RuntimeValidator::new(project, scaffold());

    let raw = validator.validate(&method("// NOTESTS")).await.unwrap();

    assert!(!raw.exit_indicates_success);
    let report = ErrorExtractor::extract(&raw, ToolKind::Runtime);
    assert!(!report.succeeded());
}

#[tokio::test]
async fn test_compile_validator_restores_existing_test_file() {
    let dir = gradle_project();
    let existing = dir.path().join(TEST_FILE);
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    let original = "package com.example;\n\npublic class StackTest {\n    // hand-written tests\n}\n";
    std::fs::write(&existing, original).unwrap();

    let project = BuildProject::detect(dir.path()).unwrap();
    let validator = CompileValidator::new(project, scaffold());
    let raw = validator.validate(&method("BROKEN;")).await.unwrap();

    assert!(!raw.exit_indicates_success);
    assert_eq!(std::fs::read_to_string(&existing).unwrap(), original);
}

#[tokio::test]
async fn test_runtime_validator_strict_assertions() {
    let dir = gradle_project();
    let project = BuildProject::detect(dir.path()).unwrap();
    let validator =
        RuntimeValidator::new(project, scaffold()).with_assertion_failure_passes(false);

    let raw = validator.validate(&method("// ASSERT")).await.unwrap();

    assert!(!raw.exit_indicates_success);
    let report = ErrorExtractor::extract(&raw, ToolKind::Runtime);
    assert_eq!(
        report.messages(),
        &["java.lang.AssertionError: expected:<1> but was:<2>".to_string()]
    );
}

#[tokio::test]
async fn test_runtime_validator_runtime_error_fails() {
    let dir = gradle_project();
    let project = BuildProject::detect(dir.path()).unwrap();
    let validator = RuntimeValidator::new(project, scaffold());
    assert_eq!(validator.tool_kind(), ToolKind::Runtime);

    let raw = validator.validate(&method("// NPE")).await.unwrap();

    assert!(!raw.exit_indicates_success);
    let report = ErrorExtractor::extract(&raw, ToolKind::Runtime);
    assert_eq!(report.count(), 1);
    assert!(report.messages()[0].starts_with("java.lang.NullPointerException"));
}

#[tokio::test]
async fn test_runtime_validator_timeout_is_failed_run() {
    let dir = gradle_project();
    let project = BuildProject::detect(dir.path())
        .unwrap()
        .with_timeout(Duration::from_millis(200));
    let validator = RuntimeValidator::new(project, scaffold());

    let raw = validator.validate(&method("// SLOW")).await.unwrap();

    assert!(!raw.exit_indicates_success);
    assert!(raw.raw_text.contains("timed out after"));
    assert!(!test_file_exists(dir.path()));
}

#[tokio::test]
async fn test_compile_timeout_is_validator_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let wrapper = dir.path().join("gradlew");
    std::fs::write(&wrapper, "#!/bin/sh\nsleep 10\n").unwrap();
    std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755)).unwrap();
    let project = BuildProject::new(dir.path(), BuildTool::Gradle)
        .with_timeout(Duration::from_millis(200));
    let validator = CompileValidator::new(project, scaffold());

    let err = validator.validate(&method("x();")).await.unwrap_err();

    assert!(matches!(err, ValidatorError::Timeout(_)));
    assert!(!test_file_exists(dir.path()));
}
