use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use fixloop_core::ValidatorError;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("No build system detected in {0} (expected build.gradle, build.gradle.kts, gradlew or pom.xml)")]
    NotDetected(PathBuf),

    #[error("Scaffold has no closing brace")]
    ScaffoldUnbalanced,

    #[error("Cannot derive a test class name from {0}")]
    TestFileName(PathBuf),

    #[error("Build command timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BuildError> for ValidatorError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Timeout(limit) => ValidatorError::Timeout(limit),
            BuildError::Io(e) => ValidatorError::Io(e),
            other => ValidatorError::Setup(other.to_string()),
        }
    }
}
