use std::path::{Path, PathBuf};
use tracing::debug;

use fixloop_core::BuildTool;

use crate::BuildError;

/// Detect the build tool of a project root. Gradle markers win over `pom.xml`.
pub fn detect_build_tool(project: &Path) -> Result<BuildTool, BuildError> {
    let gradle = ["build.gradle", "build.gradle.kts", "gradlew"]
        .iter()
        .any(|marker| project.join(marker).exists());

    let tool = if gradle {
        BuildTool::Gradle
    } else if project.join("pom.xml").exists() {
        BuildTool::Maven
    } else {
        return Err(BuildError::NotDetected(project.to_path_buf()));
    };

    debug!(project = %project.display(), tool = %tool, "Detected build tool");
    Ok(tool)
}

/// The Gradle executable for a project: the wrapper when present
pub fn gradle_command(project: &Path) -> PathBuf {
    let wrapper = project.join("gradlew");
    if wrapper.is_file() {
        wrapper
    } else {
        PathBuf::from("gradle")
    }
}
