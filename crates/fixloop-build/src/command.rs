use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use fixloop_core::BuildTool;

use crate::detect::{detect_build_tool, gradle_command};
use crate::scaffold::TestScaffold;
use crate::BuildError;

/// Plugins that fail builds for reasons unrelated to the test under repair
pub const MAVEN_SKIP_FLAGS: &[&str] = &[
    "-Dspotless.check.skip=true",
    "-Dcheckstyle.skip=true",
    "-Dfindbugs.skip=true",
    "-Dpmd.skip=true",
    "-Dspring-javaformat.skip=true",
    "-Dsortpom.skip=true",
    "-Denforcer.skip=true",
];

/// Output of one build tool invocation
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Labelled streams, the layout compiler diagnostics are reported in
    pub fn labelled(&self) -> String {
        format!("STDOUT:\n{}\n\nSTDERR:\n{}", self.stdout, self.stderr)
    }

    /// Both streams joined, the layout test runs are reported in
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// A Java project and how to invoke its build tool
#[derive(Debug, Clone)]
pub struct BuildProject {
    root: PathBuf,
    tool: BuildTool,
    java_home: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl BuildProject {
    pub fn new(root: impl Into<PathBuf>, tool: BuildTool) -> Self {
        Self {
            root: root.into(),
            tool,
            java_home: None,
            timeout: None,
        }
    }

    /// Detect the build tool from the files in `root`
    pub fn detect(root: impl Into<PathBuf>) -> Result<Self, BuildError> {
        let root = root.into();
        let tool = detect_build_tool(&root)?;
        Ok(Self::new(root, tool))
    }

    /// Run the build with this JDK (sets JAVA_HOME, PATH and GRADLE_OPTS)
    pub fn with_java_home(mut self, java_home: impl Into<PathBuf>) -> Self {
        self.java_home = Some(java_home.into());
        self
    }

    /// Kill build commands that run longer than this
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tool(&self) -> BuildTool {
        self.tool
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Absolute location of a project-relative file
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    /// Command compiling main and test sources
    pub fn compile_command(&self) -> (PathBuf, Vec<String>) {
        match self.tool {
            BuildTool::Maven => {
                let mut args = vec![
                    "clean".to_string(),
                    "compile".to_string(),
                    "test-compile".to_string(),
                ];
                args.extend(MAVEN_SKIP_FLAGS.iter().map(|f| f.to_string()));
                (PathBuf::from("mvn"), args)
            }
            BuildTool::Gradle => (
                gradle_command(&self.root),
                vec!["compileTestJava".to_string(), "--no-daemon".to_string()],
            ),
        }
    }

    /// Command running one test class
    pub fn test_command(&self, scaffold: &TestScaffold) -> (PathBuf, Vec<String>) {
        match self.tool {
            BuildTool::Maven => {
                let mut args = vec![
                    "test".to_string(),
                    format!("-Dtest={}", scaffold.class_name()),
                    "-e".to_string(),
                ];
                args.extend(MAVEN_SKIP_FLAGS.iter().map(|f| f.to_string()));
                (PathBuf::from("mvn"), args)
            }
            BuildTool::Gradle => (
                gradle_command(&self.root),
                vec![
                    "test".to_string(),
                    format!("--tests={}", scaffold.qualified_name()),
                    "--stacktrace".to_string(),
                ],
            ),
        }
    }

    /// Run a command in the project root, capturing both streams
    pub async fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput, BuildError> {
        debug!(
            program = %program.display(),
            args = ?args,
            root = %self.root.display(),
            "Running build command"
        );
        let start = Instant::now();

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(java_home) = &self.java_home {
            let bin = java_home.join("bin");
            let path = match std::env::var_os("PATH") {
                Some(existing) => {
                    let mut paths = vec![bin];
                    paths.extend(std::env::split_paths(&existing));
                    std::env::join_paths(paths)
                        .map_err(|e| BuildError::Io(std::io::Error::other(e)))?
                }
                None => bin.into_os_string(),
            };
            cmd.env("JAVA_HOME", java_home)
                .env("PATH", path)
                .env(
                    "GRADLE_OPTS",
                    format!("-Dorg.gradle.java.home={}", java_home.display()),
                );
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| BuildError::Timeout(limit))??,
            None => cmd.output().await?,
        };

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
        };
        debug!(
            exit_code = result.exit_code,
            duration_ms = result.duration.as_millis(),
            "Build command completed"
        );
        Ok(result)
    }
}
