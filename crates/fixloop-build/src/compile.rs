use async_trait::async_trait;
use tracing::debug;

use fixloop_core::{is_compilation_failure, Candidate, RawOutcome, ToolKind, Validator, ValidatorError};

use crate::command::BuildProject;
use crate::scaffold::{PlacedTestFile, TestScaffold};

/// Compiles the test class with the candidate method inserted
pub struct CompileValidator {
    project: BuildProject,
    scaffold: TestScaffold,
}

impl CompileValidator {
    pub fn new(project: BuildProject, scaffold: TestScaffold) -> Self {
        Self { project, scaffold }
    }
}

#[async_trait]
impl Validator for CompileValidator {
    fn name(&self) -> &str {
        "compile"
    }

    fn tool_kind(&self) -> ToolKind {
        self.project.tool().compile_kind()
    }

    async fn validate(&self, candidate: &Candidate) -> Result<RawOutcome, ValidatorError> {
        let source = self.scaffold.assemble(candidate.content())?;
        let path = self.project.resolve(self.scaffold.test_file());
        let _placed = PlacedTestFile::write(path, &source)?;

        let (program, args) = self.project.compile_command();
        let output = self.project.run(&program, &args).await?;

        let text = output.labelled();
        let compiled = output.success() && !is_compilation_failure(&text, self.project.tool());
        debug!(
            attempt = candidate.attempt(),
            exit_code = output.exit_code,
            compiled,
            "Compilation finished"
        );
        Ok(RawOutcome::new(compiled, text))
    }
}
