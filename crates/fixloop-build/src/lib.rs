//! # fixloop-build
//!
//! Validators that place a candidate test method into its test class and run
//! Maven or Gradle on the project.
//!
//! - [`CompileValidator`] - compiles main and test sources
//! - [`RuntimeValidator`] - runs the single test class
//!
//! The assembled test file is always removed after each validation.

mod command;
mod compile;
mod detect;
mod error;
mod runtime;
mod scaffold;

pub use command::{BuildProject, CommandOutput, MAVEN_SKIP_FLAGS};
pub use compile::CompileValidator;
pub use detect::{detect_build_tool, gradle_command};
pub use error::BuildError;
pub use runtime::{test_run_passed, RuntimeValidator};
pub use scaffold::TestScaffold;
