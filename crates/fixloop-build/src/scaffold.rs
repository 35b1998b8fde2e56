use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::BuildError;

lazy_static! {
    static ref PACKAGE_DECL: Regex =
        Regex::new(r"(?m)^\s*package\s+(?P<name>[\w.]+)\s*;").unwrap();
}

/// A test class with a slot for one candidate method.
///
/// The candidate goes right before the class's final closing brace and the
/// result is written to `test_file` inside the project.
#[derive(Debug, Clone)]
pub struct TestScaffold {
    source: String,
    test_file: PathBuf,
    class_name: String,
}

impl TestScaffold {
    pub fn new(source: impl Into<String>, test_file: impl Into<PathBuf>) -> Result<Self, BuildError> {
        let source = source.into();
        let test_file = test_file.into();
        if !source.contains('}') {
            return Err(BuildError::ScaffoldUnbalanced);
        }
        let class_name = test_file
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BuildError::TestFileName(test_file.clone()))?
            .to_string();

        Ok(Self {
            source,
            test_file,
            class_name,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Where the assembled class is written
    pub fn test_file(&self) -> &Path {
        &self.test_file
    }

    /// Simple class name, e.g. `StackTest`
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Fully qualified class name, using the scaffold's package declaration
    pub fn qualified_name(&self) -> String {
        match PACKAGE_DECL.captures(&self.source) {
            Some(caps) => format!("{}.{}", &caps["name"], self.class_name),
            None => self.class_name.clone(),
        }
    }

    /// Insert the candidate method before the last closing brace
    pub fn assemble(&self, method: &str) -> Result<String, BuildError> {
        let pos = self.source.rfind('}').ok_or(BuildError::ScaffoldUnbalanced)?;
        let mut assembled = String::with_capacity(self.source.len() + method.len() + 2);
        assembled.push_str(&self.source[..pos]);
        assembled.push('\n');
        assembled.push_str(method);
        assembled.push('\n');
        assembled.push_str(&self.source[pos..]);
        Ok(assembled)
    }
}

/// An assembled test class on disk.
///
/// When dropped, a file that existed before is restored to its previous
/// bytes and a file created here is removed.
pub(crate) struct PlacedTestFile {
    path: PathBuf,
    previous: Option<Vec<u8>>,
}

impl PlacedTestFile {
    pub(crate) fn write(path: PathBuf, contents: &str) -> Result<Self, BuildError> {
        let previous = match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        debug!(
            path = %path.display(),
            replaced = previous.is_some(),
            "Wrote test file"
        );
        Ok(Self { path, previous })
    }
}

impl Drop for PlacedTestFile {
    fn drop(&mut self) {
        let result = match self.previous.take() {
            Some(bytes) => std::fs::write(&self.path, bytes),
            None => match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "Failed to clean up test file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCAFFOLD: &str = "package com.example.stack;\n\nimport org.junit.Test;\n\npublic class StackTest {\n    private Stack stack = new Stack();\n}\n";

    #[test]
    fn test_assemble_inserts_before_last_brace() {
        let scaffold = TestScaffold::new(SCAFFOLD, "src/test/java/com/example/stack/StackTest.java").unwrap();
        let assembled = scaffold
            .assemble("    @Test\n    public void testPush() {}")
            .unwrap();
        assert!(assembled.ends_with(
            "    private Stack stack = new Stack();\n\n    @Test\n    public void testPush() {}\n}\n"
        ));
    }

    #[test]
    fn test_names() {
        let scaffold = TestScaffold::new(SCAFFOLD, "src/test/java/com/example/stack/StackTest.java").unwrap();
        assert_eq!(scaffold.class_name(), "StackTest");
        assert_eq!(scaffold.qualified_name(), "com.example.stack.StackTest");

        let default_package = TestScaffold::new("public class T {}", "T.java").unwrap();
        assert_eq!(default_package.qualified_name(), "T");
    }

    #[test]
    fn test_placed_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src/test/java/T.java");
        {
            let _placed = PlacedTestFile::write(path.clone(), "class T {}").unwrap();
            assert_eq!(std::fs::read_to_string(&path).unwrap(), "class T {}");
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_existing_file_restored_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src/test/java/T.java");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "class T { void existing() {} }").unwrap();
        {
            let _placed = PlacedTestFile::write(path.clone(), "class T {}").unwrap();
            assert_eq!(std::fs::read_to_string(&path).unwrap(), "class T {}");
        }
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "class T { void existing() {} }"
        );
    }

    #[test]
    fn test_scaffold_without_brace_rejected() {
        assert!(matches!(
            TestScaffold::new("public class Broken", "Broken.java"),
            Err(BuildError::ScaffoldUnbalanced)
        ));
    }
}
