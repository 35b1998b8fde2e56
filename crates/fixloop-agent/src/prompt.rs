use fixloop_core::FixRequest;

/// Which validation the candidate is failing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixPhase {
    Compile,
    Runtime,
}

impl FixPhase {
    fn error_heading(&self) -> &'static str {
        match self {
            FixPhase::Compile => "COMPILER ERRORS",
            FixPhase::Runtime => "TEST FAILURES",
        }
    }

    fn task(&self) -> &'static str {
        match self {
            FixPhase::Compile => "so that the test file compiles",
            FixPhase::Runtime => "so that the test runs without errors",
        }
    }
}

/// Renders a [`FixRequest`] as a plain-text prompt.
///
/// The response contract is the same for every generator: one JSON object
/// with a `code` key and an optional `diagnosis`.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    phase: FixPhase,
    scaffold: Option<String>,
    class_under_test: Option<String>,
}

impl PromptBuilder {
    pub fn new(phase: FixPhase) -> Self {
        Self {
            phase,
            scaffold: None,
            class_under_test: None,
        }
    }

    /// Test class the candidate method is inserted into
    pub fn with_scaffold(mut self, scaffold: impl Into<String>) -> Self {
        self.scaffold = Some(scaffold.into());
        self
    }

    pub fn with_class_under_test(mut self, source: impl Into<String>) -> Self {
        self.class_under_test = Some(source.into());
        self
    }

    pub fn system_message(&self) -> &'static str {
        "You are a senior Java unit-testing specialist."
    }

    pub fn render(&self, request: &FixRequest<'_>) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "Attempt {} of {}. Return a corrected version of the test method below {}.\n\n",
            request.attempt,
            request.max_attempts,
            self.phase.task()
        ));

        if let Some(source) = &self.class_under_test {
            out.push_str("=== CLASS UNDER TEST (REFERENCE ONLY) ===\n");
            push_fenced(&mut out, source);
        }

        if let Some(scaffold) = &self.scaffold {
            out.push_str("=== TEST CLASS (the method is inserted before the final brace) ===\n");
            push_fenced(&mut out, scaffold);
        }

        out.push_str("=== FAILING TEST METHOD ===\n");
        push_fenced(&mut out, request.candidate.content());

        out.push_str(&format!(
            "=== {} ({}) ===\n",
            self.phase.error_heading(),
            request.report.describe_count()
        ));
        for message in request.report.messages() {
            out.push_str("- ");
            out.push_str(message);
            out.push('\n');
        }
        out.push('\n');

        if let Some(diagnosis) = request.diagnosis {
            out.push_str("=== PREVIOUS DIAGNOSIS ===\n");
            out.push_str(diagnosis);
            out.push_str("\n\n");
        }

        if !request.examples.is_empty() {
            out.push_str("=== WORKING TEST METHODS (REFERENCE ONLY, do not reuse their names) ===\n");
            for (idx, example) in request.examples.iter().enumerate() {
                out.push_str(&format!("- Example {}:\n", example_label(idx)));
                push_fenced(&mut out, example.content());
            }
        }

        out.push_str("=== INSTRUCTIONS ===\n");
        out.push_str("1. Change only the test method. Keep its name, imports and setup untouched.\n");
        out.push_str("2. Answer with a single JSON object and nothing else:\n");
        out.push_str(
            "   {\"code\": \"<the full corrected test method>\", \"diagnosis\": \"<one or two sentences on the root cause>\"}\n",
        );
        out
    }
}

fn push_fenced(out: &mut String, body: &str) {
    out.push_str("```java\n");
    out.push_str(body.trim_end());
    out.push_str("\n```\n\n");
}

/// A, B, C, ... then AA, AB, ...
fn example_label(idx: usize) -> String {
    let mut n = idx;
    let mut label = String::new();
    loop {
        label.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    label
}
