use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fixloop_agent::{
    Agent, AgentConfig, AgentError, AgentGenerator, AgentOutput, AgentType, FixPhase,
    OllamaGenerator, PromptBuilder,
};
use fixloop_core::{Candidate, ErrorReport, FixRequest, Generator, GeneratorError, GeneratorResponse};
use mockito::{Matcher, Server};

/// Agent that replays a canned process result and remembers the prompt
struct CannedAgent {
    result: Mutex<Option<Result<AgentOutput, AgentError>>>,
    prompt: Mutex<String>,
    path: PathBuf,
}

impl CannedAgent {
    fn new(result: Result<AgentOutput, AgentError>) -> Self {
        Self {
            result: Mutex::new(Some(result)),
            prompt: Mutex::new(String::new()),
            path: PathBuf::from("canned"),
        }
    }

    fn exited(stdout: &str, exit_code: i32) -> Self {
        Self::new(Ok(AgentOutput::new(
            stdout.to_string(),
            String::new(),
            exit_code,
            Duration::from_millis(5),
        )))
    }
}

#[async_trait]
impl Agent for CannedAgent {
    fn name(&self) -> &str {
        "Canned"
    }

    fn agent_type(&self) -> AgentType {
        AgentType::ClaudeCode
    }

    async fn execute(&self, prompt: &str, _config: &AgentConfig) -> Result<AgentOutput, AgentError> {
        *self.prompt.lock().unwrap() = prompt.to_string();
        self.result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(AgentError::ExecutionFailed("called twice".to_string())))
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn binary_path(&self) -> &Path {
        &self.path
    }
}

struct Fixture {
    candidate: Candidate,
    report: ErrorReport,
}

impl Fixture {
    fn new() -> Self {
        Self {
            candidate: Candidate::seed("@Test\npublic void testPop() { stack.pop() }"),
            report: ErrorReport::failed(vec!["StackTest.java:[12,28] ';' expected".to_string()], 1),
        }
    }

    fn request(&self) -> FixRequest<'_> {
        FixRequest {
            candidate: &self.candidate,
            report: &self.report,
            examples: &[],
            diagnosis: None,
            attempt: 1,
            max_attempts: 7,
        }
    }
}

fn generator(agent: CannedAgent) -> AgentGenerator {
    AgentGenerator::new(
        Box::new(agent),
        AgentConfig::default(),
        PromptBuilder::new(FixPhase::Compile),
    )
}

#[tokio::test]
async fn test_agent_json_answer_becomes_proposal() {
    let fixture = Fixture::new();
    let generator = generator(CannedAgent::exited(
        r#"{"code": "@Test\npublic void testPop() { stack.pop(); }", "diagnosis": "missing semicolon"}"#,
        0,
    ));

    let response = generator.propose(fixture.request()).await.unwrap();

    match response {
        GeneratorResponse::Proposal(p) => {
            assert_eq!(p.content, "@Test\npublic void testPop() { stack.pop(); }");
            assert_eq!(p.diagnosis.as_deref(), Some("missing semicolon"));
        }
        GeneratorResponse::NoResponse => panic!("expected a proposal"),
    }
    assert_eq!(generator.name(), "Canned");
}

#[tokio::test]
async fn test_agent_failure_exit_is_no_response() {
    let fixture = Fixture::new();
    let generator = generator(CannedAgent::exited(r#"{"code": "void t() { x(); }"}"#, 2));

    let response = generator.propose(fixture.request()).await.unwrap();

    assert_eq!(response, GeneratorResponse::NoResponse);
}

#[tokio::test]
async fn test_agent_timeout_maps_to_generator_timeout() {
    let fixture = Fixture::new();
    let generator = generator(CannedAgent::new(Err(AgentError::Timeout(Duration::from_secs(
        90,
    )))));

    let err = generator.propose(fixture.request()).await.unwrap_err();

    assert!(matches!(err, GeneratorError::Timeout(d) if d == Duration::from_secs(90)));
}

#[tokio::test]
async fn test_agent_missing_binary_is_unavailable() {
    let fixture = Fixture::new();
    let generator = generator(CannedAgent::new(Err(AgentError::NotFound("claude".to_string()))));

    let err = generator.propose(fixture.request()).await.unwrap_err();

    assert!(matches!(err, GeneratorError::Unavailable(_)));
}

fn ollama(server: &Server) -> OllamaGenerator {
    OllamaGenerator::new(
        format!("{}/api/chat", server.url()),
        "qwen2.5-coder",
        Some(Duration::from_secs(5)),
        PromptBuilder::new(FixPhase::Runtime),
    )
    .unwrap()
}

#[tokio::test]
async fn test_ollama_structured_answer() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "qwen2.5-coder",
            "stream": false,
            "options": { "num_ctx": 32000 }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!({
                "message": {
                    "role": "assistant",
                    "content": "{\"code\": \"@Test\\nvoid t() { assertTrue(ok()); }\", \"diagnosis\": \"stub was null\"}"
                },
                "done": true
            })
            .to_string(),
        )
        .create_async()
        .await;

    let fixture = Fixture::new();
    let response = ollama(&server).propose(fixture.request()).await.unwrap();

    match response {
        GeneratorResponse::Proposal(p) => {
            assert_eq!(p.content, "@Test\nvoid t() { assertTrue(ok()); }");
            assert_eq!(p.diagnosis.as_deref(), Some("stub was null"));
        }
        GeneratorResponse::NoResponse => panic!("expected a proposal"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ollama_empty_content_is_no_response() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(r#"{"message": {"role": "assistant", "content": ""}, "done": true}"#)
        .create_async()
        .await;

    let fixture = Fixture::new();
    let response = ollama(&server).propose(fixture.request()).await.unwrap();

    assert_eq!(response, GeneratorResponse::NoResponse);
}

#[tokio::test]
async fn test_ollama_http_error_is_failure() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/chat")
        .with_status(500)
        .with_body("model not loaded")
        .create_async()
        .await;

    let fixture = Fixture::new();
    let err = ollama(&server).propose(fixture.request()).await.unwrap_err();

    match err {
        GeneratorError::Failed(message) => assert!(message.contains("model not loaded")),
        other => panic!("unexpected error: {}", other),
    }
}
