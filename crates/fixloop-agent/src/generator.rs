use async_trait::async_trait;
use tracing::{debug, warn};

use fixloop_core::{FixRequest, Generator, GeneratorError, GeneratorResponse};

use crate::prompt::PromptBuilder;
use crate::response::parse_response;
use crate::{Agent, AgentConfig, AgentError};

/// [`Generator`] backed by a coding-agent CLI
pub struct AgentGenerator {
    agent: Box<dyn Agent>,
    config: AgentConfig,
    prompt: PromptBuilder,
}

impl AgentGenerator {
    pub fn new(agent: Box<dyn Agent>, config: AgentConfig, prompt: PromptBuilder) -> Self {
        Self {
            agent,
            config,
            prompt,
        }
    }

    pub fn agent(&self) -> &dyn Agent {
        self.agent.as_ref()
    }
}

impl From<AgentError> for GeneratorError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Timeout(limit) => GeneratorError::Timeout(limit),
            AgentError::NotFound(path) => GeneratorError::Unavailable(path),
            other => GeneratorError::Failed(other.to_string()),
        }
    }
}

#[async_trait]
impl Generator for AgentGenerator {
    fn name(&self) -> &str {
        self.agent.name()
    }

    async fn propose(&self, request: FixRequest<'_>) -> Result<GeneratorResponse, GeneratorError> {
        let prompt = format!(
            "{}\n\n{}",
            self.prompt.system_message(),
            self.prompt.render(&request)
        );
        let output = self.agent.execute(&prompt, &self.config).await?;

        if !output.success() {
            warn!(
                agent = self.agent.name(),
                exit_code = output.exit_code,
                stderr = output.stderr_tail().unwrap_or(""),
                "Agent exited with failure"
            );
            return Ok(GeneratorResponse::NoResponse);
        }

        debug!(
            attempt = request.attempt,
            duration_ms = output.duration.as_millis(),
            "Agent responded"
        );
        Ok(parse_response(&output.stdout))
    }
}
