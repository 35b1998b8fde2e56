//! # fixloop-agent
//!
//! Generators for the repair loop: coding-agent CLIs (Claude Code, OpenCode)
//! spawned as child processes, and an Ollama chat endpoint.

mod claude;
mod generator;
mod ollama;
mod opencode;
mod output;
mod prompt;
mod response;
mod spawner;
mod traits;

pub use claude::ClaudeCodeAgent;
pub use generator::AgentGenerator;
pub use ollama::{OllamaGenerator, DEFAULT_OLLAMA_URL};
pub use opencode::OpenCodeAgent;
pub use output::AgentOutput;
pub use prompt::{FixPhase, PromptBuilder};
pub use response::{is_usable_code, parse_response};
pub use spawner::ProcessSpawner;
pub use traits::{Agent, AgentConfig, AgentError, AgentType};

/// Create an agent by type
pub fn create_agent(agent_type: AgentType) -> Box<dyn Agent> {
    match agent_type {
        AgentType::ClaudeCode => Box::new(ClaudeCodeAgent::new()),
        AgentType::OpenCode => Box::new(OpenCodeAgent::new()),
    }
}
