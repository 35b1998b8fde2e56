use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::{Agent, AgentConfig, AgentError, AgentOutput, AgentType, ProcessSpawner};

/// Claude Code agent implementation
pub struct ClaudeCodeAgent {
    binary_path: PathBuf,
}

impl ClaudeCodeAgent {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("claude"),
        }
    }

    pub fn with_binary_path(path: PathBuf) -> Self {
        Self { binary_path: path }
    }

    fn build_args<'a>(prompt: &'a str, config: &'a AgentConfig) -> Vec<&'a str> {
        let mut args = vec![
            "--print",                        // Non-interactive mode, output only
            "--dangerously-skip-permissions", // Skip permission prompts
        ];
        if let Some(model) = config.model.as_deref() {
            args.push("--model");
            args.push(model);
        }
        // Prompts may start with '-'
        args.push("--");
        args.push(prompt);
        args
    }
}

impl Default for ClaudeCodeAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ClaudeCodeAgent {
    fn name(&self) -> &str {
        "Claude Code"
    }

    fn agent_type(&self) -> AgentType {
        AgentType::ClaudeCode
    }

    fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn execute(&self, prompt: &str, config: &AgentConfig) -> Result<AgentOutput, AgentError> {
        debug!(agent = self.name(), prompt_len = prompt.len(), "Executing agent");
        let args = Self::build_args(prompt, config);
        ProcessSpawner::spawn(&self.binary_path, &args, config).await
    }
}
