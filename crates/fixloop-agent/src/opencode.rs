use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::{Agent, AgentConfig, AgentError, AgentOutput, AgentType, ProcessSpawner};

/// OpenCode agent implementation
pub struct OpenCodeAgent {
    binary_path: PathBuf,
}

impl OpenCodeAgent {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("opencode"),
        }
    }

    pub fn with_binary_path(path: PathBuf) -> Self {
        Self { binary_path: path }
    }

    fn build_args<'a>(prompt: &'a str, config: &'a AgentConfig) -> Vec<&'a str> {
        // "run" is the non-interactive subcommand
        let mut args = vec!["run"];
        if let Some(model) = config.model.as_deref() {
            args.push("--model");
            args.push(model);
        }
        args.push("--prompt");
        args.push(prompt);
        args
    }
}

impl Default for OpenCodeAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for OpenCodeAgent {
    fn name(&self) -> &str {
        "OpenCode"
    }

    fn agent_type(&self) -> AgentType {
        AgentType::OpenCode
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
