//! Project configuration file support for fixloop.
//!
//! Loads configuration from `fixloop.toml` in the project directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fixloop_agent::FixPhase;
use fixloop_core::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_EXAMPLES};

/// Project-level configuration loaded from `fixloop.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Generator backend: "agent" or "ollama"
    pub generator: Option<String>,
    /// Coding agent used by the "agent" backend
    pub agent: Option<String>,
    /// Model passed to the generator
    pub model: Option<String>,
    /// Ollama chat endpoint
    pub ollama_url: Option<String>,
    /// Upper bound on one generator call, in seconds
    pub generator_timeout_secs: Option<u64>,
    /// Upper bound on one validation, in seconds
    pub validator_timeout_secs: Option<u64>,
    /// JDK used for builds
    pub java_home: Option<PathBuf>,
    /// Limits for the compile loop
    #[serde(default)]
    pub compile: LoopSection,
    /// Limits for the runtime loop
    #[serde(default)]
    pub runtime: LoopSection,
}

/// Limits for one loop variant
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoopSection {
    pub max_attempts: Option<usize>,
    pub max_examples: Option<usize>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "fixloop.toml";

impl ProjectConfig {
    /// Load configuration from the project directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(project_dir: &Path) -> Result<Option<Self>> {
        let config_path = project_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    fn section(&self, phase: FixPhase) -> &LoopSection {
        match phase {
            FixPhase::Compile => &self.compile,
            FixPhase::Runtime => &self.runtime,
        }
    }
}

/// Attempt and example limits after merging all sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLimits {
    pub max_attempts: usize,
    pub max_examples: usize,
}

impl LoopLimits {
    /// Priority: CLI flag > [compile]/[runtime] section > built-in default
    pub fn resolve(
        cli_attempts: Option<usize>,
        cli_examples: Option<usize>,
        config: Option<&ProjectConfig>,
        phase: FixPhase,
    ) -> Self {
        let section = config.map(|c| c.section(phase));
        Self {
            max_attempts: cli_attempts
                .or_else(|| section.and_then(|s| s.max_attempts))
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            max_examples: cli_examples
                .or_else(|| section.and_then(|s| s.max_examples))
                .unwrap_or(DEFAULT_MAX_EXAMPLES),
        }
    }
}

/// Pick a CLI value over the config value
pub fn prefer<T>(
    cli: Option<T>,
    config: Option<&ProjectConfig>,
    get: impl Fn(&ProjectConfig) -> Option<T>,
) -> Option<T> {
    cli.or_else(|| config.and_then(get))
}

/// Seconds from the CLI or config as a timeout
pub fn timeout_secs(
    cli: Option<u64>,
    config: Option<&ProjectConfig>,
    get: impl Fn(&ProjectConfig) -> Option<u64>,
) -> Option<Duration> {
    prefer(cli, config, get).map(Duration::from_secs)
}
