mod config;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;

use fixloop_agent::{
    create_agent, AgentConfig, AgentGenerator, AgentType, FixPhase, OllamaGenerator,
    PromptBuilder, DEFAULT_OLLAMA_URL,
};
use fixloop_build::{BuildProject, CompileValidator, RuntimeValidator, TestScaffold};
use fixloop_core::{
    Candidate, FixLoopConfig, FixResult, FixStatus, Generator, LoopRunner, Validator,
};
use fixloop_logging::{init_tracing, LogFormat, Logger, SessionWriter};

use config::{prefer, timeout_secs, LoopLimits, ProjectConfig};

#[derive(Parser, Debug)]
#[command(
    name = "fixloop",
    about = "Repair a generated test method with a bounded generate-and-validate loop",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Repair a test method until the test class compiles
    Compile(FixArgs),
    /// Repair a test method until the test runs
    Runtime(RuntimeArgs),
}

#[derive(Args, Debug)]
struct FixArgs {
    /// File holding the test method to repair
    #[arg(short, long)]
    candidate: PathBuf,

    /// Test class the method is inserted into (before its final brace)
    #[arg(short, long)]
    scaffold: PathBuf,

    /// Where the assembled test class is written, relative to the project
    #[arg(short = 't', long)]
    test_file: PathBuf,

    /// Project root (default: current directory)
    #[arg(short, long)]
    project: Option<PathBuf>,

    /// Directory of working test methods shown to the generator, in name order
    #[arg(long)]
    examples_dir: Option<PathBuf>,

    /// Source of the class under test, shown to the generator
    #[arg(long)]
    class_under_test: Option<PathBuf>,

    /// Attempt budget (default: 7)
    #[arg(short = 'n', long)]
    max_attempts: Option<usize>,

    /// Examples sent with each request (default: 3)
    #[arg(long)]
    max_examples: Option<usize>,

    /// Generator backend
    #[arg(short, long, value_enum)]
    generator: Option<GeneratorChoice>,

    /// Coding agent for the agent backend
    #[arg(short, long, value_enum)]
    agent: Option<AgentChoice>,

    /// Model to use (if the generator supports it)
    #[arg(short, long)]
    model: Option<String>,

    /// Ollama chat endpoint
    #[arg(long)]
    ollama_url: Option<String>,

    /// Upper bound on one generator call, in seconds
    #[arg(long)]
    generator_timeout: Option<u64>,

    /// Upper bound on one validation, in seconds
    #[arg(long)]
    validator_timeout: Option<u64>,

    /// JDK used for builds
    #[arg(long)]
    java_home: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Also append JSON log lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Debug-level tracing on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Do not write a session file
    #[arg(long)]
    no_session: bool,

    /// Output final result as JSON
    #[arg(long)]
    json_output: bool,

    /// Write the final candidate to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dry run: show what would happen without executing
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct RuntimeArgs {
    #[command(flatten)]
    fix: FixArgs,

    /// Treat a test that only fails an assertion as still failing
    #[arg(long)]
    strict_assertions: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GeneratorChoice {
    Agent,
    Ollama,
}

impl std::str::FromStr for GeneratorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "agent" => Ok(GeneratorChoice::Agent),
            "ollama" => Ok(GeneratorChoice::Ollama),
            _ => Err(format!("Unknown generator: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AgentChoice {
    Claude,
    Opencode,
}

impl From<AgentChoice> for AgentType {
    fn from(choice: AgentChoice) -> Self {
        match choice {
            AgentChoice::Claude => AgentType::ClaudeCode,
            AgentChoice::Opencode => AgentType::OpenCode,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

/// Everything a run needs, merged from CLI flags and `fixloop.toml`
struct Settings {
    phase: FixPhase,
    project: PathBuf,
    limits: LoopLimits,
    loop_config: FixLoopConfig,
    generator: GeneratorChoice,
    agent: AgentType,
    model: Option<String>,
    ollama_url: String,
    java_home: Option<PathBuf>,
    /// Applied to the build process
    validator_timeout: Option<Duration>,
    strict_assertions: bool,
}

impl Settings {
    fn resolve(
        phase: FixPhase,
        args: &FixArgs,
        strict_assertions: bool,
        project: PathBuf,
        config: Option<&ProjectConfig>,
    ) -> Result<Self> {
        let limits = LoopLimits::resolve(args.max_attempts, args.max_examples, config, phase);

        let mut loop_config = FixLoopConfig::new(limits.max_attempts, limits.max_examples);
        if let Some(t) = timeout_secs(args.generator_timeout, config, |c| c.generator_timeout_secs)
        {
            loop_config = loop_config.with_generator_timeout(t);
        }

        let generator: GeneratorChoice = match args.generator {
            Some(choice) => choice,
            None => match config.and_then(|c| c.generator.as_deref()) {
                Some(name) => name.parse().map_err(anyhow::Error::msg)?,
                None => GeneratorChoice::Agent,
            },
        };

        let agent: AgentType = match args.agent {
            Some(choice) => choice.into(),
            None => match config.and_then(|c| c.agent.as_deref()) {
                Some(name) => name.parse().map_err(anyhow::Error::msg)?,
                None => AgentType::ClaudeCode,
            },
        };

        Ok(Self {
            phase,
            project,
            limits,
            loop_config,
            generator,
            agent,
            model: prefer(args.model.clone(), config, |c| c.model.clone()),
            ollama_url: prefer(args.ollama_url.clone(), config, |c| c.ollama_url.clone())
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            java_home: prefer(args.java_home.clone(), config, |c| c.java_home.clone()),
            validator_timeout: timeout_secs(args.validator_timeout, config, |c| {
                c.validator_timeout_secs
            }),
            strict_assertions,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (phase, args, strict_assertions) = match &cli.command {
        Command::Compile(args) => (FixPhase::Compile, args, false),
        Command::Runtime(runtime) => (FixPhase::Runtime, &runtime.fix, runtime.strict_assertions),
    };

    let log_format: LogFormat = args.log_format.into();
    init_tracing(if args.verbose { "debug" } else { "warn" }, log_format);

    let project = match &args.project {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let project_config = ProjectConfig::load(&project)?;
    let settings = Settings::resolve(
        phase,
        args,
        strict_assertions,
        project,
        project_config.as_ref(),
    )?;

    let seed = read_text(&args.candidate, "candidate")?;
    let scaffold_source = read_text(&args.scaffold, "scaffold")?;
    let scaffold = TestScaffold::new(scaffold_source.clone(), args.test_file.clone())
        .with_context(|| format!("Invalid scaffold {}", args.scaffold.display()))?;
    let examples = match &args.examples_dir {
        Some(dir) => load_examples(dir)?,
        None => Vec::new(),
    };

    let mut prompt = PromptBuilder::new(phase).with_scaffold(scaffold_source);
    if let Some(path) = &args.class_under_test {
        prompt = prompt.with_class_under_test(read_text(path, "class under test")?);
    }

    let mut build = BuildProject::detect(&settings.project).with_context(|| {
        format!("Failed to detect build tool in {}", settings.project.display())
    })?;
    if let Some(java_home) = &settings.java_home {
        build = build.with_java_home(java_home);
    }
    if let Some(timeout) = settings.validator_timeout {
        build = build.with_timeout(timeout);
    }

    if args.dry_run {
        print_dry_run(&settings, &build, &scaffold, examples.len());
        return Ok(());
    }

    let validator: Box<dyn Validator> = match phase {
        FixPhase::Compile => Box::new(CompileValidator::new(build, scaffold)),
        FixPhase::Runtime => Box::new(
            RuntimeValidator::new(build, scaffold)
                .with_assertion_failure_passes(!settings.strict_assertions),
        ),
    };
    let generator = create_generator(&settings, prompt).await?;

    let logger = match &args.log_file {
        Some(path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };

    let mut runner = LoopRunner::new(generator.as_ref(), validator.as_ref(), Arc::new(logger))
        .with_examples(examples);

    if !args.no_session {
        match SessionWriter::new(&seed) {
            Ok(session) => {
                tracing::debug!(path = %session.path().display(), "Writing session");
                runner = runner.with_session_writer(Arc::new(session));
            }
            Err(e) => tracing::warn!(error = %e, "Failed to create session file"),
        }
    }

    // Handle Ctrl+C gracefully
    let interrupt_handle = runner.interrupt_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Finishing current attempt...");
        interrupt_handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let result = runner
        .run(Candidate::seed(seed), &settings.loop_config)
        .await?;

    if let Some(path) = &args.output {
        std::fs::write(path, result.candidate.content())
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if args.json_output {
        let json = serde_json::to_string_pretty(&result)?;
        println!("{}", json);
    } else {
        print_outcome(&result);
    }

    std::process::exit(result.exit_code());
}

async fn create_generator(
    settings: &Settings,
    prompt: PromptBuilder,
) -> Result<Box<dyn Generator>> {
    match settings.generator {
        GeneratorChoice::Agent => {
            let agent = create_agent(settings.agent);
            if !agent.is_available().await {
                anyhow::bail!(
                    "Agent '{}' is not available. Make sure it's installed and in PATH.",
                    agent.name()
                );
            }
            let mut config = AgentConfig::new(settings.project.clone());
            if let Some(model) = &settings.model {
                config = config.with_model(model.clone());
            }
            if let Some(timeout) = settings.loop_config.generator_timeout {
                config = config.with_timeout(timeout);
            }
            Ok(Box::new(AgentGenerator::new(agent, config, prompt)))
        }
        GeneratorChoice::Ollama => {
            let model = settings
                .model
                .clone()
                .context("The ollama generator needs --model or `model` in fixloop.toml")?;
            let generator = OllamaGenerator::new(
                settings.ollama_url.clone(),
                model,
                settings.loop_config.generator_timeout,
                prompt,
            )?;
            Ok(Box::new(generator))
        }
    }
}

fn read_text(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file {}", what, path.display()))
}

/// Every `.java` file in the directory, ordered by file name
fn load_examples(dir: &Path) -> Result<Vec<Candidate>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read examples directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "java"))
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            read_text(path, "example").map(|content| Candidate::seed(content.trim_end()))
        })
        .collect()
}

fn print_dry_run(
    settings: &Settings,
    build: &BuildProject,
    scaffold: &TestScaffold,
    examples: usize,
) {
    println!("=== Dry Run ===");
    println!(
        "Loop: {}",
        match settings.phase {
            FixPhase::Compile => "compile",
            FixPhase::Runtime => "runtime",
        }
    );
    println!("Project: {} ({})", build.root().display(), build.tool());
    println!("Test class: {}", scaffold.qualified_name());
    match settings.generator {
        GeneratorChoice::Agent => println!("Generator: agent ({})", settings.agent),
        GeneratorChoice::Ollama => println!("Generator: ollama ({})", settings.ollama_url),
    }
    if let Some(model) = &settings.model {
        println!("Model: {}", model);
    }
    println!("Max attempts: {}", settings.limits.max_attempts);
    println!(
        "Examples: {} available, up to {} per request",
        examples, settings.limits.max_examples
    );
    if settings.phase == FixPhase::Runtime {
        println!(
            "Assertion failures: {}",
            if settings.strict_assertions {
                "fail"
            } else {
                "pass"
            }
        );
    }
}

fn print_outcome(result: &FixResult) {
    eprintln!();
    match result.status {
        FixStatus::Succeeded => {
            eprintln!("{}", "=== SUCCESS ===".bright_green().bold());
            eprintln!("Attempts: {}", result.attempts_used);
        }
        FixStatus::Exhausted => {
            eprintln!("{}", "=== EXHAUSTED ===".bright_yellow().bold());
            eprintln!("Used all {} attempts", result.attempts_used);
            eprintln!(
                "Best candidate: {} (baseline {})",
                result.report.describe_count(),
                result.baseline.describe_count()
            );
            for message in result.report.messages().iter().take(5) {
                eprintln!("  - {}", message);
            }
        }
        FixStatus::Cancelled => {
            eprintln!("{}", "=== INTERRUPTED ===".bright_yellow().bold());
            eprintln!("Stopped after {} attempt(s)", result.attempts_used);
            eprintln!("Best candidate: {}", result.report.describe_count());
        }
    }
    eprintln!("Duration: {:.1}s", result.total_duration_secs);
    if result.candidate.is_seed() {
        eprintln!("Returned candidate: the seed");
    } else {
        eprintln!("Returned candidate: from attempt {}", result.candidate.attempt());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_compile_command() {
        let cli = parse(&[
            "fixloop",
            "compile",
            "--candidate",
            "method.java",
            "--scaffold",
            "StackTest.java",
            "--test-file",
            "src/test/java/StackTest.java",
            "-n",
            "4",
            "--generator",
            "ollama",
            "--model",
            "qwen2.5-coder",
        ]);
        let Command::Compile(args) = cli.command else {
            panic!("expected compile");
        };
        assert_eq!(args.max_attempts, Some(4));
        assert_eq!(args.generator, Some(GeneratorChoice::Ollama));
        assert_eq!(args.model.as_deref(), Some("qwen2.5-coder"));
        assert!(!args.dry_run);
    }

    #[test]
    fn test_parse_runtime_strict() {
        let cli = parse(&[
            "fixloop",
            "runtime",
            "-c",
            "m.java",
            "-s",
            "T.java",
            "-t",
            "src/test/java/T.java",
            "--strict-assertions",
        ]);
        let Command::Runtime(args) = cli.command else {
            panic!("expected runtime");
        };
        assert!(args.strict_assertions);
    }

    #[test]
    fn test_settings_merge_config() {
        let cli = parse(&[
            "fixloop",
            "runtime",
            "-c",
            "m.java",
            "-s",
            "T.java",
            "-t",
            "T.java",
            "--validator-timeout",
            "30",
        ]);
        let Command::Runtime(runtime) = cli.command else {
            panic!("expected runtime");
        };
        let config: ProjectConfig = toml::from_str(
            "generator = \"ollama\"\nagent = \"opencode\"\nmodel = \"llama3\"\n[runtime]\nmax_examples = 1\n",
        )
        .unwrap();

        let settings = Settings::resolve(
            FixPhase::Runtime,
            &runtime.fix,
            false,
            PathBuf::from("/repo"),
            Some(&config),
        )
        .unwrap();

        assert_eq!(settings.generator, GeneratorChoice::Ollama);
        assert_eq!(settings.agent, AgentType::OpenCode);
        assert_eq!(settings.model.as_deref(), Some("llama3"));
        assert_eq!(settings.ollama_url, DEFAULT_OLLAMA_URL);
        assert_eq!(settings.limits.max_examples, 1);
        assert_eq!(settings.loop_config.max_attempts, 7);
        assert_eq!(settings.validator_timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.loop_config.validator_timeout, None);
        assert_eq!(settings.loop_config.generator_timeout, None);
    }

    #[test]
    fn test_bad_generator_in_config() {
        let cli = parse(&["fixloop", "compile", "-c", "m", "-s", "s", "-t", "t"]);
        let Command::Compile(args) = cli.command else {
            panic!("expected compile");
        };
        let config: ProjectConfig = toml::from_str("generator = \"gpt\"\n").unwrap();
        let settings =
            Settings::resolve(FixPhase::Compile, &args, false, PathBuf::from("."), Some(&config));
        assert!(settings.is_err());
    }

    #[test]
    fn test_load_examples_in_name_order() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("02_pop.java"), "void testPop() {}\n").unwrap();
        std::fs::write(dir.path().join("01_push.java"), "void testPush() {}\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let examples = load_examples(dir.path()).unwrap();
        let contents: Vec<&str> = examples.iter().map(|c| c.content()).collect();
        assert_eq!(contents, vec!["void testPush() {}", "void testPop() {}"]);
    }
}
