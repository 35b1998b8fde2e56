use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Error count used by the loop for validations that produced no real result
const NO_RESULT: usize = usize::MAX;

/// Structured log events for the repair loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    LoopStarted {
        generator: String,
        validator: String,
        tool: String,
        max_attempts: usize,
        max_examples: usize,
    },
    BaselineValidated {
        error_count: usize,
        succeeded: bool,
        first_message: Option<String>,
    },
    AttemptStarted {
        attempt: usize,
        max_attempts: usize,
        best_error_count: usize,
    },
    GeneratorNoResponse {
        attempt: usize,
        reason: String,
    },
    CandidateValidated {
        attempt: usize,
        error_count: usize,
        succeeded: bool,
        duration_secs: f64,
    },
    AttemptEvaluated {
        attempt: usize,
        outcome: String,
        error_count: usize,
        best_error_count: usize,
    },
    LoopSucceeded {
        attempts: usize,
        duration_secs: f64,
    },
    AttemptsExhausted {
        attempts: usize,
        best_error_count: usize,
    },
    LoopCancelled {
        attempts: usize,
    },
    ErrorEncountered {
        attempt: usize,
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

fn count_label(count: usize) -> String {
    match count {
        NO_RESULT => "no result".to_string(),
        1 => "1 error".to_string(),
        n => format!("{} errors", n),
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for repair-loop events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    quiet: bool,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            quiet: false,
            file_writer: None,
        }
    }

    /// A logger that writes nothing to the console
    pub fn silent() -> Self {
        Self {
            format: LogFormat::Compact,
            quiet: true,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            quiet: false,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if self.quiet {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::LoopStarted {
                generator,
                validator,
                tool,
                max_attempts,
                max_examples,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "fixloop".bold().bright_white(),
                    " ".repeat(60) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Generator:".dimmed(),
                    Self::truncate_with_padding(generator, 54, 57).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Validator:".dimmed(),
                    Self::truncate_with_padding(&format!("{} ({})", validator, tool), 54, 57)
                        .dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Budget:".dimmed(),
                    Self::truncate_with_padding(
                        &format!("{} attempts, {} examples", max_attempts, max_examples),
                        57,
                        60
                    )
                    .dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::BaselineValidated {
                error_count,
                succeeded,
                first_message,
            } => {
                if *succeeded {
                    let _ = writeln!(
                        stderr,
                        "  {} Baseline already passes, nothing to fix",
                        "✓".bright_green()
                    );
                } else {
                    let _ = writeln!(
                        stderr,
                        "  {} Baseline: {}",
                        "✗".bright_red(),
                        count_label(*error_count).bright_red()
                    );
                    if let Some(message) = first_message {
                        let _ = writeln!(stderr, "    {} {}", "│".dimmed(), message.dimmed());
                    }
                }
                let _ = writeln!(stderr);
            }
            LogEvent::AttemptStarted {
                attempt,
                max_attempts,
                best_error_count,
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} {}/{} {}",
                    "▶".bright_cyan(),
                    "Fix attempt".bright_cyan().bold(),
                    attempt,
                    max_attempts,
                    format!("(best: {})", count_label(*best_error_count)).dimmed()
                );
            }
            LogEvent::GeneratorNoResponse { reason, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} {}",
                    "⚠".bright_yellow(),
                    format!("No usable response: {}", reason).bright_yellow()
                );
            }
            LogEvent::CandidateValidated {
                error_count,
                succeeded,
                duration_secs,
                ..
            } => {
                if *succeeded {
                    let _ = writeln!(
                        stderr,
                        "    {} Validation passed ({:.1}s)",
                        "✓".bright_green(),
                        duration_secs
                    );
                } else {
                    let _ = writeln!(
                        stderr,
                        "    {} {} ({:.1}s)",
                        "✗".bright_red(),
                        count_label(*error_count),
                        duration_secs
                    );
                }
            }
            LogEvent::AttemptEvaluated {
                outcome,
                error_count,
                best_error_count,
                ..
            } => {
                let styled = match outcome.as_str() {
                    "improved" => format!("↓ Improved to {}", count_label(*error_count))
                        .bright_green()
                        .to_string(),
                    "succeeded" => "✓ Fixed".bright_green().to_string(),
                    "no_response" => format!("→ Still {}", count_label(*best_error_count))
                        .dimmed()
                        .to_string(),
                    _ => format!("→ Still {}", count_label(*best_error_count))
                        .bright_yellow()
                        .to_string(),
                };
                let _ = writeln!(stderr, "    {}", styled);
                let _ = writeln!(stderr);
            }
            LogEvent::LoopSucceeded { .. } => {
                // The final outcome is printed by the binary
            }
            LogEvent::AttemptsExhausted {
                attempts,
                best_error_count,
            } => {
                let _ = writeln!(
                    stderr,
                    "{} Attempt budget exhausted after {} attempts (best: {})",
                    "⚠".bright_yellow(),
                    attempts,
                    count_label(*best_error_count)
                );
            }
            LogEvent::LoopCancelled { attempts } => {
                let _ = writeln!(
                    stderr,
                    "{} Cancelled after {} attempts",
                    "⚠".bright_yellow(),
                    attempts
                );
            }
            LogEvent::ErrorEncountered { attempt, error } => {
                let _ = writeln!(
                    stderr,
                    "    {} Error in attempt {}: {}",
                    "✗".bright_red(),
                    attempt,
                    error.bright_red()
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::LoopStarted {
                tool, max_attempts, ..
            } => format!("[{}] loop:start {} max={}", timestamp, tool, max_attempts),
            LogEvent::BaselineValidated { error_count, .. } => {
                format!("[{}] baseline {}", timestamp, count_label(*error_count))
            }
            LogEvent::AttemptStarted { attempt, .. } => {
                format!("[{}] attempt:start:{}", timestamp, attempt)
            }
            LogEvent::GeneratorNoResponse { attempt, reason } => {
                format!("[{}] attempt:no_response:{} {}", timestamp, attempt, reason)
            }
            LogEvent::CandidateValidated {
                attempt,
                error_count,
                duration_secs,
                ..
            } => format!(
                "[{}] validate:{} {} {:.1}s",
                timestamp,
                attempt,
                count_label(*error_count),
                duration_secs
            ),
            LogEvent::AttemptEvaluated {
                attempt, outcome, ..
            } => format!("[{}] attempt:done:{} {}", timestamp, attempt, outcome),
            LogEvent::LoopSucceeded {
                attempts,
                duration_secs,
            } => format!(
                "[{}] loop:succeeded:{} {:.1}s",
                timestamp, attempts, duration_secs
            ),
            LogEvent::AttemptsExhausted {
                attempts,
                best_error_count,
            } => format!(
                "[{}] loop:exhausted:{} {}",
                timestamp,
                attempts,
                count_label(*best_error_count)
            ),
            LogEvent::LoopCancelled { attempts } => {
                format!("[{}] loop:cancelled:{}", timestamp, attempts)
            }
            LogEvent::ErrorEncountered { attempt, error } => {
                format!("[{}] error:{}:{}", timestamp, attempt, error)
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let truncated = if s.chars().count() > max_len {
            let head: String = s.chars().take(max_len - 3).collect();
            format!("{}...", head)
        } else {
            s.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1);
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = LogEvent::AttemptEvaluated {
            attempt: 2,
            outcome: "rejected".into(),
            error_count: 4,
            best_error_count: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "attempt_evaluated");
        assert_eq!(json["attempt"], 2);
    }

    #[test]
    fn test_file_logging_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("fixloop.jsonl");
        let mut logger = Logger::with_file(LogFormat::Compact, &path).unwrap();
        logger.quiet = true;

        logger.log(&LogEvent::LoopCancelled { attempts: 1 });
        logger.log(&LogEvent::LoopSucceeded {
            attempts: 2,
            duration_secs: 1.5,
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "loop_cancelled");
        assert!(first["timestamp"].is_string());
    }

    #[test]
    fn test_count_label() {
        assert_eq!(count_label(1), "1 error");
        assert_eq!(count_label(3), "3 errors");
        assert_eq!(count_label(usize::MAX), "no result");
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
