use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Represents each line type in the session JSONL file.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionLine {
    SessionStart {
        timestamp: DateTime<Utc>,
        seed: String,
        tool: String,
        generator: String,
        validator: String,
        max_attempts: usize,
        max_examples: usize,
        baseline_error_count: usize,
    },
    Attempt {
        attempt: usize,
        outcome: String,
        accepted: bool,
        candidate: Option<String>,
        error_count: Option<usize>,
        messages: Vec<String>,
        diagnosis: Option<String>,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
    SessionEnd {
        status: String,
        attempts_used: usize,
        final_error_count: usize,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
}

/// Fields of one attempt line
#[derive(Debug, Clone, Copy)]
pub struct AttemptEntry<'a> {
    pub attempt: usize,
    pub outcome: &'a str,
    pub accepted: bool,
    pub candidate: Option<&'a str>,
    pub error_count: Option<usize>,
    pub messages: &'a [String],
    pub diagnosis: Option<&'a str>,
    pub duration_secs: f64,
}

/// Fields of the session start line
#[derive(Debug, Clone, Copy)]
pub struct SessionHeader<'a> {
    pub seed: &'a str,
    pub tool: &'a str,
    pub generator: &'a str,
    pub validator: &'a str,
    pub max_attempts: usize,
    pub max_examples: usize,
    pub baseline_error_count: usize,
}

/// Writes session data as JSONL to a file in ~/.local/share/fixloop/sessions/.
pub struct SessionWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl SessionWriter {
    /// Create a session file in the default data directory. The file name is
    /// the current UTC timestamp plus a short hash of the seed candidate.
    pub fn new(seed: &str) -> io::Result<Self> {
        let sessions_dir = Self::sessions_dir()?;
        Self::in_dir(&sessions_dir, seed)
    }

    /// Create a session file under an explicit directory
    pub fn in_dir(sessions_dir: &Path, seed: &str) -> io::Result<Self> {
        fs::create_dir_all(sessions_dir)?;

        let now = Utc::now();
        let timestamp_str = now.format("%Y-%m-%dT%H-%M-%SZ").to_string();

        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        let hash = hex::encode(hasher.finalize());
        let short_hash = &hash[..6];

        let filename = format!("{}_{}.jsonl", timestamp_str, short_hash);
        let path = sessions_dir.join(filename);

        let file = File::create(&path)?;
        let writer = BufWriter::new(file);

        Ok(Self {
            file: Mutex::new(writer),
            path,
        })
    }

    /// Returns the path to the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_start(&self, header: SessionHeader<'_>) {
        let line = SessionLine::SessionStart {
            timestamp: Utc::now(),
            seed: header.seed.to_string(),
            tool: header.tool.to_string(),
            generator: header.generator.to_string(),
            validator: header.validator.to_string(),
            max_attempts: header.max_attempts,
            max_examples: header.max_examples,
            baseline_error_count: header.baseline_error_count,
        };
        self.write_line(&line);
    }

    pub fn write_attempt(&self, entry: AttemptEntry<'_>) {
        let line = SessionLine::Attempt {
            attempt: entry.attempt,
            outcome: entry.outcome.to_string(),
            accepted: entry.accepted,
            candidate: entry.candidate.map(String::from),
            error_count: entry.error_count,
            messages: entry.messages.to_vec(),
            diagnosis: entry.diagnosis.map(String::from),
            duration_secs: entry.duration_secs,
            timestamp: Utc::now(),
        };
        self.write_line(&line);
    }

    pub fn write_end(
        &self,
        status: &str,
        attempts_used: usize,
        final_error_count: usize,
        duration_secs: f64,
    ) {
        let line = SessionLine::SessionEnd {
            status: status.to_string(),
            attempts_used,
            final_error_count,
            duration_secs,
            timestamp: Utc::now(),
        };
        self.write_line(&line);
    }

    fn write_line(&self, line: &SessionLine) {
        let Ok(json) = serde_json::to_string(line) else {
            return;
        };
        if let Ok(mut writer) = self.file.lock() {
            if let Err(e) = writeln!(writer, "{}", json).and_then(|_| writer.flush()) {
                tracing::warn!(path = %self.path.display(), error = %e, "Session write failed");
            }
        }
    }

    fn sessions_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Ok(data_dir.join("fixloop").join("sessions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_file_lines() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SessionWriter::in_dir(dir.path(), "void testPush() {}").unwrap();

        writer.write_start(SessionHeader {
            seed: "void testPush() {}",
            tool: "maven",
            generator: "Claude Code",
            validator: "compile",
            max_attempts: 7,
            max_examples: 3,
            baseline_error_count: 2,
        });
        let messages = vec!["StackTest.java:[3,1] ';' expected".to_string()];
        writer.write_attempt(AttemptEntry {
            attempt: 1,
            outcome: "improved",
            accepted: true,
            candidate: Some("void testPush() { }"),
            error_count: Some(1),
            messages: &messages,
            diagnosis: None,
            duration_secs: 0.4,
        });
        writer.write_end("exhausted", 1, 1, 2.0);

        let name = writer.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with(".jsonl"));

        let content = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["type"], "session_start");
        assert_eq!(lines[0]["baseline_error_count"], 2);
        assert_eq!(lines[1]["type"], "attempt");
        assert_eq!(lines[1]["messages"][0], "StackTest.java:[3,1] ';' expected");
        assert_eq!(lines[2]["type"], "session_end");
        assert_eq!(lines[2]["status"], "exhausted");
    }
}
