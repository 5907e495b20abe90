//! Append-only question/answer log.
//!
//! One file per calendar day under the configured logs directory, one JSON
//! record per line (`{time, question, answer}`). Failed requests are
//! recorded too, with the answer field carrying an `ERROR:` prefix and the
//! full error text.

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

#[derive(Serialize)]
struct LogRecord<'a> {
    time: String,
    question: &'a str,
    answer: &'a str,
}

/// Daily question/answer log sink. Append-only; safe to share across
/// request handlers since every write is a single appended line.
pub struct ChatLog {
    dir: PathBuf,
}

impl ChatLog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Appends a successful question/answer pair.
    pub fn record(&self, question: &str, answer: &str) -> Result<()> {
        self.append(question, answer)
    }

    /// Appends a failed request; the error text lands in the answer field
    /// behind an `ERROR:` prefix so failures are greppable.
    pub fn record_error(&self, question: &str, error: &str) -> Result<()> {
        self.append(question, &format!("ERROR: {error}"))
    }

    fn append(&self, question: &str, answer: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create logs directory: {}", self.dir.display()))?;

        let now = Local::now();
        let path = self
            .dir
            .join(format!("{}_chat_log.jsonl", now.format("%Y-%m-%d")));

        let record = LogRecord {
            time: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            question,
            answer,
        };

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open chat log: {}", path.display()))?;

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
