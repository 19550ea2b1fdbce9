//! Session completion log.
//!
//! Each finished blogging session appends one JSONL record under the
//! configured log directory. Values are sanitised first so an API key pasted
//! into a topic never reaches disk.

use anyhow::{Context, Result};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{OpenOptions, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

const LOG_DIR_ENV: &str = "NEWSROOM_LOG_DIR";
const DEFAULT_LOG_DIR: &str = "data/logs";
const SESSION_LOG_FILE: &str = "sessions.jsonl";

static REDACTION_PATTERNS: Lazy<Vec<(String, Regex)>> = Lazy::new(|| {
    vec![
        (
            "api_key".to_string(),
            Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid api_key regex"),
        ),
        (
            "secret".to_string(),
            Regex::new(r"(?i)(secret\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid secret regex"),
        ),
        (
            "bearer".to_string(),
            Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9\-_.+=/]+)").expect("invalid bearer regex"),
        ),
        (
            "google_key".to_string(),
            Regex::new(r"(AIza[A-Za-z0-9\-_]{20,})").expect("invalid google_key regex"),
        ),
    ]
});

#[derive(Debug, Clone)]
pub struct SessionLogInput {
    pub session_id: String,
    pub topic: String,
    pub result: String,
    pub stages: Vec<String>,
    pub article_path: Option<String>,
}

#[derive(Serialize)]
struct SessionLogRecord {
    timestamp: String,
    session_id: String,
    topic: String,
    result_preview: String,
    result_chars: usize,
    stages: Vec<String>,
    article_path: Option<String>,
    redactions: Vec<String>,
}

fn log_base_dir() -> PathBuf {
    std::env::var(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR))
}

fn sanitize_text(input: &str, redactions: &mut HashSet<String>) -> String {
    let mut output = input.to_string();
    for (name, regex) in REDACTION_PATTERNS.iter() {
        let mut matched = false;
        output = regex
            .replace_all(&output, |caps: &Captures| {
                matched = true;
                if caps.len() > 2 {
                    format!("{}[REDACTED]", &caps[1])
                } else {
                    "[REDACTED]".to_string()
                }
            })
            .to_string();
        if matched {
            redactions.insert(name.clone());
        }
    }
    output
}

fn preview(text: &str) -> String {
    const MAX: usize = 200;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        text.chars().take(MAX).collect()
    }
}

fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let line = serde_json::to_string(value)?;
    writeln!(writer, "{}", line)
        .with_context(|| format!("failed to append log entry to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

pub fn log_session_completion(input: SessionLogInput) -> Result<()> {
    let mut redactions = HashSet::new();
    let topic = sanitize_text(&input.topic, &mut redactions);
    let result = sanitize_text(&input.result, &mut redactions);

    if !redactions.is_empty() {
        warn!(
            session_id = %input.session_id,
            fields = ?redactions,
            "redacted potential secrets from session log"
        );
    }

    let record = SessionLogRecord {
        timestamp: Utc::now().to_rfc3339(),
        session_id: input.session_id,
        topic,
        result_chars: result.chars().count(),
        result_preview: preview(&result),
        stages: input.stages,
        article_path: input.article_path,
        redactions: redactions.into_iter().collect(),
    };

    let path = log_base_dir().join(SESSION_LOG_FILE);
    append_json_line(&path, &record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    #[test]
    fn session_logging_sanitizes_and_persists() -> Result<()> {
        let temp = TempDir::new().expect("temp dir");
        unsafe {
            std::env::set_var(LOG_DIR_ENV, temp.path());
        }

        let input = SessionLogInput {
            session_id: "test-session".to_string(),
            topic: "quantum sensors api_key=abcd1234".to_string(),
            result: "Article mentioning AIzaSyA1234567890abcdefghij".to_string(),
            stages: vec!["research".into(), "compose".into()],
            article_path: Some("new-blog-post.md".into()),
        };

        log_session_completion(input)?;

        let log_path = temp.path().join(SESSION_LOG_FILE);
        assert!(log_path.exists());
        let line = std::fs::read_to_string(&log_path)?;
        let record: Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(record["session_id"], "test-session");
        assert!(record["topic"].as_str().unwrap().contains("[REDACTED]"));
        assert!(
            record["result_preview"]
                .as_str()
                .unwrap()
                .contains("[REDACTED]")
        );
        assert!(!record["redactions"].as_array().unwrap().is_empty());

        unsafe {
            std::env::remove_var(LOG_DIR_ENV);
        }
        Ok(())
    }
}
