//! Append-only conversation transcript.
//!
//! One transcript is scoped to one user session. Entries are never mutated
//! or removed; insertion order is display order.

use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Identity attached to a transcript line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
    Actor {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        avatar: Option<String>,
    },
}

impl Speaker {
    pub fn actor(name: impl Into<String>, avatar: Option<String>) -> Self {
        Self::Actor {
            name: name.into(),
            avatar,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Speaker::User => "user",
            Speaker::Assistant => "assistant",
            Speaker::Actor { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryTone {
    Message,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub content: String,
    pub tone: EntryTone,
    pub timestamp_ms: u64,
}

/// Single-writer append-only log of speaker/content pairs.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: RwLock<Vec<TranscriptEntry>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transcript seeded with an assistant greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let transcript = Self::new();
        transcript.append(Speaker::Assistant, greeting);
        transcript
    }

    pub fn append(&self, speaker: Speaker, content: impl Into<String>) {
        self.push(speaker, content.into(), EntryTone::Message);
    }

    pub fn append_error(&self, speaker: Speaker, content: impl Into<String>) {
        self.push(speaker, content.into(), EntryTone::Error);
    }

    fn push(&self, speaker: Speaker, content: String, tone: EntryTone) {
        let entry = TranscriptEntry {
            speaker,
            content,
            tone,
            timestamp_ms: now_ms(),
        };
        self.entries
            .write()
            .expect("transcript lock poisoned")
            .push(entry);
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries
            .read()
            .expect("transcript lock poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("transcript lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content of the most recent entry, if any.
    pub fn last_content(&self) -> Option<String> {
        self.entries
            .read()
            .expect("transcript lock poisoned")
            .last()
            .map(|entry| entry.content.clone())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_is_first_entry() {
        let transcript = Transcript::with_greeting("What news do you want us to write?");
        let entries = transcript.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].speaker, Speaker::Assistant);
        assert_eq!(entries[0].content, "What news do you want us to write?");
    }

    #[test]
    fn entries_keep_insertion_order_across_reads() {
        let transcript = Transcript::new();
        transcript.append(Speaker::User, "first");
        transcript.append(Speaker::actor("Writer", None), "second");
        transcript.append_error(Speaker::Assistant, "third");

        let first_read: Vec<String> = transcript
            .entries()
            .into_iter()
            .map(|e| e.content)
            .collect();
        let second_read: Vec<String> = transcript
            .entries()
            .into_iter()
            .map(|e| e.content)
            .collect();

        assert_eq!(first_read, vec!["first", "second", "third"]);
        assert_eq!(first_read, second_read);
        assert_eq!(transcript.entries()[2].tone, EntryTone::Error);
    }

    #[test]
    fn last_content_reflects_latest_append() {
        let transcript = Transcript::new();
        assert!(transcript.last_content().is_none());
        transcript.append(Speaker::User, "topic");
        transcript.append(Speaker::Assistant, "W-OUT");
        assert_eq!(transcript.last_content().as_deref(), Some("W-OUT"));
    }
}
