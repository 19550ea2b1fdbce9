//! Stage lifecycle events and observer sinks.
//!
//! The pipeline notifies an injected [`ObserverSink`] at stage boundaries
//! instead of relying on an ambient callback registry. Transcript appends
//! happen synchronously inside `notify`, so a later stage can never start
//! before an earlier stage's output has been committed.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::transcript::{Speaker, Transcript};

/// Unique identifier for an event
pub type EventId = String;

/// Stage lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageEvent {
    /// Stage execution started; carries the fully rendered input.
    Started {
        event_id: EventId,
        timestamp_ms: u64,
        stage_id: String,
        actor: String,
        input: String,
    },
    /// Stage execution finished with output text.
    Ended {
        event_id: EventId,
        timestamp_ms: u64,
        stage_id: String,
        actor: String,
        output: String,
        duration_ms: u64,
    },
    /// Stage execution failed; remaining stages are skipped.
    Failed {
        event_id: EventId,
        timestamp_ms: u64,
        stage_id: String,
        actor: String,
        reason: String,
    },
}

impl StageEvent {
    pub fn started(stage_id: impl Into<String>, actor: impl Into<String>, input: String) -> Self {
        Self::Started {
            event_id: generate_event_id(),
            timestamp_ms: current_timestamp(),
            stage_id: stage_id.into(),
            actor: actor.into(),
            input,
        }
    }

    pub fn ended(
        stage_id: impl Into<String>,
        actor: impl Into<String>,
        output: String,
        duration_ms: u64,
    ) -> Self {
        Self::Ended {
            event_id: generate_event_id(),
            timestamp_ms: current_timestamp(),
            stage_id: stage_id.into(),
            actor: actor.into(),
            output,
            duration_ms,
        }
    }

    pub fn failed(stage_id: impl Into<String>, actor: impl Into<String>, reason: String) -> Self {
        Self::Failed {
            event_id: generate_event_id(),
            timestamp_ms: current_timestamp(),
            stage_id: stage_id.into(),
            actor: actor.into(),
            reason,
        }
    }

    pub fn event_id(&self) -> &str {
        match self {
            StageEvent::Started { event_id, .. } => event_id,
            StageEvent::Ended { event_id, .. } => event_id,
            StageEvent::Failed { event_id, .. } => event_id,
        }
    }

    pub fn stage_id(&self) -> &str {
        match self {
            StageEvent::Started { stage_id, .. } => stage_id,
            StageEvent::Ended { stage_id, .. } => stage_id,
            StageEvent::Failed { stage_id, .. } => stage_id,
        }
    }
}

/// Consumer of stage lifecycle events.
pub trait ObserverSink: Send + Sync {
    fn notify(&self, event: StageEvent);
}

/// Sink that discards events; useful when no observer is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ObserverSink for NullSink {
    fn notify(&self, _event: StageEvent) {}
}

/// Channel-backed sink for observers that consume events asynchronously.
#[derive(Clone)]
pub struct EventCollector {
    sender: mpsc::UnboundedSender<StageEvent>,
}

impl EventCollector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StageEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ObserverSink for EventCollector {
    fn notify(&self, event: StageEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::warn!(error = %e, "failed to forward stage event");
        }
    }
}

/// Projection of stage events into a transcript.
///
/// `Started` renders the rendered input as an assistant line, `Ended` renders
/// the output tagged with the actor's display name and avatar, `Failed`
/// renders an error-tagged assistant line. Pure projection, no business
/// logic; renders happen in the order events arrive.
pub struct TranscriptSink {
    transcript: Arc<Transcript>,
    avatars: Vec<(String, String)>,
    forward: Option<Arc<dyn ObserverSink>>,
}

impl TranscriptSink {
    pub fn new(transcript: Arc<Transcript>) -> Self {
        Self {
            transcript,
            avatars: Vec::new(),
            forward: None,
        }
    }

    /// Register an avatar URL for an actor's transcript lines.
    pub fn with_avatar(mut self, actor: impl Into<String>, url: impl Into<String>) -> Self {
        self.avatars.push((actor.into(), url.into()));
        self
    }

    /// Forward each event to another sink after the transcript append.
    pub fn with_forward(mut self, sink: Arc<dyn ObserverSink>) -> Self {
        self.forward = Some(sink);
        self
    }

    fn avatar_for(&self, actor: &str) -> Option<String> {
        self.avatars
            .iter()
            .find(|(name, _)| name == actor)
            .map(|(_, url)| url.clone())
    }
}

impl ObserverSink for TranscriptSink {
    fn notify(&self, event: StageEvent) {
        match &event {
            StageEvent::Started { input, .. } => {
                self.transcript.append(Speaker::Assistant, input.clone());
            }
            StageEvent::Ended { actor, output, .. } => {
                let speaker = Speaker::actor(actor.clone(), self.avatar_for(actor));
                self.transcript.append(speaker, output.clone());
            }
            StageEvent::Failed { actor, reason, .. } => {
                self.transcript
                    .append_error(Speaker::Assistant, format!("{actor} failed: {reason}"));
            }
        }

        if let Some(forward) = &self.forward {
            forward.notify(event);
        }
    }
}

/// Generate a unique event ID
fn generate_event_id() -> EventId {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("evt_{}", id)
}

/// Get current Unix timestamp in milliseconds
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::EntryTone;

    #[tokio::test]
    async fn collector_forwards_events() {
        let (collector, mut receiver) = EventCollector::new();

        collector.notify(StageEvent::started("research", "Senior Researcher", "input".into()));

        let event = receiver.recv().await.unwrap();
        match event {
            StageEvent::Started { stage_id, .. } => assert_eq!(stage_id, "research"),
            other => panic!("expected Started event, got {other:?}"),
        }
    }

    #[test]
    fn transcript_sink_projects_events_in_order() {
        let transcript = Arc::new(Transcript::new());
        let sink = TranscriptSink::new(transcript.clone())
            .with_avatar("Writer", "https://example.com/writer.png");

        sink.notify(StageEvent::started("compose", "Writer", "rendered input".into()));
        sink.notify(StageEvent::ended("compose", "Writer", "article".into(), 12));
        sink.notify(StageEvent::failed("compose", "Writer", "provider down".into()));

        let entries = transcript.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].speaker, Speaker::Assistant);
        assert_eq!(entries[0].content, "rendered input");
        assert_eq!(
            entries[1].speaker,
            Speaker::actor("Writer", Some("https://example.com/writer.png".into()))
        );
        assert_eq!(entries[1].content, "article");
        assert_eq!(entries[2].tone, EntryTone::Error);
        assert!(entries[2].content.contains("provider down"));
    }

    #[test]
    fn transcript_append_happens_before_forwarding() {
        struct LenProbe {
            transcript: Arc<Transcript>,
            seen: std::sync::Mutex<Vec<usize>>,
        }

        impl ObserverSink for LenProbe {
            fn notify(&self, _event: StageEvent) {
                self.seen.lock().unwrap().push(self.transcript.len());
            }
        }

        let transcript = Arc::new(Transcript::new());
        let probe = Arc::new(LenProbe {
            transcript: transcript.clone(),
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let sink = TranscriptSink::new(transcript).with_forward(probe.clone());

        sink.notify(StageEvent::started("research", "Senior Researcher", "go".into()));
        sink.notify(StageEvent::ended("research", "Senior Researcher", "done".into(), 1));

        assert_eq!(*probe.seen.lock().unwrap(), vec![1, 2]);
    }
}
