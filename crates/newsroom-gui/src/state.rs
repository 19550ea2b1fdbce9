use crate::config::AppConfig;
use anyhow::Result;
use axum::response::sse::Event;
use dashmap::DashMap;
use newsroom_core::{
    CapabilityProvider, GREETING, GeminiProvider, NewsroomConfig, ObserverSink, SessionOptions,
    StageEvent, Transcript, TranscriptEntry, run_blog_session,
};
use serde::Serialize;
use std::convert::Infallible;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Semaphore, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{self as stream, Stream, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    chat_service: Arc<ChatService>,
    assets_dir: Arc<PathBuf>,
    gui_enabled: bool,
    auth_token: Option<Arc<String>>,
}

impl AppState {
    /// Build state with the default Gemini provider. Fails at startup when
    /// the generation credential is absent.
    pub fn try_new(config: &AppConfig) -> Result<Self> {
        let core_config = NewsroomConfig::from_env()?;
        let provider: Arc<dyn CapabilityProvider> =
            Arc::new(GeminiProvider::from_config(&core_config));
        Ok(Self::with_provider(config, provider))
    }

    /// Build state around an explicit provider (tests, offline demos).
    pub fn with_provider(config: &AppConfig, provider: Arc<dyn CapabilityProvider>) -> Self {
        let service = ChatService::new(provider, config.max_concurrency, config.article_path.clone());

        Self {
            chat_service: Arc::new(service),
            assets_dir: Arc::new(config.assets_dir.clone()),
            gui_enabled: config.gui_enabled,
            auth_token: config
                .auth_token
                .as_ref()
                .map(|token| Arc::new(token.to_string())),
        }
    }

    pub fn chat_service(&self) -> Arc<ChatService> {
        self.chat_service.clone()
    }

    pub fn assets_dir(&self) -> Arc<PathBuf> {
        self.assets_dir.clone()
    }

    pub fn gui_enabled(&self) -> bool {
        self.gui_enabled
    }

    pub fn auth_token(&self) -> Option<Arc<String>> {
        self.auth_token.clone()
    }

    pub fn metrics(&self) -> ChatMetrics {
        self.chat_service.metrics()
    }
}

pub struct ChatService {
    provider: Arc<dyn CapabilityProvider>,
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    article_path: Option<PathBuf>,
    chats: Arc<DashMap<String, ChatRecord>>,
    streams: Arc<DashMap<String, broadcast::Sender<ChatEvent>>>,
}

impl ChatService {
    pub fn new(
        provider: Arc<dyn CapabilityProvider>,
        max_concurrency: usize,
        article_path: Option<PathBuf>,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            provider,
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            article_path,
            chats: Arc::new(DashMap::new()),
            streams: Arc::new(DashMap::new()),
        }
    }

    /// Start a blogging run for a topic and return the chat id immediately.
    pub fn start_chat(&self, topic: String) -> String {
        let chat_id = Uuid::new_v4().to_string();
        let transcript = Arc::new(Transcript::with_greeting(GREETING));

        let sender = self
            .streams
            .entry(chat_id.clone())
            .or_insert_with(|| {
                let (tx, _rx) = broadcast::channel(32);
                tx
            })
            .clone();

        self.chats.insert(
            chat_id.clone(),
            ChatRecord {
                state: ChatState::Running,
                transcript: transcript.clone(),
                result: None,
                error: None,
                terminal: None,
            },
        );

        let provider = self.provider.clone();
        let semaphore = self.semaphore.clone();
        let article_path = self.article_path.clone();
        let chats = self.chats.clone();
        let streams = self.streams.clone();
        let chat_id_for_task = chat_id.clone();
        let sender_for_task = sender.clone();

        tokio::spawn(async move {
            let permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    let event = ChatEvent::error(&err);
                    let _ = sender_for_task.send(event.clone());
                    if let Some(mut record) = chats.get_mut(&chat_id_for_task) {
                        record.fail(err.to_string(), event);
                    }
                    streams.remove(&chat_id_for_task);
                    return;
                }
            };

            let mut options = SessionOptions::new(topic)
                .with_session_id(chat_id_for_task.clone())
                .with_provider(provider)
                .with_transcript(transcript)
                .with_observer(Arc::new(BridgeSink {
                    sender: sender_for_task.clone(),
                }));
            if let Some(path) = article_path {
                options = options.with_article_path(path);
            }

            let result = run_blog_session(options).await;
            drop(permit);

            match result {
                Ok(outcome) => {
                    info!(chat_id = %chat_id_for_task, "chat completed");
                    let event = ChatEvent::completed(&outcome.result);
                    if let Some(mut record) = chats.get_mut(&chat_id_for_task) {
                        record.complete(outcome.result, event.clone());
                    }
                    let _ = sender_for_task.send(event);
                }
                Err(err) => {
                    error!(chat_id = %chat_id_for_task, error = %err, "chat failed");
                    let event = ChatEvent::error(&err);
                    if let Some(mut record) = chats.get_mut(&chat_id_for_task) {
                        record.fail(err.to_string(), event.clone());
                    }
                    let _ = sender_for_task.send(event);
                }
            }

            streams.remove(&chat_id_for_task);
        });

        chat_id
    }

    pub fn status(&self, chat_id: &str) -> Option<ChatStatus> {
        self.chats.get(chat_id).map(|record| ChatStatus {
            chat_id: chat_id.to_string(),
            state: record.state,
            result: record.result.clone(),
            error: record.error.clone(),
            entries: record.transcript.len(),
        })
    }

    pub fn list_chats(&self) -> Vec<ChatStatus> {
        self.chats
            .iter()
            .map(|item| ChatStatus {
                chat_id: item.key().clone(),
                state: item.value().state,
                result: item.value().result.clone(),
                error: item.value().error.clone(),
                entries: item.value().transcript.len(),
            })
            .collect()
    }

    pub fn transcript(&self, chat_id: &str) -> Option<Vec<TranscriptEntry>> {
        self.chats
            .get(chat_id)
            .map(|record| record.transcript.entries())
    }

    /// SSE stream for a chat: live events while running, the terminal event
    /// replayed once the chat has finished.
    pub fn event_stream(&self, chat_id: &str) -> Option<SseStream> {
        if let Some(record) = self.chats.get(chat_id)
            && !matches!(record.state, ChatState::Running)
        {
            let event = record
                .terminal
                .clone()
                .unwrap_or_else(|| ChatEvent::error(&"terminal event missing"))
                .into_sse_event();
            let stream = stream::iter(vec![Result::<Event, Infallible>::Ok(event)]);
            return Some(Box::pin(stream));
        }

        self.streams.get(chat_id).map(|sender| {
            let rx = sender.subscribe();
            let stream = BroadcastStream::new(rx).filter_map(|event| match event {
                Ok(event) => Some(Result::<Event, Infallible>::Ok(event.into_sse_event())),
                Err(err) => {
                    warn!(error = %err, "chat event stream lagged");
                    None
                }
            });
            Box::pin(stream) as SseStream
        })
    }

    pub fn metrics(&self) -> ChatMetrics {
        let running = self
            .chats
            .iter()
            .filter(|item| matches!(item.value().state, ChatState::Running))
            .count();
        ChatMetrics {
            max_concurrency: self.max_concurrency,
            available_permits: self.semaphore.available_permits(),
            running_chats: running,
            total_chats: self.chats.len(),
        }
    }
}

pub type SseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

struct ChatRecord {
    state: ChatState,
    transcript: Arc<Transcript>,
    result: Option<String>,
    error: Option<String>,
    terminal: Option<ChatEvent>,
}

impl ChatRecord {
    fn complete(&mut self, result: String, event: ChatEvent) {
        self.state = ChatState::Completed;
        self.result = Some(result);
        self.terminal = Some(event);
    }

    fn fail(&mut self, error: String, event: ChatEvent) {
        self.state = ChatState::Failed;
        self.error = Some(error);
        self.terminal = Some(event);
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    Running,
    Completed,
    Failed,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatStatus {
    pub chat_id: String,
    pub state: ChatState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub entries: usize,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ChatMetrics {
    pub max_concurrency: usize,
    pub available_permits: usize,
    pub running_chats: usize,
    pub total_chats: usize,
}

/// Forwards pipeline stage events into the chat's broadcast channel.
struct BridgeSink {
    sender: broadcast::Sender<ChatEvent>,
}

impl ObserverSink for BridgeSink {
    fn notify(&self, event: StageEvent) {
        let _ = self.sender.send(ChatEvent::from_stage(&event));
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatEvent {
    pub kind: ChatEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl ChatEvent {
    fn from_stage(event: &StageEvent) -> Self {
        match event {
            StageEvent::Started {
                stage_id,
                actor,
                input,
                ..
            } => Self {
                kind: ChatEventKind::StageStarted,
                stage: Some(stage_id.clone()),
                actor: Some(actor.clone()),
                message: Some(input.clone()),
                result: None,
            },
            StageEvent::Ended {
                stage_id,
                actor,
                output,
                ..
            } => Self {
                kind: ChatEventKind::StageEnded,
                stage: Some(stage_id.clone()),
                actor: Some(actor.clone()),
                message: Some(output.clone()),
                result: None,
            },
            StageEvent::Failed {
                stage_id,
                actor,
                reason,
                ..
            } => Self {
                kind: ChatEventKind::StageFailed,
                stage: Some(stage_id.clone()),
                actor: Some(actor.clone()),
                message: Some(reason.clone()),
                result: None,
            },
        }
    }

    fn completed(result: &str) -> Self {
        Self {
            kind: ChatEventKind::Completed,
            stage: None,
            actor: None,
            message: Some("chat completed".into()),
            result: Some(result.to_string()),
        }
    }

    fn error(error: &impl std::fmt::Display) -> Self {
        Self {
            kind: ChatEventKind::Error,
            stage: None,
            actor: None,
            message: Some(format!("chat failed: {error}")),
            result: None,
        }
    }

    pub fn into_sse_event(self) -> Event {
        let data = serde_json::to_string(&self).unwrap_or_else(|_| {
            serde_json::json!({
                "kind": ChatEventKind::Error,
                "message": "failed to serialize chat event",
            })
            .to_string()
        });

        Event::default().event(self.kind.as_str()).data(data)
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEventKind {
    StageStarted,
    StageEnded,
    StageFailed,
    Completed,
    Error,
}

impl ChatEventKind {
    fn as_str(&self) -> &'static str {
        match self {
            ChatEventKind::StageStarted => "stage_started",
            ChatEventKind::StageEnded => "stage_ended",
            ChatEventKind::StageFailed => "stage_failed",
            ChatEventKind::Completed => "completed",
            ChatEventKind::Error => "error",
        }
    }
}
