use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path},
    http::{StatusCode, header, request::Parts},
    response::sse::{KeepAlive, Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AppError;
use crate::state::{AppState, ChatMetrics, ChatState, ChatStatus, SseStream};
use newsroom_core::TranscriptEntry;

#[derive(Debug, Deserialize)]
pub struct StartChatRequest {
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct StartChatResponse {
    pub chat_id: String,
    pub state: ChatState,
    pub capacity: ChatMetrics,
}

#[derive(Debug, Serialize)]
pub struct ListChatsResponse {
    pub chats: Vec<ChatStatus>,
    pub capacity: ChatMetrics,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub chat_id: String,
    pub entries: Vec<TranscriptEntry>,
}

pub fn chat_router() -> Router<AppState> {
    Router::new()
        .route("/chats", post(start_chat).get(list_chats))
        .route("/chats/:id", get(get_chat))
        .route("/chats/:id/transcript", get(get_transcript))
        .route("/chats/:id/stream", get(stream_chat))
}

#[instrument(skip_all)]
async fn start_chat(
    GuardedState(state): GuardedState,
    Json(payload): Json<StartChatRequest>,
) -> Result<(StatusCode, Json<StartChatResponse>), AppError> {
    if payload.topic.trim().is_empty() {
        return Err(AppError::bad_request("topic must not be empty"));
    }

    let service = state.chat_service();
    let chat_id = service.start_chat(payload.topic);

    let chat_state = service
        .status(&chat_id)
        .map(|status| status.state)
        .unwrap_or(ChatState::Running);

    let response = StartChatResponse {
        chat_id,
        state: chat_state,
        capacity: service.metrics(),
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn get_chat(
    GuardedState(state): GuardedState,
    Path(chat_id): Path<String>,
) -> Result<Json<ChatStatus>, AppError> {
    match state.chat_service().status(&chat_id) {
        Some(status) => Ok(Json(status)),
        None => Err(AppError::not_found("chat not found")),
    }
}

async fn get_transcript(
    GuardedState(state): GuardedState,
    Path(chat_id): Path<String>,
) -> Result<Json<TranscriptResponse>, AppError> {
    match state.chat_service().transcript(&chat_id) {
        Some(entries) => Ok(Json(TranscriptResponse { chat_id, entries })),
        None => Err(AppError::not_found("chat not found")),
    }
}

async fn stream_chat(
    GuardedState(state): GuardedState,
    Path(chat_id): Path<String>,
) -> Result<Sse<SseStream>, AppError> {
    match state.chat_service().event_stream(&chat_id) {
        Some(stream) => Ok(Sse::new(stream).keep_alive(KeepAlive::new())),
        None => Err(AppError::not_found("chat not found")),
    }
}

async fn list_chats(
    GuardedState(state): GuardedState,
) -> Result<Json<ListChatsResponse>, AppError> {
    let service = state.chat_service();
    Ok(Json(ListChatsResponse {
        chats: service.list_chats(),
        capacity: service.metrics(),
    }))
}

pub struct GuardedState(pub AppState);

#[async_trait]
impl FromRequestParts<AppState> for GuardedState {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let app_state = state.clone();

        if !app_state.gui_enabled() {
            return Err(AppError::new(StatusCode::FORBIDDEN, "GUI disabled"));
        }

        if let Some(expected) = app_state.auth_token() {
            let provided = parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim);

            match provided {
                Some(token) if token == expected.as_str() => {}
                _ => {
                    return Err(AppError::new(
                        StatusCode::UNAUTHORIZED,
                        "invalid auth token",
                    ));
                }
            }
        }

        Ok(GuardedState(app_state))
    }
}
