//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{state::AppState, turn_task};
use admissions_chat_core::domain::{
    Chat, ChatPatch, ChatStatus, ConversationTurn, HistoryEntry, TurnRole,
};
use admissions_chat_core::generator;
use admissions_chat_core::ports::PortError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

/// How many trailing turns are loaded as conversation history for an AI turn.
const HISTORY_FETCH_LIMIT: i64 = 50;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_chat_handler,
        list_chats_handler,
        get_chat_handler,
        update_chat_handler,
        list_messages_handler,
        post_message_handler,
    ),
    components(
        schemas(
            CreateChatRequest,
            UpdateChatRequest,
            PostMessageRequest,
            ChatResponse,
            MessageResponse,
        )
    ),
    tags(
        (name = "Havana Chat API", description = "API endpoints for the student admissions chat.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Payload for creating a chat. When `first_message` is present, the chat
/// title is generated from it, the message is stored, and an AI turn is
/// started in the background.
#[derive(Deserialize, ToSchema)]
pub struct CreateChatRequest {
    pub user_id: Uuid,
    pub first_message: Option<String>,
}

/// Partial update of a chat. Setting `admin_taken_over` to true is how an
/// admin takes the chat away from the AI.
#[derive(Deserialize, ToSchema)]
pub struct UpdateChatRequest {
    pub title: Option<String>,
    pub status: Option<String>,
    pub admin_taken_over: Option<bool>,
}

/// Payload for posting a student message to an existing chat.
#[derive(Deserialize, ToSchema)]
pub struct PostMessageRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct ListMessagesParams {
    pub count: Option<i64>,
}

/// A chat as returned by the API.
#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub status: String,
    pub admin_taken_over: bool,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

impl From<Chat> for ChatResponse {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id,
            user_id: chat.user_id,
            title: chat.title,
            status: chat.status.as_str().to_string(),
            admin_taken_over: chat.admin_taken_over,
            created_at: chat.created_at,
            last_message_at: chat.last_message_at,
        }
    }
}

/// A conversation message as returned by the API.
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: String,
    pub content: String,
    #[schema(value_type = Object, nullable)]
    pub meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<ConversationTurn> for MessageResponse {
    fn from(turn: ConversationTurn) -> Self {
        Self {
            id: turn.id,
            chat_id: turn.chat_id,
            role: turn.role.as_str().to_string(),
            content: turn.content,
            meta: turn.meta.and_then(|meta| serde_json::to_value(meta).ok()),
            created_at: turn.created_at,
        }
    }
}

fn port_error_response(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        PortError::Unexpected(_) => {
            error!("{context}: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a new chat.
///
/// With a `first_message`, this also generates a chat title, stores the
/// student's message, and kicks off the first AI turn in the background.
#[utoipa::path(
    post,
    path = "/chats",
    request_body = CreateChatRequest,
    responses(
        (status = 201, description = "Chat created successfully", body = ChatResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_chat_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateChatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let title = match &payload.first_message {
        Some(message) => generator::generate_chat_title(app_state.model.as_ref(), message).await,
        None => generator::FALLBACK_CHAT_TITLE.to_string(),
    };

    let chat = app_state
        .store
        .create_chat(payload.user_id, &title)
        .await
        .map_err(|e| port_error_response("Failed to create chat", e))?;

    if let Some(message) = payload.first_message {
        // The first message has no prior history.
        intake_student_message(app_state, chat.id, message, Vec::new())
            .await
            .map_err(|e| port_error_response("Failed to store first message", e))?;
    }

    Ok((StatusCode::CREATED, Json(ChatResponse::from(chat))))
}

/// List all chats, most recently active first.
#[utoipa::path(
    get,
    path = "/chats",
    responses(
        (status = 200, description = "All chats", body = [ChatResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_chats_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let chats = app_state
        .store
        .list_chats()
        .await
        .map_err(|e| port_error_response("Failed to list chats", e))?;

    let response: Vec<ChatResponse> = chats.into_iter().map(ChatResponse::from).collect();
    Ok(Json(response))
}

/// Fetch a single chat.
#[utoipa::path(
    get,
    path = "/chats/{chat_id}",
    responses(
        (status = 200, description = "The chat", body = ChatResponse),
        (status = 404, description = "Chat not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("chat_id" = Uuid, Path, description = "The unique ID of the chat.")
    )
)]
pub async fn get_chat_handler(
    State(app_state): State<Arc<AppState>>,
    Path(chat_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let chat = app_state
        .store
        .get_chat(chat_id)
        .await
        .map_err(|e| port_error_response("Failed to fetch chat", e))?;
    Ok(Json(ChatResponse::from(chat)))
}

/// Partially update a chat (status, title, admin takeover).
#[utoipa::path(
    patch,
    path = "/chats/{chat_id}",
    request_body = UpdateChatRequest,
    responses(
        (status = 200, description = "The updated chat", body = ChatResponse),
        (status = 400, description = "Invalid status value"),
        (status = 404, description = "Chat not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("chat_id" = Uuid, Path, description = "The unique ID of the chat.")
    )
)]
pub async fn update_chat_handler(
    State(app_state): State<Arc<AppState>>,
    Path(chat_id): Path<Uuid>,
    Json(payload): Json<UpdateChatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let status = match payload.status.as_deref() {
        Some(raw) => Some(ChatStatus::parse(raw).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("'{raw}' is not a valid chat status"),
            )
        })?),
        None => None,
    };

    let patch = ChatPatch {
        title: payload.title,
        status,
        admin_taken_over: payload.admin_taken_over,
        last_message_at: None,
    };

    let chat = app_state
        .store
        .update_chat(chat_id, patch)
        .await
        .map_err(|e| port_error_response("Failed to update chat", e))?;
    Ok(Json(ChatResponse::from(chat)))
}

/// List the messages of a chat in chronological order.
#[utoipa::path(
    get,
    path = "/chats/{chat_id}/messages",
    responses(
        (status = 200, description = "The chat's messages", body = [MessageResponse]),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("chat_id" = Uuid, Path, description = "The unique ID of the chat."),
        ("count" = Option<i64>, Query, description = "Maximum number of trailing messages to return.")
    )
)]
pub async fn list_messages_handler(
    State(app_state): State<Arc<AppState>>,
    Path(chat_id): Path<Uuid>,
    Query(params): Query<ListMessagesParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let turns = app_state
        .store
        .turns_for_chat(chat_id, params.count.unwrap_or(HISTORY_FETCH_LIMIT))
        .await
        .map_err(|e| port_error_response("Failed to fetch messages", e))?;

    let response: Vec<MessageResponse> = turns.into_iter().map(MessageResponse::from).collect();
    Ok(Json(response))
}

/// Post a student message to a chat.
///
/// The message is stored immediately and the AI turn runs in the background;
/// clients poll the message list for the bot's reply.
#[utoipa::path(
    post,
    path = "/chats/{chat_id}/messages",
    request_body = PostMessageRequest,
    responses(
        (status = 202, description = "Message stored; AI turn started", body = MessageResponse),
        (status = 404, description = "Chat not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("chat_id" = Uuid, Path, description = "The unique ID of the chat.")
    )
)]
pub async fn post_message_handler(
    State(app_state): State<Arc<AppState>>,
    Path(chat_id): Path<Uuid>,
    Json(payload): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Confirm the chat exists before writing anything.
    app_state
        .store
        .get_chat(chat_id)
        .await
        .map_err(|e| port_error_response("Failed to fetch chat", e))?;

    // History as it stood before this message, for the AI turn's prompt.
    let history: Vec<HistoryEntry> = app_state
        .store
        .turns_for_chat(chat_id, HISTORY_FETCH_LIMIT)
        .await
        .map_err(|e| port_error_response("Failed to fetch history", e))?
        .into_iter()
        .map(|turn| HistoryEntry::new(turn.role, turn.content))
        .collect();

    let stored = intake_student_message(app_state, chat_id, payload.content, history)
        .await
        .map_err(|e| port_error_response("Failed to store message", e))?;

    Ok((StatusCode::ACCEPTED, Json(MessageResponse::from(stored))))
}

/// Stores a student turn, bumps the chat's `last_message_at`, and hands the
/// AI turn to a background task with its own error boundary.
async fn intake_student_message(
    app_state: Arc<AppState>,
    chat_id: Uuid,
    content: String,
    history: Vec<HistoryEntry>,
) -> Result<ConversationTurn, PortError> {
    let stored = app_state
        .store
        .append_turn(chat_id, TurnRole::Student, &content, None)
        .await?;

    app_state
        .store
        .update_chat(
            chat_id,
            ChatPatch {
                last_message_at: Some(Utc::now()),
                ..ChatPatch::default()
            },
        )
        .await?;

    tokio::spawn(turn_task::run_ai_turn(app_state, chat_id, content, history));

    Ok(stored)
}
