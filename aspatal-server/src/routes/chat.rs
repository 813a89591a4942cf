use aspatal_core::auth::AccountId;
use aspatal_core::clinic::{ChatMessage, InboxEntry};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::{Body, Caller};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/chat/send", post(send))
        .route("/api/chat/history", get(history))
        .route("/api/chat/conversations/{id}", get(conversation))
        .route("/api/chat/inbox", get(inbox))
}

#[derive(Debug, Deserialize)]
struct SendMessage {
    content: String,
    /// Required for administrators, ignored otherwise.
    #[serde(default)]
    receiver_id: Option<AccountId>,
}

async fn send(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Body(message): Body<SendMessage>,
) -> ApiResult<(StatusCode, Json<ChatMessage>)> {
    let sent = state
        .clinic
        .send_message(&identity, &message.content, message.receiver_id)
        .await?;
    Ok((StatusCode::CREATED, Json(sent)))
}

async fn history(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    Ok(Json(state.clinic.chat_history(&identity).await?))
}

async fn conversation(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(other_id): Path<AccountId>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    Ok(Json(state.clinic.conversation(&identity, other_id).await?))
}

async fn inbox(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Json<Vec<InboxEntry>>> {
    Ok(Json(state.clinic.inbox(&identity).await?))
}
