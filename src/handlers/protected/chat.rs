// handlers/protected/chat.rs - /api/chat handlers

use axum::{extract::State, Extension};

use crate::database::models::ChatTranscript;
use crate::gateway::{ChatInsights, ChatReply};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::chat_service::{ChatCleared, ChatMessage, HistoryQuery, InsightsOptions};
use crate::services::ChatService;
use crate::state::AppState;
use crate::validation::{ValidatedJson, ValidatedQuery};

/// POST /api/chat - Ask the assistant a question
///
/// Expected Input:
/// ```json
/// { "message": "How much more can I invest under 80C?", "sessionId": "optional" }
/// ```
pub async fn chat_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(message): ValidatedJson<ChatMessage>,
) -> ApiResult<ChatReply> {
    let reply = ChatService::new(&state).chat(auth.user_id, message).await?;
    Ok(ApiResponse::success(reply))
}

/// GET /api/chat/history - The caller's conversation, oldest first
///
/// Query: `?limit=50` (1 to 200) keeps the most recent turns.
pub async fn history_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<HistoryQuery>,
) -> ApiResult<ChatTranscript> {
    let transcript = ChatService::new(&state)
        .history(auth.user_id, query)
        .await?;
    Ok(ApiResponse::success(transcript))
}

/// DELETE /api/chat/history - Forget the caller's conversation
pub async fn history_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<ChatCleared> {
    let cleared = ChatService::new(&state).clear(auth.user_id).await?;
    Ok(ApiResponse::success(cleared).with_message("Conversation history cleared"))
}

/// POST /api/chat/insights - Insights over the caller's dashboard figures
pub async fn insights_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(options): ValidatedJson<InsightsOptions>,
) -> ApiResult<ChatInsights> {
    let insights = ChatService::new(&state)
        .insights(auth.user_id, options)
        .await?;
    Ok(ApiResponse::success(insights))
}
