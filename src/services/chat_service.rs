use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use crate::database::models::{ChatTranscript, ChatTurn};
use crate::database::repository::ChatRepository;
use crate::database::Store;
use crate::error::ApiError;
use crate::gateway::{AnalysisGateway, ChatInsights, ChatReply, ChatRequest, InsightsRequest};
use crate::services::dashboard_service::DashboardService;
use crate::state::AppState;
use crate::types::ChatRole;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    #[validate(length(min = 1, max = 128))]
    pub session_id: Option<String>,
    pub context: Option<Value>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InsightsOptions {
    #[validate(length(max = 10))]
    pub focus_areas: Option<Vec<String>>,
}

fn default_history_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize, Validate)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    #[validate(range(min = 1, max = 200, message = "limit must be between 1 and 200"))]
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct ChatCleared {
    pub success: bool,
    pub cleared: u64,
}

pub struct ChatService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn AnalysisGateway>,
    dashboard: DashboardService,
}

impl ChatService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            gateway: state.gateway.clone(),
            dashboard: DashboardService::new(state),
        }
    }

    pub async fn chat(&self, user_id: Uuid, message: ChatMessage) -> Result<ChatReply, ApiError> {
        if message.message.trim().is_empty() {
            return Err(ApiError::validation_error("message: must not be blank", None));
        }
        let request = ChatRequest {
            message: message.message,
            user_id: user_id.to_string(),
            session_id: message.session_id,
            context: message.context,
        };
        let reply = self.gateway.chat(&request).await?;
        debug!(%user_id, query_type = %reply.query_type, "Chat reply relayed");

        // Only answered exchanges are kept.
        let session_id = request.session_id;
        let turns = vec![
            ChatTurn::new(user_id, ChatRole::User, request.message, session_id.clone()),
            ChatTurn::new(user_id, ChatRole::Assistant, reply.response.clone(), session_id)
                .with_query_type(reply.query_type.clone()),
        ];
        self.store.append_chat_turns(turns).await?;
        Ok(reply)
    }

    /// The caller's own conversation, oldest first.
    pub async fn history(&self, user_id: Uuid, query: HistoryQuery) -> Result<ChatTranscript, ApiError> {
        let turns = self.store.list_chat_turns(user_id, query.limit).await?;
        Ok(ChatTranscript::from(turns))
    }

    pub async fn clear(&self, user_id: Uuid) -> Result<ChatCleared, ApiError> {
        let cleared = self.store.clear_chat_turns(user_id).await?;
        debug!(%user_id, cleared, "Chat history cleared");
        Ok(ChatCleared {
            success: true,
            cleared,
        })
    }

    /// Personalised insights over the caller's live dashboard figures.
    pub async fn insights(&self, user_id: Uuid, query: InsightsOptions) -> Result<ChatInsights, ApiError> {
        let view = self.dashboard.live(user_id).await?;
        let user_data = serde_json::to_value(&view)
            .map_err(|e| ApiError::internal_server_error(e.to_string()))?;
        let request = InsightsRequest {
            user_data,
            focus_areas: query.focus_areas,
        };
        Ok(self.gateway.chat_insights(&request).await?)
    }
}
