use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ChatRole;

/// One message of a user's conversation with the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub session_id: Option<String>,
    /// Set on assistant turns: the query category the backend answered.
    pub query_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(
        user_id: Uuid,
        role: ChatRole,
        content: impl Into<String>,
        session_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            role,
            content: content.into(),
            session_id,
            query_type: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_query_type(mut self, query_type: impl Into<String>) -> Self {
        self.query_type = Some(query_type.into());
        self
    }
}

/// A user's stored conversation, oldest turn first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTranscript {
    pub messages: Vec<ChatTurn>,
    pub total_messages: usize,
}

impl From<Vec<ChatTurn>> for ChatTranscript {
    fn from(messages: Vec<ChatTurn>) -> Self {
        Self {
            total_messages: messages.len(),
            messages,
        }
    }
}
