use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::ConversationId;

/// Title the store assigns to a conversation created from the dashboard.
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// Wire message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Lifecycle status of a conversation as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    #[default]
    Active,
    Archived,
    Reported,
    Deleted,
}

/// Status change requested through the generic status-update endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusAction {
    Archive,
    Report,
    Delete,
}

impl StatusAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Report => "report",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub title: String,
    #[serde(default)]
    pub message_count: u32,
    #[serde(default)]
    pub status: ChatStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub role: MessageRole,
    pub content: String,
}

impl MessageRecord {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub id: ConversationId,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
}

/// Rate-limit figures echoed by the store after a message send.
///
/// Figures arrive as JSON numbers or numeric strings depending on the upstream provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RateLimits {
    #[serde(default)]
    pub remaining_requests: Option<Value>,
    #[serde(default)]
    pub limit_requests: Option<Value>,
    #[serde(default)]
    pub remaining_tokens: Option<Value>,
    #[serde(default)]
    pub limit_tokens: Option<Value>,
}

impl RateLimits {
    pub fn from_figures(
        remaining_requests: u64,
        limit_requests: u64,
        remaining_tokens: u64,
        limit_tokens: u64,
    ) -> Self {
        Self {
            remaining_requests: Some(Value::from(remaining_requests)),
            limit_requests: Some(Value::from(limit_requests)),
            remaining_tokens: Some(Value::from(remaining_tokens)),
            limit_tokens: Some(Value::from(limit_tokens)),
        }
    }

    /// Derives consumed quota as `limit - remaining`.
    ///
    /// Returns `None` when any figure is missing, zero, non-numeric, or when remaining exceeds
    /// its limit.
    pub fn usage(&self) -> Option<Usage> {
        let remaining_requests = figure(self.remaining_requests.as_ref())?;
        let limit_requests = figure(self.limit_requests.as_ref())?;
        let remaining_tokens = figure(self.remaining_tokens.as_ref())?;
        let limit_tokens = figure(self.limit_tokens.as_ref())?;

        Some(Usage {
            requests: Quota::new(
                limit_requests.checked_sub(remaining_requests)?,
                limit_requests,
            ),
            tokens: Quota::new(limit_tokens.checked_sub(remaining_tokens)?, limit_tokens),
        })
    }
}

fn figure(value: Option<&Value>) -> Option<u64> {
    let parsed = match value? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (parsed != 0).then_some(parsed)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub assistant_message: MessageRecord,
    #[serde(default)]
    pub rate_limits: Option<RateLimits>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeneratedTitle {
    #[serde(default)]
    pub title: Option<String>,
}

impl GeneratedTitle {
    /// Returns the generated title when the store produced a non-blank one.
    pub fn usable(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quota {
    pub used: u64,
    pub limit: u64,
}

impl Quota {
    pub const fn new(used: u64, limit: u64) -> Self {
        Self { used, limit }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Usage {
    pub requests: Quota,
    pub tokens: Quota,
}

impl Usage {
    pub fn is_consistent(&self) -> bool {
        self.requests.used <= self.requests.limit && self.tokens.used <= self.tokens.limit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatusRecord {
    pub status: String,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPage {
    #[serde(default)]
    pub chats: Vec<ConversationRecord>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_page: Option<u32>,
}
