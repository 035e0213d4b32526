use std::future::Future;
use std::pin::Pin;

pub mod error;
pub mod http;
pub mod ids;
pub mod types;

pub use error::{RemoteError, RemoteErrorKind, RemoteResult};
pub use http::{CSRF_HEADER, CsrfTokenSource, HttpRemoteStore, StaticCsrfToken};
pub use ids::ConversationId;
pub use types::{
    ChatPage, ChatStatus, ConnectionStatusRecord, ConversationDetail, ConversationRecord,
    DEFAULT_CHAT_TITLE, GeneratedTitle, MessageRecord, MessageRole, Quota, RateLimits,
    SendMessageResponse, StatusAction, Usage,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Conversation and message endpoints.
pub trait ChatStore: Send + Sync {
    fn create_chat<'a>(&'a self, title: &'a str) -> BoxFuture<'a, RemoteResult<ConversationRecord>>;
    fn get_chat<'a>(
        &'a self,
        chat_id: &'a ConversationId,
    ) -> BoxFuture<'a, RemoteResult<ConversationDetail>>;
    fn list_chats(&self) -> BoxFuture<'_, RemoteResult<Vec<ConversationRecord>>>;
    fn post_message<'a>(
        &'a self,
        chat_id: &'a ConversationId,
        content: &'a str,
    ) -> BoxFuture<'a, RemoteResult<SendMessageResponse>>;
    fn update_title<'a>(
        &'a self,
        chat_id: &'a ConversationId,
        title: &'a str,
    ) -> BoxFuture<'a, RemoteResult<()>>;
    fn generate_title<'a>(
        &'a self,
        chat_id: &'a ConversationId,
        user_message: &'a str,
        ai_response: &'a str,
    ) -> BoxFuture<'a, RemoteResult<GeneratedTitle>>;
    fn delete_chat<'a>(&'a self, chat_id: &'a ConversationId) -> BoxFuture<'a, RemoteResult<()>>;
}

/// Dashboard-scoped endpoints: status changes, provider health and list paging.
pub trait DashboardStore: Send + Sync {
    fn update_chat_status<'a>(
        &'a self,
        chat_id: &'a ConversationId,
        action: StatusAction,
    ) -> BoxFuture<'a, RemoteResult<()>>;
    fn connection_status(&self) -> BoxFuture<'_, RemoteResult<ConnectionStatusRecord>>;
    fn load_more_chats(&self, page: u32) -> BoxFuture<'_, RemoteResult<ChatPage>>;
}

pub trait RemoteStore: ChatStore + DashboardStore {}

impl<T> RemoteStore for T where T: ChatStore + DashboardStore {}
