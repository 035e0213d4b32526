//! Scripted in-memory store for driving flows in tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use reqwest::Method;
use skytorch_remote::{
    BoxFuture, ChatPage, ChatStore, ConnectionStatusRecord, ConversationDetail, ConversationId,
    ConversationRecord, DashboardStore, GeneratedTitle, MessageRecord, MessageRole, RateLimits,
    RemoteError, RemoteResult, SendMessageResponse, StatusAction,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    CreateChat { title: String },
    GetChat(String),
    ListChats,
    PostMessage { chat_id: String, content: String },
    UpdateTitle { chat_id: String, title: String },
    GenerateTitle {
        chat_id: String,
        user_message: String,
        ai_response: String,
    },
    DeleteChat(String),
    UpdateChatStatus { chat_id: String, action: StatusAction },
    ConnectionStatus,
    LoadMoreChats(u32),
}

/// Queue of canned results for one endpoint. An empty queue answers with a 500.
pub(crate) struct Script<T> {
    path: &'static str,
    queue: Mutex<VecDeque<RemoteResult<T>>>,
}

impl<T> Script<T> {
    fn new(path: &'static str) -> Self {
        Self {
            path,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn push_ok(&self, value: T) {
        self.queue.lock().unwrap().push_back(Ok(value));
    }

    pub(crate) fn push_err(&self, error: RemoteError) {
        self.queue.lock().unwrap().push_back(Err(error));
    }

    fn next(&self) -> RemoteResult<T> {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(status_error(self.path, 500)))
    }
}

pub(crate) fn status_error(path: &str, status: u16) -> RemoteError {
    RemoteError::Status {
        stage: "scripted-store",
        method: Method::GET,
        path: path.to_string(),
        status,
        body: "unscripted".to_string(),
    }
}

pub(crate) fn decode_error(path: &str) -> RemoteError {
    RemoteError::Decode {
        stage: "scripted-store",
        method: Method::GET,
        path: path.to_string(),
        body: "<html>".to_string(),
        source: serde_json::from_str::<serde_json::Value>("<html>").unwrap_err(),
    }
}

pub(crate) struct ScriptedStore {
    pub(crate) create_chat: Script<ConversationRecord>,
    pub(crate) get_chat: Script<ConversationDetail>,
    pub(crate) list_chats: Script<Vec<ConversationRecord>>,
    pub(crate) post_message: Script<SendMessageResponse>,
    pub(crate) update_title: Script<()>,
    pub(crate) generate_title: Script<GeneratedTitle>,
    pub(crate) delete_chat: Script<()>,
    pub(crate) update_chat_status: Script<()>,
    pub(crate) connection_status: Script<ConnectionStatusRecord>,
    pub(crate) load_more_chats: Script<ChatPage>,
    calls: Mutex<Vec<Call>>,
}

impl Default for ScriptedStore {
    fn default() -> Self {
        Self {
            create_chat: Script::new("/chats"),
            get_chat: Script::new("/chats/:id"),
            list_chats: Script::new("/chats"),
            post_message: Script::new("/chats/:id/messages"),
            update_title: Script::new("/chats/:id"),
            generate_title: Script::new("/chats/:id/generate_title"),
            delete_chat: Script::new("/chats/:id"),
            update_chat_status: Script::new("/dashboard/update_chat_status/:id"),
            connection_status: Script::new("/dashboard/connection_status"),
            load_more_chats: Script::new("/dashboard/load_more_chats"),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedStore {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ChatStore for ScriptedStore {
    fn create_chat<'a>(&'a self, title: &'a str) -> BoxFuture<'a, RemoteResult<ConversationRecord>> {
        self.record(Call::CreateChat {
            title: title.to_string(),
        });
        Box::pin(async move { self.create_chat.next() })
    }

    fn get_chat<'a>(
        &'a self,
        chat_id: &'a ConversationId,
    ) -> BoxFuture<'a, RemoteResult<ConversationDetail>> {
        self.record(Call::GetChat(chat_id.to_string()));
        Box::pin(async move { self.get_chat.next() })
    }

    fn list_chats(&self) -> BoxFuture<'_, RemoteResult<Vec<ConversationRecord>>> {
        self.record(Call::ListChats);
        Box::pin(async move { self.list_chats.next() })
    }

    fn post_message<'a>(
        &'a self,
        chat_id: &'a ConversationId,
        content: &'a str,
    ) -> BoxFuture<'a, RemoteResult<SendMessageResponse>> {
        self.record(Call::PostMessage {
            chat_id: chat_id.to_string(),
            content: content.to_string(),
        });
        Box::pin(async move { self.post_message.next() })
    }

    fn update_title<'a>(
        &'a self,
        chat_id: &'a ConversationId,
        title: &'a str,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        self.record(Call::UpdateTitle {
            chat_id: chat_id.to_string(),
            title: title.to_string(),
        });
        Box::pin(async move { self.update_title.next() })
    }

    fn generate_title<'a>(
        &'a self,
        chat_id: &'a ConversationId,
        user_message: &'a str,
        ai_response: &'a str,
    ) -> BoxFuture<'a, RemoteResult<GeneratedTitle>> {
        self.record(Call::GenerateTitle {
            chat_id: chat_id.to_string(),
            user_message: user_message.to_string(),
            ai_response: ai_response.to_string(),
        });
        Box::pin(async move { self.generate_title.next() })
    }

    fn delete_chat<'a>(&'a self, chat_id: &'a ConversationId) -> BoxFuture<'a, RemoteResult<()>> {
        self.record(Call::DeleteChat(chat_id.to_string()));
        Box::pin(async move { self.delete_chat.next() })
    }
}

impl DashboardStore for ScriptedStore {
    fn update_chat_status<'a>(
        &'a self,
        chat_id: &'a ConversationId,
        action: StatusAction,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        self.record(Call::UpdateChatStatus {
            chat_id: chat_id.to_string(),
            action,
        });
        Box::pin(async move { self.update_chat_status.next() })
    }

    fn connection_status(&self) -> BoxFuture<'_, RemoteResult<ConnectionStatusRecord>> {
        self.record(Call::ConnectionStatus);
        Box::pin(async move { self.connection_status.next() })
    }

    fn load_more_chats(&self, page: u32) -> BoxFuture<'_, RemoteResult<ChatPage>> {
        self.record(Call::LoadMoreChats(page));
        Box::pin(async move { self.load_more_chats.next() })
    }
}

pub(crate) fn id(raw: &str) -> ConversationId {
    ConversationId::parse(raw).unwrap()
}

pub(crate) fn record(raw: &str, title: &str, message_count: u32) -> ConversationRecord {
    ConversationRecord {
        id: id(raw),
        title: title.to_string(),
        message_count,
        status: Default::default(),
    }
}

pub(crate) fn detail(raw: &str, title: &str, messages: Vec<MessageRecord>) -> ConversationDetail {
    ConversationDetail {
        id: id(raw),
        title: title.to_string(),
        messages,
    }
}

pub(crate) fn assistant_reply(content: &str) -> SendMessageResponse {
    SendMessageResponse {
        assistant_message: MessageRecord::new(MessageRole::Assistant, content),
        rate_limits: None,
    }
}

pub(crate) fn assistant_reply_with_limits(content: &str, limits: RateLimits) -> SendMessageResponse {
    SendMessageResponse {
        assistant_message: MessageRecord::new(MessageRole::Assistant, content),
        rate_limits: Some(limits),
    }
}
