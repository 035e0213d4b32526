use std::fmt;
use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, Request, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::{ResultExt, ensure};

use super::error::{
    DecodeSnafu, EncodeBodySnafu, InvalidBaseUrlSnafu, RemoteResult, StatusSnafu, TransportSnafu,
    UnsupportedBaseUrlSnafu,
};
use super::ids::ConversationId;
use super::types::{
    ChatPage, ConnectionStatusRecord, ConversationDetail, ConversationRecord, GeneratedTitle,
    SendMessageResponse, StatusAction,
};
use super::{BoxFuture, ChatStore, DashboardStore};

/// Header carrying the per-session anti-forgery credential on mutating requests.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

const JSON_MEDIA_TYPE: &str = "application/json";

/// Supplies the anti-forgery credential. Retrieval and refresh live outside this crate.
pub trait CsrfTokenSource: Send + Sync {
    fn csrf_token(&self) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticCsrfToken {
    token: Option<String>,
}

impl StaticCsrfToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty()),
        }
    }
}

impl CsrfTokenSource for StaticCsrfToken {
    fn csrf_token(&self) -> Option<String> {
        self.token.clone()
    }
}

#[derive(Serialize)]
struct ChatParams<'a> {
    title: &'a str,
}

#[derive(Serialize)]
struct ChatEnvelope<'a> {
    chat: ChatParams<'a>,
}

#[derive(Serialize)]
struct MessageParams<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct MessageEnvelope<'a> {
    message: MessageParams<'a>,
}

#[derive(Serialize)]
struct GenerateTitleBody<'a> {
    user_message: &'a str,
    ai_response: &'a str,
}

#[derive(Serialize)]
struct StatusBody {
    status: StatusAction,
}

/// reqwest-backed remote store speaking the dashboard's JSON endpoints.
#[derive(Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: Url,
    csrf: Arc<dyn CsrfTokenSource>,
}

impl fmt::Debug for HttpRemoteStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HttpRemoteStore")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, csrf: Arc<dyn CsrfTokenSource>) -> RemoteResult<Self> {
        Self::with_client(Client::new(), base_url, csrf)
    }

    pub fn with_client(
        client: Client,
        base_url: &str,
        csrf: Arc<dyn CsrfTokenSource>,
    ) -> RemoteResult<Self> {
        let mut parsed = Url::parse(base_url.trim()).context(InvalidBaseUrlSnafu {
            stage: "http-store-parse-base-url",
            raw: base_url.to_string(),
        })?;
        ensure!(
            !parsed.cannot_be_a_base() && matches!(parsed.scheme(), "http" | "https"),
            UnsupportedBaseUrlSnafu {
                stage: "http-store-check-base-url",
                raw: base_url.to_string(),
            }
        );
        parsed.set_query(None);
        parsed.set_fragment(None);

        Ok(Self {
            client,
            base_url: parsed,
            csrf,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Base URLs are validated as hierarchical in the constructor, so segments are always writable.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn build(&self, method: Method, url: Url, stage: &'static str) -> RemoteResult<Request> {
        self.builder(method.clone(), url.clone())
            .build()
            .context(TransportSnafu {
                stage,
                method,
                path: url.path().to_string(),
            })
    }

    fn build_json<B>(
        &self,
        method: Method,
        url: Url,
        body: &B,
        stage: &'static str,
    ) -> RemoteResult<Request>
    where
        B: Serialize,
    {
        let payload = serde_json::to_vec(body).context(EncodeBodySnafu { stage })?;
        self.builder(method.clone(), url.clone())
            .header(CONTENT_TYPE, JSON_MEDIA_TYPE)
            .body(payload)
            .build()
            .context(TransportSnafu {
                stage,
                method,
                path: url.path().to_string(),
            })
    }

    fn builder(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let mutating = method != Method::GET;
        let mut builder = self
            .client
            .request(method, url)
            .header(ACCEPT, JSON_MEDIA_TYPE);
        if mutating && let Some(token) = self.csrf.csrf_token() {
            builder = builder.header(CSRF_HEADER, token);
        }
        builder
    }

    pub(crate) fn build_create_chat(&self, title: &str) -> RemoteResult<Request> {
        self.build_json(
            Method::POST,
            self.endpoint(&["chats"]),
            &ChatEnvelope {
                chat: ChatParams { title },
            },
            "create-chat",
        )
    }

    pub(crate) fn build_get_chat(&self, chat_id: &ConversationId) -> RemoteResult<Request> {
        self.build(
            Method::GET,
            self.endpoint(&["chats", chat_id.as_str()]),
            "get-chat",
        )
    }

    pub(crate) fn build_list_chats(&self) -> RemoteResult<Request> {
        self.build(Method::GET, self.endpoint(&["chats"]), "list-chats")
    }

    pub(crate) fn build_post_message(
        &self,
        chat_id: &ConversationId,
        content: &str,
    ) -> RemoteResult<Request> {
        self.build_json(
            Method::POST,
            self.endpoint(&["chats", chat_id.as_str(), "messages"]),
            &MessageEnvelope {
                message: MessageParams { content },
            },
            "post-message",
        )
    }

    pub(crate) fn build_update_title(
        &self,
        chat_id: &ConversationId,
        title: &str,
    ) -> RemoteResult<Request> {
        self.build_json(
            Method::PATCH,
            self.endpoint(&["chats", chat_id.as_str()]),
            &ChatEnvelope {
                chat: ChatParams { title },
            },
            "update-title",
        )
    }

    pub(crate) fn build_generate_title(
        &self,
        chat_id: &ConversationId,
        user_message: &str,
        ai_response: &str,
    ) -> RemoteResult<Request> {
        self.build_json(
            Method::POST,
            self.endpoint(&["chats", chat_id.as_str(), "generate_title"]),
            &GenerateTitleBody {
                user_message,
                ai_response,
            },
            "generate-title",
        )
    }

    pub(crate) fn build_delete_chat(&self, chat_id: &ConversationId) -> RemoteResult<Request> {
        self.build(
            Method::DELETE,
            self.endpoint(&["chats", chat_id.as_str()]),
            "delete-chat",
        )
    }

    pub(crate) fn build_update_chat_status(
        &self,
        chat_id: &ConversationId,
        action: StatusAction,
    ) -> RemoteResult<Request> {
        self.build_json(
            Method::PATCH,
            self.endpoint(&["dashboard", "update_chat_status", chat_id.as_str()]),
            &StatusBody { status: action },
            "update-chat-status",
        )
    }

    pub(crate) fn build_connection_status(&self) -> RemoteResult<Request> {
        self.build(
            Method::GET,
            self.endpoint(&["dashboard", "connection_status"]),
            "connection-status",
        )
    }

    pub(crate) fn build_load_more_chats(&self, page: u32) -> RemoteResult<Request> {
        let mut url = self.endpoint(&["dashboard", "load_more_chats"]);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string());
        self.build(Method::GET, url, "load-more-chats")
    }

    async fn send(&self, request: Request, stage: &'static str) -> RemoteResult<String> {
        let method = request.method().clone();
        let path = request.url().path().to_string();

        let response = self
            .client
            .execute(request)
            .await
            .context(TransportSnafu {
                stage,
                method: method.clone(),
                path: path.clone(),
            })?;
        let status = response.status();
        let body = response.text().await.context(TransportSnafu {
            stage,
            method: method.clone(),
            path: path.clone(),
        })?;

        if !status.is_success() {
            tracing::warn!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                "remote store rejected request"
            );
            return StatusSnafu {
                stage,
                method,
                path,
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        tracing::debug!(method = %method, path = %path, status = status.as_u16(), "remote request completed");
        Ok(body)
    }

    async fn send_json<T>(&self, request: Request, stage: &'static str) -> RemoteResult<T>
    where
        T: DeserializeOwned,
    {
        let method = request.method().clone();
        let path = request.url().path().to_string();
        let body = self.send(request, stage).await?;

        serde_json::from_str(&body).with_context(|_| DecodeSnafu {
            stage,
            method,
            path,
            body: body.clone(),
        })
    }
}

impl ChatStore for HttpRemoteStore {
    fn create_chat<'a>(&'a self, title: &'a str) -> BoxFuture<'a, RemoteResult<ConversationRecord>> {
        Box::pin(async move {
            let request = self.build_create_chat(title)?;
            self.send_json(request, "create-chat").await
        })
    }

    fn get_chat<'a>(
        &'a self,
        chat_id: &'a ConversationId,
    ) -> BoxFuture<'a, RemoteResult<ConversationDetail>> {
        Box::pin(async move {
            let request = self.build_get_chat(chat_id)?;
            self.send_json(request, "get-chat").await
        })
    }

    fn list_chats(&self) -> BoxFuture<'_, RemoteResult<Vec<ConversationRecord>>> {
        Box::pin(async move {
            let request = self.build_list_chats()?;
            self.send_json(request, "list-chats").await
        })
    }

    fn post_message<'a>(
        &'a self,
        chat_id: &'a ConversationId,
        content: &'a str,
    ) -> BoxFuture<'a, RemoteResult<SendMessageResponse>> {
        Box::pin(async move {
            let request = self.build_post_message(chat_id, content)?;
            self.send_json(request, "post-message").await
        })
    }

    fn update_title<'a>(
        &'a self,
        chat_id: &'a ConversationId,
        title: &'a str,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let request = self.build_update_title(chat_id, title)?;
            self.send(request, "update-title").await.map(|_| ())
        })
    }

    fn generate_title<'a>(
        &'a self,
        chat_id: &'a ConversationId,
        user_message: &'a str,
        ai_response: &'a str,
    ) -> BoxFuture<'a, RemoteResult<GeneratedTitle>> {
        Box::pin(async move {
            let request = self.build_generate_title(chat_id, user_message, ai_response)?;
            self.send_json(request, "generate-title").await
        })
    }

    fn delete_chat<'a>(&'a self, chat_id: &'a ConversationId) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let request = self.build_delete_chat(chat_id)?;
            self.send(request, "delete-chat").await.map(|_| ())
        })
    }
}

impl DashboardStore for HttpRemoteStore {
    fn update_chat_status<'a>(
        &'a self,
        chat_id: &'a ConversationId,
        action: StatusAction,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let request = self.build_update_chat_status(chat_id, action)?;
            self.send(request, "update-chat-status").await.map(|_| ())
        })
    }

    fn connection_status(&self) -> BoxFuture<'_, RemoteResult<ConnectionStatusRecord>> {
        Box::pin(async move {
            let request = self.build_connection_status()?;
            self.send_json(request, "connection-status").await
        })
    }

    fn load_more_chats(&self, page: u32) -> BoxFuture<'_, RemoteResult<ChatPage>> {
        Box::pin(async move {
            let request = self.build_load_more_chats(page)?;
            self.send_json(request, "load-more-chats").await
        })
    }
}
