use std::collections::HashMap;

use skytorch_remote::{RateLimits, RemoteResult, SendMessageResponse, Usage};

use crate::chat::message::{
    ConversationId, ExchangeId, ExchangeState, ExchangeTarget, ExchangeTransition, Message,
};
use crate::chat::view::{self, MessagePane};
use crate::session::SessionContext;

pub const TITLE_ELLIPSIS: &str = "...";

/// Title change waiting on `PATCH /chats/:id`, ordered per conversation by `revision`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleWrite {
    pub conversation_id: ConversationId,
    pub title: String,
    pub revision: u64,
}

/// Inputs for `POST /chats/:id/generate_title`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleRequest {
    pub conversation_id: ConversationId,
    pub user_message: String,
    pub ai_response: String,
}

/// Phase-1 result of a send: what the remote round trip must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendPlan {
    pub target: ExchangeTarget,
    pub content: String,
    pub provisional_title: Option<TitleWrite>,
}

/// How a settled send changed the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEffect {
    /// The reply targeted an exchange or conversation that is no longer current.
    Stale,
    Replied { generate_title: Option<TitleRequest> },
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingReply {
    user_text: String,
    first_exchange: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TitleRevision {
    issued: u64,
    applied: Option<u64>,
}

/// Send flow for the active conversation: optimistic append, in-progress marker, reconciliation.
#[derive(Debug)]
pub struct MessageExchange {
    conversation_id: Option<ConversationId>,
    transcript: Vec<Message>,
    state: ExchangeState,
    pending: Option<PendingReply>,
    next_exchange_id: u64,
    title_max_chars: usize,
    last_error: Option<String>,
    title_revisions: HashMap<ConversationId, TitleRevision>,
}

impl MessageExchange {
    pub fn new(title_max_chars: usize) -> Self {
        Self {
            conversation_id: None,
            transcript: Vec::new(),
            state: ExchangeState::Idle,
            pending: None,
            next_exchange_id: 1,
            title_max_chars: title_max_chars.max(1),
            last_error: None,
            title_revisions: HashMap::new(),
        }
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True while the in-progress marker should be shown.
    pub fn is_thinking(&self) -> bool {
        !self.state.is_idle()
    }

    pub fn pane(&self) -> MessagePane {
        view::render_messages(&self.transcript, self.is_thinking())
    }

    /// Replaces the transcript with a freshly opened conversation.
    ///
    /// Any exchange still in flight is abandoned; its reply will be discarded as stale.
    pub fn load_transcript(&mut self, conversation_id: ConversationId, messages: Vec<Message>) {
        self.abandon();
        self.conversation_id = Some(conversation_id);
        self.transcript = messages;
        self.last_error = None;
    }

    pub fn clear(&mut self) {
        self.abandon();
        self.conversation_id = None;
        self.transcript.clear();
        self.last_error = None;
    }

    fn abandon(&mut self) {
        if let Some(target) = self.state.active_target() {
            tracing::debug!(
                conversation_id = %target.conversation_id,
                exchange_id = target.exchange_id.0,
                "abandoning in-flight exchange"
            );
        }
        if let Ok(next) = self.state.apply(ExchangeTransition::Abandon) {
            self.state = next;
        }
        self.pending = None;
    }

    /// Phase 1 of a send. Returns `None` (and changes nothing) for blank text, when no
    /// conversation is active, or while another exchange is in flight.
    pub fn begin_send(&mut self, session: &SessionContext, text: &str) -> Option<SendPlan> {
        let content = text.trim();
        if content.is_empty() {
            tracing::debug!("ignoring blank message");
            return None;
        }
        let Some(conversation_id) = session.active_conversation_id().cloned() else {
            tracing::debug!("ignoring message without an active conversation");
            return None;
        };
        if self.conversation_id.as_ref() != Some(&conversation_id) {
            tracing::debug!(conversation_id = %conversation_id, "transcript not loaded yet, ignoring message");
            return None;
        }

        let target = ExchangeTarget::new(conversation_id.clone(), ExchangeId::new(self.next_exchange_id));
        let sending = match self.state.apply(ExchangeTransition::Begin(target.clone())) {
            Ok(state) => state,
            Err(rejection) => {
                tracing::debug!(?rejection, "send rejected while another exchange is in flight");
                return None;
            }
        };
        self.next_exchange_id += 1;

        let first_exchange = self.transcript.is_empty();
        self.transcript.push(Message::user(content));
        self.last_error = None;
        self.state = match sending.apply(ExchangeTransition::Submitted(target.clone())) {
            Ok(state) => state,
            Err(rejection) => {
                tracing::warn!(?rejection, "exchange failed to enter awaiting state");
                sending
            }
        };
        self.pending = Some(PendingReply {
            user_text: content.to_string(),
            first_exchange,
        });

        let provisional_title = first_exchange.then(|| {
            let title = provisional_title(content, self.title_max_chars);
            self.issue_title(conversation_id, title)
        });

        Some(SendPlan {
            target,
            content: content.to_string(),
            provisional_title,
        })
    }

    /// Phase 2 of a send: reconciles the store's answer for `target`.
    pub fn finish_send(
        &mut self,
        session: &SessionContext,
        target: &ExchangeTarget,
        result: RemoteResult<SendMessageResponse>,
    ) -> ReplyEffect {
        if !self.state.accepts_reply(target) || !session.is_active(&target.conversation_id) {
            tracing::debug!(
                conversation_id = %target.conversation_id,
                exchange_id = target.exchange_id.0,
                "discarding stale reply"
            );
            return ReplyEffect::Stale;
        }

        self.state = match self.state.apply(ExchangeTransition::Settle(target.clone())) {
            Ok(state) => state,
            Err(rejection) => {
                tracing::warn!(?rejection, "failed to settle exchange");
                ExchangeState::Idle
            }
        };
        let pending = self.pending.take();

        match result {
            Ok(response) => {
                let reply = Message::from(response.assistant_message);
                let generate_title = pending
                    .filter(|pending| pending.first_exchange)
                    .map(|pending| TitleRequest {
                        conversation_id: target.conversation_id.clone(),
                        user_message: pending.user_text,
                        ai_response: reply.content.clone(),
                    });
                self.transcript.push(reply);
                ReplyEffect::Replied { generate_title }
            }
            Err(error) => {
                tracing::warn!(
                    conversation_id = %target.conversation_id,
                    stage = error.stage(),
                    error = %error,
                    "message send failed"
                );
                self.last_error = Some(error.to_string());
                ReplyEffect::Failed
            }
        }
    }

    /// Allocates the next title revision for `conversation_id`.
    pub fn issue_title(&mut self, conversation_id: ConversationId, title: impl Into<String>) -> TitleWrite {
        let revision = self.title_revisions.entry(conversation_id.clone()).or_default();
        revision.issued += 1;
        TitleWrite {
            conversation_id,
            title: title.into(),
            revision: revision.issued,
        }
    }

    /// Returns true when a persisted title write is not older than the last one applied.
    pub fn accept_title(&mut self, write: &TitleWrite) -> bool {
        let revision = self
            .title_revisions
            .entry(write.conversation_id.clone())
            .or_default();
        if revision.applied.is_some_and(|applied| write.revision < applied) {
            tracing::debug!(
                conversation_id = %write.conversation_id,
                revision = write.revision,
                "skipping superseded title write"
            );
            return false;
        }
        revision.applied = Some(write.revision);
        true
    }
}

/// Usage figures carried by a send response, if all four are present and sane.
pub fn reply_usage(result: &RemoteResult<SendMessageResponse>) -> Option<Usage> {
    result
        .as_ref()
        .ok()?
        .rate_limits
        .as_ref()
        .and_then(RateLimits::usage)
}

/// First message as a title: truncated to `max_chars` characters, with an ellipsis when cut.
pub fn provisional_title(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head = chars.by_ref().take(max_chars).collect::<String>();
    if chars.next().is_some() {
        format!("{head}{TITLE_ELLIPSIS}")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use skytorch_remote::{MessageRecord, MessageRole, Quota, RemoteError};

    use super::*;

    fn id(raw: &str) -> ConversationId {
        ConversationId::parse(raw).unwrap()
    }

    fn active(raw: &str) -> (SessionContext, MessageExchange) {
        let mut session = SessionContext::default();
        session.activate(id(raw), "New Chat");
        let mut exchange = MessageExchange::new(100);
        exchange.load_transcript(id(raw), Vec::new());
        (session, exchange)
    }

    fn reply(content: &str) -> RemoteResult<SendMessageResponse> {
        Ok(SendMessageResponse {
            assistant_message: MessageRecord::new(MessageRole::Assistant, content),
            rate_limits: None,
        })
    }

    fn decode_failure() -> RemoteError {
        RemoteError::Decode {
            stage: "test",
            method: reqwest::Method::POST,
            path: "/chats/c1/messages".to_string(),
            body: "{".to_string(),
            source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        }
    }

    #[test]
    fn provisional_title_truncates_on_char_boundaries() {
        assert_eq!(provisional_title("Hello", 100), "Hello");
        let long = "é".repeat(150);
        let title = provisional_title(&long, 100);
        assert_eq!(title.chars().count(), 103);
        assert!(title.ends_with("..."));
        assert_eq!(provisional_title(&"a".repeat(100), 100), "a".repeat(100));
    }

    #[test]
    fn blank_text_or_no_active_conversation_is_a_no_op() {
        let (session, mut exchange) = active("c1");
        assert_eq!(exchange.begin_send(&session, "   \n"), None);

        let mut idle = MessageExchange::new(100);
        assert_eq!(idle.begin_send(&SessionContext::default(), "Hello"), None);
        assert!(idle.transcript().is_empty());
        assert!(exchange.transcript().is_empty());
        assert!(exchange.state().is_idle());
    }

    #[test]
    fn first_send_appends_optimistically_and_issues_title() {
        let (session, mut exchange) = active("c1");

        let plan = exchange.begin_send(&session, "  Hello  ").unwrap();

        assert_eq!(plan.content, "Hello");
        assert_eq!(
            plan.provisional_title.as_ref().map(|write| write.title.as_str()),
            Some("Hello")
        );
        assert_eq!(exchange.transcript(), &[Message::user("Hello")]);
        assert!(exchange.is_thinking());
        assert!(exchange.pane().has_thinking());

        let effect = exchange.finish_send(&session, &plan.target, reply("Hi there"));

        assert_eq!(
            effect,
            ReplyEffect::Replied {
                generate_title: Some(TitleRequest {
                    conversation_id: id("c1"),
                    user_message: "Hello".to_string(),
                    ai_response: "Hi there".to_string(),
                })
            }
        );
        assert_eq!(exchange.transcript().len(), 2);
        assert!(!exchange.pane().has_thinking());
    }

    #[test]
    fn later_sends_neither_retitle_nor_generate() {
        let (session, mut exchange) = active("c1");
        let first = exchange.begin_send(&session, "Hello").unwrap();
        exchange.finish_send(&session, &first.target, reply("Hi"));

        let second = exchange.begin_send(&session, "Again").unwrap();
        assert_eq!(second.provisional_title, None);
        assert_eq!(
            exchange.finish_send(&session, &second.target, reply("Sure")),
            ReplyEffect::Replied {
                generate_title: None
            }
        );
    }

    #[test]
    fn second_send_while_awaiting_is_ignored() {
        let (session, mut exchange) = active("c1");
        exchange.begin_send(&session, "Hello").unwrap();

        assert_eq!(exchange.begin_send(&session, "Again"), None);
        assert_eq!(exchange.transcript(), &[Message::user("Hello")]);
    }

    #[test]
    fn failed_send_keeps_user_message_and_records_error() {
        let (session, mut exchange) = active("c1");
        let plan = exchange.begin_send(&session, "Hello").unwrap();

        let effect = exchange.finish_send(&session, &plan.target, Err(decode_failure()));

        assert_eq!(effect, ReplyEffect::Failed);
        assert_eq!(exchange.transcript(), &[Message::user("Hello")]);
        assert!(exchange.last_error().is_some());
        assert!(!exchange.is_thinking());
    }

    #[test]
    fn reply_after_switching_conversation_is_discarded() {
        let (mut session, mut exchange) = active("c1");
        let plan = exchange.begin_send(&session, "Hello").unwrap();

        session.activate(id("c2"), "Other");
        exchange.load_transcript(id("c2"), vec![Message::user("Earlier")]);
        assert!(exchange.state().is_idle());
        assert!(!exchange.is_thinking());

        assert_eq!(
            exchange.finish_send(&session, &plan.target, reply("Hi")),
            ReplyEffect::Stale
        );
        assert_eq!(exchange.transcript(), &[Message::user("Earlier")]);
    }

    #[test]
    fn older_title_revision_never_overwrites_newer() {
        let mut exchange = MessageExchange::new(100);
        let provisional = exchange.issue_title(id("c1"), "Hello");
        let generated = exchange.issue_title(id("c1"), "Greeting");

        assert!(exchange.accept_title(&generated));
        assert!(!exchange.accept_title(&provisional));

        let other = exchange.issue_title(id("c2"), "Other");
        assert_eq!(other.revision, 1);
        assert!(exchange.accept_title(&other));
    }

    #[test]
    fn usage_is_read_from_rate_limits() {
        let result = Ok(SendMessageResponse {
            assistant_message: MessageRecord::new(MessageRole::Assistant, "Hi"),
            rate_limits: Some(RateLimits::from_figures(95, 100, 9000, 10000)),
        });

        assert_eq!(
            reply_usage(&result),
            Some(Usage {
                requests: Quota::new(5, 100),
                tokens: Quota::new(1000, 10000),
            })
        );
        assert_eq!(reply_usage(&reply("Hi")), None);
        assert_eq!(reply_usage(&Err(decode_failure())), None);
    }
}
