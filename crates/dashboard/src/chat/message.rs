use skytorch_remote::{ConversationRecord, MessageRecord, MessageRole};

pub use skytorch_remote::ConversationId;

/// Identifier for one send/reply round trip.
///
/// This must change on every send so a late reply can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub u64);

impl ExchangeId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Reconciliation key attached to every in-flight send.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExchangeTarget {
    pub conversation_id: ConversationId,
    pub exchange_id: ExchangeId,
}

impl ExchangeTarget {
    pub fn new(conversation_id: ConversationId, exchange_id: ExchangeId) -> Self {
        Self {
            conversation_id,
            exchange_id,
        }
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl From<MessageRole> for Role {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => Self::User,
            MessageRole::Assistant => Self::Assistant,
        }
    }
}

/// Rendered message. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self::new(record.role.into(), record.content)
    }
}

/// Conversation summary as shown in the chat list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub message_count: u32,
}

impl Conversation {
    pub fn new(id: ConversationId, title: impl Into<String>, message_count: u32) -> Self {
        Self {
            id,
            title: title.into(),
            message_count,
        }
    }
}

impl From<ConversationRecord> for Conversation {
    fn from(record: ConversationRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            message_count: record.message_count,
        }
    }
}

/// Lifecycle of the send flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExchangeState {
    #[default]
    Idle,
    Sending(ExchangeTarget),
    AwaitingReply(ExchangeTarget),
}

/// State transition input for the send flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeTransition {
    Begin(ExchangeTarget),
    Submitted(ExchangeTarget),
    Settle(ExchangeTarget),
    Abandon,
}

/// Rejection reason for illegal exchange transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeTransitionRejection {
    AlreadyInFlight {
        active: ExchangeTarget,
        attempted: ExchangeTarget,
    },
    NotSending,
    NoActiveExchange,
    TargetMismatch {
        active: ExchangeTarget,
        attempted: ExchangeTarget,
    },
}

pub type ExchangeTransitionResult = Result<ExchangeState, ExchangeTransitionRejection>;

impl ExchangeState {
    pub fn active_target(&self) -> Option<&ExchangeTarget> {
        match self {
            Self::Sending(target) | Self::AwaitingReply(target) => Some(target),
            Self::Idle => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true when a reply for `target` is the one currently awaited.
    pub fn accepts_reply(&self, target: &ExchangeTarget) -> bool {
        matches!(self, Self::AwaitingReply(active) if active == target)
    }

    /// Applies one transition deterministically.
    ///
    /// Only an idle flow may begin a new exchange. `Submitted` and `Settle` must name the
    /// exchange that is currently active.
    pub fn apply(&self, transition: ExchangeTransition) -> ExchangeTransitionResult {
        match transition {
            ExchangeTransition::Begin(target) => self.apply_begin(target),
            ExchangeTransition::Submitted(target) => self.apply_submitted(target),
            ExchangeTransition::Settle(target) => self.apply_settle(target),
            ExchangeTransition::Abandon => Ok(Self::Idle),
        }
    }

    fn apply_begin(&self, target: ExchangeTarget) -> ExchangeTransitionResult {
        match self {
            Self::Idle => Ok(Self::Sending(target)),
            Self::Sending(active) | Self::AwaitingReply(active) => {
                Err(ExchangeTransitionRejection::AlreadyInFlight {
                    active: active.clone(),
                    attempted: target,
                })
            }
        }
    }

    fn apply_submitted(&self, target: ExchangeTarget) -> ExchangeTransitionResult {
        match self {
            Self::Sending(active) if *active == target => Ok(Self::AwaitingReply(target)),
            Self::Sending(active) => Err(ExchangeTransitionRejection::TargetMismatch {
                active: active.clone(),
                attempted: target,
            }),
            Self::Idle | Self::AwaitingReply(_) => Err(ExchangeTransitionRejection::NotSending),
        }
    }

    fn apply_settle(&self, target: ExchangeTarget) -> ExchangeTransitionResult {
        match self {
            Self::AwaitingReply(active) if *active == target => Ok(Self::Idle),
            Self::AwaitingReply(active) => Err(ExchangeTransitionRejection::TargetMismatch {
                active: active.clone(),
                attempted: target,
            }),
            Self::Idle | Self::Sending(_) => Err(ExchangeTransitionRejection::NoActiveExchange),
        }
    }
}
