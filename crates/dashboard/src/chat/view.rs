//! Pure projection of dashboard state into displayable regions.
//!
//! Nothing here performs IO or keeps state; identical input always yields identical output.

use std::fmt;

use skytorch_remote::{StatusAction, Usage};

use super::message::{Conversation, ConversationId, Message, Role};
use crate::status::{ConnectionState, ConnectionStatus};

pub const LANDING_SUBTITLE: &str = "Start a new conversation or select an existing chat";
pub const LANDING_PROMPT: &str = "Start New Chat";
pub const EMPTY_CONVERSATION_HEADING: &str = "New Chat Started";
pub const EMPTY_CONVERSATION_HINT: &str = "Start typing to begin your conversation with AI";
pub const THINKING_LABEL: &str = "Thinking";
pub const ACTION_MODAL_SUBTITLE: &str = "This action cannot be undone.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub subtitle: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub role: Role,
    pub content: String,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageItem {
    Message(MessageRow),
    /// Transient in-progress marker shown while a reply is awaited.
    Thinking,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePane {
    Landing { heading: String, prompt: String },
    EmptyConversation { heading: String, hint: String },
    Items(Vec<MessageItem>),
}

impl MessagePane {
    pub fn items(&self) -> &[MessageItem] {
        match self {
            Self::Items(items) => items,
            Self::Landing { .. } | Self::EmptyConversation { .. } => &[],
        }
    }

    pub fn has_thinking(&self) -> bool {
        self.items()
            .iter()
            .any(|item| matches!(item, MessageItem::Thinking))
    }

    /// Rendered messages, excluding the in-progress marker.
    pub fn message_rows(&self) -> impl Iterator<Item = &MessageRow> {
        self.items().iter().filter_map(|item| match item {
            MessageItem::Message(row) => Some(row),
            MessageItem::Thinking => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRow {
    pub id: ConversationId,
    pub title: String,
    pub subtitle: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFooter {
    #[default]
    Hidden,
    Loading,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorColor {
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorView {
    pub color: IndicatorColor,
    pub pulsing: bool,
    pub message: Option<String>,
    pub requests: Option<String>,
    pub tokens: Option<String>,
}

/// Severity of a confirmation dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalTone {
    Info,
    Warning,
    Danger,
}

impl ModalTone {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalView {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub confirm_label: String,
    pub tone: ModalTone,
    pub submitting: bool,
    pub error: Option<String>,
}

/// Every output region of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub header: Header,
    pub messages: MessagePane,
    pub input_visible: bool,
    pub actions_visible: bool,
    pub send_error: Option<String>,
    pub chat_list: Vec<ConversationRow>,
    pub list_footer: ListFooter,
    pub modal: Option<ModalView>,
    pub alert: Option<String>,
    pub indicator: IndicatorView,
}

impl DashboardView {
    pub fn landing(brand_name: &str) -> Self {
        Self {
            header: render_landing_header(brand_name),
            messages: render_landing_pane(brand_name),
            input_visible: false,
            actions_visible: false,
            send_error: None,
            chat_list: Vec::new(),
            list_footer: ListFooter::Hidden,
            modal: None,
            alert: None,
            indicator: render_connection_status(&ConnectionStatus::default()),
        }
    }
}

/// "1 message" or "N messages".
pub fn message_count_label(count: usize) -> String {
    if count == 1 {
        "1 message".to_string()
    } else {
        format!("{count} messages")
    }
}

/// Header for an open conversation: its title over the message count.
pub fn render_header(title: &str, message_count: usize) -> Header {
    Header {
        title: title.to_string(),
        subtitle: message_count_label(message_count),
    }
}

/// Header shown when no conversation is selected.
pub fn render_landing_header(brand_name: &str) -> Header {
    Header {
        title: format!("Welcome to {brand_name}"),
        subtitle: LANDING_SUBTITLE.to_string(),
    }
}

/// Landing body inviting the user to start a chat.
pub fn render_landing_pane(brand_name: &str) -> MessagePane {
    MessagePane::Landing {
        heading: format!("Welcome to {brand_name}"),
        prompt: LANDING_PROMPT.to_string(),
    }
}

/// One chat-list row.
pub fn render_conversation(conversation: &Conversation, selected: bool) -> ConversationRow {
    ConversationRow {
        id: conversation.id.clone(),
        title: conversation.title.clone(),
        subtitle: message_count_label(conversation.message_count as usize),
        selected,
    }
}

/// User messages align to the end, assistant messages to the start.
pub fn render_message(message: &Message) -> MessageRow {
    MessageRow {
        role: message.role,
        content: message.content.clone(),
        alignment: match message.role {
            Role::User => Alignment::End,
            Role::Assistant => Alignment::Start,
        },
    }
}

/// Ordered message list, or the empty-conversation placeholder when there is nothing to show.
pub fn render_messages(messages: &[Message], thinking: bool) -> MessagePane {
    if messages.is_empty() && !thinking {
        return MessagePane::EmptyConversation {
            heading: EMPTY_CONVERSATION_HEADING.to_string(),
            hint: EMPTY_CONVERSATION_HINT.to_string(),
        };
    }

    let mut items = messages
        .iter()
        .map(|message| MessageItem::Message(render_message(message)))
        .collect::<Vec<_>>();
    if thinking {
        items.push(MessageItem::Thinking);
    }
    MessagePane::Items(items)
}

/// `used/limit` pairs for requests and tokens, in that order.
pub fn render_usage(usage: &Usage) -> (String, String) {
    (
        format!("{}/{}", usage.requests.used, usage.requests.limit),
        format!("{}/{}", usage.tokens.used, usage.tokens.limit),
    )
}

/// Connected pulses green, warning pulses yellow, anything else is steady red.
pub fn render_connection_status(status: &ConnectionStatus) -> IndicatorView {
    let (color, pulsing) = match status.state {
        ConnectionState::Connected => (IndicatorColor::Green, true),
        ConnectionState::Warning => (IndicatorColor::Yellow, true),
        ConnectionState::Disconnected => (IndicatorColor::Red, false),
    };
    let (requests, tokens) = match status.usage.as_ref() {
        Some(usage) => {
            let (requests, tokens) = render_usage(usage);
            (Some(requests), Some(tokens))
        }
        None => (None, None),
    };

    IndicatorView {
        color,
        pulsing,
        message: status.message.clone(),
        requests,
        tokens,
    }
}

/// Copy for the archive/report/delete dialog, naming the target conversation.
pub fn render_action_modal(kind: StatusAction, target_title: &str) -> ModalView {
    let (title, description, confirm_label, tone) = match kind {
        StatusAction::Archive => (
            "Archive Chat?",
            "This will move the chat to your archived chats.",
            "Archive",
            ModalTone::Info,
        ),
        StatusAction::Report => (
            "Report Chat?",
            "This will flag the chat for review by our team.",
            "Report",
            ModalTone::Warning,
        ),
        StatusAction::Delete => (
            "Delete Chat?",
            "This will permanently delete the chat and all its messages.",
            "Delete",
            ModalTone::Danger,
        ),
    };

    ModalView {
        title: title.to_string(),
        subtitle: ACTION_MODAL_SUBTITLE.to_string(),
        description: description.replacen("the chat", &format!("\"{target_title}\""), 1),
        confirm_label: confirm_label.to_string(),
        tone,
        submitting: false,
        error: None,
    }
}

/// Copy for the per-row delete dialog.
pub fn render_delete_modal(target_title: &str) -> ModalView {
    ModalView {
        title: "Delete Chat?".to_string(),
        subtitle: ACTION_MODAL_SUBTITLE.to_string(),
        description: format!("Are you sure you want to delete \"{target_title}\"?"),
        confirm_label: "Delete".to_string(),
        tone: ModalTone::Danger,
        submitting: false,
        error: None,
    }
}

impl fmt::Display for DashboardView {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.indicator.color {
            IndicatorColor::Green => "connected",
            IndicatorColor::Yellow => "warning",
            IndicatorColor::Red => "disconnected",
        };
        write!(formatter, "[{status}]")?;
        if let (Some(requests), Some(tokens)) = (&self.indicator.requests, &self.indicator.tokens) {
            write!(formatter, " requests {requests} tokens {tokens}")?;
        }
        if let Some(message) = &self.indicator.message {
            write!(formatter, " {message}")?;
        }
        writeln!(formatter)?;

        writeln!(formatter, "== chats ==")?;
        for row in &self.chat_list {
            let marker = if row.selected { '>' } else { ' ' };
            writeln!(formatter, "{marker} [{}] {} ({})", row.id, row.title, row.subtitle)?;
        }
        match self.list_footer {
            ListFooter::Hidden => {}
            ListFooter::Loading => writeln!(formatter, "  loading more chats...")?,
            ListFooter::End => writeln!(formatter, "  no more chats")?,
        }

        writeln!(formatter, "== {} ({}) ==", self.header.title, self.header.subtitle)?;
        match &self.messages {
            MessagePane::Landing { heading, prompt } => {
                writeln!(formatter, "{heading}")?;
                writeln!(formatter, "/new to {}", prompt.to_lowercase())?;
            }
            MessagePane::EmptyConversation { heading, hint } => {
                writeln!(formatter, "{heading}")?;
                writeln!(formatter, "{hint}")?;
            }
            MessagePane::Items(items) => {
                for item in items {
                    match item {
                        MessageItem::Message(row) => {
                            let speaker = match row.role {
                                Role::User => "you",
                                Role::Assistant => "ai",
                            };
                            writeln!(formatter, "{speaker}> {}", row.content)?;
                        }
                        MessageItem::Thinking => writeln!(formatter, "ai> {THINKING_LABEL}...")?,
                    }
                }
            }
        }
        if let Some(error) = &self.send_error {
            writeln!(formatter, "! message failed: {error}")?;
        }

        if let Some(modal) = &self.modal {
            writeln!(
                formatter,
                "-- [{}] {} {} --",
                modal.tone.label(),
                modal.title,
                modal.subtitle
            )?;
            writeln!(formatter, "{}", modal.description)?;
            if let Some(error) = &modal.error {
                writeln!(formatter, "! {error}")?;
            }
            if modal.submitting {
                writeln!(formatter, "working...")?;
            } else {
                writeln!(formatter, "/confirm to {} or /cancel", modal.confirm_label.to_lowercase())?;
            }
        }
        if let Some(alert) = &self.alert {
            writeln!(formatter, "!! {alert} (/ok to dismiss)")?;
        }
        Ok(())
    }
}
