use skytorch_remote::StatusAction;

use crate::chat::ConversationId;
use crate::chat::view::{self, Header};

/// Destructive status change awaiting explicit confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub kind: StatusAction,
    pub target_id: ConversationId,
    pub target_title: String,
}

/// Conversation awaiting confirmation on the removal endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeleteTarget {
    pub id: ConversationId,
    pub title: String,
}

/// Identity of the active conversation plus the one pending confirmation.
///
/// Owned by the dashboard and handed to each flow explicitly. Holding a pending action and a
/// pending delete target at the same time is impossible: replacing one clears the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    active_conversation_id: Option<ConversationId>,
    active_conversation_title: Option<String>,
    pending_action: Option<PendingAction>,
    pending_delete_target: Option<PendingDeleteTarget>,
}

impl SessionContext {
    /// Conversation whose transcript is on screen, if any.
    pub fn active_conversation_id(&self) -> Option<&ConversationId> {
        self.active_conversation_id.as_ref()
    }

    /// Title shown in the header for the active conversation.
    pub fn active_conversation_title(&self) -> Option<&str> {
        self.active_conversation_title.as_deref()
    }

    /// Whether `conversation_id` is the active conversation.
    pub fn is_active(&self, conversation_id: &ConversationId) -> bool {
        self.active_conversation_id.as_ref() == Some(conversation_id)
    }

    /// Makes a freshly loaded conversation the active one.
    pub fn activate(&mut self, conversation_id: ConversationId, title: impl Into<String>) {
        self.active_conversation_id = Some(conversation_id);
        self.active_conversation_title = Some(title.into());
    }

    /// Retitles the active conversation. Ignored when nothing is active.
    pub fn set_active_title(&mut self, title: impl Into<String>) {
        if self.active_conversation_id.is_some() {
            self.active_conversation_title = Some(title.into());
        }
    }

    /// Back to no conversation selected. Pending confirmations are left alone.
    pub fn clear_active(&mut self) {
        self.active_conversation_id = None;
        self.active_conversation_title = None;
    }

    /// Status change awaiting confirmation.
    pub fn pending_action(&self) -> Option<&PendingAction> {
        self.pending_action.as_ref()
    }

    /// Conversation awaiting delete confirmation.
    pub fn pending_delete_target(&self) -> Option<&PendingDeleteTarget> {
        self.pending_delete_target.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_action.is_some() || self.pending_delete_target.is_some()
    }

    /// Replaces the pending action, dropping any pending delete target. Returns the previous action.
    pub fn replace_pending_action(&mut self, action: Option<PendingAction>) -> Option<PendingAction> {
        if action.is_some() {
            self.pending_delete_target = None;
        }
        std::mem::replace(&mut self.pending_action, action)
    }

    /// Replaces the pending delete target, dropping any pending action. Returns the previous target.
    pub fn replace_pending_delete_target(
        &mut self,
        target: Option<PendingDeleteTarget>,
    ) -> Option<PendingDeleteTarget> {
        if target.is_some() {
            self.pending_action = None;
        }
        std::mem::replace(&mut self.pending_delete_target, target)
    }

    /// Forgets both pending confirmations.
    pub fn clear_pending(&mut self) {
        self.pending_action = None;
        self.pending_delete_target = None;
    }

    /// Header for the active conversation, or the landing header when none is active.
    pub fn header(&self, brand_name: &str, message_count: usize) -> Header {
        match self.active_conversation_title.as_deref() {
            Some(title) if self.active_conversation_id.is_some() => {
                view::render_header(title, message_count)
            }
            _ => view::render_landing_header(brand_name),
        }
    }
}
