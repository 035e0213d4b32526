use skytorch_remote::StatusAction;

use crate::chat::message::ConversationId;

/// How an open confirmation modal was dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    CancelControl,
    Backdrop,
    Escape,
}

/// One user-triggered action. Each variant is handled by exactly one flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Creates a conversation with the default title and opens it.
    NewChat,
    SelectChat(ConversationId),
    Send(String),
    /// Scroll reached the end of the chat list.
    LoadMore,
    RefreshList,
    /// Opens the destructive-action modal for the active conversation.
    RequestAction(StatusAction),
    /// Opens the delete-confirmation modal for a listed conversation.
    RequestDelete(ConversationId),
    Confirm,
    Cancel(CancelReason),
    ReturnToDashboard,
    DismissAlert,
}

impl Intent {
    /// Returns true for intents that only make sense while a modal is open.
    pub fn targets_modal(&self) -> bool {
        matches!(self, Self::Confirm | Self::Cancel(_))
    }
}
