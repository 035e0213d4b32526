use skytorch_remote::{RemoteError, RemoteErrorKind, RemoteResult, StatusAction};

use crate::chat::events::CancelReason;
use crate::chat::message::ConversationId;
use crate::chat::view::{self, ModalView};
use crate::session::{PendingAction, PendingDeleteTarget, SessionContext};

pub const DELETE_FAILED_ALERT: &str = "Failed to delete chat. Please try again.";
pub const DELETE_ERROR_ALERT: &str = "Error deleting chat. Please try again.";

/// Which of the two confirmation modals is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModalKind {
    /// Archive/report/delete routed through the status-update endpoint.
    Action(StatusAction),
    /// Per-row removal routed through `DELETE /chats/:id`.
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfirmationState {
    #[default]
    Closed,
    Open {
        kind: ModalKind,
        ticket: u64,
        submitting: bool,
        error: Option<String>,
    },
}

/// Confirmed request handed to the store. `ticket` identifies the modal that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmRequest {
    Status { ticket: u64, action: PendingAction },
    Delete { ticket: u64, target: PendingDeleteTarget },
}

impl ConfirmRequest {
    pub fn ticket(&self) -> u64 {
        match self {
            Self::Status { ticket, .. } | Self::Delete { ticket, .. } => *ticket,
        }
    }

    pub fn target_id(&self) -> &ConversationId {
        match self {
            Self::Status { action, .. } => &action.target_id,
            Self::Delete { target, .. } => &target.id,
        }
    }
}

/// What the dashboard must do once a confirmed request settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The request succeeded. `neutralize` is set when the acted-on conversation was active.
    Completed { neutralize: bool },
    /// The request failed; the modal, if still open, shows the error.
    Failed,
    /// Delete failed; a blocking alert must be shown.
    Alert(String),
}

/// Confirmation-gated destructive actions. At most one modal is open at a time.
#[derive(Debug, Default)]
pub struct ActionConfirmation {
    state: ConfirmationState,
    next_ticket: u64,
}

impl ActionConfirmation {
    pub fn state(&self) -> &ConfirmationState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ConfirmationState::Open { .. })
    }

    fn is_submitting(&self) -> bool {
        matches!(self.state, ConfirmationState::Open { submitting: true, .. })
    }

    fn open(&mut self, kind: ModalKind) {
        self.next_ticket += 1;
        self.state = ConfirmationState::Open {
            kind,
            ticket: self.next_ticket,
            submitting: false,
            error: None,
        };
    }

    /// Opens the destructive-action modal for the active conversation.
    pub fn open_action(&mut self, session: &mut SessionContext, kind: StatusAction) -> bool {
        if self.is_submitting() {
            tracing::debug!("confirmation already submitting, ignoring new action");
            return false;
        }
        let (Some(target_id), Some(target_title)) = (
            session.active_conversation_id().cloned(),
            session.active_conversation_title().map(str::to_string),
        ) else {
            tracing::debug!(action = kind.as_str(), "no active conversation for action");
            return false;
        };

        session.replace_pending_action(Some(PendingAction {
            kind,
            target_id,
            target_title,
        }));
        self.open(ModalKind::Action(kind));
        true
    }

    /// Opens the delete-confirmation modal for a listed conversation.
    pub fn open_delete(
        &mut self,
        session: &mut SessionContext,
        id: ConversationId,
        title: impl Into<String>,
    ) -> bool {
        if self.is_submitting() {
            tracing::debug!("confirmation already submitting, ignoring delete request");
            return false;
        }

        session.replace_pending_delete_target(Some(PendingDeleteTarget {
            id,
            title: title.into(),
        }));
        self.open(ModalKind::Delete);
        true
    }

    /// Issues the confirmed request once. Repeated confirms while submitting are ignored.
    pub fn confirm(&mut self, session: &SessionContext) -> Option<ConfirmRequest> {
        let ConfirmationState::Open {
            kind,
            ticket,
            submitting,
            error,
        } = &mut self.state
        else {
            return None;
        };
        if *submitting {
            tracing::debug!("confirm ignored while request is in flight");
            return None;
        }

        let request = match kind {
            ModalKind::Action(_) => session.pending_action().cloned().map(|action| {
                ConfirmRequest::Status {
                    ticket: *ticket,
                    action,
                }
            }),
            ModalKind::Delete => session.pending_delete_target().cloned().map(|target| {
                ConfirmRequest::Delete {
                    ticket: *ticket,
                    target,
                }
            }),
        }?;

        *submitting = true;
        *error = None;
        Some(request)
    }

    /// Closes the modal and clears pending state without contacting the store.
    pub fn cancel(&mut self, session: &mut SessionContext, reason: CancelReason) -> bool {
        let was_open = self.reset(session);
        if was_open {
            tracing::debug!(?reason, "confirmation cancelled");
        }
        was_open
    }

    /// Closes whatever is open. A request already in flight still settles through [`Self::finish`].
    pub fn reset(&mut self, session: &mut SessionContext) -> bool {
        let was_open = self.is_open();
        self.state = ConfirmationState::Closed;
        session.clear_pending();
        was_open
    }

    fn is_current(&self, ticket: u64) -> bool {
        matches!(self.state, ConfirmationState::Open { ticket: current, .. } if current == ticket)
    }

    fn close_if_current(&mut self, session: &mut SessionContext, ticket: u64) {
        if self.is_current(ticket) {
            self.state = ConfirmationState::Closed;
            session.clear_pending();
        }
    }

    fn record_failure(&mut self, ticket: u64, message: String) {
        if let ConfirmationState::Open {
            ticket: current,
            submitting,
            error,
            ..
        } = &mut self.state
            && *current == ticket
        {
            *submitting = false;
            *error = Some(message);
        }
    }

    /// Settles a confirmed request from either modal.
    pub fn finish(
        &mut self,
        session: &mut SessionContext,
        request: &ConfirmRequest,
        result: RemoteResult<()>,
    ) -> ConfirmOutcome {
        let ticket = request.ticket();
        match result {
            Ok(()) => {
                let neutralize = session.is_active(request.target_id());
                self.close_if_current(session, ticket);
                match request {
                    ConfirmRequest::Status { action, .. } => tracing::info!(
                        conversation_id = %action.target_id,
                        action = action.kind.as_str(),
                        "chat status updated"
                    ),
                    ConfirmRequest::Delete { target, .. } => tracing::info!(
                        conversation_id = %target.id,
                        title = %target.title,
                        "chat deleted"
                    ),
                }
                ConfirmOutcome::Completed { neutralize }
            }
            Err(error) => match request {
                ConfirmRequest::Status { action, .. } => {
                    tracing::warn!(
                        conversation_id = %action.target_id,
                        action = action.kind.as_str(),
                        stage = error.stage(),
                        error = %error,
                        "chat status update failed"
                    );
                    self.record_failure(ticket, error.to_string());
                    ConfirmOutcome::Failed
                }
                ConfirmRequest::Delete { target, .. } => {
                    tracing::error!(
                        conversation_id = %target.id,
                        stage = error.stage(),
                        error = %error,
                        "chat delete failed"
                    );
                    let alert = delete_alert(&error);
                    self.record_failure(ticket, error.to_string());
                    ConfirmOutcome::Alert(alert.to_string())
                }
            },
        }
    }

    pub fn modal_view(&self, session: &SessionContext) -> Option<ModalView> {
        let ConfirmationState::Open {
            kind,
            submitting,
            error,
            ..
        } = &self.state
        else {
            return None;
        };

        let mut modal = match kind {
            ModalKind::Action(action) => {
                let title = session.pending_action()?.target_title.as_str();
                view::render_action_modal(*action, title)
            }
            ModalKind::Delete => view::render_delete_modal(&session.pending_delete_target()?.title),
        };
        modal.submitting = *submitting;
        modal.error = error.clone();
        Some(modal)
    }
}

fn delete_alert(error: &RemoteError) -> &'static str {
    match error.kind() {
        RemoteErrorKind::Status => DELETE_FAILED_ALERT,
        RemoteErrorKind::Transport | RemoteErrorKind::Decode | RemoteErrorKind::Configuration => {
            DELETE_ERROR_ALERT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> ConversationId {
        ConversationId::parse(raw).unwrap()
    }

    fn active_session() -> SessionContext {
        let mut session = SessionContext::default();
        session.activate(id("c1"), "Trip plans");
        session
    }

    fn status_failure(status: u16) -> RemoteError {
        RemoteError::Status {
            stage: "test",
            method: reqwest::Method::DELETE,
            path: "/chats/c1".to_string(),
            status,
            body: String::new(),
        }
    }

    #[test]
    fn action_requires_active_conversation() {
        let mut confirmation = ActionConfirmation::default();
        let mut session = SessionContext::default();

        assert!(!confirmation.open_action(&mut session, StatusAction::Archive));
        assert!(!confirmation.is_open());
        assert!(!session.has_pending());
    }

    #[test]
    fn confirm_issues_one_request_for_the_target() {
        let mut confirmation = ActionConfirmation::default();
        let mut session = active_session();
        assert!(confirmation.open_action(&mut session, StatusAction::Archive));

        let request = confirmation.confirm(&session).unwrap();
        assert_eq!(confirmation.confirm(&session), None);

        let ConfirmRequest::Status { action, .. } = &request else {
            panic!("expected a status request");
        };
        assert_eq!(action.target_id, id("c1"));
        assert_eq!(action.kind, StatusAction::Archive);
        assert!(confirmation.modal_view(&session).unwrap().submitting);

        let outcome = confirmation.finish(&mut session, &request, Ok(()));
        assert_eq!(outcome, ConfirmOutcome::Completed { neutralize: true });
        assert!(!confirmation.is_open());
        assert!(session.pending_action().is_none());
    }

    #[test]
    fn cancel_clears_pending_for_every_reason() {
        for reason in [CancelReason::CancelControl, CancelReason::Backdrop, CancelReason::Escape] {
            let mut confirmation = ActionConfirmation::default();
            let mut session = active_session();
            confirmation.open_delete(&mut session, id("c9"), "Old");

            assert!(confirmation.cancel(&mut session, reason));
            assert!(!session.has_pending());
            assert_eq!(confirmation.modal_view(&session), None);
            assert_eq!(confirmation.confirm(&session), None);
        }
    }

    #[test]
    fn opening_one_modal_replaces_the_other() {
        let mut confirmation = ActionConfirmation::default();
        let mut session = active_session();
        confirmation.open_action(&mut session, StatusAction::Report);

        confirmation.open_delete(&mut session, id("c2"), "Other");

        assert!(session.pending_action().is_none());
        let modal = confirmation.modal_view(&session).unwrap();
        assert_eq!(modal.title, "Delete Chat?");
        assert!(modal.description.contains("Other"));
    }

    #[test]
    fn failed_status_update_keeps_modal_open_with_error() {
        let mut confirmation = ActionConfirmation::default();
        let mut session = active_session();
        confirmation.open_action(&mut session, StatusAction::Report);
        let request = confirmation.confirm(&session).unwrap();

        let outcome = confirmation.finish(&mut session, &request, Err(status_failure(500)));

        assert_eq!(outcome, ConfirmOutcome::Failed);
        let modal = confirmation.modal_view(&session).unwrap();
        assert!(!modal.submitting);
        assert!(modal.error.is_some());
        assert!(session.pending_action().is_some());
        assert!(confirmation.confirm(&session).is_some());
    }

    #[test]
    fn delete_failures_raise_alerts_by_class() {
        let mut confirmation = ActionConfirmation::default();
        let mut session = active_session();
        confirmation.open_delete(&mut session, id("c1"), "Trip plans");
        let request = confirmation.confirm(&session).unwrap();

        assert_eq!(
            confirmation.finish(&mut session, &request, Err(status_failure(422))),
            ConfirmOutcome::Alert(DELETE_FAILED_ALERT.to_string())
        );

        let request = confirmation.confirm(&session).unwrap();
        let decode = RemoteError::Decode {
            stage: "test",
            method: reqwest::Method::DELETE,
            path: "/chats/c1".to_string(),
            body: "<html>".to_string(),
            source: serde_json::from_str::<serde_json::Value>("<html>").unwrap_err(),
        };
        assert_eq!(
            confirmation.finish(&mut session, &request, Err(decode)),
            ConfirmOutcome::Alert(DELETE_ERROR_ALERT.to_string())
        );
        assert!(confirmation.is_open());
    }

    #[test]
    fn success_after_cancel_leaves_new_modal_alone() {
        let mut confirmation = ActionConfirmation::default();
        let mut session = active_session();
        confirmation.open_delete(&mut session, id("c1"), "Trip plans");
        let request = confirmation.confirm(&session).unwrap();
        confirmation.cancel(&mut session, CancelReason::Escape);
        confirmation.open_delete(&mut session, id("c2"), "Other");

        let outcome = confirmation.finish(&mut session, &request, Ok(()));

        assert_eq!(outcome, ConfirmOutcome::Completed { neutralize: true });
        assert!(confirmation.is_open());
        assert_eq!(session.pending_delete_target().map(|target| target.id.clone()), Some(id("c2")));
    }
}
