use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use skytorch_remote::{
    BoxFuture, ChatPage, ChatStore, ConversationDetail, ConversationRecord, DashboardStore,
    GeneratedTitle, RemoteResult, RemoteStore, SendMessageResponse,
};
use tokio::sync::{mpsc, watch};

use crate::chat::exchange::{self, ReplyEffect, TitleRequest, TitleWrite};
use crate::chat::view::{self, DashboardView};
use crate::chat::{
    ActionConfirmation, ChatListPager, ConfirmOutcome, ConfirmRequest, ConversationId,
    ExchangeTarget, Intent, Message, MessageExchange, PageRequest,
};
use crate::session::SessionContext;
use crate::settings::Settings;
use crate::status::StatusBoard;

/// Copy and sizing knobs the orchestration layer needs from [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardOptions {
    pub brand_name: String,
    pub new_chat_title: String,
    pub initial_page_size: usize,
    pub title_max_chars: usize,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for DashboardOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            brand_name: settings.brand_name.clone(),
            new_chat_title: settings.new_chat_title.clone(),
            initial_page_size: settings.initial_page_size,
            title_max_chars: settings.title_max_chars,
        }
    }
}

/// Settled remote request, applied back on the task that owns the dashboard.
#[derive(Debug)]
pub enum Outcome {
    ChatCreated(RemoteResult<ConversationRecord>),
    ChatLoaded {
        seq: u64,
        chat_id: ConversationId,
        result: RemoteResult<ConversationDetail>,
    },
    ReplyReceived {
        target: ExchangeTarget,
        result: RemoteResult<SendMessageResponse>,
    },
    TitleSaved {
        write: TitleWrite,
        result: RemoteResult<()>,
    },
    TitleGenerated {
        chat_id: ConversationId,
        result: RemoteResult<GeneratedTitle>,
    },
    ListRefreshed {
        generation: u64,
        result: RemoteResult<Vec<ConversationRecord>>,
    },
    PageLoaded {
        request: PageRequest,
        result: RemoteResult<ChatPage>,
    },
    Confirmed {
        request: ConfirmRequest,
        result: RemoteResult<()>,
    },
}

/// The orchestration layer.
///
/// Intents run synchronously against local state and may start remote requests. Requests never
/// touch state themselves; each resolves to an [`Outcome`] that [`Dashboard::apply`] reconciles.
pub struct Dashboard {
    store: Arc<dyn RemoteStore>,
    board: StatusBoard,
    options: DashboardOptions,
    session: SessionContext,
    exchange: MessageExchange,
    pager: ChatListPager,
    confirmation: ActionConfirmation,
    load_seq: u64,
    alert: Option<String>,
    in_flight: FuturesUnordered<BoxFuture<'static, Outcome>>,
}

impl Dashboard {
    pub fn new(store: Arc<dyn RemoteStore>, board: StatusBoard, options: DashboardOptions) -> Self {
        Self {
            store,
            board,
            exchange: MessageExchange::new(options.title_max_chars),
            pager: ChatListPager::new(options.initial_page_size),
            options,
            session: SessionContext::default(),
            confirmation: ActionConfirmation::default(),
            load_seq: 0,
            alert: None,
            in_flight: FuturesUnordered::new(),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn pager(&self) -> &ChatListPager {
        &self.pager
    }

    pub fn exchange(&self) -> &MessageExchange {
        &self.exchange
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn spawn<F>(&mut self, request: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        self.in_flight.push(Box::pin(request));
    }

    /// Handles one intent. Remote work is queued, never awaited here.
    pub fn dispatch(&mut self, intent: Intent) {
        if intent.targets_modal() && !self.confirmation.is_open() {
            tracing::debug!(?intent, "no modal open");
        }

        match intent {
            Intent::NewChat => self.create_chat(),
            Intent::SelectChat(chat_id) => self.select_chat(chat_id),
            Intent::Send(text) => self.send(&text),
            Intent::LoadMore => self.load_more(),
            Intent::RefreshList => self.refresh_list(),
            Intent::RequestAction(kind) => {
                self.confirmation.open_action(&mut self.session, kind);
            }
            Intent::RequestDelete(chat_id) => self.request_delete(chat_id),
            Intent::Confirm => self.confirm(),
            Intent::Cancel(reason) => {
                self.confirmation.cancel(&mut self.session, reason);
            }
            Intent::ReturnToDashboard => {
                self.confirmation.reset(&mut self.session);
                self.show_landing();
                self.refresh_list();
            }
            Intent::DismissAlert => self.alert = None,
        }
    }

    fn create_chat(&mut self) {
        let store = Arc::clone(&self.store);
        let title = self.options.new_chat_title.clone();
        self.spawn(async move { Outcome::ChatCreated(store.create_chat(&title).await) });
    }

    fn select_chat(&mut self, chat_id: ConversationId) {
        if self.session.is_active(&chat_id) && self.exchange.conversation_id() == Some(&chat_id) {
            // Still the latest selection, so loads requested before it must not land.
            self.load_seq += 1;
            tracing::debug!(conversation_id = %chat_id, "conversation already open");
            return;
        }
        self.open_chat(chat_id);
    }

    fn open_chat(&mut self, chat_id: ConversationId) {
        self.load_seq += 1;
        let seq = self.load_seq;
        let store = Arc::clone(&self.store);
        self.spawn(async move {
            let result = store.get_chat(&chat_id).await;
            Outcome::ChatLoaded {
                seq,
                chat_id,
                result,
            }
        });
    }

    fn send(&mut self, text: &str) {
        let Some(plan) = self.exchange.begin_send(&self.session, text) else {
            return;
        };

        if let Some(write) = plan.provisional_title {
            self.save_title(write);
        }

        let store = Arc::clone(&self.store);
        let target = plan.target;
        let content = plan.content;
        self.spawn(async move {
            let result = store.post_message(&target.conversation_id, &content).await;
            Outcome::ReplyReceived { target, result }
        });
    }

    fn save_title(&mut self, write: TitleWrite) {
        let store = Arc::clone(&self.store);
        self.spawn(async move {
            let result = store.update_title(&write.conversation_id, &write.title).await;
            Outcome::TitleSaved { write, result }
        });
    }

    fn generate_title(&mut self, request: TitleRequest) {
        let store = Arc::clone(&self.store);
        self.spawn(async move {
            let result = store
                .generate_title(
                    &request.conversation_id,
                    &request.user_message,
                    &request.ai_response,
                )
                .await;
            Outcome::TitleGenerated {
                chat_id: request.conversation_id,
                result,
            }
        });
    }

    fn load_more(&mut self) {
        let Some(request) = self.pager.begin_load_more() else {
            return;
        };
        let store = Arc::clone(&self.store);
        self.spawn(async move {
            let result = store.load_more_chats(request.page).await;
            Outcome::PageLoaded { request, result }
        });
    }

    fn refresh_list(&mut self) {
        let generation = self.pager.begin_refresh();
        let store = Arc::clone(&self.store);
        self.spawn(async move {
            let result = store.list_chats().await;
            Outcome::ListRefreshed { generation, result }
        });
    }

    fn request_delete(&mut self, chat_id: ConversationId) {
        let title = self
            .pager
            .title_of(&chat_id)
            .or_else(|| {
                self.session
                    .is_active(&chat_id)
                    .then(|| self.session.active_conversation_title())
                    .flatten()
            })
            .map(str::to_string);
        let Some(title) = title else {
            tracing::debug!(conversation_id = %chat_id, "delete requested for unknown conversation");
            return;
        };
        self.confirmation.open_delete(&mut self.session, chat_id, title);
    }

    fn confirm(&mut self) {
        let Some(request) = self.confirmation.confirm(&self.session) else {
            return;
        };

        let store = Arc::clone(&self.store);
        self.spawn(async move {
            let result = match &request {
                ConfirmRequest::Status { action, .. } => {
                    store.update_chat_status(&action.target_id, action.kind).await
                }
                ConfirmRequest::Delete { target, .. } => store.delete_chat(&target.id).await,
            };
            Outcome::Confirmed { request, result }
        });
    }

    fn show_landing(&mut self) {
        self.session.clear_active();
        self.exchange.clear();
    }

    /// Reconciles one settled request with current state.
    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::ChatCreated(result) => match result {
                Ok(record) => {
                    tracing::info!(conversation_id = %record.id, title = %record.title, "chat created");
                    self.open_chat(record.id);
                    self.refresh_list();
                }
                Err(error) => {
                    tracing::warn!(stage = error.stage(), error = %error, "failed to create chat");
                }
            },
            Outcome::ChatLoaded {
                seq,
                chat_id,
                result,
            } => self.apply_chat_loaded(seq, chat_id, result),
            Outcome::ReplyReceived { target, result } => {
                if let Some(usage) = exchange::reply_usage(&result) {
                    self.board.update_usage(usage);
                }
                match self.exchange.finish_send(&self.session, &target, result) {
                    ReplyEffect::Replied { generate_title } => {
                        tracing::info!(conversation_id = %target.conversation_id, "assistant replied");
                        if let Some(request) = generate_title {
                            self.generate_title(request);
                        }
                        self.refresh_list();
                    }
                    ReplyEffect::Stale | ReplyEffect::Failed => {}
                }
            }
            Outcome::TitleSaved { write, result } => match result {
                Ok(()) => {
                    if self.exchange.accept_title(&write) {
                        self.pager.rename(&write.conversation_id, &write.title);
                        if self.session.is_active(&write.conversation_id) {
                            self.session.set_active_title(write.title.as_str());
                        }
                        tracing::info!(conversation_id = %write.conversation_id, title = %write.title, "chat title updated");
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        conversation_id = %write.conversation_id,
                        stage = error.stage(),
                        error = %error,
                        "failed to update chat title"
                    );
                }
            },
            Outcome::TitleGenerated { chat_id, result } => match result {
                Ok(generated) => match generated.usable() {
                    Some(title) => {
                        let write = self.exchange.issue_title(chat_id, title);
                        self.save_title(write);
                    }
                    None => {
                        tracing::debug!(conversation_id = %chat_id, "store produced no title");
                    }
                },
                Err(error) => {
                    tracing::warn!(
                        conversation_id = %chat_id,
                        stage = error.stage(),
                        error = %error,
                        "failed to generate chat title"
                    );
                }
            },
            Outcome::ListRefreshed { generation, result } => {
                self.pager.finish_refresh(generation, result);
            }
            Outcome::PageLoaded { request, result } => {
                self.pager.finish_load_more(request, result);
            }
            Outcome::Confirmed { request, result } => {
                match self.confirmation.finish(&mut self.session, &request, result) {
                    ConfirmOutcome::Completed { neutralize } => {
                        if let ConfirmRequest::Delete { target, .. } = &request {
                            self.pager.remove(&target.id);
                        }
                        if neutralize {
                            self.show_landing();
                        }
                        self.refresh_list();
                    }
                    ConfirmOutcome::Alert(message) => self.alert = Some(message),
                    ConfirmOutcome::Failed => {}
                }
            }
        }
    }

    fn apply_chat_loaded(
        &mut self,
        seq: u64,
        chat_id: ConversationId,
        result: RemoteResult<ConversationDetail>,
    ) {
        if seq != self.load_seq {
            tracing::debug!(conversation_id = %chat_id, "discarding superseded chat load");
            return;
        }

        match result {
            Ok(detail) => {
                let messages = detail
                    .messages
                    .into_iter()
                    .map(Message::from)
                    .collect::<Vec<_>>();
                tracing::info!(
                    conversation_id = %detail.id,
                    messages = messages.len(),
                    "chat opened"
                );
                self.session.activate(detail.id.clone(), detail.title);
                self.exchange.load_transcript(detail.id, messages);
            }
            Err(error) => {
                tracing::warn!(
                    conversation_id = %chat_id,
                    stage = error.stage(),
                    error = %error,
                    "failed to load chat"
                );
            }
        }
    }

    /// Waits for the next request to settle, without applying it.
    pub async fn next_outcome(&mut self) -> Option<Outcome> {
        self.in_flight.next().await
    }

    /// Applies outcomes, including the follow-ups they start, until nothing is in flight.
    pub async fn settle(&mut self) {
        while let Some(outcome) = self.next_outcome().await {
            self.apply(outcome);
        }
    }

    /// Collects every outcome currently in flight so callers can apply them in any order.
    pub async fn drain_outcomes(&mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(self.in_flight.len());
        while let Some(outcome) = self.next_outcome().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn view(&self) -> DashboardView {
        let brand = self.options.brand_name.as_str();
        let active = self.session.active_conversation_id();
        let showing_chat = active.is_some() && self.exchange.conversation_id() == active;

        DashboardView {
            header: self
                .session
                .header(brand, self.exchange.transcript().len()),
            messages: if showing_chat {
                self.exchange.pane()
            } else {
                view::render_landing_pane(brand)
            },
            input_visible: showing_chat,
            actions_visible: showing_chat,
            send_error: self.exchange.last_error().map(str::to_string),
            chat_list: self.pager.rows(active),
            list_footer: self.pager.footer(),
            modal: self.confirmation.modal_view(&self.session),
            alert: self.alert.clone(),
            indicator: view::render_connection_status(&self.board.snapshot()),
        }
    }

    /// Drives the dashboard until the intent channel closes, publishing every changed view.
    pub async fn run(mut self, mut intents: mpsc::Receiver<Intent>, views: watch::Sender<DashboardView>) {
        let mut status_changes = self.board.subscribe();
        self.refresh_list();
        views.send_replace(self.view());

        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(intent) => self.dispatch(intent),
                    None => break,
                },
                Some(outcome) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.apply(outcome);
                }
                _ = status_changes.changed() => {}
            }

            let next = self.view();
            views.send_if_modified(|current| {
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
        }

        tracing::info!(in_flight = self.in_flight.len(), "dashboard stopped");
    }
}
