/// Confirmation-gated archive/report/delete flows.
pub mod confirmation;
/// Typed user intents.
pub mod events;
pub mod exchange;
/// Domain entities and the deterministic send state machine.
pub mod message;
pub mod sidebar;
pub mod view;

pub use confirmation::{ActionConfirmation, ConfirmOutcome, ConfirmRequest, ConfirmationState, ModalKind};
pub use events::{CancelReason, Intent};
pub use exchange::{MessageExchange, ReplyEffect, SendPlan, TitleRequest, TitleWrite};
pub use message::{
    Conversation, ConversationId, ExchangeId, ExchangeState, ExchangeTarget, ExchangeTransition,
    ExchangeTransitionRejection, ExchangeTransitionResult, Message, Role,
};
pub use sidebar::{ChatListPager, PageRequest, PagerState, PaginationCursor};
pub use view::DashboardView;
