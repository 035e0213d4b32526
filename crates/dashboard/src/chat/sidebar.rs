use skytorch_remote::{ChatPage, ConversationRecord, RemoteResult};

use crate::chat::message::{Conversation, ConversationId};
use crate::chat::view::{self, ConversationRow, ListFooter};

/// Derived from the cursor: loading wins, then exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PagerState {
    #[default]
    Idle,
    Loading,
    End,
}

/// Incremental list-loading progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    pub page: u32,
    pub has_more: bool,
    pub loading: bool,
}

impl Default for PaginationCursor {
    fn default() -> Self {
        Self {
            page: 1,
            has_more: true,
            loading: false,
        }
    }
}

/// Page fetch issued by [`ChatListPager::begin_load_more`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub generation: u64,
    pub page: u32,
}

/// Conversation list with scroll paging.
///
/// Every full refresh starts a new generation. Results tagged with an older generation are
/// dropped so a page fetched for a previous list is never appended to a fresh one.
#[derive(Debug)]
pub struct ChatListPager {
    entries: Vec<Conversation>,
    cursor: PaginationCursor,
    generation: u64,
    initial_page_size: usize,
}

impl ChatListPager {
    pub fn new(initial_page_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: PaginationCursor::default(),
            generation: 0,
            initial_page_size: initial_page_size.max(1),
        }
    }

    /// Listed conversations in display order.
    pub fn entries(&self) -> &[Conversation] {
        &self.entries
    }

    /// Current `(page, has_more, loading)` triple.
    pub fn cursor(&self) -> PaginationCursor {
        self.cursor
    }

    pub fn state(&self) -> PagerState {
        if self.cursor.loading {
            PagerState::Loading
        } else if !self.cursor.has_more {
            PagerState::End
        } else {
            PagerState::Idle
        }
    }

    /// Whether `conversation_id` is already listed.
    pub fn contains(&self, conversation_id: &ConversationId) -> bool {
        self.entries.iter().any(|entry| entry.id == *conversation_id)
    }

    /// Title of a listed conversation.
    pub fn title_of(&self, conversation_id: &ConversationId) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.id == *conversation_id)
            .map(|entry| entry.title.as_str())
    }

    /// Invalidates every in-flight page and returns the refresh generation.
    ///
    /// The cursor keeps its page and end marker until the refresh succeeds, so a failed refresh
    /// leaves paging where it was. Only `loading` is cleared, letting a stalled fetch be retried.
    pub fn begin_refresh(&mut self) -> u64 {
        self.generation += 1;
        self.cursor.loading = false;
        self.generation
    }

    /// Replaces the list with the first entries of `GET /chats`.
    pub fn finish_refresh(
        &mut self,
        generation: u64,
        result: RemoteResult<Vec<ConversationRecord>>,
    ) -> bool {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "discarding stale list refresh");
            return false;
        }

        match result {
            Ok(records) => {
                let mut entries = Vec::with_capacity(self.initial_page_size);
                for record in records {
                    if entries.len() == self.initial_page_size {
                        break;
                    }
                    if !entries.iter().any(|entry: &Conversation| entry.id == record.id) {
                        entries.push(Conversation::from(record));
                    }
                }
                self.entries = entries;
                // Pages requested between begin and apply belong to the list just replaced.
                self.generation += 1;
                self.cursor = PaginationCursor::default();
                tracing::debug!(count = self.entries.len(), "chat list refreshed");
                true
            }
            Err(error) => {
                tracing::warn!(stage = error.stage(), error = %error, "chat list refresh failed");
                false
            }
        }
    }

    /// Starts a page fetch unless one is already running or the list is exhausted.
    pub fn begin_load_more(&mut self) -> Option<PageRequest> {
        if self.state() != PagerState::Idle {
            tracing::debug!(state = ?self.state(), "load more ignored");
            return None;
        }

        self.cursor.loading = true;
        Some(PageRequest {
            generation: self.generation,
            page: self.cursor.page,
        })
    }

    /// Appends a fetched page, skipping ids already listed. Returns how many rows were added.
    pub fn finish_load_more(&mut self, request: PageRequest, result: RemoteResult<ChatPage>) -> usize {
        if request.generation != self.generation {
            tracing::debug!(page = request.page, "discarding page from a previous list");
            return 0;
        }
        self.cursor.loading = false;

        let page = match result {
            Ok(page) => page,
            Err(error) => {
                tracing::warn!(
                    page = request.page,
                    stage = error.stage(),
                    error = %error,
                    "failed to load more chats"
                );
                return 0;
            }
        };

        let before = self.entries.len();
        for record in page.chats {
            if !self.contains(&record.id) {
                self.entries.push(Conversation::from(record));
            }
        }

        self.cursor.has_more = page.has_more;
        if page.has_more {
            let current = self.cursor.page;
            self.cursor.page = page
                .next_page
                .filter(|next| *next > current)
                .unwrap_or(current.saturating_add(1));
        }

        let added = self.entries.len() - before;
        tracing::debug!(page = request.page, added, has_more = page.has_more, "loaded chat page");
        added
    }

    /// Drops a row locally, ahead of the next refresh.
    pub fn remove(&mut self, conversation_id: &ConversationId) -> Option<Conversation> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.id == *conversation_id)?;
        Some(self.entries.remove(index))
    }

    /// Applies a saved title to its row. Returns false when the row is not listed.
    pub fn rename(&mut self, conversation_id: &ConversationId, title: &str) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.id == *conversation_id)
        {
            Some(entry) => {
                entry.title = title.to_string();
                true
            }
            None => false,
        }
    }

    /// Rendered rows, marking `selected`.
    pub fn rows(&self, selected: Option<&ConversationId>) -> Vec<ConversationRow> {
        self.entries
            .iter()
            .map(|entry| view::render_conversation(entry, selected == Some(&entry.id)))
            .collect()
    }

    pub fn footer(&self) -> ListFooter {
        match self.state() {
            PagerState::Idle => ListFooter::Hidden,
            PagerState::Loading => ListFooter::Loading,
            PagerState::End => ListFooter::End,
        }
    }
}

#[cfg(test)]
mod tests {
    use skytorch_remote::RemoteError;

    use super::*;

    fn record(raw: &str) -> ConversationRecord {
        ConversationRecord {
            id: ConversationId::parse(raw).unwrap(),
            title: format!("Chat {raw}"),
            message_count: 2,
            status: Default::default(),
        }
    }

    fn page(ids: &[&str], has_more: bool, next_page: Option<u32>) -> ChatPage {
        ChatPage {
            chats: ids.iter().map(|raw| record(raw)).collect(),
            has_more,
            next_page,
        }
    }

    fn failure() -> RemoteError {
        RemoteError::Status {
            stage: "test",
            method: reqwest::Method::GET,
            path: "/dashboard/load_more_chats".to_string(),
            status: 500,
            body: String::new(),
        }
    }

    fn refreshed(ids: &[&str], size: usize) -> ChatListPager {
        let mut pager = ChatListPager::new(size);
        let generation = pager.begin_refresh();
        assert!(pager.finish_refresh(generation, Ok(ids.iter().map(|raw| record(raw)).collect())));
        pager
    }

    #[test]
    fn refresh_keeps_initial_page_size_entries() {
        let pager = refreshed(&["1", "2", "3", "4"], 3);

        let ids = pager.entries().iter().map(|entry| entry.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(pager.cursor(), PaginationCursor::default());
    }

    #[test]
    fn load_more_while_loading_issues_nothing() {
        let mut pager = refreshed(&["1"], 8);
        let first = pager.begin_load_more().unwrap();
        let cursor = pager.cursor();

        assert_eq!(pager.begin_load_more(), None);
        assert_eq!(pager.cursor(), cursor);
        assert_eq!(pager.footer(), ListFooter::Loading);
        assert_eq!(first.page, 1);
    }

    #[test]
    fn pages_append_without_duplicates_and_advance_until_exhausted() {
        let mut pager = refreshed(&["1", "2"], 8);

        let request = pager.begin_load_more().unwrap();
        assert_eq!(pager.finish_load_more(request, Ok(page(&["2", "3"], true, Some(2)))), 1);
        assert_eq!(pager.cursor().page, 2);

        let request = pager.begin_load_more().unwrap();
        assert_eq!(request.page, 2);
        // A server that repeats its page number still moves the cursor forward.
        pager.finish_load_more(request, Ok(page(&["4"], true, Some(2))));
        assert_eq!(pager.cursor().page, 3);

        let request = pager.begin_load_more().unwrap();
        pager.finish_load_more(request, Ok(page(&["5"], false, None)));
        assert_eq!(pager.cursor().page, 3);
        assert_eq!(pager.state(), PagerState::End);
        assert_eq!(pager.footer(), ListFooter::End);
        assert_eq!(pager.begin_load_more(), None);

        let mut ids = pager.entries().iter().map(|entry| entry.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn failed_page_leaves_cursor_for_retry() {
        let mut pager = refreshed(&["1"], 8);
        let request = pager.begin_load_more().unwrap();

        assert_eq!(pager.finish_load_more(request, Err(failure())), 0);

        assert_eq!(pager.cursor(), PaginationCursor::default());
        assert_eq!(pager.begin_load_more().map(|retry| retry.page), Some(1));
    }

    #[test]
    fn refresh_invalidates_in_flight_pages() {
        let mut pager = refreshed(&["1"], 8);
        let request = pager.begin_load_more().unwrap();

        let generation = pager.begin_refresh();
        assert_eq!(pager.state(), PagerState::Idle);
        assert!(pager.finish_refresh(generation, Ok(vec![record("9")])));

        assert_eq!(pager.finish_load_more(request, Ok(page(&["2"], true, Some(2)))), 0);
        assert_eq!(pager.entries().len(), 1);
        assert_eq!(pager.cursor(), PaginationCursor::default());
        assert!(!pager.finish_refresh(generation, Ok(Vec::new())));
    }

    #[test]
    fn failed_refresh_keeps_paging_position() {
        let mut pager = refreshed(&["1"], 8);
        let request = pager.begin_load_more().unwrap();
        pager.finish_load_more(request, Ok(page(&["2"], true, Some(2))));
        let request = pager.begin_load_more().unwrap();
        pager.finish_load_more(request, Ok(page(&["3"], false, None)));
        let cursor = pager.cursor();

        let generation = pager.begin_refresh();
        assert!(!pager.finish_refresh(generation, Err(failure())));

        assert_eq!(pager.cursor(), cursor);
        assert_eq!(pager.footer(), ListFooter::End);
        assert_eq!(pager.begin_load_more(), None);
        assert_eq!(pager.entries().len(), 3);
    }

    #[test]
    fn refresh_lets_a_stalled_page_fetch_be_retried() {
        let mut pager = refreshed(&["1"], 8);
        let stalled = pager.begin_load_more().unwrap();

        let generation = pager.begin_refresh();
        assert_eq!(pager.state(), PagerState::Idle);
        assert!(!pager.finish_refresh(generation, Err(failure())));

        let retry = pager.begin_load_more().unwrap();
        assert_eq!(retry.page, stalled.page);
        assert_ne!(retry.generation, stalled.generation);
    }

    #[test]
    fn rows_mark_selection_and_follow_renames() {
        let mut pager = refreshed(&["1", "2"], 8);
        let selected = ConversationId::parse("2").unwrap();

        assert!(pager.rename(&selected, "Renamed"));
        let rows = pager.rows(Some(&selected));

        assert!(!rows[0].selected);
        assert!(rows[1].selected);
        assert_eq!(rows[1].title, "Renamed");
        assert_eq!(pager.remove(&selected).map(|entry| entry.title), Some("Renamed".to_string()));
        assert_eq!(pager.title_of(&selected), None);
    }
}
