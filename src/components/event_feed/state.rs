use super::fetch::FeedPage;
use super::models::Event;
use super::query::FeedQuery;
use crate::error::FeedResult;
use serde::Serialize;

/// What a fetch was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Initial page or `load_more`
    Page,
    /// Background re-query of page 0
    Refresh,
}

/// Tag carried by every fetch. Results are only applied while the
/// generation still matches the state's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub page: usize,
    pub kind: FetchKind,
    /// Pages covered by the fetch; a refresh spans every loaded page
    pub span: usize,
}

impl FetchTicket {
    /// Page index and size to query with
    pub fn window(&self, page_size: usize) -> (usize, usize) {
        match self.kind {
            FetchKind::Page => (self.page, page_size),
            FetchKind::Refresh => (0, page_size * self.span),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Issued before a reset or query change, dropped
    Stale,
}

/// Point-in-time view of a feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSnapshot {
    pub query: FeedQuery,
    pub events: Vec<Event>,
    pub page: usize,
    pub has_more: bool,
    pub loading: bool,
    pub refreshing: bool,
    /// Last list failure; loaded pages stay in place
    pub error: Option<String>,
    /// Matching events across all pages
    pub total: Option<u64>,
    pub count_error: Option<String>,
    /// Completed background refreshes
    pub refreshes: u64,
    pub generation: u64,
}

/// Pagination state machine of an event feed.
///
/// Pages are kept as separate slices. A refresh re-queries every loaded page
/// in one window and swaps them together, so rows shifting across a page
/// boundary are neither repeated nor lost. `page` always indexes the last
/// loaded page.
#[derive(Debug, Clone)]
pub struct FeedState {
    query: FeedQuery,
    page_size: usize,
    skip_reset: bool,
    generation: u64,
    page: usize,
    has_more: bool,
    pages: Vec<Vec<Event>>,
    pending_page: Option<usize>,
    refreshing: bool,
    error: Option<String>,
    total: Option<u64>,
    count_error: Option<String>,
    refreshes: u64,
}

impl FeedState {
    pub fn new(query: FeedQuery, page_size: usize, skip_reset: bool) -> Self {
        Self {
            query,
            page_size,
            skip_reset,
            generation: 0,
            page: 0,
            has_more: true,
            pages: Vec::new(),
            pending_page: None,
            refreshing: false,
            error: None,
            total: None,
            count_error: None,
            refreshes: 0,
        }
    }

    pub fn query(&self) -> &FeedQuery {
        &self.query
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.pending_page.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn events(&self) -> Vec<Event> {
        self.pages.iter().flatten().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Back to the initial state and invalidate everything in flight
    fn clear(&mut self) {
        self.generation += 1;
        self.page = 0;
        self.has_more = true;
        self.pages.clear();
        self.pending_page = None;
        self.refreshing = false;
        self.error = None;
    }

    /// Drop loaded pages. A no-op returning false when `skip_reset` is set.
    pub fn reset(&mut self) -> bool {
        if self.skip_reset {
            return false;
        }
        self.clear();
        true
    }

    /// Switch to another query. Returns false for an identical query;
    /// otherwise pagination restarts regardless of `skip_reset`.
    pub fn set_query(&mut self, query: FeedQuery) -> bool {
        if query == self.query {
            return false;
        }
        self.query = query;
        self.clear();
        self.total = None;
        self.count_error = None;
        true
    }

    /// Start fetching page 0
    pub fn begin_initial(&mut self) -> FetchTicket {
        self.page = 0;
        self.pending_page = Some(0);
        FetchTicket {
            generation: self.generation,
            page: 0,
            kind: FetchKind::Page,
            span: 1,
        }
    }

    /// Start fetching the page after the last loaded one. None while a fetch
    /// or refresh is in flight, or once the end was reached.
    pub fn begin_load_more(&mut self) -> Option<FetchTicket> {
        if self.pending_page.is_some() || self.refreshing || !self.has_more {
            return None;
        }
        // A failed first page is retried rather than skipped
        let next = self.pages.len();
        self.page = next;
        self.pending_page = Some(next);
        Some(FetchTicket {
            generation: self.generation,
            page: next,
            kind: FetchKind::Page,
            span: 1,
        })
    }

    /// Start a background re-query of every loaded page. None while a
    /// refresh or a page fetch is in flight.
    pub fn begin_refresh(&mut self) -> Option<FetchTicket> {
        if self.refreshing || self.pending_page.is_some() {
            return None;
        }
        self.refreshing = true;
        let span = self.pages.len().max(1);
        Some(FetchTicket {
            generation: self.generation,
            page: span - 1,
            kind: FetchKind::Refresh,
            span,
        })
    }

    /// Apply a page result
    pub fn apply_page(&mut self, ticket: FetchTicket, result: FeedResult<FeedPage>) -> ApplyOutcome {
        if ticket.generation != self.generation {
            return ApplyOutcome::Stale;
        }

        match ticket.kind {
            FetchKind::Page => {
                self.pending_page = None;
                match result {
                    Ok(page) => {
                        self.has_more = page.events.len() == self.page_size;
                        // Page 0 replaces, later pages append
                        self.pages.truncate(ticket.page);
                        self.pages.push(page.events);
                        self.page = ticket.page;
                        self.error = None;
                    }
                    Err(e) => {
                        self.error = Some(e.to_string());
                        self.page = self.pages.len().saturating_sub(1);
                    }
                }
            }
            FetchKind::Refresh => {
                self.refreshing = false;
                match result {
                    Ok(page) => {
                        let (_, limit) = ticket.window(self.page_size);
                        self.has_more = page.events.len() == limit;
                        self.pages = page
                            .events
                            .chunks(self.page_size.max(1))
                            .map(<[Event]>::to_vec)
                            .collect();
                        if self.pages.is_empty() {
                            self.pages.push(Vec::new());
                        }
                        self.page = self.pages.len() - 1;
                        self.error = None;
                        self.refreshes += 1;
                    }
                    Err(e) => self.error = Some(e.to_string()),
                }
            }
        }

        ApplyOutcome::Applied
    }

    /// Apply a count result; failures never touch the list
    pub fn apply_count(&mut self, ticket: FetchTicket, result: FeedResult<u64>) -> ApplyOutcome {
        if ticket.generation != self.generation {
            return ApplyOutcome::Stale;
        }
        match result {
            Ok(total) => {
                self.total = Some(total);
                self.count_error = None;
            }
            Err(e) => self.count_error = Some(e.to_string()),
        }
        ApplyOutcome::Applied
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            query: self.query.clone(),
            events: self.events(),
            page: self.page,
            has_more: self.has_more,
            loading: self.is_loading(),
            refreshing: self.refreshing,
            error: self.error.clone(),
            total: self.total,
            count_error: self.count_error.clone(),
            refreshes: self.refreshes,
            generation: self.generation,
        }
    }
}
