mod memory;
mod supabase;

pub use memory::{Dataset, MemoryStore};
pub use supabase::SupabaseStore;

use crate::components::event_feed::models::Event;
use crate::components::event_feed::predicate::{Predicate, SortOrder};
use crate::error::FeedResult;
use async_trait::async_trait;

/// One page of the event list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub predicate: Predicate,
    /// Applied to `start_date`, then `id`
    pub order: SortOrder,
    pub offset: usize,
    pub limit: usize,
}

/// Read-only access to the hosted events backend.
///
/// Every call is independent; implementations do not coordinate between
/// them.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Matching events with creator, location and tags joined
    async fn list_events(&self, request: &PageRequest) -> FeedResult<Vec<Event>>;

    /// Number of events matching `predicate`
    async fn count_events(&self, predicate: &Predicate) -> FeedResult<u64>;

    /// Ids of events carrying at least one of `tag_ids`
    async fn list_event_ids_by_any_tag(&self, tag_ids: &[String]) -> FeedResult<Vec<String>>;

    /// Ids of events the profile has RSVPed to
    async fn list_event_ids_rsvped_by(&self, profile_id: &str) -> FeedResult<Vec<String>>;

    /// Ids of events the profile co-hosts
    async fn list_event_ids_co_hosted_by(&self, profile_id: &str) -> FeedResult<Vec<String>>;
}
