mod actor;
pub mod fetch;
mod handle;
pub mod models;
pub mod predicate;
pub mod query;
pub mod state;

pub use fetch::{count_events, fetch_page, resolve_plan, FeedPage};
pub use handle::EventFeedHandle;
pub use models::Event;
pub use query::{FeedQuery, TabType};
pub use state::{FeedSnapshot, FeedState};

use crate::components::event_store::EventStore;
use crate::config::Config;
use crate::error::{component_error, FeedResult};
use crate::utils::time::{Clock, SystemClock};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Event feed component for the configured query
pub struct EventFeed {
    handle: RwLock<Option<EventFeedHandle>>,
    clock: Arc<dyn Clock>,
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFeed {
    /// Create a new event feed component on the wall clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            handle: RwLock::new(None),
            clock,
        }
    }

    /// Get the handle if it exists
    pub async fn get_handle(&self) -> Option<EventFeedHandle> {
        let handle_lock = self.handle.read().await;
        handle_lock.clone()
    }
}

#[async_trait]
impl super::Component for EventFeed {
    fn name(&self) -> &'static str {
        "event_feed"
    }

    async fn init(&self, config: Arc<RwLock<Config>>, store: Arc<dyn EventStore>) -> FeedResult<()> {
        let (settings, query) = {
            let config_read = config.read().await;
            (config_read.feed.clone(), config_read.query.clone())
        };

        // Create a new handle if one doesn't exist
        let mut handle_lock = self.handle.write().await;
        if handle_lock.is_some() {
            return Err(component_error("Event feed is already running"));
        }

        info!(
            "Opening {} feed ({} per page, refresh every {}s)",
            query.tab, settings.page_size, settings.refresh_interval_secs
        );
        *handle_lock = Some(EventFeedHandle::new(
            store,
            Arc::clone(&self.clock),
            settings,
            query,
        )?);

        Ok(())
    }

    async fn shutdown(&self) -> FeedResult<()> {
        // Shutdown the handle if it exists
        let mut handle_lock = self.handle.write().await;
        if let Some(handle) = handle_lock.take() {
            handle.shutdown().await?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
