use super::actor::{FeedActor, FeedActorHandle};
use super::query::FeedQuery;
use super::state::FeedSnapshot;
use crate::components::event_store::EventStore;
use crate::config::FeedSettings;
use crate::error::{component_error, FeedResult};
use crate::utils::time::Clock;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle for interacting with a running event feed
#[derive(Clone)]
pub struct EventFeedHandle {
    actor_handle: FeedActorHandle,
    _actor_task: Arc<JoinHandle<()>>,
}

impl EventFeedHandle {
    /// Create a new EventFeedHandle and spawn the actor
    pub fn new(
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        settings: FeedSettings,
        query: FeedQuery,
    ) -> FeedResult<Self> {
        // Create the actor and get its handle
        let (mut actor, handle) = FeedActor::new(store, clock, settings, query)?;

        // Spawn a task to run the actor
        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });

        Ok(Self {
            actor_handle: handle,
            _actor_task: Arc::new(actor_task),
        })
    }

    /// Switch to another query; false if it equals the current one
    pub async fn set_query(&self, query: FeedQuery) -> FeedResult<bool> {
        self.actor_handle.set_query(query).await
    }

    /// Fetch the next page; false when one is in flight or the feed ended
    pub async fn load_more(&self) -> FeedResult<bool> {
        self.actor_handle.load_more().await
    }

    /// Start over from page 0; false when resets are skipped
    pub async fn reset(&self) -> FeedResult<bool> {
        self.actor_handle.reset().await
    }

    /// Re-query page 0 and the count now
    pub async fn refresh(&self) -> FeedResult<bool> {
        self.actor_handle.refresh().await
    }

    pub async fn snapshot(&self) -> FeedResult<FeedSnapshot> {
        self.actor_handle.snapshot().await
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.actor_handle.subscribe()
    }

    /// Wait until a published snapshot satisfies `condition`
    pub async fn wait_for<F>(&self, condition: F) -> FeedResult<FeedSnapshot>
    where
        F: FnMut(&FeedSnapshot) -> bool,
    {
        let mut rx = self.subscribe();
        let snapshot = rx
            .wait_for(condition)
            .await
            .map_err(|_| component_error("Event feed actor stopped"))?;
        Ok(snapshot.clone())
    }

    /// Wait until nothing is loading
    pub async fn settled(&self) -> FeedResult<FeedSnapshot> {
        self.wait_for(|snapshot| !snapshot.loading && !snapshot.refreshing)
            .await
    }

    /// Like `settled`, but gives up once `stop` is cancelled. `None` means
    /// the feed was stopped on purpose before it settled.
    pub async fn settled_until(&self, stop: &CancellationToken) -> FeedResult<Option<FeedSnapshot>> {
        tokio::select! {
            _ = stop.cancelled() => Ok(None),
            settled = self.settled() => match settled {
                Ok(snapshot) => Ok(Some(snapshot)),
                // The actor went away because of the stop request
                Err(_) if stop.is_cancelled() => Ok(None),
                Err(e) => Err(e),
            },
        }
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> FeedResult<()> {
        self.actor_handle.shutdown().await
    }
}
