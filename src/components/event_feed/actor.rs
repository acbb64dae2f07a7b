use super::fetch::{fetch_page, fetch_page_with_count, FeedPage};
use super::query::FeedQuery;
use super::state::{ApplyOutcome, FeedSnapshot, FeedState, FetchKind, FetchTicket};
use crate::components::event_store::EventStore;
use crate::config::FeedSettings;
use crate::error::{component_error, FeedResult};
use crate::utils::scheduler::RefreshTimer;
use crate::utils::time::Clock;
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// The feed actor that owns the pagination state and runs its fetches
pub struct FeedActor {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    settings: FeedSettings,
    tz: Tz,
    state: FeedState,
    command_rx: mpsc::Receiver<FeedCommand>,
    result_tx: mpsc::UnboundedSender<FetchOutcome>,
    result_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    tick_tx: mpsc::Sender<()>,
    tick_rx: mpsc::Receiver<()>,
    timer: RefreshTimer,
    snapshot_tx: watch::Sender<FeedSnapshot>,
}

/// Commands that can be sent to the feed actor
pub enum FeedCommand {
    SetQuery(FeedQuery, mpsc::Sender<bool>),
    LoadMore(mpsc::Sender<bool>),
    Reset(mpsc::Sender<bool>),
    Refresh(mpsc::Sender<bool>),
    Snapshot(mpsc::Sender<FeedSnapshot>),
    Shutdown,
}

/// Completed fetches reported back by spawned tasks
enum FetchOutcome {
    Page(FetchTicket, FeedResult<FeedPage>),
    Count(FetchTicket, FeedResult<u64>),
}

/// Handle for communicating with the feed actor
#[derive(Clone)]
pub struct FeedActorHandle {
    command_tx: mpsc::Sender<FeedCommand>,
    snapshot_rx: watch::Receiver<FeedSnapshot>,
}

impl FeedActorHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(mpsc::Sender<T>) -> FeedCommand,
    ) -> FeedResult<T> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(command(response_tx))
            .await
            .map_err(|e| component_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| component_error("Response channel closed"))
    }

    /// Switch the feed to another query
    pub async fn set_query(&self, query: FeedQuery) -> FeedResult<bool> {
        self.request(|tx| FeedCommand::SetQuery(query, tx)).await
    }

    /// Request the next page
    pub async fn load_more(&self) -> FeedResult<bool> {
        self.request(FeedCommand::LoadMore).await
    }

    /// Drop loaded pages and start again from page 0
    pub async fn reset(&self) -> FeedResult<bool> {
        self.request(FeedCommand::Reset).await
    }

    /// Re-query page 0 now instead of waiting for the timer
    pub async fn refresh(&self) -> FeedResult<bool> {
        self.request(FeedCommand::Refresh).await
    }

    /// Current state as seen by the actor
    pub async fn snapshot(&self) -> FeedResult<FeedSnapshot> {
        self.request(FeedCommand::Snapshot).await
    }

    /// Receiver that observes every published state change
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> FeedResult<()> {
        let _ = self.command_tx.send(FeedCommand::Shutdown).await;
        Ok(())
    }
}

impl FeedActor {
    /// Create a new actor and return its handle
    pub fn new(
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        settings: FeedSettings,
        query: FeedQuery,
    ) -> FeedResult<(Self, FeedActorHandle)> {
        let tz = settings.tz()?;
        let (command_tx, command_rx) = mpsc::channel(32);
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::channel(1);

        let mut state = FeedState::new(query, settings.page_size, settings.skip_reset);
        // Subscribers must never observe an idle, empty feed before page 0 lands
        state.begin_initial();
        let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot());

        let actor = Self {
            store,
            clock,
            settings,
            tz,
            state,
            command_rx,
            result_tx,
            result_rx,
            tick_tx,
            tick_rx,
            timer: RefreshTimer::new(),
            snapshot_tx,
        };

        let handle = FeedActorHandle {
            command_tx,
            snapshot_rx,
        };

        Ok((actor, handle))
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Event feed actor started on {} tab", self.state.query().tab);

        self.start_first_page();
        self.arm_timer();
        self.publish();

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(FeedCommand::Shutdown) | None => {
                        info!("Event feed actor shutting down");
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                },
                Some(outcome) = self.result_rx.recv() => self.apply(outcome),
                Some(()) = self.tick_rx.recv() => {
                    debug!("Refresh timer fired");
                    self.start_refresh();
                }
            }
        }

        self.timer.stop();
        info!("Event feed actor shut down");
    }

    async fn handle_command(&mut self, cmd: FeedCommand) {
        match cmd {
            FeedCommand::SetQuery(query, response_tx) => {
                let tab_changed = query.tab != self.state.query().tab;
                let changed = self.state.set_query(query);
                if changed {
                    info!("Feed query changed, now on {} tab", self.state.query().tab);
                    self.start_first_page();
                    if tab_changed {
                        self.arm_timer();
                    }
                    self.publish();
                }
                let _ = response_tx.send(changed).await;
            }
            FeedCommand::LoadMore(response_tx) => {
                let started = match self.state.begin_load_more() {
                    Some(ticket) => {
                        debug!("Loading page {}", ticket.page);
                        self.spawn_page(ticket);
                        self.publish();
                        true
                    }
                    None => false,
                };
                let _ = response_tx.send(started).await;
            }
            FeedCommand::Reset(response_tx) => {
                let cleared = self.state.reset();
                if cleared {
                    self.start_first_page();
                    self.publish();
                } else {
                    debug!("Reset skipped, feed keeps its pages");
                }
                let _ = response_tx.send(cleared).await;
            }
            FeedCommand::Refresh(response_tx) => {
                let started = self.start_refresh();
                let _ = response_tx.send(started).await;
            }
            FeedCommand::Snapshot(response_tx) => {
                let _ = response_tx.send(self.state.snapshot()).await;
            }
            FeedCommand::Shutdown => {}
        }
    }

    fn arm_timer(&mut self) {
        self.timer
            .restart(self.settings.refresh_interval(), self.tick_tx.clone(), ());
    }

    fn start_first_page(&mut self) {
        let ticket = self.state.begin_initial();
        self.spawn_page_with_count(ticket);
    }

    fn start_refresh(&mut self) -> bool {
        match self.state.begin_refresh() {
            Some(ticket) => {
                self.spawn_page_with_count(ticket);
                self.publish();
                true
            }
            None => {
                debug!("Refresh skipped, a fetch is already running");
                false
            }
        }
    }

    fn spawn_page(&self, ticket: FetchTicket) {
        let store = Arc::clone(&self.store);
        let query = self.state.query().clone();
        let page_size = self.settings.page_size;
        let now = self.clock.now();
        let tz = self.tz;
        let result_tx = self.result_tx.clone();

        tokio::spawn(async move {
            let result = fetch_page(store.as_ref(), &query, ticket.page, page_size, now, tz).await;
            let _ = result_tx.send(FetchOutcome::Page(ticket, result));
        });
    }

    fn spawn_page_with_count(&self, ticket: FetchTicket) {
        let store = Arc::clone(&self.store);
        let query = self.state.query().clone();
        let page_size = self.settings.page_size;
        let now = self.clock.now();
        let tz = self.tz;
        let result_tx = self.result_tx.clone();

        tokio::spawn(async move {
            let (page, limit) = ticket.window(page_size);
            let (page, count) =
                fetch_page_with_count(store.as_ref(), &query, page, limit, now, tz).await;
            let _ = result_tx.send(FetchOutcome::Page(ticket, page));
            let _ = result_tx.send(FetchOutcome::Count(ticket, count));
        });
    }

    fn apply(&mut self, outcome: FetchOutcome) {
        let (ticket, applied) = match outcome {
            FetchOutcome::Page(ticket, result) => {
                if let Err(e) = &result {
                    warn!("Fetching page {} failed: {}", ticket.page, e);
                }
                (ticket, self.state.apply_page(ticket, result))
            }
            FetchOutcome::Count(ticket, result) => {
                if let Err(e) = &result {
                    warn!("Counting events failed: {}", e);
                }
                (ticket, self.state.apply_count(ticket, result))
            }
        };

        match applied {
            ApplyOutcome::Applied => self.publish(),
            ApplyOutcome::Stale => debug!(
                "Discarding stale {} result for page {} (generation {})",
                match ticket.kind {
                    FetchKind::Page => "page",
                    FetchKind::Refresh => "refresh",
                },
                ticket.page,
                ticket.generation
            ),
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.state.snapshot());
    }
}
