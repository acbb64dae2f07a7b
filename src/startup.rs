use crate::shutdown;
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zuifeed::components::event_feed::{EventFeed, FeedSnapshot};
use zuifeed::components::event_store::{MemoryStore, SupabaseStore};
use zuifeed::components::{ComponentManager, EventStore};
use zuifeed::config::Config;
use zuifeed::error::{component_error, config_error, env_error, Error, FeedResult};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and initialize the application config
pub async fn load_config() -> miette::Result<Arc<RwLock<Config>>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(RwLock::new(config))),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Pick the hosted backend when configured, the JSON dataset otherwise
fn build_store(config: &Config) -> FeedResult<Arc<dyn EventStore>> {
    match (&config.supabase_url, &config.dataset_path) {
        (Some(url), _) => {
            let anon_key = config
                .supabase_anon_key
                .clone()
                .ok_or_else(|| env_error("SUPABASE_ANON_KEY"))?;
            info!("Using hosted event store at {}", url);
            Ok(Arc::new(SupabaseStore::new(
                url,
                anon_key,
                config.supabase_access_token.clone(),
            )?))
        }
        (None, Some(path)) => {
            info!("Using event dataset {}", path.display());
            Ok(Arc::new(MemoryStore::from_json_file(path)?))
        }
        (None, None) => Err(config_error("Set SUPABASE_URL or FEED_DATASET")),
    }
}

fn log_snapshot(snapshot: &FeedSnapshot) {
    let total = snapshot
        .total
        .map(|t| t.to_string())
        .unwrap_or_else(|| "?".to_string());
    info!(
        "{} tab: {} of {} events loaded (page {}, more: {})",
        snapshot.query.tab,
        snapshot.events.len(),
        total,
        snapshot.page,
        snapshot.has_more
    );
    for event in &snapshot.events {
        let place = event.place().unwrap_or_else(|| "-".to_string());
        info!(
            "  {} | {} | {}",
            event.start_date.format("%Y-%m-%d %H:%M"),
            event.title,
            place
        );
    }
    if let Some(e) = &snapshot.error {
        warn!("Feed error: {}", e);
    }
    if let Some(e) = &snapshot.count_error {
        warn!("Count error: {}", e);
    }
}

/// Start the feed and follow it until a shutdown signal arrives
pub async fn run(config: Arc<RwLock<Config>>) -> miette::Result<()> {
    let store = {
        let config_read = config.read().await;
        build_store(&config_read)?
    };

    // Initialize component manager
    let mut component_manager = ComponentManager::new(Arc::clone(&config));
    component_manager.register(EventFeed::new());
    component_manager.init_all(store).await?;
    let component_manager = Arc::new(component_manager);

    let handle = component_manager
        .get_component::<EventFeed>()
        .ok_or_else(|| component_error("Event feed component is not registered"))?
        .get_handle()
        .await
        .ok_or_else(|| component_error("Event feed failed to start"))?;

    // Create shutdown channel
    let (shutdown_send, mut shutdown_recv) = oneshot::channel();
    let stopping = CancellationToken::new();
    let shutdown_components = Arc::clone(&component_manager);
    let signal_stopping = stopping.clone();
    tokio::spawn(async move {
        shutdown::handle_signals(shutdown_send, signal_stopping, shutdown_components).await;
    });

    let Some(first) = handle.settled_until(&stopping).await? else {
        let _ = shutdown_recv.await;
        info!("Shutdown before the first page loaded");
        return Ok(());
    };
    log_snapshot(&first);

    // Follow refreshes until shutdown
    let mut updates = handle.subscribe();
    let mut last_refresh = first.refreshes;
    loop {
        tokio::select! {
            _ = &mut shutdown_recv => {
                info!("Shutdown complete");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    if stopping.is_cancelled() {
                        let _ = (&mut shutdown_recv).await;
                        info!("Shutdown complete");
                    } else {
                        warn!("Event feed stopped publishing");
                    }
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.refreshes != last_refresh && !snapshot.refreshing {
                    last_refresh = snapshot.refreshes;
                    log_snapshot(&snapshot);
                }
            }
        }
    }

    Ok(())
}
