use crate::config::Config;
use crate::error::{component_error, FeedResult};
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

// Export components
pub mod event_feed;
pub mod event_store;

// Re-export the feed handle and store seam
pub use event_feed::{EventFeed, EventFeedHandle};
pub use event_store::EventStore;

/// Component trait that all components must implement
#[async_trait]
pub trait Component: Send + Sync + Any {
    /// Get the name of the component
    fn name(&self) -> &'static str;

    /// Start the component against the shared event store
    async fn init(&self, config: Arc<RwLock<Config>>, store: Arc<dyn EventStore>) -> FeedResult<()>;

    /// Shutdown the component
    async fn shutdown(&self) -> FeedResult<()>;

    /// Convert to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Owns the registered components and drives their lifecycle
pub struct ComponentManager {
    components: Vec<Box<dyn Component>>,
    config: Arc<RwLock<Config>>,
}

impl fmt::Debug for ComponentManager {
    // Config carries API keys, keep it out of logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.components.iter().map(|c| c.name()).collect();
        f.debug_struct("ComponentManager")
            .field("components", &names)
            .finish_non_exhaustive()
    }
}

impl ComponentManager {
    pub fn new(config: Arc<RwLock<Config>>) -> Self {
        Self {
            components: Vec::new(),
            config,
        }
    }

    /// Register a component
    pub fn register<T: Component + 'static>(&mut self, component: T) {
        info!("Registering component: {}", component.name());
        self.components.push(Box::new(component));
    }

    /// Initialize every component. All of them get a chance to start; the
    /// names of the ones that failed are reported together.
    pub async fn init_all(&self, store: Arc<dyn EventStore>) -> FeedResult<()> {
        let mut failed = Vec::new();

        for component in &self.components {
            info!("Initializing component: {}", component.name());

            if let Err(e) = component
                .init(Arc::clone(&self.config), Arc::clone(&store))
                .await
            {
                error!("Error initializing component {}: {:?}", component.name(), e);
                failed.push(component.name());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(component_error(&format!(
                "Failed to start: {}",
                failed.join(", ")
            )))
        }
    }

    /// Shutdown all components, continuing past failures
    pub async fn shutdown_all(&self) -> FeedResult<()> {
        info!("Shutting down all components");

        for component in &self.components {
            info!("Shutting down component: {}", component.name());

            if let Err(e) = component.shutdown().await {
                error!("Error shutting down component {}: {:?}", component.name(), e);
            }
        }

        Ok(())
    }

    /// Get a component by name
    pub fn get_component_by_name(&self, name: &str) -> Option<&dyn Component> {
        self.components
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }

    /// First registered component of type `T`
    pub fn get_component<T: Component>(&self) -> Option<&T> {
        self.components
            .iter()
            .find_map(|c| c.as_any().downcast_ref::<T>())
    }
}
