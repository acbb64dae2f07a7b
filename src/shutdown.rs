use std::io;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use zuifeed::components::ComponentManager;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
#[cfg(windows)]
use tokio::signal::windows::{ctrl_break, ctrl_c};

/// Wait for a termination signal, stop the components, then release `run`.
/// `stopping` is cancelled before any component goes down.
pub async fn handle_signals(
    shutdown_send: oneshot::Sender<()>,
    stopping: CancellationToken,
    component_manager: Arc<ComponentManager>,
) {
    match wait_for_signal().await {
        Ok(name) => info!("Received {}, stopping the feed", name),
        Err(e) => {
            warn!("Signal handlers unavailable ({}), falling back to Ctrl+C", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for Ctrl+C either: {}", e);
                return;
            }
        }
    }

    stopping.cancel();
    if let Err(e) = component_manager.shutdown_all().await {
        error!("Error shutting down components: {:?}", e);
    } else {
        info!("All components shut down successfully");
    }

    let _ = shutdown_send.send(());
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(windows)]
async fn wait_for_signal() -> io::Result<&'static str> {
    let mut ctrlc = ctrl_c()?;
    let mut ctrlbreak = ctrl_break()?;

    Ok(tokio::select! {
        _ = ctrlc.recv() => "Ctrl+C",
        _ = ctrlbreak.recv() => "Ctrl+Break",
    })
}
