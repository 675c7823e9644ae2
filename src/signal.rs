//! Interrupt watcher
//!
//! Termination signals cancel a [`CancellationToken`]. The probe loop polls
//! the token between iterations and never mid-send or mid-receive.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Register SIGINT/SIGTERM handlers and cancel `token` when either arrives.
///
/// Handlers are installed before this function returns, so a signal raised
/// afterwards is never lost.
#[cfg(unix)]
pub fn spawn_interrupt_watcher(token: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("received SIGINT"),
            _ = terminate.recv() => info!("received SIGTERM"),
            _ = token.cancelled() => return,
        }
        token.cancel();
    }))
}

/// Cancel `token` on Ctrl-C.
#[cfg(not(unix))]
pub fn spawn_interrupt_watcher(token: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!("failed to listen for Ctrl-C: {}", e);
                    return;
                }
                info!("received Ctrl-C");
            }
            _ = token.cancelled() => return,
        }
        token.cancel();
    }))
}
