//! Process shutdown wiring for the worker binaries.

use tokio_util::sync::CancellationToken;

/// Return a token cancelled on the first SIGINT or SIGTERM.
///
/// Must be called from inside a Tokio runtime.
pub fn cancel_on_signal() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        trigger.cancel();
    });
    cancel
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(error = %err, "SIGTERM handler unavailable; listening for Ctrl-C only");
            ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        () = ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "Ctrl-C handler failed");
        std::future::pending::<()>().await;
    }
}
