//! Shutdown signal handling for the serve loop.

use tokio::signal;

/// Resolves when the process is asked to stop.
///
/// Listens for Ctrl-C everywhere, and on Unix also for SIGTERM, which
/// is how container runtimes stop a node. The future is handed to
/// `axum::serve` as its graceful-shutdown trigger, so in-flight
/// transactions still run to commit or rollback before the listener
/// closes.
#[allow(clippy::expect_used)]
pub async fn shutdown_signal() {
    // A node that cannot hear its stop signals should not keep serving
    // writes; failing to install a handler panics on purpose.
    #[cfg(unix)]
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
        "Ctrl-C"
    };

    #[cfg(unix)]
    let terminate = async move {
        sigterm.recv().await;
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&str>();

    let signal = tokio::select! {
        name = ctrl_c => name,
        name = terminate => name,
    };
    tracing::info!(signal, "shutdown requested");
}
