//! Process signals that stop the daemon.

use tracing::{info, warn};

/// Ctrl-C, or never if the handler cannot be installed.
async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Resolve on SIGINT or SIGTERM. With `quit` set, SIGQUIT counts too.
#[cfg(unix)]
pub async fn shutdown_signal(quit: bool) {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    fn install(kind: SignalKind, name: &str) -> Option<Signal> {
        signal(kind)
            .map_err(|e| warn!(signal = name, error = %e, "failed to install signal handler"))
            .ok()
    }

    async fn recv(sig: Option<Signal>) {
        match sig {
            Some(mut sig) => {
                sig.recv().await;
            }
            None => std::future::pending().await,
        }
    }

    let term = install(SignalKind::terminate(), "SIGTERM");
    let quit = if quit {
        install(SignalKind::quit(), "SIGQUIT")
    } else {
        None
    };

    let name = tokio::select! {
        _ = interrupt() => "SIGINT",
        _ = recv(term) => "SIGTERM",
        _ = recv(quit) => "SIGQUIT",
    };
    info!(signal = name, "shutdown signal received");
}

#[cfg(not(unix))]
pub async fn shutdown_signal(_quit: bool) {
    interrupt().await;
    info!(signal = "ctrl-c", "shutdown signal received");
}
