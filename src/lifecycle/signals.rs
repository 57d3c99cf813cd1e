//! OS signal handling.
//!
//! # Responsibilities
//! - Translate SIGTERM/SIGINT into a graceful shutdown
//! - Translate SIGHUP into a resync of every registry with its store
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers definition reload, not shutdown

use std::sync::Arc;

use crate::lifecycle::shutdown::Shutdown;
use crate::registry::ApiRegistry;

/// Wait for a termination signal, reloading definitions on every SIGHUP,
/// then trigger `shutdown`.
pub async fn handle_signals(shutdown: Shutdown, registries: Vec<Arc<ApiRegistry>>) {
    wait_for_termination(&registries).await;
    shutdown.trigger();
}

/// Resync every registry with its store: stored definitions are reloaded and
/// APIs whose file disappeared are unloaded.
pub fn reload_all(registries: &[Arc<ApiRegistry>]) -> usize {
    registries.iter().map(|r| r.reload_all()).sum()
}

#[cfg(unix)]
async fn wait_for_termination(registries: &[Arc<ApiRegistry>]) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut term, mut hup) = match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
        (Ok(term), Ok(hup)) => (term, hup),
        (term, hup) => {
            if let Err(e) = term.and(hup) {
                tracing::error!(error = %e, "Failed to register signal handlers, only Ctrl-C is handled");
            }
            ctrl_c().await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = ctrl_c() => return,
            _ = term.recv() => {
                tracing::info!("SIGTERM received");
                return;
            }
            _ = hup.recv() => {
                tracing::info!("SIGHUP received, reloading definitions");
                let registries = registries.to_vec();
                match tokio::task::spawn_blocking(move || reload_all(&registries)).await {
                    Ok(loaded) => tracing::info!(loaded, "Definitions reloaded"),
                    Err(e) => tracing::error!(error = %e, "Definition reload task failed"),
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination(_registries: &[Arc<ApiRegistry>]) {
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl-C received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
