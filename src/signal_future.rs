//! One-shot futures over OS signal delivery.
//!
//! The reference implementation's `create_future_for_signal` installs a
//! signal handler, resolves a future on first delivery, then removes the
//! handler. `tokio::signal::unix::signal` already owns the handler
//! lifecycle — dropping the returned `Signal` stream deregisters it — so
//! [`wait_for_signal`] just consumes exactly one item and lets the stream
//! drop.

use tokio::signal::unix::{signal, SignalKind};

/// Await exactly one delivery of `kind`, then return. Repeated deliveries
/// before this resolves are coalesced by the OS/tokio the same way
/// `tokio::signal` always coalesces; only the first is observed here.
pub async fn wait_for_signal(kind: SignalKind) -> std::io::Result<()> {
    let mut stream = signal(kind)?;
    stream.recv().await;
    Ok(())
}

/// Convenience union of SIGINT and SIGTERM, the pair the pool is armed with
/// by default.
pub async fn wait_for_quit_signal() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => Ok(()),
        _ = sigterm.recv() => Ok(()),
    }
}
