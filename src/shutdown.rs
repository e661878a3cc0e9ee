use anyhow::Result;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Cooperative shutdown signal shared by the pipeline tasks.
///
/// Every task holds a receiver and treats a `true` value as the order to
/// wind down. Dropping the handle triggers the same signal, so an error
/// path out of the runtime still stops the tasks.
#[derive(Debug)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, receiver)
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }
}

impl Drop for Shutdown {
    fn drop(&mut self) {
        let _ = self.sender.send(true);
    }
}

/// Aborts `handle` unless it already ran to completion, then waits for it.
pub async fn abort_and_await<T>(handle: &mut JoinHandle<T>) {
    if handle.is_finished() {
        return;
    }
    handle.abort();
    let _ = handle.await;
}

/// Completes when SIGTERM or SIGINT arrives.
pub async fn wait_for_signal() -> Result<()> {
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = term.recv() => info!("received SIGTERM"),
        _ = int.recv() => info!("received SIGINT"),
    }
    Ok(())
}
