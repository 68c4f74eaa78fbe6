use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::warn;

/// Resolves on SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Two-stage shutdown: the first signal flips `stop`, the second notifies `abandon`.
pub struct Shutdown {
    pub stop: watch::Receiver<bool>,
    pub abandon: Arc<Notify>,
    task: JoinHandle<()>,
}

impl Shutdown {
    pub fn listen() -> Self {
        let (tx, stop) = watch::channel(false);
        let abandon = Arc::new(Notify::new());

        let notify = abandon.clone();
        let task = tokio::spawn(async move {
            if wait_for_signal().await.is_err() {
                warn!("Unable to listen for shutdown signals");
                return;
            }
            warn!("Shutdown requested, finishing the current run. Signal again to abandon it.");
            let _ = tx.send(true);

            if wait_for_signal().await.is_ok() {
                warn!("Abandoning the current run.");
                notify.notify_one();
            }
        });

        Self {
            stop,
            abandon,
            task,
        }
    }
}

impl Drop for Shutdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}
