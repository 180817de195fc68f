use std::io;

use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;
use tracing::warn;

pub struct Shutdown {
    sender: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Shutdown { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    pub fn listen(self) {
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("shutdown signal received");
            if self.sender.send(()).is_err() {
                warn!("no shutdown subscriber");
            }
        });
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    let Ok(mut terminate) = signal::unix::signal(signal::unix::SignalKind::terminate()) else {
        warn!("failed to register SIGTERM handler");
        let _: io::Result<()> = signal::ctrl_c().await;
        return;
    };
    tokio::select! {
        _ = signal::ctrl_c() => {},
        _ = terminate.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _: io::Result<()> = signal::ctrl_c().await;
}
