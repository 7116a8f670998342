use std::sync::Arc;

use tokio::sync::watch;

/// Invoked once per on-demand check request (SIGUSR1).
pub type CheckNowCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

impl ShutdownListener {
    pub async fn notified(&mut self) {
        // Err only when every sender is gone, which also means shutdown.
        let _ = self.receiver.wait_for(|triggered| *triggered).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Ctrl-C and SIGTERM stop the service; SIGUSR1 asks for an immediate check.
pub fn install_signal_handlers(shutdown: Shutdown, check_now: CheckNowCallback) {
    let ctrlc = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrlc.trigger();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term = shutdown.clone();
        tokio::spawn(async move {
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                term.trigger();
            }
        });

        tokio::spawn(async move {
            match signal(SignalKind::user_defined1()) {
                Ok(mut sig) => {
                    while sig.recv().await.is_some() {
                        tracing::info!(target: "lifecycle", "check requested via SIGUSR1");
                        check_now();
                    }
                }
                Err(err) => {
                    tracing::warn!(target: "lifecycle", error = %err, "SIGUSR1 handler unavailable");
                }
            }
        });
    }

    #[cfg(not(unix))]
    drop(check_now);
}
