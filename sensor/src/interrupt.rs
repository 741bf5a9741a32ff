use std::{io, sync::Arc, time::Duration};

use thermostat_common::{Interrupted, Pause};
use tokio::{runtime::Runtime, sync::watch};
use tracing::{info, warn};

/// Latched operator interrupt shared by every blocking step of a run.
///
/// Once raised it stays raised, so a Ctrl-C that lands while the main thread
/// is outside the runtime (driving the plug, logging) is still observed by
/// the next check.
#[derive(Debug, Clone)]
pub struct InterruptSignal {
    raised: Arc<watch::Sender<bool>>,
}

impl Default for InterruptSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptSignal {
    pub fn new() -> Self {
        let (raised, _) = watch::channel(false);
        Self {
            raised: Arc::new(raised),
        }
    }

    /// Replaces the default SIGINT disposition with a listener that raises
    /// the returned signal.
    ///
    /// The listener is a task on `runtime`, so the runtime needs a worker
    /// thread of its own for the latch to fire while no `block_on` is active.
    pub fn install(runtime: &Runtime) -> io::Result<Self> {
        let signal = Self::new();
        let _guard = runtime.enter();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal as unix_signal, SignalKind};

            let mut sigint = unix_signal(SignalKind::interrupt())?;
            let latch = signal.clone();
            runtime.spawn(async move {
                if sigint.recv().await.is_some() {
                    info!("ctrl-c received");
                    latch.raise();
                }
            });
        }

        #[cfg(not(unix))]
        {
            let latch = signal.clone();
            runtime.spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("ctrl-c received");
                        latch.raise();
                    }
                    Err(err) => warn!("failed to listen for ctrl-c: {err}"),
                }
            });
        }

        Ok(signal)
    }

    pub fn raise(&self) {
        self.raised.send_replace(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.raised.borrow()
    }

    /// Resolves once the signal is raised, immediately if it already was.
    pub async fn raised(&self) {
        let mut raised = self.raised.subscribe();
        if raised.wait_for(|raised| *raised).await.is_err() {
            warn!("interrupt latch closed");
            std::future::pending::<()>().await;
        }
    }
}

/// Sleeps between sensor retries, returning early on an interrupt.
pub struct SignalPause {
    runtime: Arc<Runtime>,
    interrupt: InterruptSignal,
}

impl SignalPause {
    pub fn new(runtime: Arc<Runtime>, interrupt: InterruptSignal) -> Self {
        Self { runtime, interrupt }
    }
}

impl Pause for SignalPause {
    fn pause(&mut self, duration: Duration) -> Result<(), Interrupted> {
        let interrupt = &self.interrupt;
        self.runtime.block_on(async {
            tokio::select! {
                biased;
                _ = interrupt.raised() => Err(Interrupted),
                _ = tokio::time::sleep(duration) => Ok(()),
            }
        })
    }
}
