//! Periodic risk drift.

use std::sync::Arc;
use std::time::Duration;

use thunderwatch_weather::{RiskChange, StationStore, WeatherSimulator};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const CHANGE_CHANNEL_CAPACITY: usize = 64;
const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Background task that applies one drift tick per period until cancelled.
#[derive(Debug)]
pub struct DriftScheduler {
    token: CancellationToken,
    changes_tx: broadcast::Sender<RiskChange>,
    handle: JoinHandle<()>,
}

impl DriftScheduler {
    /// Spawn the drift task on the current runtime. The first tick fires one
    /// full period after start. Periods under a second are raised to one.
    pub fn spawn(
        store: Arc<StationStore>,
        simulator: Arc<WeatherSimulator>,
        period: Duration,
    ) -> Self {
        let period = period.max(MIN_PERIOD);
        let token = CancellationToken::new();
        let (changes_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        let task_token = token.clone();
        let task_tx = changes_tx.clone();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!("Risk drift started, period {:?}", period);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => {
                        for change in simulator.tick(&store) {
                            // No subscribers is fine.
                            let _ = task_tx.send(change);
                        }
                    }
                }
            }
            tracing::info!("Risk drift stopped");
        });

        Self {
            token,
            changes_tx,
            handle,
        }
    }

    /// Receive every risk change applied from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RiskChange> {
        self.changes_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the task and wait for it to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!("Risk drift task failed: {}", e);
        }
    }
}
