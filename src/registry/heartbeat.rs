//! Periodic liveness reporting.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::observability::metrics;
use crate::registry::error::RegistryResult;
use crate::registry::instance::InstanceManager;

/// Sends one heartbeat.
#[async_trait]
pub trait Beater: Send + Sync {
    /// Returns whether the registry enabled light beats.
    async fn beat(&self) -> RegistryResult<bool>;
}

#[async_trait]
impl Beater for InstanceManager {
    async fn beat(&self) -> RegistryResult<bool> {
        InstanceManager::beat(self).await
    }
}

/// Background loop beating on a fixed cadence.
///
/// The first beat goes out one interval after start. A failed beat is logged
/// and the loop simply waits for the next tick.
pub struct Heartbeat {
    beater: Arc<dyn Beater>,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(beater: Arc<dyn Beater>, interval: Duration) -> Self {
        Self { beater, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Heartbeat starting");

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => {
                    tracing::info!("Heartbeat received shutdown signal, exiting loop");
                    break;
                }
            }

            match self.beater.beat().await {
                Ok(light_beat_enabled) => {
                    metrics::record_heartbeat("ok");
                    tracing::trace!(light_beat_enabled, "Heartbeat sent");
                }
                Err(e) => {
                    metrics::record_heartbeat("error");
                    tracing::warn!(error = %e, "Heartbeat failed, waiting for next tick");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::error::{HttpStatusError, RegistryError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    /// Registry that fails every other beat.
    #[derive(Default)]
    struct Flaky {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Beater for Flaky {
        async fn beat(&self) -> RegistryResult<bool> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                Ok(true)
            } else {
                Err(RegistryError::Http(HttpStatusError::from_status(
                    500,
                    "server busy".to_string(),
                )))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_n_intervals_give_n_beats() {
        let beater = Arc::new(Flaky::default());
        let (tx, rx) = broadcast::channel(1);
        let interval = Duration::from_secs(5);
        let handle = tokio::spawn(Heartbeat::new(beater.clone(), interval).run(rx));

        let n = 7;
        sleep(interval * n + interval / 2).await;
        assert!(!handle.is_finished());
        assert_eq!(beater.attempts.load(Ordering::SeqCst), n as usize);

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(beater.attempts.load(Ordering::SeqCst), n as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_beat_before_first_interval() {
        let beater = Arc::new(Flaky::default());
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(Heartbeat::new(beater.clone(), Duration::from_secs(4)).run(rx));

        sleep(Duration::from_millis(3_900)).await;
        assert_eq!(beater.attempts.load(Ordering::SeqCst), 0);

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(beater.attempts.load(Ordering::SeqCst), 0);
    }
}
