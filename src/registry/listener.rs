//! Long-poll change listener.
//!
//! # States
//! - Waiting: blocked on the registry long-poll
//! - Applying: fetching and applying the changed document
//!
//! # State Transitions
//! ```text
//! Waiting → Applying: long-poll answered with a non-empty body
//! Waiting → Waiting:  empty body, or error followed by the cooldown
//! Applying → Waiting: always; a fetch that never reached validation is
//!                     followed by the cooldown first
//! ```
//!
//! A rejected document advances the fingerprint, so the next long-poll blocks
//! normally. A failed download leaves the fingerprint stale and the registry
//! would answer the next long-poll at once.
//!
//! Shutdown is observed while waiting and during the cooldown. An apply that
//! has started always runs to completion.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::sleep;

use crate::observability::metrics;
use crate::registry::config_service::ConfigService;
use crate::registry::error::{RegistryError, RegistryResult};
use crate::settings::Settings;

/// Something the listener can long-poll and reload from.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Block until the registry reports a change (`true`) or the poll window ends (`false`).
    async fn poll_change(&self) -> RegistryResult<bool>;

    /// Fetch the current document and apply it.
    async fn fetch_and_apply(&self) -> RegistryResult<String>;
}

#[async_trait]
impl<T: Settings> ChangeSource for ConfigService<T> {
    async fn poll_change(&self) -> RegistryResult<bool> {
        ConfigService::poll_change(self).await
    }

    async fn fetch_and_apply(&self) -> RegistryResult<String> {
        ConfigService::fetch_and_apply(self).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerState {
    Waiting,
    Applying,
}

/// Background loop reloading configuration whenever the registry signals a change.
pub struct ChangeListener {
    source: Arc<dyn ChangeSource>,
    cooldown: Duration,
}

impl ChangeListener {
    pub fn new(source: Arc<dyn ChangeSource>, cooldown: Duration) -> Self {
        Self { source, cooldown }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(cooldown_secs = self.cooldown.as_secs(), "Config listener starting");

        let mut state = ListenerState::Waiting;
        loop {
            match state {
                ListenerState::Waiting => {
                    let polled = tokio::select! {
                        result = self.source.poll_change() => result,
                        _ = shutdown.recv() => break,
                    };

                    match polled {
                        Ok(true) => state = ListenerState::Applying,
                        Ok(false) => {}
                        Err(e) => {
                            metrics::record_longpoll("error");
                            tracing::error!(
                                error = %e,
                                cooldown_secs = self.cooldown.as_secs(),
                                "Config long-poll failed, cooling down"
                            );
                            if !self.cool_down(&mut shutdown).await {
                                break;
                            }
                        }
                    }
                }
                ListenerState::Applying => {
                    let applied = self.source.fetch_and_apply().await;
                    state = ListenerState::Waiting;

                    match applied {
                        Ok(_) => {}
                        Err(e @ RegistryError::Validation(_)) => {
                            tracing::error!(error = %e, "Config reload rejected, last known settings stay active");
                        }
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                cooldown_secs = self.cooldown.as_secs(),
                                "Config download failed, cooling down"
                            );
                            if !self.cool_down(&mut shutdown).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        tracing::info!("Config listener received shutdown signal, exiting loop");
    }

    /// Sleep for the cooldown. Returns `false` when shutdown arrived first.
    async fn cool_down(&self, shutdown: &mut broadcast::Receiver<()>) -> bool {
        tokio::select! {
            _ = sleep(self.cooldown) => true,
            _ = shutdown.recv() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::error::HttpStatusError;
    use std::sync::Mutex;
    use tokio::time::Instant;

    const HOLD: Duration = Duration::from_secs(1);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Poll,
        Fetch,
    }

    /// Scripted source: answers polls from `changes`, then keeps answering `false`.
    struct Scripted {
        changes: Mutex<Vec<RegistryResult<bool>>>,
        events: Mutex<Vec<(Event, Instant)>>,
        fail_fetch: bool,
    }

    impl Scripted {
        fn new(mut changes: Vec<RegistryResult<bool>>, fail_fetch: bool) -> Arc<Self> {
            changes.reverse();
            Arc::new(Self {
                changes: Mutex::new(changes),
                events: Mutex::new(Vec::new()),
                fail_fetch,
            })
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().iter().map(|(e, _)| *e).collect()
        }

        fn count(&self, event: Event) -> usize {
            self.events().into_iter().filter(|e| *e == event).count()
        }
    }

    #[async_trait]
    impl ChangeSource for Scripted {
        async fn poll_change(&self) -> RegistryResult<bool> {
            self.events.lock().unwrap().push((Event::Poll, Instant::now()));
            let next = self.changes.lock().unwrap().pop();
            match next {
                Some(Err(e)) => Err(e),
                Some(Ok(changed)) => {
                    sleep(HOLD).await;
                    Ok(changed)
                }
                None => {
                    sleep(HOLD).await;
                    Ok(false)
                }
            }
        }

        async fn fetch_and_apply(&self) -> RegistryResult<String> {
            self.events.lock().unwrap().push((Event::Fetch, Instant::now()));
            if self.fail_fetch {
                Err(RegistryError::Validation("bad document".to_string()))
            } else {
                Ok("log_level: INFO".to_string())
            }
        }
    }

    /// Always fails the long-poll immediately, as an unreachable registry would.
    struct Unreachable {
        attempts: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl ChangeSource for Unreachable {
        async fn poll_change(&self) -> RegistryResult<bool> {
            self.attempts.lock().unwrap().push(Instant::now());
            Err(RegistryError::Decode("connection refused".to_string()))
        }

        async fn fetch_and_apply(&self) -> RegistryResult<String> {
            unreachable!("no change was ever signalled")
        }
    }

    /// Signals a change on every poll but never serves the document.
    struct Unservable {
        fetches: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl ChangeSource for Unservable {
        async fn poll_change(&self) -> RegistryResult<bool> {
            Ok(true)
        }

        async fn fetch_and_apply(&self) -> RegistryResult<String> {
            self.fetches.lock().unwrap().push(Instant::now());
            Err(HttpStatusError::from_status(500, "server busy".to_string()).into())
        }
    }

    async fn run_for(source: Arc<dyn ChangeSource>, duration: Duration) {
        let (tx, rx) = broadcast::channel(1);
        let listener = ChangeListener::new(source, Duration::from_secs(18));
        let handle = tokio::spawn(listener.run(rx));

        sleep(duration).await;
        assert!(!handle.is_finished(), "listener must keep running until shutdown");

        tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_triggers_exactly_one_fetch() {
        let source = Scripted::new(vec![Ok(true)], false);
        run_for(source.clone(), Duration::from_millis(5_500)).await;

        let events = source.events();
        assert_eq!(events[0], Event::Poll);
        assert_eq!(events[1], Event::Fetch);
        assert!(events[2..].iter().all(|e| *e == Event::Poll));
        assert_eq!(source.count(Event::Fetch), 1);
        assert!(source.count(Event::Poll) >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_body_never_fetches() {
        let source = Scripted::new(vec![Ok(false), Ok(false)], false);
        run_for(source.clone(), Duration::from_millis(10_500)).await;

        assert_eq!(source.count(Event::Fetch), 0);
        assert_eq!(source.count(Event::Poll), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_apply_returns_to_waiting() {
        let source = Scripted::new(vec![Ok(true), Ok(true)], true);
        run_for(source.clone(), Duration::from_millis(4_500)).await;

        let events = source.events();
        assert_eq!(
            &events[..5],
            &[Event::Poll, Event::Fetch, Event::Poll, Event::Fetch, Event::Poll]
        );
        assert_eq!(source.count(Event::Fetch), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_are_followed_by_cooldown() {
        let source = Arc::new(Unreachable {
            attempts: Mutex::new(Vec::new()),
        });
        run_for(source.clone(), Duration::from_secs(100)).await;

        let attempts = source.attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 6);
        for pair in attempts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(18));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_then_recovery() {
        let source = Scripted::new(
            vec![Err(RegistryError::Decode("timeout".to_string())), Ok(true)],
            false,
        );
        run_for(source.clone(), Duration::from_secs(20)).await;

        let events = source.events.lock().unwrap().clone();
        assert_eq!(events[0].0, Event::Poll);
        assert_eq!(events[1].0, Event::Poll);
        assert!(events[1].1 - events[0].1 >= Duration::from_secs(18));
        assert_eq!(events[2].0, Event::Fetch);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_download_is_followed_by_cooldown() {
        let source = Arc::new(Unservable {
            fetches: Mutex::new(Vec::new()),
        });
        run_for(source.clone(), Duration::from_secs(100)).await;

        let fetches = source.fetches.lock().unwrap().clone();
        assert_eq!(fetches.len(), 6);
        for pair in fetches.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(18));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_download_cooldown() {
        let source = Arc::new(Unservable {
            fetches: Mutex::new(Vec::new()),
        });
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(
            ChangeListener::new(source.clone(), Duration::from_secs(18)).run(rx),
        );

        sleep(Duration::from_secs(1)).await;
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_millis(10), handle)
            .await
            .expect("listener should stop during the cooldown")
            .unwrap();
        assert_eq!(source.fetches.lock().unwrap().len(), 1);
    }
}
