//! Gas price tracker service
//!
//! Runs one session of the refresh controller on a single tokio task. The
//! task is the only place the controller is touched: countdown ticks, fetch
//! completions and shutdown are multiplexed with `select!` and each is fed
//! through the dispatcher in one step, so state transitions never
//! interleave.

use crate::{
    config::OracleConfig,
    constants::{EVENT_CHANNEL_CAPACITY, TICK_INTERVAL_MS},
    controller::{Command, Event, RefreshController},
    error::ProviderError,
    metrics::{MetricsCollector, RefreshMetrics},
    provider::GasPriceProvider,
    providers::EtherscanProvider,
    types::{ComponentHealth, DisplayState, GasPrice, GasPriceEvent, HealthStatus, RefreshState},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Gas price tracker
///
/// Built from an [`OracleConfig`]; [`start`](Self::start) spawns the session
/// and returns a [`TrackerHandle`] to observe and stop it.
///
/// # Example
/// ```no_run
/// use gas_oracle::{GasPriceTracker, OracleConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let tracker = GasPriceTracker::new(OracleConfig::from_env())?;
/// let handle = tracker.start();
/// let mut states = handle.subscribe_state();
/// while states.changed().await.is_ok() {
///     println!("{}", states.borrow().display());
/// }
/// # Ok(())
/// # }
/// ```
pub struct GasPriceTracker {
    config: OracleConfig,
    provider: Option<Arc<dyn GasPriceProvider>>,
    metrics: Arc<MetricsCollector>,
}

impl GasPriceTracker {
    /// Creates a tracker backed by Etherscan
    ///
    /// The config is validated first. Without an API key no provider is built
    /// and the session only reports the missing key.
    pub fn new(config: OracleConfig) -> Result<Self, ProviderError> {
        config.validate()?;

        let provider: Option<Arc<dyn GasPriceProvider>> = match config.api_key.as_deref() {
            Some(api_key) => Some(Arc::new(EtherscanProvider::new(api_key, &config)?)),
            None => None,
        };

        Ok(Self::build(config, provider))
    }

    /// Creates a tracker with a custom provider
    ///
    /// This is primarily for testing with mock providers.
    pub fn with_provider(config: OracleConfig, provider: Arc<dyn GasPriceProvider>) -> Self {
        Self::build(config, Some(provider))
    }

    fn build(config: OracleConfig, provider: Option<Arc<dyn GasPriceProvider>>) -> Self {
        let provider_name = provider
            .as_ref()
            .map(|p| p.provider_name())
            .unwrap_or("none");
        let metrics = Arc::new(MetricsCollector::new(provider_name));

        Self {
            config,
            provider,
            metrics,
        }
    }

    /// Returns the name of the current provider
    pub fn provider_name(&self) -> &str {
        self.provider
            .as_ref()
            .map(|p| p.provider_name())
            .unwrap_or("none")
    }

    /// Fetches the gas price once, outside any session
    pub async fn fetch_once(&self) -> Result<GasPrice, ProviderError> {
        let provider = match (&self.provider, self.config.has_api_key()) {
            (Some(provider), true) => provider,
            _ => return Err(ProviderError::MissingApiKey),
        };

        let start = Instant::now();
        let result = provider.fetch_gas_price().await;
        self.metrics
            .record_attempt(start.elapsed(), result.is_ok())
            .await;
        result
    }

    /// Spawns the session task
    pub fn start(self) -> TrackerHandle {
        let controller = RefreshController::new(&self.config);
        let (state_tx, state_rx) = watch::channel(controller.state().clone());
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let session = Session {
            controller,
            provider: self.provider,
            metrics: self.metrics.clone(),
            state_tx,
            events_tx: events_tx.clone(),
            done_tx,
            pending: None,
            shutdown: shutdown.clone(),
        };

        tracing::info!(
            base_delay_ms = self.config.base_delay.as_millis() as u64,
            max_delay_ms = self.config.max_delay.as_millis() as u64,
            "Starting gas price tracker"
        );
        let task = tokio::spawn(session.run(done_rx));

        TrackerHandle {
            state_rx,
            events_tx,
            metrics: self.metrics,
            shutdown,
            task: Some(task),
        }
    }
}

/// Result of one request, tagged with the generation it was issued for
struct Completion {
    generation: u64,
    outcome: Result<GasPrice, ProviderError>,
    elapsed: Duration,
}

/// The one request that may still change state
struct PendingRequest {
    generation: u64,
    cancel: CancellationToken,
}

enum Wake {
    Shutdown,
    Done(Completion),
    Tick,
}

struct Session {
    controller: RefreshController,
    provider: Option<Arc<dyn GasPriceProvider>>,
    metrics: Arc<MetricsCollector>,
    state_tx: watch::Sender<RefreshState>,
    events_tx: broadcast::Sender<GasPriceEvent>,
    done_tx: mpsc::UnboundedSender<Completion>,
    pending: Option<PendingRequest>,
    shutdown: CancellationToken,
}

impl Session {
    async fn run(mut self, mut done_rx: mpsc::UnboundedReceiver<Completion>) {
        self.handle(Event::Start).await;

        if !self.controller.is_running() {
            // Missing API key: keep the error visible until the session ends.
            self.shutdown.cancelled().await;
            self.handle(Event::Stop).await;
            tracing::info!("Gas price tracker stopped");
            return;
        }

        let tick = Duration::from_millis(TICK_INTERVAL_MS);
        let mut ticker = interval_at(Instant::now() + tick, tick);
        // After a stall resume counting instead of replaying every missed second
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = self.shutdown.clone();

        loop {
            let wake = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Wake::Shutdown,
                Some(done) = done_rx.recv() => Wake::Done(done),
                _ = ticker.tick() => Wake::Tick,
            };

            match wake {
                Wake::Shutdown => {
                    self.handle(Event::Stop).await;
                    break;
                }
                Wake::Done(done) => self.complete(done).await,
                Wake::Tick => self.handle(Event::Tick).await,
            }
        }

        tracing::info!("Gas price tracker stopped");
    }

    /// Feeds a finished request to the controller
    ///
    /// Only the request still in the pending slot counts towards metrics; a
    /// result that was already queued when its request got superseded has
    /// been counted as superseded.
    async fn complete(&mut self, done: Completion) {
        let current = self
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == done.generation);
        if current {
            self.pending = None;
        }

        let resolved = current && !matches!(&done.outcome, Err(e) if e.is_cancelled());
        if resolved {
            self.metrics
                .record_attempt(done.elapsed, done.outcome.is_ok())
                .await;
        }

        self.handle(Event::Completed {
            generation: done.generation,
            outcome: done.outcome,
        })
        .await;

        if resolved {
            self.metrics
                .record_next_delay(self.controller.backoff().current())
                .await;
        }
    }

    async fn handle(&mut self, event: Event) {
        for command in self.controller.dispatch(event) {
            match command {
                Command::Fetch { generation } => self.spawn_fetch(generation),
                Command::Cancel { generation } => self.cancel(generation).await,
                Command::Notify(event) => {
                    // No subscribers is fine
                    let _ = self.events_tx.send(event);
                }
            }
        }

        if self.controller.is_active() {
            let state = self.controller.state();
            self.state_tx.send_if_modified(|current| {
                if current != state {
                    *current = state.clone();
                    true
                } else {
                    false
                }
            });
        }
    }

    fn spawn_fetch(&mut self, generation: u64) {
        let Some(provider) = self.provider.clone() else {
            tracing::error!(generation, "No provider available for gas price request");
            return;
        };

        let cancel = self.shutdown.child_token();
        self.pending = Some(PendingRequest {
            generation,
            cancel: cancel.clone(),
        });

        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            let outcome = provider.fetch_cancellable(&cancel).await;
            // The session may already be gone
            let _ = done_tx.send(Completion {
                generation,
                outcome,
                elapsed: start.elapsed(),
            });
        });
    }

    async fn cancel(&mut self, generation: u64) {
        let current = self
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == generation);
        if !current {
            return;
        }
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
            self.metrics.record_superseded().await;
        }
    }
}

/// Handle to a running tracker session
///
/// Dropping the handle ends the session.
pub struct TrackerHandle {
    state_rx: watch::Receiver<RefreshState>,
    events_tx: broadcast::Sender<GasPriceEvent>,
    metrics: Arc<MetricsCollector>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TrackerHandle {
    /// Latest published state
    pub fn state(&self) -> RefreshState {
        self.state_rx.borrow().clone()
    }

    /// What the presentation layer should show right now
    pub fn display(&self) -> DisplayState {
        self.state_rx.borrow().display()
    }

    /// Receiver notified on every state change
    pub fn subscribe_state(&self) -> watch::Receiver<RefreshState> {
        self.state_rx.clone()
    }

    /// Receiver for price and failure events
    pub fn subscribe_events(&self) -> broadcast::Receiver<GasPriceEvent> {
        self.events_tx.subscribe()
    }

    /// Attempt counters, latency and the current backoff delay
    pub async fn metrics(&self) -> RefreshMetrics {
        self.metrics.snapshot().await
    }

    /// Perform a health check on the tracker
    pub async fn health_check(&self) -> ComponentHealth {
        let state = self.state();
        let mut details = std::collections::HashMap::new();

        details.insert(
            "price_gwei".to_string(),
            serde_json::json!(state.price.map(|p| p.gwei_string())),
        );
        details.insert(
            "countdown_secs".to_string(),
            serde_json::json!(state.countdown_secs),
        );
        let metrics = self.metrics.snapshot().await;
        details.insert(
            "provider_name".to_string(),
            serde_json::json!(metrics.provider_name),
        );
        details.insert(
            "consecutive_failures".to_string(),
            serde_json::json!(metrics.consecutive_failures),
        );

        let status = match (&state.price, &state.error) {
            (Some(_), None) => HealthStatus::Healthy,
            (Some(_), Some(_)) => HealthStatus::Degraded,
            (None, _) => HealthStatus::Unhealthy,
        };

        let message = match (&status, &state.error) {
            (HealthStatus::Healthy, _) => "Gas price tracker is operational".to_string(),
            (_, Some(error)) => error.clone(),
            (_, None) => "No gas price fetched yet".to_string(),
        };

        ComponentHealth {
            name: "gas_price_tracker".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: chrono::Utc::now(),
        }
    }

    /// Ends the session and waits for the task to finish
    ///
    /// Cancels any pending request; no state is published afterwards.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Gas price tracker task ended abnormally");
            }
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
