//! Refresh controller
//!
//! Pure state machine behind the tracker. It owns the session state, the
//! backoff interval and the identity of the one request that may still
//! change that state. All inputs arrive through [`RefreshController::dispatch`],
//! which returns the side effects the caller has to carry out.
//!
//! ```text
//!            Start (key present)
//!   Idle ─────────────────────────▶ Fetching ◀──── Tick (countdown ≤ 1)
//!    ▲                                 │                 │
//!    │ Stop                Completed   │                 │
//!    │                                 ▼                 │
//!    └──────────────────────────── Counting ─────────────┘
//! ```
//!
//! Every attempt gets a new generation. A completion is applied only if it
//! carries the current generation, so a superseded request can never touch
//! the state even if its result was already queued when it was cancelled.

use crate::{
    backoff::Backoff,
    config::OracleConfig,
    constants::{FETCH_ERROR_MESSAGE, MISSING_API_KEY_MESSAGE},
    error::ProviderError,
    types::{GasPrice, GasPriceEvent, RefreshState},
};

/// Controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not running: before start, after stop, or without an API key
    Idle,
    /// Waiting for the countdown, no request outstanding
    Counting,
    /// A request is outstanding; the countdown keeps running
    Fetching,
}

/// Input to the controller
#[derive(Debug)]
pub enum Event {
    /// Session start
    Start,
    /// One countdown tick elapsed
    Tick,
    /// A request finished
    Completed {
        generation: u64,
        outcome: Result<GasPrice, ProviderError>,
    },
    /// Session end
    Stop,
}

/// Side effect requested by the controller
#[derive(Debug, Clone)]
pub enum Command {
    /// Issue a request tagged with this generation
    Fetch { generation: u64 },
    /// Abort the request with this generation
    Cancel { generation: u64 },
    /// Broadcast an event to subscribers
    Notify(GasPriceEvent),
}

/// Fetch-and-backoff state machine for one session
#[derive(Debug)]
pub struct RefreshController {
    state: RefreshState,
    backoff: Backoff,
    phase: Phase,
    generation: u64,
    has_api_key: bool,
    active: bool,
}

impl RefreshController {
    pub fn new(config: &OracleConfig) -> Self {
        let backoff = Backoff::new(config.base_delay, config.max_delay);
        Self {
            state: RefreshState::new(backoff.countdown_secs()),
            backoff,
            phase: Phase::Idle,
            generation: 0,
            has_api_key: config.has_api_key(),
            active: false,
        }
    }

    pub fn state(&self) -> &RefreshState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Generation of the most recently issued request
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True between Start and Stop
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True while the session runs and the countdown should tick
    pub fn is_running(&self) -> bool {
        self.active && self.phase != Phase::Idle
    }

    /// Applies one event and returns the commands to execute, in order
    pub fn dispatch(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::Start => self.on_start(),
            Event::Tick => self.on_tick(),
            Event::Completed {
                generation,
                outcome,
            } => self.on_completed(generation, outcome),
            Event::Stop => self.on_stop(),
        }
    }

    fn on_start(&mut self) -> Vec<Command> {
        if self.active {
            return Vec::new();
        }
        self.active = true;

        if !self.has_api_key {
            tracing::warn!("No Etherscan API key configured, gas price fetching disabled");
            self.state.error = Some(MISSING_API_KEY_MESSAGE.to_string());
            return Vec::new();
        }

        self.attempt()
    }

    fn on_tick(&mut self) -> Vec<Command> {
        if !self.is_running() {
            return Vec::new();
        }

        if self.state.countdown_secs > 1 {
            self.state.countdown_secs -= 1;
            return Vec::new();
        }

        self.state.countdown_secs = self.backoff.countdown_secs();
        self.attempt()
    }

    fn attempt(&mut self) -> Vec<Command> {
        let mut commands = Vec::with_capacity(2);

        if self.phase == Phase::Fetching {
            tracing::debug!(generation = self.generation, "Superseding pending request");
            commands.push(Command::Cancel {
                generation: self.generation,
            });
        }

        self.generation += 1;
        self.phase = Phase::Fetching;
        commands.push(Command::Fetch {
            generation: self.generation,
        });
        commands
    }

    fn on_completed(
        &mut self,
        generation: u64,
        outcome: Result<GasPrice, ProviderError>,
    ) -> Vec<Command> {
        if !self.active || self.phase != Phase::Fetching || generation != self.generation {
            tracing::debug!(
                generation,
                current = self.generation,
                "Discarding result of superseded request"
            );
            return Vec::new();
        }

        let notification = match outcome {
            Err(e) if e.is_cancelled() => return Vec::new(),
            Ok(price) => {
                let old = self.state.price.replace(price);
                self.state.error = None;
                self.backoff.reset();
                tracing::info!(gwei = %price.gwei, "Gas price updated");
                GasPriceEvent::price_updated(old, price)
            }
            Err(e) => {
                self.state.error = Some(FETCH_ERROR_MESSAGE.to_string());
                self.backoff.fail();
                tracing::warn!(
                    error = %e,
                    next_delay_ms = self.backoff.current().as_millis() as u64,
                    "Failed to fetch gas price, backing off"
                );
                GasPriceEvent::fetch_failed(e.to_string(), self.backoff.countdown_secs())
            }
        };

        self.phase = Phase::Counting;
        self.state.countdown_secs = self.backoff.countdown_secs();
        vec![Command::Notify(notification)]
    }

    fn on_stop(&mut self) -> Vec<Command> {
        if !self.active {
            return Vec::new();
        }
        self.active = false;

        let mut commands = Vec::new();
        if self.phase == Phase::Fetching {
            commands.push(Command::Cancel {
                generation: self.generation,
            });
        }
        self.phase = Phase::Idle;
        commands
    }
}
