//! # Gas Oracle
//!
//! Tracks the current Ethereum gas price from the Etherscan API, with a
//! visible countdown to the next refresh and exponential backoff on failure.
//!
//! ## Usage
//!
//! ```no_run
//! use gas_oracle::{GasPriceTracker, OracleConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Reads ETHERSCAN_API_KEY; a missing key is reported, not fatal
//! let tracker = GasPriceTracker::new(OracleConfig::from_env())?;
//! let handle = tracker.start();
//!
//! let mut states = handle.subscribe_state();
//! while states.changed().await.is_ok() {
//!     // "Current Gas Price: 20.00 Gwei\nRefreshing in 15 seconds..."
//!     println!("{}", states.borrow().display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Refresh cycle
//!
//! ```text
//! 1s ticker ──▶ countdown 15 → 1 ──▶ attempt (supersedes any pending request)
//!                                        │
//!            success: delay = 15s  ◀─────┼─────▶  failure: delay = min(2 × delay, 60s)
//!                                        │
//!                         countdown restarts at the new delay
//! ```
//!
//! A failure keeps the last good price around but displays the error. A
//! request that is superseded before it resolves is cancelled and its result
//! discarded.

pub mod backoff;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use config::OracleConfig;
pub use error::{ConfigError, ProviderError};
pub use metrics::RefreshMetrics;
pub use tracker::{GasPriceTracker, TrackerHandle};
pub use types::{
    ComponentHealth, DisplayState, GasPrice, GasPriceEvent, HealthStatus, RefreshState,
};
