//! Constants for the gas price tracker
//!
//! Timing and endpoint defaults live here. The only runtime input the
//! tracker needs is the Etherscan API key; everything else can be
//! overridden through [`OracleConfig`](crate::config::OracleConfig).

/// Baseline delay between refreshes (in milliseconds)
pub const BASE_DELAY_MS: u64 = 15_000;

/// Upper bound for the backoff delay after repeated failures (in milliseconds)
pub const MAX_DELAY_MS: u64 = 60_000;

/// Countdown tick period (in milliseconds)
pub const TICK_INTERVAL_MS: u64 = 1_000;

/// HTTP request timeout when fetching the gas price (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Etherscan API base URL
pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/api";

/// Etherscan proxy module name
pub const ETHERSCAN_MODULE: &str = "proxy";

/// Etherscan action returning the current gas price in wei
pub const ETHERSCAN_GAS_PRICE_ACTION: &str = "eth_gasPrice";

/// Environment variable holding the Etherscan API key
pub const API_KEY_ENV_VAR: &str = "ETHERSCAN_API_KEY";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "gas-oracle/0.1.0";

/// Decimal places kept when displaying gwei
pub const GWEI_DECIMALS: u32 = 2;

/// Shown when no API key is configured
pub const MISSING_API_KEY_MESSAGE: &str =
    "Missing Etherscan API key. Set ETHERSCAN_API_KEY in the environment.";

/// Shown for every transient fetch failure
pub const FETCH_ERROR_MESSAGE: &str = "Error fetching gas price";

/// Internal message for a `result` field that is not a hex integer
pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid gas price response";

/// Placeholder shown until the first attempt completes
pub const LOADING_MESSAGE: &str = "Loading gas price...";

/// Capacity of the event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
