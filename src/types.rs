//! Types for the gas price tracker

use crate::{
    constants::{GWEI_DECIMALS, INVALID_RESPONSE_MESSAGE, LOADING_MESSAGE},
    error::ProviderError,
};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Gas price reading
///
/// `gwei` is the wei value divided by 1e9, rounded half away from zero to
/// two decimals and always carried with scale 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPrice {
    /// Raw value in wei
    pub wei: u128,
    /// Display value in gwei
    pub gwei: Decimal,
}

impl GasPrice {
    /// Converts a wei amount into a gas price reading
    pub fn from_wei(wei: u128) -> Result<Self, ProviderError> {
        let mantissa = i128::try_from(wei)
            .map_err(|_| ProviderError::invalid_response(INVALID_RESPONSE_MESSAGE))?;
        // Nine decimal places turn wei into gwei without any division.
        let exact = Decimal::try_from_i128_with_scale(mantissa, 9)
            .map_err(|_| ProviderError::invalid_response(INVALID_RESPONSE_MESSAGE))?;

        let mut gwei =
            exact.round_dp_with_strategy(GWEI_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
        gwei.rescale(GWEI_DECIMALS);

        Ok(Self { wei, gwei })
    }

    /// Parses a `0x`-prefixed hexadecimal wei string
    pub fn from_hex(hex: &str) -> Result<Self, ProviderError> {
        let trimmed = hex.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ProviderError::invalid_response(INVALID_RESPONSE_MESSAGE));
        }

        let wei = u128::from_str_radix(digits, 16)
            .map_err(|_| ProviderError::invalid_response(INVALID_RESPONSE_MESSAGE))?;
        Self::from_wei(wei)
    }

    /// Gwei formatted with exactly two decimals
    pub fn gwei_string(&self) -> String {
        self.gwei.to_string()
    }
}

impl std::fmt::Display for GasPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Gwei", self.gwei)
    }
}

/// Observable state of a tracker session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshState {
    /// Last successfully fetched price
    pub price: Option<GasPrice>,
    /// User-visible error of the most recent completed attempt
    pub error: Option<String>,
    /// Seconds until the next attempt
    pub countdown_secs: u64,
}

impl RefreshState {
    /// Creates the state shown before the first attempt completes
    pub fn new(countdown_secs: u64) -> Self {
        Self {
            price: None,
            error: None,
            countdown_secs,
        }
    }

    /// Projects the state onto what should be displayed
    pub fn display(&self) -> DisplayState {
        DisplayState::from(self)
    }
}

/// What the presentation layer shows, in precedence order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayState {
    /// An error is shown; the last good price is carried but not rendered
    Error {
        message: String,
        stale_price: Option<GasPrice>,
    },
    /// A price with the countdown to the next refresh
    Price {
        price: GasPrice,
        countdown_secs: u64,
    },
    /// Nothing has completed yet
    Loading,
}

impl From<&RefreshState> for DisplayState {
    fn from(state: &RefreshState) -> Self {
        match (&state.error, state.price) {
            (Some(message), stale_price) => DisplayState::Error {
                message: message.clone(),
                stale_price,
            },
            (None, Some(price)) => DisplayState::Price {
                price,
                countdown_secs: state.countdown_secs,
            },
            (None, None) => DisplayState::Loading,
        }
    }
}

impl std::fmt::Display for DisplayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayState::Error { message, .. } => write!(f, "{}", message),
            DisplayState::Price {
                price,
                countdown_secs,
            } => {
                writeln!(f, "Current Gas Price: {}", price)?;
                write!(f, "Refreshing in {} seconds...", countdown_secs)
            }
            DisplayState::Loading => write!(f, "{}", LOADING_MESSAGE),
        }
    }
}

/// Events broadcast by the tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GasPriceEvent {
    /// A new price was stored
    PriceUpdated {
        id: Uuid,
        old_gwei: Option<Decimal>,
        new_gwei: Decimal,
        wei: u128,
        timestamp: DateTime<Utc>,
    },

    /// An attempt failed and the delay was backed off
    PriceFetchFailed {
        id: Uuid,
        error_message: String,
        next_attempt_secs: u64,
        timestamp: DateTime<Utc>,
    },
}

impl GasPriceEvent {
    pub fn price_updated(old: Option<GasPrice>, new: GasPrice) -> Self {
        GasPriceEvent::PriceUpdated {
            id: Uuid::new_v4(),
            old_gwei: old.map(|p| p.gwei),
            new_gwei: new.gwei,
            wei: new.wei,
            timestamp: Utc::now(),
        }
    }

    pub fn fetch_failed(error_message: impl Into<String>, next_attempt_secs: u64) -> Self {
        GasPriceEvent::PriceFetchFailed {
            id: Uuid::new_v4(),
            error_message: error_message.into(),
            next_attempt_secs,
            timestamp: Utc::now(),
        }
    }

    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            GasPriceEvent::PriceUpdated { id, .. } => *id,
            GasPriceEvent::PriceFetchFailed { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            GasPriceEvent::PriceUpdated { .. } => "PRICE_UPDATED",
            GasPriceEvent::PriceFetchFailed { .. } => "PRICE_FETCH_FAILED",
        }
    }
}

impl std::fmt::Display for GasPriceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GasPriceEvent::PriceUpdated { new_gwei, .. } => {
                write!(f, "Gas price updated: {} Gwei", new_gwei)
            }
            GasPriceEvent::PriceFetchFailed {
                error_message,
                next_attempt_secs,
                ..
            } => {
                write!(
                    f,
                    "Gas price fetch failed: {} (retry in {}s)",
                    error_message, next_attempt_secs
                )
            }
        }
    }
}

/// Overall tracker health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Fresh price, last attempt succeeded
    Healthy,
    /// Last attempt failed but a stale price is available
    Degraded,
    /// No price available
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(wei: u128) -> String {
        format!("0x{:x}", wei)
    }

    #[test]
    fn test_whole_gwei() {
        let price = GasPrice::from_hex(&hex(20_000_000_000)).unwrap();
        assert_eq!(price.gwei_string(), "20.00");
        assert_eq!(price.wei, 20_000_000_000);
    }

    #[test]
    fn test_rounding_boundaries() {
        assert_eq!(GasPrice::from_wei(0).unwrap().gwei_string(), "0.00");
        assert_eq!(GasPrice::from_wei(1).unwrap().gwei_string(), "0.00");
        assert_eq!(GasPrice::from_wei(4_999_999).unwrap().gwei_string(), "0.00");
        assert_eq!(GasPrice::from_wei(5_000_000).unwrap().gwei_string(), "0.01");
        assert_eq!(
            GasPrice::from_wei(1_234_567_890).unwrap().gwei_string(),
            "1.23"
        );
        assert_eq!(
            GasPrice::from_wei(999_999_999_500).unwrap().gwei_string(),
            "1000.00"
        );
    }

    #[test]
    fn test_rejects_non_hex() {
        for bad in ["", "0x", "0xzz", "Invalid API Key", "12.5"] {
            let err = GasPrice::from_hex(bad).unwrap_err();
            assert!(matches!(err, ProviderError::InvalidResponse(_)), "{bad}");
        }
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(GasPrice::from_wei(u128::MAX).is_err());
        assert!(GasPrice::from_hex("0x1ffffffffffffffffffffffffffffffff").is_err());
    }

    #[test]
    fn test_display_precedence() {
        let price = GasPrice::from_wei(20_000_000_000).unwrap();

        let loading = RefreshState::new(15);
        assert_eq!(loading.display(), DisplayState::Loading);
        assert_eq!(loading.display().to_string(), "Loading gas price...");

        let ok = RefreshState {
            price: Some(price),
            error: None,
            countdown_secs: 12,
        };
        assert_eq!(
            ok.display().to_string(),
            "Current Gas Price: 20.00 Gwei\nRefreshing in 12 seconds..."
        );

        let failed = RefreshState {
            price: Some(price),
            error: Some("Error fetching gas price".to_string()),
            countdown_secs: 30,
        };
        assert_eq!(
            failed.display(),
            DisplayState::Error {
                message: "Error fetching gas price".to_string(),
                stale_price: Some(price),
            }
        );
        assert_eq!(failed.display().to_string(), "Error fetching gas price");
    }

    #[test]
    fn test_event_types() {
        let price = GasPrice::from_wei(30_000_000_000).unwrap();
        let event = GasPriceEvent::price_updated(None, price);
        assert_eq!(event.event_type(), "PRICE_UPDATED");
        assert_eq!(event.to_string(), "Gas price updated: 30.00 Gwei");

        let event = GasPriceEvent::fetch_failed("Error fetching gas price", 30);
        assert_eq!(event.event_type(), "PRICE_FETCH_FAILED");
        assert_ne!(event.id(), GasPriceEvent::fetch_failed("x", 1).id());
    }
}
