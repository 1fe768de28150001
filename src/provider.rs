//! Provider abstraction for fetching the gas price from an external API

use crate::{error::ProviderError, types::GasPrice};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Trait for gas price providers
///
/// Implementations issue one request per call. Dropping the returned future
/// aborts the request.
#[async_trait]
pub trait GasPriceProvider: Send + Sync {
    /// Fetches the current gas price
    async fn fetch_gas_price(&self) -> Result<GasPrice, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;

    /// Fetches the gas price unless `cancel` fires first
    ///
    /// On cancellation the in-flight request is dropped and
    /// [`ProviderError::Cancelled`] is returned.
    async fn fetch_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> Result<GasPrice, ProviderError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = self.fetch_gas_price() => result,
        }
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Scripted outcome for one call
    #[derive(Debug, Clone)]
    pub enum MockResponse {
        /// Successful response carrying this many wei
        Wei(u128),
        /// Transport-level failure
        Fail(String),
        /// Body whose `result` is not a hex integer
        Invalid,
    }

    /// Mock provider for testing
    ///
    /// Responses are consumed in order; each may be delayed to simulate a
    /// slow request.
    pub struct MockProvider {
        responses: Arc<Mutex<VecDeque<(Duration, MockResponse)>>>,
        call_count: Arc<Mutex<usize>>,
    }

    impl Default for MockProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self {
                responses: Arc::new(Mutex::new(VecDeque::new())),
                call_count: Arc::new(Mutex::new(0)),
            }
        }

        pub fn push(&self, response: MockResponse) {
            self.push_delayed(Duration::ZERO, response);
        }

        pub fn push_delayed(&self, delay: Duration, response: MockResponse) {
            self.responses
                .lock()
                .unwrap()
                .push_back((delay, response));
        }

        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl GasPriceProvider for MockProvider {
        async fn fetch_gas_price(&self) -> Result<GasPrice, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            let next = self.responses.lock().unwrap().pop_front();
            let (delay, response) = next.unwrap_or((
                Duration::ZERO,
                MockResponse::Fail("no scripted response".to_string()),
            ));

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match response {
                MockResponse::Wei(wei) => GasPrice::from_wei(wei),
                MockResponse::Fail(msg) => Err(ProviderError::ApiError(msg)),
                MockResponse::Invalid => GasPrice::from_hex("not hex"),
            }
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_cancellable_returns_cancelled() {
        let provider = MockProvider::new();
        provider.push_delayed(Duration::from_secs(30), MockResponse::Wei(1));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = provider.fetch_cancellable(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_cancellable_passes_result_through() {
        let provider = MockProvider::new();
        provider.push(MockResponse::Wei(20_000_000_000));

        let price = provider
            .fetch_cancellable(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(price.gwei_string(), "20.00");
    }
}
