//! Etherscan gas price provider implementation

use crate::{
    config::OracleConfig,
    constants::{ETHERSCAN_GAS_PRICE_ACTION, ETHERSCAN_MODULE, INVALID_RESPONSE_MESSAGE, USER_AGENT},
    error::{ConfigError, ProviderError},
    provider::GasPriceProvider,
    types::GasPrice,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

/// Etherscan API response
///
/// The proxy module answers in JSON-RPC shape (`result` or `error`), while
/// key and rate-limit problems come back in the REST envelope with
/// `status: "0"`.
#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

/// Etherscan gas price provider
pub struct EtherscanProvider {
    client: Client,
    url: Url,
}

impl EtherscanProvider {
    /// Creates a new Etherscan provider for the given API key
    pub fn new(api_key: &str, config: &OracleConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::NetworkError)?;

        let url = Self::build_url(&config.api_url, api_key)?;

        Ok(Self { client, url })
    }

    /// Builds the `eth_gasPrice` request URL
    fn build_url(api_url: &str, api_key: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(api_url).map_err(|e| ConfigError::invalid_url(api_url, e))?;

        url.query_pairs_mut()
            .append_pair("module", ETHERSCAN_MODULE)
            .append_pair("action", ETHERSCAN_GAS_PRICE_ACTION)
            .append_pair("apikey", api_key);

        Ok(url)
    }

    /// Parses the Etherscan response body into a gas price
    fn parse_response(body: &str) -> Result<GasPrice, ProviderError> {
        let response: EtherscanResponse = serde_json::from_str(body).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse Etherscan response: {}. Response: {}",
                e, body
            ))
        })?;

        if let Some(error) = response.error {
            return Err(ProviderError::ApiError(match error.code {
                Some(code) => format!("{} (code {})", error.message, code),
                None => error.message,
            }));
        }

        if response.status.as_deref() == Some("0") {
            let reason = response
                .result
                .as_ref()
                .and_then(|r| r.as_str())
                .map(str::to_string)
                .or(response.message)
                .unwrap_or_else(|| "NOTOK".to_string());
            return Err(ProviderError::ApiError(reason));
        }

        match response.result {
            Some(serde_json::Value::String(hex)) => GasPrice::from_hex(&hex),
            _ => Err(ProviderError::invalid_response(INVALID_RESPONSE_MESSAGE)),
        }
    }
}

#[async_trait]
impl GasPriceProvider for EtherscanProvider {
    async fn fetch_gas_price(&self) -> Result<GasPrice, ProviderError> {
        tracing::debug!(
            host = self.url.host_str().unwrap_or_default(),
            path = self.url.path(),
            "Fetching gas price from Etherscan"
        );

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(transport_error)?;

        // Check for rate limiting
        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimitExceeded);
        }

        // Check for other errors
        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let response_text = response.text().await.map_err(transport_error)?;
        let price = Self::parse_response(&response_text)?;

        tracing::debug!(wei = %price.wei, gwei = %price.gwei, "Fetched gas price from Etherscan");

        Ok(price)
    }

    fn provider_name(&self) -> &'static str {
        "etherscan"
    }
}

/// The client timeout covers the whole request, body included
fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::NetworkError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use std::time::Duration;

    fn provider_for(server: &MockServer) -> EtherscanProvider {
        let config = OracleConfig::default().with_api_url(format!("{}/api", server.base_url()));
        EtherscanProvider::new("test-api-key", &config).unwrap()
    }

    #[test]
    fn test_build_url() {
        let url = EtherscanProvider::build_url("https://api.etherscan.io/api", "abc").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.etherscan.io/api?module=proxy&action=eth_gasPrice&apikey=abc"
        );
    }

    #[test]
    fn test_build_url_rejects_unparsable_url() {
        match EtherscanProvider::build_url("etherscan api", "abc") {
            Err(ProviderError::InvalidConfig(ConfigError::InvalidUrl { url, .. })) => {
                assert_eq!(url, "etherscan api")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_json_rpc_result() {
        let body = format!(r#"{{"jsonrpc":"2.0","id":73,"result":"0x{:x}"}}"#, 20_000_000_000u64);
        let price = EtherscanProvider::parse_response(&body).unwrap();
        assert_eq!(price.gwei_string(), "20.00");
    }

    #[test]
    fn test_parse_error_envelopes() {
        let body = r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#;
        match EtherscanProvider::parse_response(body) {
            Err(ProviderError::ApiError(reason)) => assert_eq!(reason, "Invalid API Key"),
            other => panic!("unexpected: {other:?}"),
        }

        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"boom"}}"#;
        match EtherscanProvider::parse_response(body) {
            Err(ProviderError::ApiError(reason)) => assert_eq!(reason, "boom (code -32000)"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_invalid_result() {
        for body in [r#"{"result":"garbage"}"#, r#"{"result":42}"#, r#"{}"#, "not json"] {
            let err = EtherscanProvider::parse_response(body).unwrap_err();
            assert!(matches!(err, ProviderError::InvalidResponse(_)), "{body}");
        }
    }

    #[tokio::test]
    async fn test_fetch_happy_path() {
        let server = MockServer::start();
        let body = format!(r#"{{"jsonrpc":"2.0","id":73,"result":"0x{:x}"}}"#, 30_000_000_000u64);

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api")
                .query_param("module", "proxy")
                .query_param("action", "eth_gasPrice")
                .query_param("apikey", "test-api-key");
            then.status(200)
                .header("content-type", "application/json")
                .body(body);
        });

        let price = provider_for(&server).fetch_gas_price().await.unwrap();
        mock.assert();
        assert_eq!(price.gwei_string(), "30.00");
        assert_eq!(price.wei, 30_000_000_000);
    }

    #[tokio::test]
    async fn test_fetch_status_errors() {
        let server = MockServer::start();
        let limited = server.mock(|when, then| {
            when.method(GET).path("/api");
            then.status(429);
        });

        let err = provider_for(&server).fetch_gas_price().await.unwrap_err();
        limited.assert();
        assert!(matches!(err, ProviderError::RateLimitExceeded));

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api");
            then.status(502).body("bad gateway");
        });

        let err = provider_for(&server).fetch_gas_price().await.unwrap_err();
        match err {
            ProviderError::ApiError(msg) => assert!(msg.contains("502"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api");
            then.status(200)
                .delay(Duration::from_millis(500))
                .body(r#"{"jsonrpc":"2.0","id":73,"result":"0x4a817c800"}"#);
        });

        let config = OracleConfig::default()
            .with_api_url(format!("{}/api", server.base_url()))
            .with_request_timeout(Duration::from_millis(100));
        let provider = EtherscanProvider::new("test-api-key", &config).unwrap();

        let err = provider.fetch_gas_price().await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout), "{err:?}");
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Grab a free port, then close it so nothing is listening there.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let config = OracleConfig::default().with_api_url(format!("http://{addr}/api"));
        let provider = EtherscanProvider::new("test-api-key", &config).unwrap();

        match provider.fetch_gas_price().await {
            Err(ProviderError::NetworkError(e)) => assert!(e.is_connect(), "{e}"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
