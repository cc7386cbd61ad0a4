//! Explorer HTTP Client
//!
//! `ExplorerApi` implementation for Etherscan-family block explorer APIs.
//! One client per chain, built from the chain descriptor plus config
//! overrides. The client performs exactly one HTTP attempt per call so
//! that budget accounting upstream stays exact; retry policy lives in
//! the collector.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use super::types::{
    parse_hex_u64, AccountEnvelope, ProxyResponse, RpcBlock, TokenTransferRow,
};
use crate::domain::chain::ChainDescriptor;
use crate::domain::event::RawTransfer;
use crate::ports::explorer::{ExplorerApi, ExplorerError};

/// Explorer client configuration
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// API base URL
    pub api_url: String,
    /// Explorer API key
    pub api_key: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ExplorerConfig {
    pub fn from_descriptor(descriptor: &ChainDescriptor, api_key: String) -> Self {
        Self {
            api_url: descriptor.explorer_url.to_string(),
            api_key,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Etherscan-style explorer client for one chain
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    config: ExplorerConfig,
    native_symbol: String,
    native_asset_id: String,
    http: Client,
}

impl ExplorerClient {
    pub fn new(
        config: ExplorerConfig,
        native_symbol: String,
        native_asset_id: String,
    ) -> Result<Self, ExplorerError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExplorerError::Http(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            config,
            native_symbol,
            native_asset_id,
            http,
        })
    }

    pub fn for_chain(
        descriptor: &ChainDescriptor,
        api_key: String,
    ) -> Result<Self, ExplorerError> {
        Self::new(
            ExplorerConfig::from_descriptor(descriptor, api_key),
            descriptor.native_symbol.to_string(),
            descriptor.native_asset_id.to_string(),
        )
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        query: &[(&str, &str)],
    ) -> Result<T, ExplorerError> {
        let response = self
            .http
            .get(&self.config.api_url)
            .query(query)
            .query(&[("apikey", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExplorerError::Timeout
                } else {
                    ExplorerError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ExplorerError::Provider("rate limited (429)".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExplorerError::Http(format!("{}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| ExplorerError::Parse(format!("failed to parse response: {}", e)))
    }

    fn unwrap_proxy<T>(response: ProxyResponse<T>) -> Result<T, ExplorerError> {
        if let Some(error) = response.error {
            return Err(ExplorerError::Provider(error.message));
        }
        response
            .result
            .ok_or_else(|| ExplorerError::Provider("empty proxy result".to_string()))
    }
}

#[async_trait]
impl ExplorerApi for ExplorerClient {
    async fn latest_block_number(&self) -> Result<u64, ExplorerError> {
        let response: ProxyResponse<String> = self
            .get_json(&[("module", "proxy"), ("action", "eth_blockNumber")])
            .await?;
        parse_hex_u64(&Self::unwrap_proxy(response)?)
    }

    async fn block_with_transfers(&self, number: u64) -> Result<Vec<RawTransfer>, ExplorerError> {
        let tag = format!("0x{:x}", number);
        let response: ProxyResponse<RpcBlock> = self
            .get_json(&[
                ("module", "proxy"),
                ("action", "eth_getBlockByNumber"),
                ("tag", tag.as_str()),
                ("boolean", "true"),
            ])
            .await?;
        Self::unwrap_proxy(response)?.into_transfers(&self.native_symbol, &self.native_asset_id)
    }

    async fn token_transfers(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawTransfer>, ExplorerError> {
        let start = from_block.to_string();
        let end = to_block.to_string();
        let envelope: AccountEnvelope = self
            .get_json(&[
                ("module", "account"),
                ("action", "tokentx"),
                ("startblock", start.as_str()),
                ("endblock", end.as_str()),
                ("sort", "asc"),
            ])
            .await?;

        // "No transactions found" arrives as status 0; it is an empty
        // result, not a failure
        if envelope.status != "1" {
            if envelope.message.contains("No transactions") {
                return Ok(Vec::new());
            }
            return Err(ExplorerError::Provider(format!(
                "{}: {}",
                envelope.message, envelope.result
            )));
        }

        let rows: Vec<TokenTransferRow> = serde_json::from_value(envelope.result)
            .map_err(|e| ExplorerError::Parse(format!("failed to parse tokentx rows: {}", e)))?;
        rows.into_iter().map(TokenTransferRow::into_transfer).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain::Chain;

    #[test]
    fn test_client_from_descriptor() {
        let client =
            ExplorerClient::for_chain(Chain::Ethereum.descriptor(), "key123".to_string()).unwrap();
        assert_eq!(client.api_url(), "https://api.etherscan.io/api");
        assert_eq!(client.native_symbol, "ETH");
    }

    #[test]
    fn test_unwrap_proxy_error() {
        let response: ProxyResponse<String> = serde_json::from_str(
            r#"{"error": {"message": "invalid tag"}}"#,
        )
        .unwrap();
        let err = ExplorerClient::unwrap_proxy(response).unwrap_err();
        assert!(matches!(err, ExplorerError::Provider(_)));
        assert!(err.to_string().contains("invalid tag"));
    }

    #[test]
    fn test_unwrap_proxy_empty_result() {
        let response: ProxyResponse<String> = serde_json::from_str(r#"{"result": null}"#).unwrap();
        assert!(ExplorerClient::unwrap_proxy(response).is_err());
    }

    #[test]
    fn test_unwrap_proxy_ok() {
        let response: ProxyResponse<String> =
            serde_json::from_str(r#"{"result": "0x12d687"}"#).unwrap();
        assert_eq!(ExplorerClient::unwrap_proxy(response).unwrap(), "0x12d687");
    }
}
