//! Explorer API Wire Types
//!
//! DTOs for Etherscan-family APIs. The proxy endpoints mirror JSON-RPC
//! (hex-encoded quantities); the account endpoints wrap results in a
//! `status`/`message` envelope where `status != "1"` is a provider error
//! carried in an otherwise successful HTTP response.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::domain::event::RawTransfer;
use crate::ports::explorer::ExplorerError;

/// JSON-RPC style proxy envelope
#[derive(Debug, Deserialize)]
pub struct ProxyResponse<T> {
    pub result: Option<T>,
    pub error: Option<ProxyError>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyError {
    pub message: String,
}

/// Block as returned by `eth_getBlockByNumber` with full transactions
#[derive(Debug, Deserialize)]
pub struct RpcBlock {
    pub number: String,
    pub timestamp: String,
    pub transactions: Vec<RpcTransaction>,
}

#[derive(Debug, Deserialize)]
pub struct RpcTransaction {
    pub hash: String,
    pub from: String,
    /// Absent for contract creation
    #[serde(default)]
    pub to: Option<String>,
    pub value: String,
}

/// `status`/`message` envelope of the account endpoints
#[derive(Debug, Deserialize)]
pub struct AccountEnvelope {
    pub status: String,
    pub message: String,
    pub result: serde_json::Value,
}

/// One row of a `tokentx` listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransferRow {
    pub hash: String,
    pub from: String,
    pub to: String,
    /// Decimal string in token base units
    pub value: String,
    pub token_symbol: String,
    pub token_decimal: String,
    pub contract_address: String,
    pub block_number: String,
    pub time_stamp: String,
}

/// Parse a 0x-prefixed hex quantity
pub fn parse_hex_u64(value: &str) -> Result<u64, ExplorerError> {
    let stripped = value.trim_start_matches("0x");
    u64::from_str_radix(stripped, 16)
        .map_err(|e| ExplorerError::Parse(format!("invalid hex quantity '{}': {}", value, e)))
}

/// Parse a 0x-prefixed hex wei amount into whole coins (18 decimals)
pub fn parse_hex_wei(value: &str) -> Result<f64, ExplorerError> {
    let stripped = value.trim_start_matches("0x");
    let wei = u128::from_str_radix(stripped, 16)
        .map_err(|e| ExplorerError::Parse(format!("invalid hex amount '{}': {}", value, e)))?;
    Ok(wei as f64 / 1e18)
}

/// Parse a decimal base-unit string into whole tokens
pub fn parse_token_amount(value: &str, decimals: &str) -> Result<f64, ExplorerError> {
    let units: f64 = value
        .parse()
        .map_err(|_| ExplorerError::Parse(format!("invalid token amount '{}'", value)))?;
    let decimals: u32 = decimals
        .parse()
        .map_err(|_| ExplorerError::Parse(format!("invalid token decimals '{}'", decimals)))?;
    Ok(units / 10f64.powi(decimals as i32))
}

fn parse_unix_ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
}

impl RpcBlock {
    /// Native value transfers in this block. Zero-value calls and
    /// contract creations are dropped; they can never be whale
    /// transfers.
    pub fn into_transfers(
        self,
        native_symbol: &str,
        native_asset_id: &str,
    ) -> Result<Vec<RawTransfer>, ExplorerError> {
        let block_number = parse_hex_u64(&self.number)?;
        let timestamp = parse_unix_ts(parse_hex_u64(&self.timestamp)? as i64);

        let mut transfers = Vec::new();
        for tx in self.transactions {
            let to = match tx.to {
                Some(to) => to,
                None => continue,
            };
            let amount = parse_hex_wei(&tx.value)?;
            if amount == 0.0 {
                continue;
            }
            transfers.push(RawTransfer {
                tx_hash: tx.hash,
                from: tx.from,
                to,
                symbol: native_symbol.to_string(),
                asset_id: native_asset_id.to_string(),
                amount,
                block_number,
                timestamp,
            });
        }
        Ok(transfers)
    }
}

impl TokenTransferRow {
    pub fn into_transfer(self) -> Result<RawTransfer, ExplorerError> {
        let amount = parse_token_amount(&self.value, &self.token_decimal)?;
        let block_number: u64 = self
            .block_number
            .parse()
            .map_err(|_| ExplorerError::Parse(format!("invalid block '{}'", self.block_number)))?;
        let ts: i64 = self
            .time_stamp
            .parse()
            .map_err(|_| ExplorerError::Parse(format!("invalid timestamp '{}'", self.time_stamp)))?;
        Ok(RawTransfer {
            tx_hash: self.hash,
            from: self.from,
            to: self.to,
            symbol: self.token_symbol,
            // Token prices are looked up by contract address
            asset_id: self.contract_address,
            amount,
            block_number,
            timestamp: parse_unix_ts(ts),
        })
    }
}
