//! Chain explorer HTTP adapters

mod client;
mod types;

pub use client::{ExplorerClient, ExplorerConfig};
pub use types::{parse_hex_u64, parse_hex_wei, parse_token_amount};
