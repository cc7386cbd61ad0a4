//! Whalewatch - Multi-Chain Whale Transfer Ingestion Pipeline
//!
//! Watches EVM chains through their block explorer APIs for transfers
//! worth crossing a USD threshold, attributes the counterparties against
//! a known-exchange directory and persists deduplicated whale events.
//!
//! # Modules
//!
//! - `domain`: Core business logic (cursors, budget, rate limiter, circuit breaker, classifier, dedup)
//! - `ports`: Trait abstractions (ExplorerApi, PriceSource, EventSink)
//! - `adapters`: External implementations (explorer HTTP client, price feed, in-memory store)
//! - `application`: ChainCollector poll loops and the CollectorManager fleet
//! - `config`: Configuration loading and validation

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
