//! Domain Layer - Core ingestion logic
//!
//! Chain descriptors, cursors, call budget, adaptive rate limiter,
//! circuit breaker, classifier and dedup guard. Everything here is
//! independent of HTTP and storage concerns; those enter through ports.

pub mod budget;
pub mod chain;
pub mod circuit_breaker;
pub mod classifier;
pub mod cursor;
pub mod dedup;
pub mod event;
pub mod exchanges;
pub mod rate_limiter;
