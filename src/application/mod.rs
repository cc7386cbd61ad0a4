//! Application Layer
//!
//! Collector poll loops and the fleet manager that owns them.

pub mod collector;
pub mod manager;

pub use collector::{ChainCollector, CollectorConfig, CollectorError};
pub use manager::CollectorManager;
