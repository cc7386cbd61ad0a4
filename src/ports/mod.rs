//! Ports Layer - Trait definitions for external collaborators
//!
//! Following hexagonal architecture, these traits abstract:
//! - Chain explorer HTTP APIs (head block, block transfers, token transfers)
//! - The USD price oracle
//! - The durable event store (insert / existence check)

pub mod explorer;
pub mod mocks;
pub mod price;
pub mod store;
