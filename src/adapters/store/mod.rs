//! Event store adapters

mod memory;

pub use memory::{tests_support, MemoryEventStore};
