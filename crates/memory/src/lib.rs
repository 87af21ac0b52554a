//! Persistence adapter implementations for Mindloop.

pub mod in_memory;

pub use in_memory::InMemoryAdapter;
