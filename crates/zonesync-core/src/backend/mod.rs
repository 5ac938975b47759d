//! Built-in backends

pub mod memory;

pub use memory::{CallCounts, MOCK_PROVIDER, MemoryBackend, MemoryBackendFactory};
