//! Core traits for zonesync
//!
//! - [`DnsBackend`]: enumerate and mutate a zone
//! - [`DnsBackendFactory`]: construct a backend from configuration

pub mod backend;

pub use backend::{DnsBackend, DnsBackendFactory};
