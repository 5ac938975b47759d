// # zonesync-core
//
// Core library for declarative DNS A-record reconciliation.
//
// ## Architecture Overview
//
// A run converges one zone to a declared record set:
// - **input**: CSV → `DesiredState`, collecting rejected rows
// - **fetch**: `DnsBackend::list` → `CurrentState`
// - **plan**: pure diff → `ChangePlan`, then the zone guard → `SafePlan`
// - **engine**: `PlanExecutor` applies a `SafePlan`; `Reconciler` ties the
//   steps together and publishes `EngineEvent`s
// - **registry**: backends are selected by provider name at runtime
//
// ## Safety Properties
//
// 1. **Zone boundary**: only a `SafePlan` can be executed, and only the zone
//    guard produces one
// 2. **Idempotence**: re-running against a converged zone plans no mutations
// 3. **Failure isolation**: one failed action never stops the rest
// 4. **Library-First**: the binary only wires these pieces together

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod input;
pub mod model;
pub mod plan;
pub mod registry;
pub mod report;
pub mod rollback;
pub mod traits;
pub mod validate;

// Re-export core types for convenience
pub use backend::{MemoryBackend, MemoryBackendFactory};
pub use config::{EngineConfig, LoggingConfig, ProviderConfig, ZonesyncConfig};
pub use engine::{
    ActionReport, EngineEvent, ExecutionMode, ExecutionReport, ExecutionSummary, Outcome,
    PlanExecutor, Reconciler,
};
pub use error::{Error, ErrorClass, Result};
pub use model::{CurrentState, DesiredState, Fqdn, Record, RecordType, Zone};
pub use plan::{ActionKind, ChangeAction, ChangePlan, DiffPolicy, SafePlan};
pub use registry::BackendRegistry;
pub use traits::{DnsBackend, DnsBackendFactory};
