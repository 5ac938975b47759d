// # DNS Backend Trait
//
// The interface every zone backend implements: enumerate a zone and apply
// single-record mutations to it.
//
// ## Implementations
//
// - Memory: `zonesync_core::backend::MemoryBackend` (provider name `mock`)
// - BIND: `zonesync-backend-bind` crate (AXFR + RFC 2136 UPDATE)
//
// ## Usage
//
// ```rust,ignore
// use zonesync_core::{DnsBackend, Zone};
//
// async fn show(backend: &dyn DnsBackend) -> zonesync_core::Result<()> {
//     let zone = Zone::parse("example.com")?;
//     for record in backend.list(&zone).await? {
//         println!("{}", record);
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::model::{Fqdn, Record, Zone};

/// Trait for DNS backend implementations
///
/// Every method addresses one zone explicitly, since dynamic updates are sent
/// to a zone rather than to a name.
///
/// # Contract
///
/// - Each call is a single attempt. Backends do not retry, sleep or spawn
///   background work; the executor owns timeouts and failure isolation.
/// - Mutations carry their own preconditions: `create` fails if the name
///   already exists, `update` and `delete` fail if the zone no longer holds
///   the expected address. A backend never silently overwrites a concurrent
///   change.
/// - `update` and `delete` act on the name's whole A record set. After
///   `update` the name holds exactly `record`; after `delete` it holds no A
///   record, even if the backend held several addresses for it.
/// - `list` returns what the backend holds. The fetcher, not the backend,
///   drops out-of-zone names and collapses multi-address names.
#[async_trait]
pub trait DnsBackend: Send + Sync {
    /// Enumerate every A record of `zone`
    async fn list(&self, zone: &Zone) -> Result<Vec<Record>>;

    /// Add `record`, which must not exist yet
    async fn create(&self, zone: &Zone, record: &Record) -> Result<()>;

    /// Replace the A records of `record.fqdn`, which must include `previous`
    async fn update(&self, zone: &Zone, record: &Record, previous: &Record) -> Result<()>;

    /// Remove the A records of `record.fqdn`, which must include `record`
    async fn delete(&self, zone: &Zone, record: &Record) -> Result<()>;

    /// Read back the A record for one name
    ///
    /// Used to verify a mutation. The default enumerates the zone; backends
    /// with a cheaper point query should override it.
    async fn lookup(&self, zone: &Zone, fqdn: &Fqdn) -> Result<Option<Record>> {
        let records = self.list(zone).await?;
        Ok(records
            .into_iter()
            .filter(|r| &r.fqdn == fqdn)
            .min_by_key(|r| r.ip))
    }

    /// Backend name for logs and reports (e.g. "bind", "mock")
    fn backend_name(&self) -> &'static str;
}

/// Builds a backend from its provider configuration
pub trait DnsBackendFactory: Send + Sync {
    /// Validate settings and open a backend session
    fn connect(&self, config: &ProviderConfig) -> Result<Box<dyn DnsBackend>>;
}
