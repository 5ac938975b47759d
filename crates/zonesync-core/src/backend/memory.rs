// # Memory Backend
//
// In-process implementation of DnsBackend.
//
// ## Purpose
//
// Holds a flat set of A records in memory. Used by the test suites and by the
// `mock` provider for trying out a CSV without touching a nameserver.
//
// ## Semantics
//
// - `list` returns every record held, whatever the zone. Out-of-zone filtering
//   is the fetcher's job, and seeding foreign names is how that gets tested.
// - `create` fails with a conflict if the name exists.
// - `update` and `delete` fail if the name is missing or holds a different
//   address than expected.
//
// ## Test hooks
//
// Clones share state, so a test can hand one clone to the engine and inspect
// another. Failures can be injected per name, writes can be silently
// discarded (to exercise read-back verification), every call can be delayed
// (to exercise timeouts), and calls are counted.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::model::{Fqdn, Record, Zone};
use crate::traits::{DnsBackend, DnsBackendFactory};

/// Provider name the memory backend registers under
pub const MOCK_PROVIDER: &str = "mock";

/// Call counters, snapshot form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `list` calls
    pub list: usize,
    /// `create` calls
    pub create: usize,
    /// `update` calls
    pub update: usize,
    /// `delete` calls
    pub delete: usize,
    /// `lookup` calls
    pub lookup: usize,
}

impl CallCounts {
    /// Number of mutating calls attempted
    pub fn mutations(&self) -> usize {
        self.create + self.update + self.delete
    }
}

#[derive(Debug, Default)]
struct Counters {
    list: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
    lookup: AtomicUsize,
}

#[derive(Debug, Default)]
struct Shared {
    records: RwLock<BTreeMap<Fqdn, Record>>,
    fail_on: RwLock<HashSet<Fqdn>>,
    discard_on: RwLock<HashSet<Fqdn>>,
    fail_list: AtomicBool,
    counters: Counters,
}

/// In-memory DNS backend
///
/// # Example
///
/// ```rust,no_run
/// use zonesync_core::backend::MemoryBackend;
/// use zonesync_core::{DnsBackend, Fqdn, Record, Zone};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = MemoryBackend::new();
///     backend
///         .seed([Record::new(Fqdn::parse("a.example.com")?, "10.0.0.1".parse()?)])
///         .await;
///
///     let zone = Zone::parse("example.com")?;
///     assert_eq!(backend.list(&zone).await?.len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
    delay: Option<Duration>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records(records: BTreeMap<Fqdn, Record>) -> Self {
        Self {
            shared: Arc::new(Shared {
                records: RwLock::new(records),
                ..Shared::default()
            }),
            delay: None,
        }
    }

    /// Delay every call by `delay`
    ///
    /// The delay applies to this handle and clones made from it afterwards.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Insert records, replacing any held under the same name
    pub async fn seed(&self, records: impl IntoIterator<Item = Record>) {
        let mut guard = self.shared.records.write().await;
        for record in records {
            guard.insert(record.fqdn.clone(), record);
        }
    }

    /// Make every mutation of `fqdn` fail
    pub async fn fail_on(&self, fqdn: Fqdn) {
        self.shared.fail_on.write().await.insert(fqdn);
    }

    /// Report success for mutations of `fqdn` without applying them
    pub async fn discard_writes_on(&self, fqdn: Fqdn) {
        self.shared.discard_on.write().await.insert(fqdn);
    }

    /// Make `list` fail
    pub fn fail_list(&self, fail: bool) {
        self.shared.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Current contents, in name order
    pub async fn records(&self) -> Vec<Record> {
        self.shared.records.read().await.values().cloned().collect()
    }

    /// Record held for `fqdn`
    pub async fn get(&self, fqdn: &Fqdn) -> Option<Record> {
        self.shared.records.read().await.get(fqdn).cloned()
    }

    /// Number of records held
    pub async fn len(&self) -> usize {
        self.shared.records.read().await.len()
    }

    /// Whether the backend holds no records
    pub async fn is_empty(&self) -> bool {
        self.shared.records.read().await.is_empty()
    }

    /// Snapshot of the call counters
    pub fn calls(&self) -> CallCounts {
        let c = &self.shared.counters;
        CallCounts {
            list: c.list.load(Ordering::SeqCst),
            create: c.create.load(Ordering::SeqCst),
            update: c.update.load(Ordering::SeqCst),
            delete: c.delete.load(Ordering::SeqCst),
            lookup: c.lookup.load(Ordering::SeqCst),
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Returns `Ok(false)` when the write should be swallowed
    async fn check_mutation(&self, fqdn: &Fqdn) -> Result<bool> {
        if self.shared.fail_on.read().await.contains(fqdn) {
            return Err(Error::backend(
                MOCK_PROVIDER,
                format!("injected failure for {}", fqdn),
            ));
        }
        Ok(!self.shared.discard_on.read().await.contains(fqdn))
    }
}

#[async_trait]
impl DnsBackend for MemoryBackend {
    async fn list(&self, zone: &Zone) -> Result<Vec<Record>> {
        self.shared.counters.list.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if self.shared.fail_list.load(Ordering::SeqCst) {
            return Err(Error::backend(
                MOCK_PROVIDER,
                format!("injected failure listing {}", zone),
            ));
        }

        let records = self.records().await;
        debug!("Mock: listed {} records for zone {}", records.len(), zone);
        Ok(records)
    }

    async fn create(&self, _zone: &Zone, record: &Record) -> Result<()> {
        self.shared.counters.create.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if !self.check_mutation(&record.fqdn).await? {
            return Ok(());
        }

        let mut guard = self.shared.records.write().await;
        if let Some(existing) = guard.get(&record.fqdn) {
            return Err(Error::conflict(format!(
                "{} already exists with address {}",
                record.fqdn, existing.ip
            )));
        }
        guard.insert(record.fqdn.clone(), record.clone());
        debug!("Mock: created {}", record);
        Ok(())
    }

    async fn update(&self, _zone: &Zone, record: &Record, previous: &Record) -> Result<()> {
        self.shared.counters.update.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if !self.check_mutation(&record.fqdn).await? {
            return Ok(());
        }

        let mut guard = self.shared.records.write().await;
        match guard.get_mut(&record.fqdn) {
            None => Err(Error::not_found(format!("{} not found for update", record.fqdn))),
            Some(existing) if existing.ip != previous.ip => Err(Error::conflict(format!(
                "{} holds {}, expected {}",
                record.fqdn, existing.ip, previous.ip
            ))),
            Some(existing) => {
                *existing = record.clone();
                debug!("Mock: updated {} (was {})", record, previous.ip);
                Ok(())
            }
        }
    }

    async fn delete(&self, _zone: &Zone, record: &Record) -> Result<()> {
        self.shared.counters.delete.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if !self.check_mutation(&record.fqdn).await? {
            return Ok(());
        }

        let mut guard = self.shared.records.write().await;
        match guard.get(&record.fqdn) {
            None => Err(Error::not_found(format!("{} not found for deletion", record.fqdn))),
            Some(existing) if existing.ip != record.ip => Err(Error::conflict(format!(
                "{} holds {}, not {}",
                record.fqdn, existing.ip, record.ip
            ))),
            Some(_) => {
                guard.remove(&record.fqdn);
                debug!("Mock: deleted {}", record);
                Ok(())
            }
        }
    }

    async fn lookup(&self, _zone: &Zone, fqdn: &Fqdn) -> Result<Option<Record>> {
        self.shared.counters.lookup.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self.get(fqdn).await)
    }

    fn backend_name(&self) -> &'static str {
        MOCK_PROVIDER
    }
}

#[derive(Debug, Default, Deserialize)]
struct MemorySettings {
    #[serde(default)]
    records: Vec<Record>,
}

/// Factory for the `mock` provider
///
/// By default every `connect` builds a fresh backend seeded from the
/// provider's `records` setting. [`MemoryBackendFactory::shared`] instead
/// hands out clones of one existing backend, so tests can observe what a run
/// did.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackendFactory {
    shared: Option<MemoryBackend>,
}

impl MemoryBackendFactory {
    /// Factory seeding a new backend from configuration on each connect
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory returning clones of `backend`, ignoring configuration
    pub fn shared(backend: MemoryBackend) -> Self {
        Self {
            shared: Some(backend),
        }
    }
}

impl DnsBackendFactory for MemoryBackendFactory {
    fn connect(&self, config: &ProviderConfig) -> Result<Box<dyn DnsBackend>> {
        if let Some(backend) = &self.shared {
            return Ok(Box::new(backend.clone()));
        }

        let settings: MemorySettings = config.settings_as()?;
        let mut records = BTreeMap::new();
        for record in settings.records {
            records.insert(record.fqdn.clone(), record);
        }
        info!("Mock backend initialized with {} seeded records", records.len());

        Ok(Box::new(MemoryBackend::with_records(records)))
    }
}
