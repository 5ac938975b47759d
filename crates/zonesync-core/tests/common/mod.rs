//! Test doubles and common utilities for contract tests
//!
//! The memory backend covers most needs; [`JournalBackend`] wraps it to record
//! the order in which mutations reach the backend. [`RrsetBackend`] holds
//! several addresses per name, as a real nameserver can.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use zonesync_core::error::{Error, Result};
use zonesync_core::{
    CurrentState, DesiredState, DnsBackend, EngineConfig, EngineEvent, Fqdn, MemoryBackend,
    Reconciler, Record, Zone,
};

/// One mutating call, as seen by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Update(String),
    Delete(String),
}

impl Call {
    pub fn fqdn(&self) -> &str {
        match self {
            Call::Create(name) | Call::Update(name) | Call::Delete(name) => name,
        }
    }
}

/// A backend that logs every mutation before delegating to a memory backend
#[derive(Clone)]
pub struct JournalBackend {
    inner: MemoryBackend,
    journal: Arc<Mutex<Vec<Call>>>,
}

impl JournalBackend {
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Mutations in the order they were issued
    pub fn journal(&self) -> Vec<Call> {
        self.journal.lock().unwrap().clone()
    }

    fn log(&self, call: Call) {
        self.journal.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl DnsBackend for JournalBackend {
    async fn list(&self, zone: &Zone) -> Result<Vec<Record>> {
        self.inner.list(zone).await
    }

    async fn create(&self, zone: &Zone, record: &Record) -> Result<()> {
        self.log(Call::Create(record.fqdn.to_string()));
        self.inner.create(zone, record).await
    }

    async fn update(&self, zone: &Zone, record: &Record, previous: &Record) -> Result<()> {
        self.log(Call::Update(record.fqdn.to_string()));
        self.inner.update(zone, record, previous).await
    }

    async fn delete(&self, zone: &Zone, record: &Record) -> Result<()> {
        self.log(Call::Delete(record.fqdn.to_string()));
        self.inner.delete(zone, record).await
    }

    async fn lookup(&self, zone: &Zone, fqdn: &Fqdn) -> Result<Option<Record>> {
        self.inner.lookup(zone, fqdn).await
    }

    fn backend_name(&self) -> &'static str {
        "journal"
    }
}

/// A backend holding whole A RRsets
///
/// `update` and `delete` replace or remove the name's full set, guarded by the
/// expected address being a member.
#[derive(Clone, Default)]
pub struct RrsetBackend {
    sets: Arc<Mutex<BTreeMap<Fqdn, BTreeSet<Ipv4Addr>>>>,
    mutations: Arc<AtomicUsize>,
}

impl RrsetBackend {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let backend = Self::default();
        {
            let mut sets = backend.sets.lock().unwrap();
            for record in records(pairs) {
                sets.entry(record.fqdn).or_default().insert(record.ip);
            }
        }
        backend
    }

    /// Addresses held for `name`, ascending
    pub fn addresses(&self, name: &str) -> Vec<String> {
        self.sets
            .lock()
            .unwrap()
            .get(&fqdn(name))
            .map(|set| set.iter().map(|ip| ip.to_string()).collect())
            .unwrap_or_default()
    }

    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn guard(
        sets: &BTreeMap<Fqdn, BTreeSet<Ipv4Addr>>,
        fqdn: &Fqdn,
        expected: Ipv4Addr,
    ) -> Result<()> {
        match sets.get(fqdn) {
            Some(set) if set.contains(&expected) => Ok(()),
            _ => Err(Error::conflict(format!("{} does not hold {}", fqdn, expected))),
        }
    }
}

#[async_trait::async_trait]
impl DnsBackend for RrsetBackend {
    async fn list(&self, _zone: &Zone) -> Result<Vec<Record>> {
        let sets = self.sets.lock().unwrap();
        Ok(sets
            .iter()
            .flat_map(|(name, set)| set.iter().map(move |ip| Record::new(name.clone(), *ip)))
            .collect())
    }

    async fn create(&self, _zone: &Zone, record: &Record) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut sets = self.sets.lock().unwrap();
        if sets.contains_key(&record.fqdn) {
            return Err(Error::conflict(format!("{} exists", record.fqdn)));
        }
        sets.insert(record.fqdn.clone(), BTreeSet::from([record.ip]));
        Ok(())
    }

    async fn update(&self, _zone: &Zone, record: &Record, previous: &Record) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut sets = self.sets.lock().unwrap();
        Self::guard(&sets, &record.fqdn, previous.ip)?;
        sets.insert(record.fqdn.clone(), BTreeSet::from([record.ip]));
        Ok(())
    }

    async fn delete(&self, _zone: &Zone, record: &Record) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut sets = self.sets.lock().unwrap();
        Self::guard(&sets, &record.fqdn, record.ip)?;
        sets.remove(&record.fqdn);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "rrset"
    }
}

pub fn fqdn(name: &str) -> Fqdn {
    Fqdn::parse(name).unwrap()
}

pub fn zone(name: &str) -> Zone {
    Zone::parse(name).unwrap()
}

pub fn rec(name: &str, ip: &str) -> Record {
    Record::new(fqdn(name), ip.parse::<Ipv4Addr>().unwrap())
}

pub fn records(pairs: &[(&str, &str)]) -> Vec<Record> {
    pairs.iter().map(|(name, ip)| rec(name, ip)).collect()
}

pub fn desired(pairs: &[(&str, &str)]) -> DesiredState {
    DesiredState::from_records(records(pairs)).unwrap()
}

pub fn current(pairs: &[(&str, &str)]) -> CurrentState {
    let mut state = CurrentState::new();
    for record in records(pairs) {
        state.insert(record);
    }
    state
}

/// A memory backend holding `pairs`
pub async fn seeded(pairs: &[(&str, &str)]) -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.seed(records(pairs)).await;
    backend
}

/// A reconciler over `backend` with default engine settings
pub fn reconciler<B>(backend: B) -> (Reconciler, mpsc::Receiver<EngineEvent>)
where
    B: DnsBackend + 'static,
{
    reconciler_with(backend, EngineConfig::default())
}

pub fn reconciler_with<B>(
    backend: B,
    engine: EngineConfig,
) -> (Reconciler, mpsc::Receiver<EngineEvent>)
where
    B: DnsBackend + 'static,
{
    Reconciler::new(Arc::new(backend), engine).expect("reconciler construction succeeds")
}

/// The zone contents as sorted (name, address) pairs
pub async fn contents(backend: &MemoryBackend) -> Vec<(String, String)> {
    backend
        .records()
        .await
        .into_iter()
        .map(|r| (r.fqdn.to_string(), r.ip.to_string()))
        .collect()
}

pub fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = expected
        .iter()
        .map(|(n, ip)| (n.to_string(), ip.to_string()))
        .collect();
    out.sort();
    out
}
