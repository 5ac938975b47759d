// # BIND Backend
//
// DnsBackend for an authoritative BIND (or any RFC 2136 capable) nameserver.
//
// ## Operations
//
// - `list`: AXFR over TCP; only A records are kept
// - `create`: UPDATE with prerequisite "RRset does not exist"
// - `update`: UPDATE replacing the name's whole A RRset
// - `delete`: UPDATE deleting the name's whole A RRset
// - `lookup`: plain A query over UDP
//
// Every message, the zone transfer included, is TSIG-signed when a key is
// configured.
//
// ## Constraints
//
// - One attempt per call. Retries and deadlines belong to the executor.
// - `update` and `delete` first read the RRset over the same TCP session and
//   list every member as a value-dependent prerequisite (RFC 2136 2.4.2), so
//   the message applies only if the set is unchanged and still holds the
//   expected address.
// - hickory's sync client runs its own event loop, so each call moves to
//   `spawn_blocking` and opens a fresh connection.
// - The TSIG secret never appears in logs or `Debug` output.
//
// ## Configuration
//
// ```yaml
// dns_providers:
//   bind:
//     nameserver: 127.0.0.1
//     port: 53
//     key_file: /etc/bind/keys/zonesync.key
//     key_name: zonesync-key
//     timeout_secs: 30
// ```

pub mod key;

pub use key::TsigKey;

use async_trait::async_trait;
use hickory_client::client::{Client, ClientConnection, SyncClient};
use hickory_client::op::{Message, MessageType, OpCode, Query, ResponseCode, UpdateMessage};
use hickory_client::rr::rdata::NULL;
use hickory_client::rr::{DNSClass, Name, RData, RecordType};
use hickory_client::tcp::TcpClientConnection;
use hickory_client::udp::UdpClientConnection;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use zonesync_core::{
    BackendRegistry, DnsBackend, DnsBackendFactory, Error, Fqdn, ProviderConfig, Record, Result,
    Zone,
};

/// Provider name this backend registers under
pub const BIND_PROVIDER: &str = "bind";

/// TTL used when a record reaches the backend without one
///
/// The executor resolves `engine.default_ttl` before every create or update,
/// rollbacks included, so this only covers callers using the backend directly.
const FALLBACK_TTL: u32 = 300;

/// Settings under `dns_providers.bind`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindSettings {
    /// Nameserver address (IP literal)
    #[serde(default = "default_nameserver")]
    pub nameserver: String,

    /// Nameserver port
    #[serde(default = "default_port")]
    pub port: u16,

    /// BIND key file holding the TSIG key
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Name of the key block to use
    #[serde(default)]
    pub key_name: Option<String>,

    /// Per-connection I/O timeout (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_nameserver() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    53
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BindSettings {
    fn default() -> Self {
        Self {
            nameserver: default_nameserver(),
            port: default_port(),
            key_file: None,
            key_name: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BindSettings {
    /// Resolve the nameserver socket address
    pub fn server_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.nameserver.trim().parse().map_err(|_| {
            Error::config(format!(
                "bind nameserver must be an IP address, got '{}'",
                self.nameserver
            ))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Load the TSIG key, if one is configured
    pub fn tsig_key(&self) -> Result<Option<TsigKey>> {
        match (&self.key_file, &self.key_name) {
            (Some(file), Some(name)) => TsigKey::load(file, name).map(Some),
            (None, None) => Ok(None),
            _ => Err(Error::config(
                "bind key_file and key_name must be set together",
            )),
        }
    }
}

/// Backend session for one nameserver
pub struct BindBackend {
    server: SocketAddr,
    key: Option<TsigKey>,
    timeout: Duration,
}

// Manual impl so the key stays redacted even if TsigKey's Debug changes.
impl std::fmt::Debug for BindBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindBackend")
            .field("server", &self.server)
            .field("key_name", &self.key.as_ref().map(TsigKey::name))
            .field("secret", &"<REDACTED>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BindBackend {
    /// Create a backend for `server`
    pub fn new(server: SocketAddr, key: Option<TsigKey>, timeout: Duration) -> Self {
        Self {
            server,
            key,
            timeout,
        }
    }

    /// Create a backend from validated settings
    pub fn from_settings(settings: &BindSettings) -> Result<Self> {
        if settings.timeout_secs == 0 {
            return Err(Error::config("bind timeout_secs must be greater than 0"));
        }
        let server = settings.server_addr()?;
        let key = settings.tsig_key()?;

        match &key {
            Some(key) => info!(
                "BIND backend initialized for {} with TSIG key '{}' ({})",
                server,
                key.name(),
                key.algorithm()
            ),
            None => warn!(
                "BIND backend initialized for {} without a TSIG key; updates are unsigned",
                server
            ),
        }

        Ok(Self::new(
            server,
            key,
            Duration::from_secs(settings.timeout_secs),
        ))
    }

    fn client<CC: ClientConnection>(key: Option<&TsigKey>, conn: CC) -> Result<SyncClient<CC>> {
        Ok(match key {
            Some(key) => SyncClient::with_tsigner(conn, key.signer()?),
            None => SyncClient::new(conn),
        })
    }

    /// Run `op` against a TCP session on a blocking thread
    async fn with_tcp<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SyncClient<TcpClientConnection>) -> Result<T> + Send + 'static,
    {
        let server = self.server;
        let timeout = self.timeout;
        let key = self.key.clone();

        tokio::task::spawn_blocking(move || {
            let conn = TcpClientConnection::with_timeout(server, timeout)
                .map_err(|e| Error::connect(format!("TCP connection to {} failed: {}", server, e)))?;
            let client = Self::client(key.as_ref(), conn)?;
            op(&client)
        })
        .await
        .map_err(|e| Error::backend(BIND_PROVIDER, format!("DNS task failed: {}", e)))?
    }

    /// Send one UPDATE built by `send` and check its response code
    async fn update_message<F>(&self, zone: &Zone, what: String, send: F) -> Result<()>
    where
        F: FnOnce(&SyncClient<TcpClientConnection>, Name) -> Result<ResponseCode>
            + Send
            + 'static,
    {
        let origin = dns_name(zone.as_str())?;
        let server = self.server;

        let code = self.with_tcp(move |client| send(client, origin)).await?;
        check_update(code, &what, server)?;
        debug!("BIND: {} ({})", what, server);
        Ok(())
    }
}

#[async_trait]
impl DnsBackend for BindBackend {
    async fn list(&self, zone: &Zone) -> Result<Vec<Record>> {
        let origin = dns_name(zone.as_str())?;
        let server = self.server;
        let zone_name = zone.to_string();

        let records = self
            .with_tcp(move |client| {
                let transfer = client.zone_transfer(&origin, None).map_err(|e| {
                    Error::backend(
                        BIND_PROVIDER,
                        format!("zone transfer of {} from {} failed: {}", zone_name, server, e),
                    )
                })?;

                let mut records = Vec::new();
                for response in transfer {
                    let response = response.map_err(|e| {
                        Error::backend(
                            BIND_PROVIDER,
                            format!("zone transfer of {} interrupted: {}", zone_name, e),
                        )
                    })?;
                    check_query(response.response_code(), &format!("AXFR {}", zone_name), server)?;

                    for answer in response.answers() {
                        if let Some(RData::A(a)) = answer.data() {
                            let name = answer.name().to_ascii();
                            match Fqdn::parse(&name) {
                                Ok(fqdn) => records.push(Record::new(fqdn, a.0).with_ttl(answer.ttl())),
                                Err(e) => debug!("BIND: skipping A record {}: {}", name, e),
                            }
                        }
                    }
                }
                Ok(records)
            })
            .await?;

        debug!("BIND: transferred {} A records for {}", records.len(), zone);
        Ok(records)
    }

    async fn create(&self, zone: &Zone, record: &Record) -> Result<()> {
        let rr = to_dns_record(record)?;
        self.update_message(zone, format!("create {}", record), move |client, origin| {
            client
                .create(rr, origin)
                .map(|response| response.response_code())
                .map_err(|e| Error::backend(BIND_PROVIDER, format!("UPDATE failed: {}", e)))
        })
        .await
    }

    async fn update(&self, zone: &Zone, record: &Record, previous: &Record) -> Result<()> {
        let name = dns_name(record.fqdn.as_str())?;
        let new = to_dns_record(record)?;
        let expected = previous.ip;
        let what = format!("update {} (was {})", record, previous.ip);
        let server = self.server;

        self.update_message(zone, what.clone(), move |client, origin| {
            swap_rrset(client, origin, name, expected, Some(new), &what, server)
        })
        .await
    }

    async fn delete(&self, zone: &Zone, record: &Record) -> Result<()> {
        let name = dns_name(record.fqdn.as_str())?;
        let expected = record.ip;
        let what = format!("delete {}", record);
        let server = self.server;

        self.update_message(zone, what.clone(), move |client, origin| {
            swap_rrset(client, origin, name, expected, None, &what, server)
        })
        .await
    }

    async fn lookup(&self, _zone: &Zone, fqdn: &Fqdn) -> Result<Option<Record>> {
        let name = dns_name(fqdn.as_str())?;
        let server = self.server;
        let timeout = self.timeout;
        let key = self.key.clone();
        let fqdn = fqdn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = UdpClientConnection::with_timeout(server, timeout)
                .map_err(|e| Error::connect(format!("UDP socket for {} failed: {}", server, e)))?;
            let client = Self::client(key.as_ref(), conn)?;

            let response = client
                .query(&name, DNSClass::IN, RecordType::A)
                .map_err(|e| {
                    Error::backend(BIND_PROVIDER, format!("query for {} failed: {}", fqdn, e))
                })?;

            match response.response_code() {
                ResponseCode::NXDomain => return Ok(None),
                code => check_query(code, &format!("query {}", fqdn), server)?,
            }

            let found = response
                .answers()
                .iter()
                .filter_map(|answer| match answer.data() {
                    Some(RData::A(a)) => Some((a.0, answer.ttl())),
                    _ => None,
                })
                .min_by_key(|(ip, _)| *ip);

            Ok(found.map(|(ip, ttl)| Record::new(fqdn, ip).with_ttl(ttl)))
        })
        .await
        .map_err(|e| Error::backend(BIND_PROVIDER, format!("DNS task failed: {}", e)))?
    }

    fn backend_name(&self) -> &'static str {
        BIND_PROVIDER
    }
}

/// Absolute DNS name for a canonical (dot-less) name
fn dns_name(name: &str) -> Result<Name> {
    Name::from_ascii(format!("{}.", name))
        .map_err(|e| Error::input(format!("'{}' is not a valid DNS name: {}", name, e)))
}

fn to_dns_record(record: &Record) -> Result<hickory_client::rr::Record> {
    let name = dns_name(record.fqdn.as_str())?;
    let ip: Ipv4Addr = record.ip;
    let mut rr = hickory_client::rr::Record::from_rdata(
        name,
        record.ttl.unwrap_or(FALLBACK_TTL),
        RData::A(ip.into()),
    );
    rr.set_dns_class(DNSClass::IN);
    Ok(rr)
}

/// Read the A RRset of `name` over an open session
fn query_rrset<CC: ClientConnection>(
    client: &SyncClient<CC>,
    name: &Name,
    server: SocketAddr,
) -> Result<Vec<hickory_client::rr::Record>> {
    let response = client
        .query(name, DNSClass::IN, RecordType::A)
        .map_err(|e| Error::backend(BIND_PROVIDER, format!("query for {} failed: {}", name, e)))?;

    match response.response_code() {
        ResponseCode::NXDomain => return Ok(Vec::new()),
        code => check_query(code, &format!("query {}", name), server)?,
    }

    Ok(response
        .answers()
        .iter()
        .filter(|answer| matches!(answer.data(), Some(RData::A(_))))
        .cloned()
        .collect())
}

/// Replace (or with `None`, delete) the A RRset of `name`
///
/// Fails with a conflict before sending anything if the set no longer holds
/// `expected`.
fn swap_rrset<CC: ClientConnection>(
    client: &SyncClient<CC>,
    origin: Name,
    name: Name,
    expected: Ipv4Addr,
    replacement: Option<hickory_client::rr::Record>,
    what: &str,
    server: SocketAddr,
) -> Result<ResponseCode> {
    let members = query_rrset(client, &name, server)?;
    let holds_expected = members
        .iter()
        .any(|member| matches!(member.data(), Some(RData::A(a)) if a.0 == expected));
    if !holds_expected {
        return Err(Error::conflict(format!(
            "{}: zone no longer holds {}",
            what, expected
        )));
    }
    if members.len() > 1 {
        debug!("BIND: {} replaces {} addresses", what, members.len());
    }

    let message = replace_rrset_message(origin, name, &members, replacement);
    client
        .send(message)
        .into_iter()
        .next()
        .ok_or_else(|| Error::backend(BIND_PROVIDER, format!("{}: no response", what)))?
        .map(|response| response.response_code())
        .map_err(|e| Error::backend(BIND_PROVIDER, format!("UPDATE failed: {}", e)))
}

/// UPDATE message swapping the A RRset `members` of `name` for `replacement`
///
/// Prerequisites list every current member with TTL 0. The update section
/// deletes the RRset (class ANY) and then adds `replacement`, if given.
fn replace_rrset_message(
    origin: Name,
    name: Name,
    members: &[hickory_client::rr::Record],
    replacement: Option<hickory_client::rr::Record>,
) -> Message {
    let mut zone = Query::new();
    zone.set_name(origin)
        .set_query_class(DNSClass::IN)
        .set_query_type(RecordType::SOA);

    let mut message = Message::new();
    message
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update)
        .set_recursion_desired(false);
    message.add_zone(zone);

    for member in members {
        let mut prerequisite = member.clone();
        prerequisite.set_ttl(0);
        prerequisite.set_dns_class(DNSClass::IN);
        message.add_pre_requisite(prerequisite);
    }

    let mut delete = hickory_client::rr::Record::with(name, RecordType::A, 0);
    delete
        .set_dns_class(DNSClass::ANY)
        .set_data(Some(RData::NULL(NULL::new())));
    message.add_update(delete);

    if let Some(record) = replacement {
        message.add_update(record);
    }
    message
}

fn refused(code: ResponseCode, what: &str, server: SocketAddr) -> Error {
    Error::backend(
        BIND_PROVIDER,
        format!(
            "{} refused by {} ({}); check the TSIG key and the zone's update/transfer policy",
            what, server, code
        ),
    )
}

/// Map an UPDATE response code
///
/// YXRRSet and NXRRSet mean a prerequisite failed: the name exists on
/// create, or its RRset changed between the read and the update.
fn check_update(code: ResponseCode, what: &str, server: SocketAddr) -> Result<()> {
    match code {
        ResponseCode::NoError => Ok(()),
        ResponseCode::YXRRSet | ResponseCode::YXDomain => Err(Error::conflict(format!(
            "{}: record set already exists ({})",
            what, code
        ))),
        ResponseCode::NXRRSet => Err(Error::conflict(format!(
            "{}: zone no longer holds the expected record ({})",
            what, code
        ))),
        ResponseCode::NotAuth | ResponseCode::Refused => Err(refused(code, what, server)),
        code => Err(Error::backend(
            BIND_PROVIDER,
            format!("{} failed with response code {}", what, code),
        )),
    }
}

fn check_query(code: ResponseCode, what: &str, server: SocketAddr) -> Result<()> {
    match code {
        ResponseCode::NoError => Ok(()),
        ResponseCode::NotAuth | ResponseCode::Refused => Err(refused(code, what, server)),
        code => Err(Error::backend(
            BIND_PROVIDER,
            format!("{} failed with response code {}", what, code),
        )),
    }
}

/// Factory for BIND backends
pub struct BindFactory;

impl DnsBackendFactory for BindFactory {
    fn connect(&self, config: &ProviderConfig) -> Result<Box<dyn DnsBackend>> {
        let settings: BindSettings = config.settings_as()?;
        Ok(Box::new(BindBackend::from_settings(&settings)?))
    }
}

/// Register the BIND backend with a registry
///
/// # Example
///
/// ```rust
/// use zonesync_core::BackendRegistry;
///
/// let registry = BackendRegistry::with_builtin();
/// zonesync_backend_bind::register(&registry);
/// assert!(registry.has_backend("bind"));
/// ```
pub fn register(registry: &BackendRegistry) {
    registry.register_backend(BIND_PROVIDER, Box::new(BindFactory));
}
