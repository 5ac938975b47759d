//! Current-state fetcher
//!
//! Enumerates a zone through the backend in one call and turns the result into
//! a [`CurrentState`]. There is no retry: a failed or timed-out enumeration
//! means there is no plan.

use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::{CurrentState, Zone};
use crate::traits::DnsBackend;

/// Enumerate `zone` and build its current state
///
/// Names outside the zone are dropped. A name holding several A records is
/// reduced to its lowest address and flagged as multi-address; backends
/// update and delete the whole set.
pub async fn fetch_current_state(
    backend: &dyn DnsBackend,
    zone: &Zone,
    timeout: Duration,
) -> Result<CurrentState> {
    let records = match tokio::time::timeout(timeout, backend.list(zone)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(Error::timeout(format!(
                "listing zone {} via {} exceeded {}s",
                zone,
                backend.backend_name(),
                timeout.as_secs_f64()
            )));
        }
    };

    let mut state = CurrentState::new();
    let mut foreign = 0usize;

    for record in records {
        if !zone.contains(&record.fqdn) {
            warn!(
                "Backend {} returned {} outside zone {}, ignoring",
                backend.backend_name(),
                record.fqdn,
                zone
            );
            foreign += 1;
            continue;
        }

        let keep_existing = match state.get(&record.fqdn) {
            None => None,
            Some(existing) if existing.ip == record.ip => continue,
            Some(existing) => {
                warn!(
                    "{} has several A records ({}, {}); reconciling the whole set",
                    record.fqdn, existing.ip, record.ip
                );
                Some(existing.ip < record.ip)
            }
        };

        if let Some(keep) = keep_existing {
            state.mark_multi_address(record.fqdn.clone());
            if keep {
                continue;
            }
        }
        state.insert(record);
    }

    info!(
        "Fetched {} records from zone {} ({} ignored)",
        state.len(),
        zone,
        foreign
    );
    Ok(state)
}
