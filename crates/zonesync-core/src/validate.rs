//! Syntax checks for host names, zone names and IPv4 addresses
//!
//! Validators return a human-readable reason on failure. The reason ends up
//! either in a rejected CSV row or inside an [`crate::Error`].

use std::net::Ipv4Addr;

/// Maximum length of a domain name in presentation form (RFC 1035)
pub const MAX_NAME_LEN: usize = 253;

/// Maximum length of a single label (RFC 1035)
pub const MAX_LABEL_LEN: usize = 63;

/// Lower-case a name and strip surrounding whitespace and one trailing dot
pub fn canonicalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    trimmed.to_ascii_lowercase()
}

/// Validate a canonical FQDN
///
/// Rules (RFC 1035 / RFC 1123 host names):
/// - at most 253 characters
/// - at least two labels, none empty
/// - labels of 1-63 characters from `[a-z0-9-]`, not starting or ending with `-`
pub fn validate_fqdn(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("FQDN cannot be empty".to_string());
    }

    if name.len() > MAX_NAME_LEN {
        return Err(format!(
            "FQDN too long: {} chars (max {})",
            name.len(),
            MAX_NAME_LEN
        ));
    }

    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return Err(format!("FQDN must have at least 2 labels: '{}'", name));
    }

    for label in &labels {
        validate_label(label).map_err(|reason| format!("{} in FQDN '{}'", reason, name))?;
    }

    // RFC 3696 §2: the top-level label is never all-numeric
    if labels
        .last()
        .is_some_and(|tld| tld.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(format!("FQDN '{}' has an all-numeric top-level label", name));
    }

    Ok(())
}

fn validate_label(label: &str) -> Result<(), String> {
    if label.is_empty() {
        return Err("empty label".to_string());
    }

    if label.len() > MAX_LABEL_LEN {
        return Err(format!(
            "label '{}' too long: {} chars (max {})",
            label,
            label.len(),
            MAX_LABEL_LEN
        ));
    }

    if !label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(format!("label '{}' contains invalid characters", label));
    }

    if label.starts_with('-') || label.ends_with('-') {
        return Err(format!("label '{}' starts or ends with a hyphen", label));
    }

    Ok(())
}

/// Parse a dotted-quad IPv4 address, ignoring surrounding whitespace
pub fn validate_ipv4(raw: &str) -> Result<Ipv4Addr, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("IPv4 address cannot be empty".to_string());
    }
    trimmed
        .parse::<Ipv4Addr>()
        .map_err(|_| format!("invalid IPv4 address '{}'", trimmed))
}

/// Validate a canonical zone name
///
/// A zone follows the FQDN rules and must not look like an address.
pub fn validate_zone_name(zone: &str) -> Result<(), String> {
    if zone.parse::<Ipv4Addr>().is_ok() {
        return Err(format!("zone '{}' is an IP address, not a domain", zone));
    }
    validate_fqdn(zone).map_err(|reason| format!("invalid zone: {}", reason))
}
