//! TSIG key files in BIND `named.conf` syntax
//!
//! ```text
//! key "zonesync-key" {
//!     algorithm hmac-sha256;
//!     secret "c2VjcmV0LWtleS1tYXRlcmlhbA==";
//! };
//! ```

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hickory_client::rr::Name;
use hickory_client::rr::rdata::tsig::TsigAlgorithm;
use hickory_proto::rr::dnssec::tsig::TSigner;
use regex::Regex;
use std::path::Path;
use std::str::FromStr;

use zonesync_core::{Error, Result};

/// Algorithm assumed when the key block does not name one
pub const DEFAULT_ALGORITHM: &str = "hmac-sha256";

/// Allowed clock skew for signed messages (RFC 8945 recommends 300s)
pub const TSIG_FUDGE_SECS: u16 = 300;

/// A parsed TSIG key
#[derive(Clone)]
pub struct TsigKey {
    name: String,
    algorithm: String,
    secret: Vec<u8>,
}

impl std::fmt::Debug for TsigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TsigKey")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

impl TsigKey {
    /// Read `key_name` from a key file
    pub fn load(path: &Path, key_name: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read TSIG key file {}: {}", path.display(), e))
        })?;
        Self::parse(&content, key_name).map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Find the `key "<key_name>" { ... };` block in `content`
    pub fn parse(content: &str, key_name: &str) -> Result<Self> {
        let block_pattern = format!(r#"(?s)key\s+"{}"\s*\{{(.*?)\}}\s*;"#, regex::escape(key_name));
        let block_re = Regex::new(&block_pattern)
            .map_err(|e| Error::config(format!("invalid key name '{}': {}", key_name, e)))?;

        let block = block_re
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| Error::config(format!("key '{}' not found in key file", key_name)))?;

        let secret_re = Regex::new(r#"secret\s+"([^"]+)"\s*;"#)
            .map_err(|e| Error::config(e.to_string()))?;
        let algorithm_re = Regex::new(r#"algorithm\s+"?([A-Za-z0-9.\-]+)"?\s*;"#)
            .map_err(|e| Error::config(e.to_string()))?;

        let secret = secret_re
            .captures(block)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| Error::config(format!("key '{}' has no secret", key_name)))?;

        let algorithm = algorithm_re
            .captures(block)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_ALGORITHM.to_string());

        tsig_algorithm(&algorithm)?;

        let secret = BASE64.decode(secret.trim()).map_err(|e| {
            Error::config(format!("secret of key '{}' is not valid base64: {}", key_name, e))
        })?;

        let key = Self {
            name: key_name.to_string(),
            algorithm,
            secret,
        };
        // A key that cannot sign is rejected here, not on the first message.
        key.signer()?;
        Ok(key)
    }

    /// Key name as configured
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Algorithm name, lower-case
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Build a signer for one client session
    pub fn signer(&self) -> Result<TSigner> {
        let name = Name::from_str(&self.name)
            .map_err(|e| Error::config(format!("invalid TSIG key name '{}': {}", self.name, e)))?;

        TSigner::new(
            self.secret.clone(),
            tsig_algorithm(&self.algorithm)?,
            name,
            TSIG_FUDGE_SECS,
        )
        .map_err(|e| Error::config(format!("cannot create TSIG signer: {}", e)))
    }
}

/// Algorithms the ring backend can sign with
fn tsig_algorithm(name: &str) -> Result<TsigAlgorithm> {
    match name {
        "hmac-sha256" => Ok(TsigAlgorithm::HmacSha256),
        "hmac-sha384" => Ok(TsigAlgorithm::HmacSha384),
        "hmac-sha512" => Ok(TsigAlgorithm::HmacSha512),
        other => Err(Error::config(format!(
            "unsupported TSIG algorithm '{}' (use hmac-sha256, hmac-sha384 or hmac-sha512)",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const KEY_FILE: &str = r#"
# generated by tsig-keygen
key "other-key" {
    algorithm hmac-sha512;
    secret "b3RoZXI=";
};

key "zonesync-key" {
	algorithm hmac-sha256;
	secret "c2VjcmV0LWtleS1tYXRlcmlhbA==";
};
"#;

    #[test]
    fn test_parse_selects_named_block() {
        let key = TsigKey::parse(KEY_FILE, "zonesync-key").unwrap();
        assert_eq!(key.name(), "zonesync-key");
        assert_eq!(key.algorithm(), "hmac-sha256");
        assert_eq!(key.secret, b"secret-key-material");

        let other = TsigKey::parse(KEY_FILE, "other-key").unwrap();
        assert_eq!(other.algorithm(), "hmac-sha512");
        assert_eq!(other.secret, b"other");
    }

    #[test]
    fn test_parse_defaults_algorithm() {
        let content = r#"key "k" { secret "c2VjcmV0"; };"#;
        let key = TsigKey::parse(content, "k").unwrap();
        assert_eq!(key.algorithm(), DEFAULT_ALGORITHM);
    }

    #[test]
    fn test_parse_accepts_quoted_algorithm() {
        let content = r#"key "k" { algorithm "HMAC-SHA384"; secret "c2VjcmV0"; };"#;
        let key = TsigKey::parse(content, "k").unwrap();
        assert_eq!(key.algorithm(), "hmac-sha384");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            TsigKey::parse(KEY_FILE, "missing-key"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            TsigKey::parse(r#"key "k" { algorithm hmac-sha256; };"#, "k"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            TsigKey::parse(r#"key "k" { algorithm gost; secret "c2VjcmV0"; };"#, "k"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            TsigKey::parse(r#"key "k" { secret "not base64!"; };"#, "k"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_parse_rejects_algorithms_without_signer() {
        for algorithm in ["hmac-md5", "hmac-sha1", "hmac-sha224"] {
            let content = format!(r#"key "k" {{ algorithm {}; secret "c2VjcmV0"; }};"#, algorithm);
            match TsigKey::parse(&content, "k") {
                Err(Error::Config(msg)) => assert!(msg.contains(algorithm), "{}", msg),
                other => panic!("{} accepted: {:?}", algorithm, other),
            }
        }
    }

    #[test]
    fn test_key_name_is_not_a_pattern() {
        // "a.c" must not match a block named "abc"
        let content = r#"key "abc" { secret "c2VjcmV0"; };"#;
        assert!(TsigKey::parse(content, "a.c").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(KEY_FILE.as_bytes()).unwrap();

        let key = TsigKey::load(file.path(), "zonesync-key").unwrap();
        assert_eq!(key.name(), "zonesync-key");
        assert!(key.signer().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let result = TsigKey::load(Path::new("/nonexistent/zonesync.key"), "k");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let key = TsigKey::parse(KEY_FILE, "zonesync-key").unwrap();
        let debug = format!("{:?}", key);
        assert!(debug.contains("zonesync-key"));
        assert!(debug.contains("<REDACTED>"));
        assert!(!debug.contains("c2VjcmV0"));
        assert!(!debug.contains("115, 101, 99"));
    }
}
