//! Caller identities and the directory that resolves them from API keys.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::error::{GatewayError, Result};

/// Identity assigned to every request when running in development mode.
pub const DEV_IDENTITY: &str = "dev-user";

/// A stable identifier for a caller.
///
/// Identities are the unit of rate accounting: every identity gets its own
/// token bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an identity from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The sentinel identity used when credential checks are bypassed.
    pub fn dev() -> Self {
        Self::new(DEV_IDENTITY)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Resolves a presented credential to a caller identity.
///
/// Implementations are read-only for the lifetime of the process.
pub trait CredentialDirectory: Send + Sync {
    /// Look up the identity owning `credential`, if any.
    fn resolve(&self, credential: &str) -> Option<Identity>;

    /// Number of provisioned credentials.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An immutable identity directory built from static configuration.
///
/// Lookup is a linear scan for value equality. The directory is expected to
/// hold a handful of keys, so no reverse index is kept.
pub struct StaticKeyDirectory {
    /// (identity, credential) pairs, ordered by identity
    entries: Vec<(Identity, String)>,
}

impl StaticKeyDirectory {
    /// Build a directory from an identity -> credential mapping.
    ///
    /// Fails if two identities share a credential, or if any credential is
    /// empty (an empty header is treated as missing and could never match).
    pub fn new(keys: HashMap<String, String>) -> Result<Self> {
        let mut entries: Vec<(Identity, String)> = keys
            .into_iter()
            .map(|(id, key)| (Identity::new(id), key))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (i, (id, key)) in entries.iter().enumerate() {
            if key.is_empty() {
                return Err(GatewayError::Directory(format!(
                    "identity '{}' has an empty API key",
                    id
                )));
            }
            if let Some((other, _)) = entries[i + 1..].iter().find(|(_, k)| k == key) {
                return Err(GatewayError::Directory(format!(
                    "identities '{}' and '{}' share the same API key",
                    id, other
                )));
            }
        }

        Ok(Self { entries })
    }

    /// An empty directory; every credential lookup fails.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Parse a directory from a JSON object of `{"identity": "key"}` pairs.
    ///
    /// This is the format of the `API_KEYS` environment variable.
    pub fn from_json(json: &str) -> Result<Self> {
        let keys: HashMap<String, String> = serde_json::from_str(json).map_err(|e| {
            warn!(error = %e, "Failed to parse API keys");
            GatewayError::Directory(format!("invalid API key JSON: {}", e))
        })?;
        Self::new(keys)
    }

    /// Identities known to this directory, in sorted order.
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.entries.iter().map(|(id, _)| id)
    }
}

impl CredentialDirectory for StaticKeyDirectory {
    fn resolve(&self, credential: &str) -> Option<Identity> {
        self.entries
            .iter()
            .find(|(_, key)| key == credential)
            .map(|(id, _)| id.clone())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// Keys are secrets; only identities are printed.
impl fmt::Debug for StaticKeyDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeyDirectory")
            .field("identities", &self.identities().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(id, key)| (id.to_string(), key.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_known_key() {
        let directory =
            StaticKeyDirectory::new(keys(&[("alice", "key-a"), ("bob", "key-b")])).unwrap();

        assert_eq!(directory.resolve("key-a"), Some(Identity::new("alice")));
        assert_eq!(directory.resolve("key-b"), Some(Identity::new("bob")));
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn test_resolve_unknown_key() {
        let directory = StaticKeyDirectory::new(keys(&[("alice", "key-a")])).unwrap();

        assert_eq!(directory.resolve("bad-value"), None);
        assert_eq!(directory.resolve(""), None);
        assert_eq!(directory.resolve("KEY-A"), None);
    }

    #[test]
    fn test_duplicate_credentials_rejected() {
        let result = StaticKeyDirectory::new(keys(&[("alice", "shared"), ("bob", "shared")]));

        assert!(matches!(result, Err(GatewayError::Directory(_))));
    }

    #[test]
    fn test_empty_credential_rejected() {
        let result = StaticKeyDirectory::new(keys(&[("alice", "")]));
        assert!(matches!(result, Err(GatewayError::Directory(_))));
    }

    #[test]
    fn test_from_json() {
        let directory =
            StaticKeyDirectory::from_json(r#"{"alice": "key-a", "bob": "key-b"}"#).unwrap();

        let ids: Vec<&str> = directory.identities().map(Identity::as_str).collect();
        assert_eq!(ids, vec!["alice", "bob"]);
        assert_eq!(directory.resolve("key-b"), Some(Identity::new("bob")));
    }

    #[test]
    fn test_from_invalid_json() {
        assert!(StaticKeyDirectory::from_json("not json").is_err());
        assert!(StaticKeyDirectory::from_json(r#"["alice"]"#).is_err());
    }

    #[test]
    fn test_debug_hides_keys() {
        let directory = StaticKeyDirectory::new(keys(&[("alice", "super-secret")])).unwrap();
        let printed = format!("{:?}", directory);

        assert!(printed.contains("alice"));
        assert!(!printed.contains("super-secret"));
    }

    #[test]
    fn test_dev_identity() {
        assert_eq!(Identity::dev().as_str(), DEV_IDENTITY);
        assert_eq!(Identity::dev().to_string(), "dev-user");
    }
}
