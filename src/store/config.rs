//! Store entries and connection-string handling

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

/// One configured backing store
#[derive(Clone)]
pub struct StoreConfig {
    /// Unique registry name
    pub name: String,

    /// Connection string, which usually embeds credentials
    uri: SecretString,
}

impl StoreConfig {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: SecretString::new(uri.into().into_boxed_str()),
        }
    }

    /// The raw connection string, credentials included
    pub fn uri(&self) -> &str {
        self.uri.expose_secret()
    }

    /// Connection string safe for logs and terminal output
    pub fn redacted_uri(&self) -> String {
        redact_uri(self.uri())
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("name", &self.name)
            .field("uri", &self.redacted_uri())
            .finish()
    }
}

/// Serialized form of a store entry (`[[stores]]` in the config file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntry {
    pub name: String,

    /// Written back out redacted
    #[serde(serialize_with = "serialize_redacted")]
    pub uri: SecretString,
}

impl StoreEntry {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: SecretString::new(uri.into().into_boxed_str()),
        }
    }
}

impl From<StoreEntry> for StoreConfig {
    fn from(entry: StoreEntry) -> Self {
        StoreConfig {
            name: entry.name,
            uri: entry.uri,
        }
    }
}

/// Serialize a connection string with its password masked
pub fn serialize_redacted<S: Serializer>(
    uri: &SecretString,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&redact_uri(uri.expose_secret()))
}

/// Replace the password in a connection string's userinfo with `***`.
///
/// Works on multi-host MongoDB strings (`mongodb://u:p@a:1,b:2/db`) that a
/// strict URL parser rejects.
pub fn redact_uri(uri: &str) -> String {
    let Some(scheme_end) = uri.find("://") else {
        return uri.to_string();
    };

    let rest = &uri[scheme_end + 3..];
    let authority_end = rest.find(|c: char| c == '/' || c == '?').unwrap_or(rest.len());
    let authority = &rest[..authority_end];

    match authority.rfind('@') {
        Some(at) => {
            let userinfo = &authority[..at];
            let user = userinfo.split(':').next().unwrap_or("");
            format!("{}://{}:***@{}", &uri[..scheme_end], user, &rest[at + 1..])
        }
        None => uri.to_string(),
    }
}
