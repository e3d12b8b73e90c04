use std::collections::HashMap;
use std::sync::RwLock;

/// HTTP Basic credentials for one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

/// Where previously entered Basic credentials come from, keyed by origin
/// (`scheme://host[:port]`).
pub trait BasicCredentialSource: Send + Sync {
    fn basic_credentials(&self, origin: &str) -> Option<BasicCredentials>;
}

/// Basic credentials held in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    entries: RwLock<HashMap<String, BasicCredentials>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers credentials entered for `origin`.
    pub fn insert(&self, origin: impl Into<String>, credentials: BasicCredentials) {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(origin.into(), credentials);
    }

    pub fn remove(&self, origin: &str) -> Option<BasicCredentials> {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.remove(origin)
    }
}

impl BasicCredentialSource for MemoryCredentials {
    fn basic_credentials(&self, origin: &str) -> Option<BasicCredentials> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(origin).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_origin() {
        let creds = MemoryCredentials::new();
        creds.insert("https://intranet.example.com", BasicCredentials::new("ada", "pw"));

        assert_eq!(creds.basic_credentials("https://intranet.example.com").unwrap().username, "ada");
        assert!(creds.basic_credentials("http://intranet.example.com").is_none());
        assert!(creds.remove("https://intranet.example.com").is_some());
        assert!(creds.basic_credentials("https://intranet.example.com").is_none());
    }
}
