use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::model::{FeedAuthConfig, FeedSelectorConfig, StoredAuthConfig};
use crate::parse::compile_selector;
use crate::selectors::{Operation, SelectorItem};
use crate::{GleanerError, Result};

/// Storage key of the feed configuration blob.
pub const FEED_CONFIG_KEY: &str = "feeds";

/// A string key-value store the configuration blob lives in.
pub trait KeyValueBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory backend for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON file per key inside a directory (`~/.config/gleaner` by default).
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Default directory (~/.config/gleaner)
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("gleaner"))
    }

    /// Backend in the default directory.
    pub fn open_default() -> Result<Self> {
        Self::default_dir()
            .map(Self::new)
            .ok_or_else(|| GleanerError::ConfigError("could not determine the home directory".to_string()))
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }
}

/// Per-feed configuration records kept as one JSON blob.
///
/// Every mutation rewrites the whole blob; concurrent writers are not
/// coordinated and the last write wins.
///
/// # Example
///
/// ```rust
/// use gleaner_core::config::{ConfigStore, MemoryBackend};
/// use gleaner_core::selectors::Operation;
///
/// let store = ConfigStore::open(MemoryBackend::new()).unwrap();
/// store.add_selector("feed-1", "article", Operation::Include).unwrap();
/// store.add_selector("feed-1", ".ad", Operation::Exclude).unwrap();
///
/// let config = store.get("feed-1").unwrap();
/// assert_eq!(config.selectors[1].order, 1);
/// ```
#[derive(Debug)]
pub struct ConfigStore<B: KeyValueBackend> {
    backend: B,
    records: Mutex<BTreeMap<String, FeedSelectorConfig>>,
}

impl<B: KeyValueBackend> ConfigStore<B> {
    /// Reads the blob from `backend`; a missing blob is an empty store.
    ///
    /// # Errors
    ///
    /// Backend read failures and malformed JSON.
    pub fn open(backend: B) -> Result<Self> {
        let records = match backend.read(FEED_CONFIG_KEY)? {
            Some(blob) if !blob.trim().is_empty() => serde_json::from_str(&blob)?,
            _ => BTreeMap::new(),
        };
        Ok(Self { backend, records: Mutex::new(records) })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<String, FeedSelectorConfig>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, records: &BTreeMap<String, FeedSelectorConfig>) -> Result<()> {
        let blob = serde_json::to_string(records)?;
        self.backend.write(FEED_CONFIG_KEY, &blob)
    }

    /// Applies `change` to the feed's record (created on first use), then
    /// renumbers, timestamps and persists it. The in-memory records only
    /// change once the backend write succeeded.
    fn update<T>(&self, feed_id: &str, change: impl FnOnce(&mut FeedSelectorConfig) -> Result<T>) -> Result<T> {
        let mut records = self.records();
        let mut config = records.get(feed_id).cloned().unwrap_or_else(|| FeedSelectorConfig::new(feed_id));
        let out = change(&mut config)?;
        config.renumber();
        config.touch();

        let mut next = records.clone();
        next.insert(feed_id.to_string(), config);
        self.persist(&next)?;
        *records = next;
        Ok(out)
    }

    /// The feed's record, if one was ever saved.
    pub fn get(&self, feed_id: &str) -> Option<FeedSelectorConfig> {
        self.records().get(feed_id).cloned()
    }

    /// Ids of every configured feed, sorted.
    pub fn feeds(&self) -> Vec<String> {
        self.records().keys().cloned().collect()
    }

    /// Replaces the feed's record.
    pub fn save(&self, mut config: FeedSelectorConfig) -> Result<()> {
        config.normalize_order();
        let feed_id = config.feed_id.clone();
        self.update(&feed_id, move |slot| {
            *slot = config;
            Ok(())
        })
    }

    /// Replaces the feed's rules, applied in their `order`.
    pub fn set_selectors(&self, feed_id: &str, items: Vec<SelectorItem>) -> Result<()> {
        self.update(feed_id, |config| {
            config.selectors = items;
            config.normalize_order();
            Ok(())
        })
    }

    /// Appends a rule with a fresh id.
    ///
    /// # Errors
    ///
    /// [`GleanerError::InvalidSelector`] when the selector does not parse.
    pub fn add_selector(&self, feed_id: &str, selector: &str, operation: Operation) -> Result<SelectorItem> {
        self.insert_selector(feed_id, usize::MAX, selector, operation)
    }

    /// Inserts a rule at `index` (clamped to the end).
    pub fn insert_selector(
        &self, feed_id: &str, index: usize, selector: &str, operation: Operation,
    ) -> Result<SelectorItem> {
        compile_selector(selector)?;
        self.update(feed_id, |config| {
            let index = index.min(config.selectors.len());
            config.selectors.insert(index, SelectorItem::new(selector, operation, index));
            config.renumber();
            Ok(config.selectors[index].clone())
        })
    }

    /// Removes a rule; false when no rule had that id.
    pub fn remove_selector(&self, feed_id: &str, id: &str) -> Result<bool> {
        if self.get(feed_id).is_none_or(|c| !c.selectors.iter().any(|s| s.id == id)) {
            return Ok(false);
        }
        self.update(feed_id, |config| {
            config.selectors.retain(|s| s.id != id);
            Ok(true)
        })
    }

    /// Moves a rule to `new_index` (clamped); false when no rule had that id.
    pub fn move_selector(&self, feed_id: &str, id: &str, new_index: usize) -> Result<bool> {
        if self.get(feed_id).is_none_or(|c| !c.selectors.iter().any(|s| s.id == id)) {
            return Ok(false);
        }
        self.update(feed_id, |config| {
            let Some(from) = config.selectors.iter().position(|s| s.id == id) else {
                return Ok(false);
            };
            let item = config.selectors.remove(from);
            let to = new_index.min(config.selectors.len());
            config.selectors.insert(to, item);
            Ok(true)
        })
    }

    /// Sets or clears the feed's custom CSS.
    pub fn set_custom_css(&self, feed_id: &str, css: Option<String>) -> Result<()> {
        self.update(feed_id, |config| {
            config.custom_css = css.filter(|c| !c.trim().is_empty());
            Ok(())
        })
    }

    /// Stores the login descriptor with its password encrypted under `master`.
    pub fn save_auth_config(&self, feed_id: &str, auth: &FeedAuthConfig, master: &str) -> Result<()> {
        let sealed = StoredAuthConfig::seal(auth, master)?;
        self.update(feed_id, |config| {
            config.auth_config = Some(sealed);
            Ok(())
        })
    }

    /// The decrypted login descriptor. Absent when none is stored, no master
    /// secret is available, or decryption fails.
    pub fn load_auth_config(&self, feed_id: &str, master: Option<&str>) -> Option<FeedAuthConfig> {
        let stored = self.get(feed_id)?.auth_config?;
        let Some(master) = master else {
            tracing::debug!(feed_id, "auth config present but no master secret available");
            return None;
        };
        match stored.unseal(master) {
            Ok(auth) => Some(auth),
            Err(e) => {
                tracing::warn!(feed_id, error = %e, "stored auth config could not be decrypted");
                None
            }
        }
    }

    /// Drops the feed's login descriptor.
    pub fn clear_auth_config(&self, feed_id: &str) -> Result<()> {
        self.update(feed_id, |config| {
            config.auth_config = None;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> ConfigStore<MemoryBackend> {
        ConfigStore::open(MemoryBackend::new()).unwrap()
    }

    fn selectors(store: &ConfigStore<MemoryBackend>) -> Vec<(String, usize)> {
        store.get("f").unwrap().selectors.iter().map(|s| (s.selector.clone(), s.order)).collect()
    }

    #[test]
    fn test_add_insert_keeps_order_contiguous() {
        let store = store();
        store.add_selector("f", "article", Operation::Include).unwrap();
        store.add_selector("f", ".ad", Operation::Exclude).unwrap();
        store.insert_selector("f", 1, "h1", Operation::Include).unwrap();

        assert_eq!(selectors(&store), vec![("article".into(), 0), ("h1".into(), 1), (".ad".into(), 2)]);
    }

    #[test]
    fn test_remove_and_move() {
        let store = store();
        let a = store.add_selector("f", "a", Operation::Include).unwrap();
        let b = store.add_selector("f", "b", Operation::Include).unwrap();
        store.add_selector("f", "c", Operation::Include).unwrap();

        assert!(store.move_selector("f", &a.id, 5).unwrap());
        assert_eq!(selectors(&store), vec![("b".into(), 0), ("c".into(), 1), ("a".into(), 2)]);

        assert!(store.remove_selector("f", &b.id).unwrap());
        assert_eq!(selectors(&store), vec![("c".into(), 0), ("a".into(), 1)]);

        assert!(!store.remove_selector("f", "missing").unwrap());
        assert!(!store.move_selector("other", &a.id, 0).unwrap());
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let store = store();
        assert!(matches!(
            store.add_selector("f", "[[", Operation::Include),
            Err(GleanerError::InvalidSelector { .. })
        ));
        assert!(store.get("f").is_none());
    }

    #[test]
    fn test_mutations_bump_updated_at() {
        let store = store();
        store.set_custom_css("f", Some("p { margin: 0 }".into())).unwrap();
        let first = store.get("f").unwrap().updated_at;
        store.set_custom_css("f", None).unwrap();
        let config = store.get("f").unwrap();
        assert!(config.updated_at > first);
        assert_eq!(config.custom_css, None);
    }

    #[test]
    fn test_auth_config_encrypted_at_rest() {
        let store = store();
        let auth = FeedAuthConfig::new("https://example.com/login", "ada", "hunter2");
        store.save_auth_config("f", &auth, "master").unwrap();

        let blob = store.backend().read(FEED_CONFIG_KEY).unwrap().unwrap();
        assert!(!blob.contains("hunter2"));
        assert!(blob.contains("encryptedPassword"));

        assert_eq!(store.load_auth_config("f", Some("master")), Some(auth));
        assert_eq!(store.load_auth_config("f", Some("wrong")), None);
        assert_eq!(store.load_auth_config("f", None), None);

        store.clear_auth_config("f").unwrap();
        assert_eq!(store.load_auth_config("f", Some("master")), None);
    }

    #[test]
    fn test_save_replaces_record() {
        let store = store();
        store.add_selector("f", "article", Operation::Include).unwrap();

        let mut config = FeedSelectorConfig::new("f");
        config.selectors = vec![SelectorItem::new("main", Operation::Include, 4)];
        config.custom_css = Some("h1 { font-size: 2em }".into());
        store.save(config).unwrap();

        assert_eq!(selectors(&store), vec![("main".into(), 0)]);
        let saved = store.get("f").unwrap();
        assert_eq!(saved.custom_css.as_deref(), Some("h1 { font-size: 2em }"));
        assert!(saved.updated_at > 0);
    }

    #[test]
    fn test_set_selectors_sorts_by_order() {
        let store = store();
        store
            .set_selectors(
                "f",
                vec![SelectorItem::new("late", Operation::Include, 9), SelectorItem::new("early", Operation::Include, 3)],
            )
            .unwrap();
        assert_eq!(selectors(&store), vec![("early".into(), 0), ("late".into(), 1)]);
    }

    #[test]
    fn test_file_backend_roundtrip() {
        let dir = TempDir::new().unwrap();
        {
            let store = ConfigStore::open(FileBackend::new(dir.path())).unwrap();
            store.add_selector("feed-a", "article", Operation::Include).unwrap();
            store.set_custom_css("feed-b", Some("body { color: #222 }".into())).unwrap();
        }
        assert!(dir.path().join("feeds.json").exists());

        let reopened = ConfigStore::open(FileBackend::new(dir.path())).unwrap();
        assert_eq!(reopened.feeds(), vec!["feed-a".to_string(), "feed-b".to_string()]);
        assert_eq!(reopened.get("feed-a").unwrap().selectors[0].selector, "article");
    }

    /// Accepts one write, then fails every later one.
    #[derive(Default)]
    struct FailingBackend {
        inner: MemoryBackend,
        writes: Mutex<usize>,
    }

    impl KeyValueBackend for FailingBackend {
        fn read(&self, key: &str) -> Result<Option<String>> {
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<()> {
            let mut writes = self.writes.lock().unwrap();
            *writes += 1;
            if *writes > 1 {
                return Err(GleanerError::ConfigError("disk full".into()));
            }
            self.inner.write(key, value)
        }
    }

    #[test]
    fn test_failed_write_leaves_records_unchanged() {
        let store = ConfigStore::open(FailingBackend::default()).unwrap();
        store.add_selector("f", "article", Operation::Include).unwrap();
        let before = store.get("f").unwrap();

        assert!(store.add_selector("f", ".ad", Operation::Exclude).is_err());
        assert!(store.set_custom_css("g", Some("p {}".into())).is_err());

        assert_eq!(store.get("f").unwrap(), before);
        assert!(store.get("g").is_none());
        assert_eq!(store.feeds(), vec!["f".to_string()]);
    }

    #[test]
    fn test_open_rejects_corrupt_blob() {
        let backend = MemoryBackend::new();
        backend.write(FEED_CONFIG_KEY, "{not json").unwrap();
        assert!(matches!(ConfigStore::open(backend), Err(GleanerError::Json(_))));
    }
}
