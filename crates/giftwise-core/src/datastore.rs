use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::event::{self, Event, EventChange};
use crate::gift::Gift;
use crate::saved::{self, Toggle};

pub const SAVED_GIFTS_KEY: &str = "savedGifts";
pub const EVENTS_KEY: &str = "giftWiseEvents";
pub const TOUR_KEY: &str = "hasSeenTour";
pub const THEME_KEY: &str = "theme";

/// String-keyed storage, the local analogue of browser storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// One `<key>.json` file per key inside a directory. Writes are atomic.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(dir), fields(dir = %dir.display()))]
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Some(raw))
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.key_path(key);
        debug!(file = %path.display(), bytes = value.len(), "writing key atomically");

        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed removing {}", path.display()))?;
        }
        Ok(())
    }
}

/// Volatile store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RefCell<BTreeMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.map.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.map.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.map.borrow_mut().remove(key);
        Ok(())
    }
}

/// Reads a JSON list, treating a missing or corrupt value as empty.
pub(crate) fn load_json_list<T, S>(store: &S, key: &str) -> anyhow::Result<Vec<T>>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let Some(raw) = store.get(key)? else {
        return Ok(Vec::new());
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Vec<T>>(&raw) {
        Ok(items) => {
            debug!(key, count = items.len(), "loaded stored list");
            Ok(items)
        }
        Err(err) => {
            warn!(key, error = %err, "stored value is not valid JSON; treating as empty");
            Ok(Vec::new())
        }
    }
}

pub(crate) fn store_json<T, S>(store: &S, key: &str, value: &T) -> anyhow::Result<()>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let serialized =
        serde_json::to_string(value).with_context(|| format!("failed to serialize {key}"))?;
    store
        .set(key, &serialized)
        .with_context(|| format!("failed to save {key}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" | "day" => Some(Self::Light),
            "dark" | "night" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn storage_value(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

/// Durable application state: saved gifts, calendar events, onboarding and theme flags.
/// Every mutation replaces and persists the whole collection.
#[derive(Debug)]
pub struct DataStore<S: KeyValueStore = FileStore> {
    backend: S,
}

impl DataStore<FileStore> {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let backend = FileStore::open(data_dir)?;
        info!(
            data_dir = %data_dir.display(),
            saved = %backend.key_path(SAVED_GIFTS_KEY).display(),
            events = %backend.key_path(EVENTS_KEY).display(),
            "opened datastore"
        );
        Ok(Self { backend })
    }

    pub fn data_dir(&self) -> &Path {
        self.backend.dir()
    }
}

impl<S: KeyValueStore> DataStore<S> {
    pub fn with_backend(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    #[tracing::instrument(skip(self))]
    pub fn load_saved_gifts(&self) -> anyhow::Result<Vec<Gift>> {
        load_json_list(&self.backend, SAVED_GIFTS_KEY)
    }

    #[tracing::instrument(skip(self, gifts), fields(count = gifts.len()))]
    pub fn replace_saved_gifts(&self, gifts: &[Gift]) -> anyhow::Result<()> {
        store_json(&self.backend, SAVED_GIFTS_KEY, gifts)
    }

    #[tracing::instrument(skip(self))]
    pub fn load_events(&self) -> anyhow::Result<Vec<Event>> {
        load_json_list(&self.backend, EVENTS_KEY)
    }

    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    pub fn replace_events(&self, events: &[Event]) -> anyhow::Result<()> {
        store_json(&self.backend, EVENTS_KEY, events)
    }

    #[tracing::instrument(skip(self, gift), fields(id = gift.id))]
    pub fn save_gift(&self, gift: &Gift) -> anyhow::Result<bool> {
        let mut saved = self.load_saved_gifts()?;
        let changed = saved::save_gift(&mut saved, gift);
        self.replace_saved_gifts(&saved)?;
        Ok(changed)
    }

    #[tracing::instrument(skip(self))]
    pub fn remove_gift(&self, id: u64) -> anyhow::Result<bool> {
        let mut saved = self.load_saved_gifts()?;
        let changed = saved::remove_gift(&mut saved, id);
        self.replace_saved_gifts(&saved)?;
        Ok(changed)
    }

    #[tracing::instrument(skip(self, gift), fields(id = gift.id))]
    pub fn toggle_gift(&self, gift: &Gift) -> anyhow::Result<Toggle> {
        let mut saved = self.load_saved_gifts()?;
        let outcome = saved::toggle_gift(&mut saved, gift);
        self.replace_saved_gifts(&saved)?;
        Ok(outcome)
    }

    #[tracing::instrument(skip(self))]
    pub fn remove_all_gifts(&self) -> anyhow::Result<usize> {
        let mut saved = self.load_saved_gifts()?;
        let removed = saved::remove_all(&mut saved);
        self.replace_saved_gifts(&saved)?;
        info!(removed, "cleared saved gifts");
        Ok(removed)
    }

    #[tracing::instrument(skip(self, draft))]
    pub fn add_event(&self, draft: Event, now_millis: u64) -> anyhow::Result<u64> {
        let mut events = self.load_events()?;
        let id = event::add_event(&mut events, draft, now_millis);
        self.replace_events(&events)?;
        Ok(id)
    }

    #[tracing::instrument(skip(self, draft))]
    pub fn upsert_event(&self, draft: Event, now_millis: u64) -> anyhow::Result<EventChange> {
        let mut events = self.load_events()?;
        let change = event::upsert_event(&mut events, draft, now_millis);
        self.replace_events(&events)?;
        Ok(change)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_event(&self, id: u64) -> anyhow::Result<bool> {
        let mut events = self.load_events()?;
        let removed = event::delete_event(&mut events, id);
        self.replace_events(&events)?;
        Ok(removed)
    }

    pub fn has_seen_tour(&self) -> anyhow::Result<bool> {
        Ok(self.backend.get(TOUR_KEY)?.is_some_and(|v| v.trim() == "true"))
    }

    #[tracing::instrument(skip(self))]
    pub fn mark_tour_seen(&self) -> anyhow::Result<()> {
        self.backend.set(TOUR_KEY, "true")
    }

    #[tracing::instrument(skip(self))]
    pub fn reset_tour(&self) -> anyhow::Result<()> {
        self.backend.remove(TOUR_KEY)
    }

    /// `None` means follow the configured default.
    pub fn theme(&self) -> anyhow::Result<Option<Theme>> {
        Ok(self
            .backend
            .get(THEME_KEY)?
            .as_deref()
            .and_then(Theme::parse))
    }

    #[tracing::instrument(skip(self))]
    pub fn set_theme(&self, theme: Option<Theme>) -> anyhow::Result<()> {
        match theme {
            Some(theme) => self.backend.set(THEME_KEY, theme.storage_value()),
            None => self.backend.remove(THEME_KEY),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{DataStore, EVENTS_KEY, KeyValueStore, MemoryStore, SAVED_GIFTS_KEY, Theme};
    use crate::gift::sample_gift;

    #[test]
    fn corrupt_json_loads_as_empty() {
        let backend = MemoryStore::default();
        backend.set(SAVED_GIFTS_KEY, "{not json").expect("set");
        backend.set(EVENTS_KEY, "").expect("set");
        let store = DataStore::with_backend(backend);

        assert!(store.load_saved_gifts().expect("load gifts").is_empty());
        assert!(store.load_events().expect("load events").is_empty());
    }

    #[test]
    fn file_store_persists_full_collection() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");
        let gift = sample_gift(4, "Tech", 20.0, &["techSavvy"]);

        assert!(store.save_gift(&gift).expect("save"));
        assert!(!store.save_gift(&gift).expect("save again"));

        let reopened = DataStore::open(temp.path()).expect("reopen");
        let saved = reopened.load_saved_gifts().expect("load");
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, 4);
        assert!(temp.path().join("savedGifts.json").exists());
    }

    #[test]
    fn tour_flag_is_literal_true() {
        let store = DataStore::with_backend(MemoryStore::default());
        assert!(!store.has_seen_tour().expect("flag"));
        store.mark_tour_seen().expect("mark");
        assert_eq!(
            store.backend().get("hasSeenTour").expect("get").as_deref(),
            Some("true")
        );
        assert!(store.has_seen_tour().expect("flag"));
        store.reset_tour().expect("reset");
        assert!(!store.has_seen_tour().expect("flag"));
    }

    #[test]
    fn theme_round_trips() {
        let store = DataStore::with_backend(MemoryStore::default());
        assert_eq!(store.theme().expect("theme"), None);
        store.set_theme(Some(Theme::Dark)).expect("set");
        assert_eq!(store.theme().expect("theme"), Some(Theme::Dark));
        store.set_theme(None).expect("clear");
        assert_eq!(store.theme().expect("theme"), None);
    }
}
