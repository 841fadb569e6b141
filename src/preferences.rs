// Persisted user preferences
//
// Values are plain strings under string keys, mirroring browser-style local
// storage. The only preference today is the sound-effects flag.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::SettingsError;

pub const SOUND_ENABLED_KEY: &str = "serenade-sound-enabled";

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError>;
}

/// Store that forgets everything on exit
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by `preferences.json` in the app directory
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(app_dir: &Path) -> Result<Self, SettingsError> {
        let path = app_dir.join("preferences.json");
        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.to_string());

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&*values)?)?;
        Ok(())
    }
}

/// Global sound-effects switch. Clones share state; every receiver from
/// `subscribe()` sees a change as soon as `set`/`toggle` returns.
#[derive(Clone)]
pub struct SoundToggle {
    tx: Arc<watch::Sender<bool>>,
    store: Arc<dyn PreferenceStore>,
}

impl SoundToggle {
    /// Read the stored flag. Missing means enabled; anything but "true" means disabled.
    pub fn load(store: Arc<dyn PreferenceStore>) -> Self {
        let enabled = match store.get(SOUND_ENABLED_KEY) {
            Some(value) => value == "true",
            None => true,
        };
        let (tx, _) = watch::channel(enabled);
        Self {
            tx: Arc::new(tx),
            store,
        }
    }

    pub fn enabled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn set(&self, enabled: bool) {
        self.tx.send_replace(enabled);
        self.persist(enabled);
    }

    /// Flip the flag, returning the new value
    pub fn toggle(&self) -> bool {
        let mut next = false;
        self.tx.send_modify(|enabled| {
            *enabled = !*enabled;
            next = *enabled;
        });
        self.persist(next);
        next
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn persist(&self, enabled: bool) {
        let value = if enabled { "true" } else { "false" };
        if let Err(e) = self.store.set(SOUND_ENABLED_KEY, value) {
            tracing::warn!("Failed to persist sound preference: {}", e);
        }
        tracing::info!("Sound effects {}", if enabled { "enabled" } else { "disabled" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("serenade-prefs-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_missing_value_defaults_to_enabled() {
        let sound = SoundToggle::load(Arc::new(MemoryStore::new()));
        assert!(sound.enabled());
    }

    #[test]
    fn test_stored_values() {
        let store = Arc::new(MemoryStore::new());
        store.set(SOUND_ENABLED_KEY, "false").unwrap();
        assert!(!SoundToggle::load(store.clone()).enabled());

        store.set(SOUND_ENABLED_KEY, "true").unwrap();
        assert!(SoundToggle::load(store.clone()).enabled());

        store.set(SOUND_ENABLED_KEY, "yes").unwrap();
        assert!(!SoundToggle::load(store).enabled());
    }

    #[test]
    fn test_toggle_persists_and_broadcasts() {
        let store = Arc::new(MemoryStore::new());
        let sound = SoundToggle::load(store.clone());
        let mut header = sound.subscribe();
        let mut marquee = sound.subscribe();
        assert_eq!(sound.observer_count(), 2);

        assert!(!sound.toggle());

        assert!(header.has_changed().unwrap());
        assert!(!*header.borrow_and_update());
        assert!(!*marquee.borrow_and_update());
        assert_eq!(store.get(SOUND_ENABLED_KEY).as_deref(), Some("false"));

        sound.clone().set(true);
        assert!(*header.borrow());
        assert_eq!(store.get(SOUND_ENABLED_KEY).as_deref(), Some("true"));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = scratch_dir("reopen");
        {
            let store = FileStore::open(&dir).unwrap();
            assert_eq!(store.get(SOUND_ENABLED_KEY), None);
            let sound = SoundToggle::load(Arc::new(store));
            sound.toggle();
        }

        let store = FileStore::open(&dir).unwrap();
        assert_eq!(store.get(SOUND_ENABLED_KEY).as_deref(), Some("false"));
        assert!(!SoundToggle::load(Arc::new(store)).enabled());

        let _ = fs::remove_dir_all(&dir);
    }
}
