//! JSON-file preferences source with change notification

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::sync::watch;
use tracing::{info, warn};

use super::{Preferences, PreferencesError};

/// Owns the persisted preferences and publishes every accepted update
pub struct PreferencesStore {
    path: PathBuf,
    tx: watch::Sender<Preferences>,
    /// Held across persist + publish so the file and the snapshot agree
    write_lock: Mutex<()>,
}

impl PreferencesStore {
    /// Load preferences from `path`, falling back to defaults when the file
    /// is missing, unreadable, or fails validation
    pub fn open(path: &Path) -> Self {
        let initial = Self::read(path);
        let (tx, _rx) = watch::channel(initial);
        Self {
            path: path.to_owned(),
            tx,
            write_lock: Mutex::new(()),
        }
    }

    fn read(path: &Path) -> Preferences {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(?path, "no preferences file, using defaults");
                return Preferences::default();
            }
            Err(e) => {
                warn!(?e, ?path, "failed to read preferences, using defaults");
                return Preferences::default();
            }
        };

        match serde_json::from_slice::<Preferences>(&bytes) {
            Ok(prefs) => match prefs.validate() {
                Ok(()) => prefs,
                Err(e) => {
                    warn!(%e, "stored preferences are invalid, using defaults");
                    Preferences::default()
                }
            },
            Err(e) => {
                warn!(?e, "failed to parse preferences, using defaults");
                Preferences::default()
            }
        }
    }

    /// Current snapshot
    pub fn current(&self) -> Preferences {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every accepted update
    pub fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.tx.subscribe()
    }

    /// Validate, persist and publish new preferences
    ///
    /// Blocks on file IO; concurrent callers are applied one at a time.
    pub fn update(&self, preferences: Preferences) -> Result<(), PreferencesError> {
        preferences.validate()?;

        // A poisoned lock guards no data, only ordering
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.write(&preferences)?;

        info!(trigger = %preferences.trigger, "preferences updated");
        self.tx.send_replace(preferences);
        Ok(())
    }

    fn write(&self, preferences: &Preferences) -> Result<(), PreferencesError> {
        let persist = |e: std::io::Error| PreferencesError::Persist(e.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(persist)?;
        }

        let json = serde_json::to_vec_pretty(preferences)
            .map_err(|e| PreferencesError::Persist(e.to_string()))?;

        // Write beside the target, then rename over it
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(persist)?;
        std::fs::rename(&tmp, &self.path).map_err(persist)?;
        Ok(())
    }
}
