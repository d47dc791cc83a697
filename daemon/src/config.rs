//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

const DEFAULT_DOUBLE_TAP_WINDOW_MS: u64 = 300;
const DEFAULT_AX_TIMEOUT_MS: u64 = 500;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Persisted user preferences
    pub preferences_path: PathBuf,

    /// Max gap between release and second press of a double tap
    pub double_tap_window: Duration,

    /// Messaging timeout for accessibility calls into the target app
    pub ax_timeout: Duration,

    /// How often to check the frontmost app and permission state
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup("KEYGLANCE_DATA_DIR") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = lookup("HOME").context("HOME is not set")?;
                PathBuf::from(home)
                    .join(".local")
                    .join("share")
                    .join("keyglance")
            }
        };

        Ok(Self {
            socket_path: data_dir.join("daemon.sock"),
            preferences_path: data_dir.join("preferences.json"),
            data_dir,
            double_tap_window: millis(
                &lookup,
                "KEYGLANCE_DOUBLE_TAP_WINDOW_MS",
                DEFAULT_DOUBLE_TAP_WINDOW_MS,
            )?,
            ax_timeout: millis(&lookup, "KEYGLANCE_AX_TIMEOUT_MS", DEFAULT_AX_TIMEOUT_MS)?,
            poll_interval: millis(
                &lookup,
                "KEYGLANCE_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            )?,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_millis(default));
    };
    let value: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a whole number of milliseconds, got {raw:?}"))?;
    if value == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_millis(value))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = load(&[("HOME", "/Users/ada")]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/Users/ada/.local/share/keyglance"));
        assert!(config.socket_path.ends_with("daemon.sock"));
        assert!(config.preferences_path.ends_with("preferences.json"));
        assert_eq!(config.double_tap_window, Duration::from_millis(300));
        assert_eq!(config.ax_timeout, Duration::from_millis(500));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_config_overrides() {
        let config = load(&[
            ("KEYGLANCE_DATA_DIR", "/tmp/kg"),
            ("KEYGLANCE_DOUBLE_TAP_WINDOW_MS", "250"),
            ("KEYGLANCE_POLL_INTERVAL_MS", " 100 "),
        ])
        .unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/kg/daemon.sock"));
        assert_eq!(config.double_tap_window, Duration::from_millis(250));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let err = load(&[("HOME", "/h"), ("KEYGLANCE_AX_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("KEYGLANCE_AX_TIMEOUT_MS"));

        assert!(load(&[("HOME", "/h"), ("KEYGLANCE_DOUBLE_TAP_WINDOW_MS", "0")]).is_err());
    }

    #[test]
    fn test_missing_home_without_data_dir() {
        assert!(load(&[]).is_err());
    }

    #[test]
    fn test_ensure_dirs_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("keyglance");
        let config = load(&[("KEYGLANCE_DATA_DIR", root.to_str().unwrap())]).unwrap();
        config.ensure_dirs().unwrap();
        assert!(root.is_dir());
    }
}
