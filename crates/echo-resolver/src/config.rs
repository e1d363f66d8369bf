// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Resolver settings and the storage port they are persisted through.
//!
//! The key/value port is generic; what belongs to the resolver is
//! [`ResolverConfig`], its `resolver.json` key, and
//! [`ConfigService::resolver`], which falls back to defaults when nothing
//! is stored and turns the settings into a budget and a node chooser.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::chooser::{DefaultChooser, NodeChooser, PathFollowingChooser};

/// Key under which [`ResolverConfig`] is stored.
pub const RESOLVER_KEY: &str = "resolver";

/// Tunables for a [`Resolver`](crate::Resolver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Wall-clock budget per resolution call, in seconds.
    pub timeout_secs: u64,
    /// Decode `dag-fs` blocks with the file/directory shape.
    pub follow_fs: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            follow_fs: true,
        }
    }
}

impl ResolverConfig {
    /// Per-call budget.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Chooser matching [`Self::follow_fs`].
    pub fn chooser(&self) -> Arc<dyn NodeChooser> {
        if self.follow_fs {
            Arc::new(PathFollowingChooser)
        } else {
            Arc::new(DefaultChooser)
        }
    }
}

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Serializes config values as JSON and delegates storage to a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Load and deserialize the value under `key`. Returns `Ok(None)` if missing.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist `value` under `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Stored [`ResolverConfig`], or the defaults when none is saved.
    pub fn resolver(&self) -> Result<ResolverConfig, ConfigError> {
        Ok(self.load(RESOLVER_KEY)?.unwrap_or_default())
    }
}

/// Config blobs as JSON files in one directory.
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Store rooted at the user config directory (e.g. `~/.config/Echo`).
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "Echo")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        Self::at(proj.config_dir())
    }

    /// Store rooted at `base`, created if needed.
    pub fn at(base: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        fs::write(self.path_for(key), data)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let service = ConfigService::new(FsConfigStore::at(dir.path()).unwrap());
        assert_eq!(service.resolver().unwrap(), ResolverConfig::default());
        assert_eq!(ResolverConfig::default().timeout(), Duration::from_secs(60));
    }

    #[test]
    fn saved_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let service = ConfigService::new(FsConfigStore::at(dir.path()).unwrap());
        let cfg = ResolverConfig {
            timeout_secs: 5,
            follow_fs: false,
        };
        service.save(RESOLVER_KEY, &cfg).unwrap();
        assert!(dir.path().join("resolver.json").exists());
        assert_eq!(service.resolver().unwrap(), cfg);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::at(dir.path()).unwrap();
        store.save_raw(RESOLVER_KEY, br#"{"timeout_secs": 7}"#).unwrap();
        let cfg = ConfigService::new(store).resolver().unwrap();
        assert_eq!(cfg.timeout_secs, 7);
        assert!(cfg.follow_fs);
    }

    #[test]
    fn garbage_is_a_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::at(dir.path()).unwrap();
        store.save_raw(RESOLVER_KEY, b"not json").unwrap();
        assert!(matches!(
            ConfigService::new(store).resolver(),
            Err(ConfigError::Serde(_))
        ));
    }
}
