//! Durable registry of custom log sources.
//!
//! The persisted document is a JSON object mapping container references
//! to file paths inside those containers.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// File name of the registry inside the config directory.
pub const REGISTRY_FILE_NAME: &str = "custom_sources.json";

/// A single registered custom log source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSourceEntry {
    /// Container name or ID the source belongs to.
    pub container_ref: String,
    /// Absolute path of the log file inside the container.
    pub path: String,
}

/// Full set of custom log sources, keyed by container reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryState {
    sources: BTreeMap<String, String>,
}

impl RegistryState {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the path for `container_ref`.
    pub fn upsert(&mut self, container_ref: impl Into<String>, path: impl Into<String>) {
        self.sources.insert(container_ref.into(), path.into());
    }

    /// Registered path for `container_ref`, if any.
    pub fn get(&self, container_ref: &str) -> Option<&str> {
        self.sources.get(container_ref).map(String::as_str)
    }

    /// Whether `container_ref` has a registered source.
    pub fn contains(&self, container_ref: &str) -> bool {
        self.sources.contains_key(container_ref)
    }

    /// Iterate `(container_ref, path)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sources.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Decode a persisted document.
    ///
    /// Keys whose value is not a string are skipped so that later format
    /// extensions do not break older readers.
    fn from_document(content: &str) -> std::result::Result<Self, String> {
        if content.trim().is_empty() {
            tracing::debug!("registry file is empty, starting with no custom sources");
            return Ok(Self::new());
        }

        let document: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let Value::Object(map) = document else {
            return Err("expected a JSON object at the top level".to_string());
        };

        let mut state = Self::new();
        for (key, value) in map {
            match value {
                Value::String(path) => state.upsert(key, path),
                other => tracing::warn!(key = %key, value = %other, "ignoring unrecognised registry key"),
            }
        }
        Ok(state)
    }
}

impl FromIterator<LogSourceEntry> for RegistryState {
    fn from_iter<I: IntoIterator<Item = LogSourceEntry>>(iter: I) -> Self {
        let mut state = Self::new();
        for entry in iter {
            state.upsert(entry.container_ref, entry.path);
        }
        state
    }
}

/// Loads and saves the [`RegistryState`] at a fixed location.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    /// Store at an explicit file path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store inside `dir`, creating the directory if it does not exist.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            Error::Config(format!(
                "could not create config directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self::new(dir.join(REGISTRY_FILE_NAME)))
    }

    /// Read the persisted registry; a missing file yields an empty registry.
    pub fn load(&self) -> Result<RegistryState> {
        if !self.path.exists() {
            return Ok(RegistryState::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            Error::PersistenceRead(format!("{}: {e}", self.path.display()))
        })?;

        RegistryState::from_document(&content)
            .map_err(|e| Error::PersistenceRead(format!("{}: {e}", self.path.display())))
    }

    /// Replace the persisted registry with `state`.
    ///
    /// The document is written to a sibling temp file and renamed into
    /// place, so readers see either the old or the new content.
    pub fn save(&self, state: &RegistryState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::PersistenceWrite(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let write_temp = || -> std::io::Result<()> {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            serde_json::to_writer_pretty(&mut writer, state)?;
            writer.write_all(b"\n")?;
            writer.into_inner().map_err(|e| e.into_error())?.sync_all()
        };

        if let Err(e) = write_temp() {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::PersistenceWrite(format!(
                "{}: {e}",
                temp_path.display()
            )));
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            Error::PersistenceWrite(format!("{}: {e}", self.path.display()))
        })?;

        tracing::debug!(path = %self.path.display(), sources = state.len(), "saved custom log sources");
        Ok(())
    }

    /// Path of the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
