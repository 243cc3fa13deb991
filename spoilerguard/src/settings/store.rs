//! The persisted rules-and-settings document and where it is kept.
//!
//! Only raw data is stored: rules, user overrides, and the auto-enable
//! options. Effective [`Settings`](super::Settings) are always re-derived.

use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::values::SettingsOverrides;
use crate::{error::SpoilerResult, provider::ContainerId, registry::ProtectionRule};

/// Everything that survives a restart.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedDocument {
    pub rules: BTreeMap<ContainerId, ProtectionRule>,
    pub settings: SettingsOverrides,
    pub tag_auto_enable_list: Vec<String>,
    pub auto_enable_on_first_play: bool,
}

impl PersistedDocument {
    /// Parses a document from JSON.
    pub fn from_json(json: &str) -> SpoilerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encodes the document as pretty-printed JSON.
    pub fn to_json(&self) -> SpoilerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Load/save sink for the persisted document.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Returns the stored document, or `None` when nothing was saved yet.
    async fn load(&self) -> SpoilerResult<Option<PersistedDocument>>;

    async fn save(&self, document: &PersistedDocument) -> SpoilerResult<()>;
}

/// Keeps the document in memory. Useful for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<PersistedDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with an already-saved document.
    pub fn with_document(document: PersistedDocument) -> Self {
        Self {
            document: Mutex::new(Some(document)),
        }
    }

    /// Returns the last saved document.
    pub fn snapshot(&self) -> Option<PersistedDocument> {
        self.document
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> SpoilerResult<Option<PersistedDocument>> {
        Ok(self.snapshot())
    }

    async fn save(&self, document: &PersistedDocument) -> SpoilerResult<()> {
        *self
            .document
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(document.clone());
        Ok(())
    }
}

/// Stores the document as a JSON file.
#[cfg(feature = "fs-store")]
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: std::path::PathBuf,
}

#[cfg(feature = "fs-store")]
impl JsonFileStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[cfg(feature = "fs-store")]
#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load(&self) -> SpoilerResult<Option<PersistedDocument>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => PersistedDocument::from_json(&json).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, document: &PersistedDocument) -> SpoilerResult<()> {
        let json = document.to_json()?;
        // The file at `path` is always a complete document.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
