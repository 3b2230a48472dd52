//! String key-value persistence for editor preferences and document content.

use std::{
    collections::BTreeMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

pub const THEME_KEY: &str = "markdownRendererTheme";
pub const AUTO_RENDER_KEY: &str = "markdownRendererAutoRender";
pub const TEXT_DIR_KEY: &str = "markdownRendererTextDir";
pub const INLINE_CODE_DIR_KEY: &str = "markdownRendererInlineCodeDir";
pub const CODE_DIR_KEY: &str = "markdownRendererCodeDir";
pub const FULL_HEIGHT_KEY: &str = "markdownRendererFullHeightMode";
pub const INPUT_VISIBLE_KEY: &str = "markdownRendererInputVisible";
pub const CONTENT_KEY: &str = "markdownInputContent";
pub const DOCUMENTS_KEY: &str = "markdownRendererDocuments";
pub const ACTIVE_DOCUMENT_KEY: &str = "markdownRendererActiveDocument";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings file `{path}` could not be accessed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file `{path}` is not a JSON object of strings: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode `{key}`: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub trait SettingsStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;

    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// JSON object on disk, rewritten through a sibling temp file on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open `path`, treating a missing file as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(StoreError::io(&path, err)),
        };

        debug!(
            target = "infra::store",
            path = %path.display(),
            entries = entries.len(),
            "Opened settings file"
        );

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|err| StoreError::io(dir, err))?;

        let mut file = tempfile::Builder::new()
            .prefix(".livemark-settings")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|err| StoreError::io(dir, err))?;
        let encoded =
            serde_json::to_vec_pretty(&self.entries).map_err(|source| StoreError::Encode {
                key: "settings",
                source,
            })?;
        file.write_all(&encoded)
            .and_then(|()| file.flush())
            .map_err(|err| StoreError::io(file.path(), err))?;
        file.persist(&self.path)
            .map_err(|err| StoreError::io(&self.path, err.error))?;
        Ok(())
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        if self.entries.get(key) == Some(&value) {
            return Ok(());
        }
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}
