use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use gatehouse_model::{FromValue, Value};
use itertools::Itertools;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::sandbox::Sandbox;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Named YAML documents under a single root directory.
///
/// Documents are read lazily on first access and kept in memory. Mutations
/// through [`DocumentStore::set_value`] only touch the cached copy and mark
/// the document dirty; [`DocumentStore::save`] and [`DocumentStore::flush`]
/// write it out. Writes go to a temporary file which is then renamed over the
/// previous version, so a crash mid-write leaves the old file intact.
///
/// Cache and dirty set are keyed by the canonical document name, so every
/// alias of a document (`kits`, `./kits`) shares one in-memory copy.
#[derive(Debug)]
pub struct DocumentStore {
    sandbox: Sandbox,
    documents: HashMap<String, Value>,
    dirty: HashSet<String>,
    keep_backups: bool,
}

impl DocumentStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let sandbox = Sandbox::new(root)?;
        info!("Document store root: {}", sandbox.root().display());
        Ok(Self {
            sandbox,
            documents: Default::default(),
            dirty: Default::default(),
            keep_backups: true,
        })
    }

    /// Keep the previous version of a document as `<file>.bak` on overwrite.
    pub fn with_backups(mut self, keep_backups: bool) -> Self {
        self.keep_backups = keep_backups;
        self
    }

    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        self.sandbox.document_path(name)
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        let (key, path) = self.sandbox.locate(name)?;
        Ok(self.documents.contains_key(&key) || path.is_file())
    }

    /// Returns the cached document, reading it from disk on first access.
    /// A missing file is an empty mapping.
    pub fn load(&mut self, name: &str) -> Result<&Value> {
        self.cached(name).map(|doc| &*doc)
    }

    /// Drops the cached copy and reads the file again. Unsaved changes are lost.
    pub fn reload(&mut self, name: &str) -> Result<&Value> {
        let (key, path) = self.sandbox.locate(name)?;
        if self.dirty.remove(&key) {
            warn!("Reloading {key:?} discards unsaved changes");
        }
        self.documents.remove(&key);
        self.cached_at(key, &path).map(|doc| &*doc)
    }

    /// Forgets the cached copy without writing it.
    pub fn unload(&mut self, name: &str) -> bool {
        let Ok((key, _)) = self.sandbox.locate(name) else {
            return false;
        };
        self.dirty.remove(&key);
        self.documents.remove(&key).is_some()
    }

    pub fn load_as<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        let document = self.load(name)?;
        let convert = |source| StoreError::Convert {
            name: name.to_owned(),
            source,
        };
        let yaml = serde_yaml::to_value(document).map_err(convert)?;
        serde_yaml::from_value(yaml).map_err(convert)
    }

    pub fn save_as<T: Serialize>(&mut self, name: &str, data: &T) -> Result<()> {
        let convert = |source| StoreError::Convert {
            name: name.to_owned(),
            source,
        };
        let yaml = serde_yaml::to_value(data).map_err(convert)?;
        let document: Value = serde_yaml::from_value(yaml).map_err(convert)?;
        self.save_document(name, document)
    }

    /// Replaces the document and writes it out. If the write fails the new
    /// content stays cached and dirty.
    pub fn save_document(&mut self, name: &str, document: Value) -> Result<()> {
        let (key, path) = self.sandbox.locate(name)?;
        self.documents.insert(key.clone(), document);
        let written = self.write_document(&path, &self.documents[&key]);
        if written.is_ok() {
            self.dirty.remove(&key);
        } else {
            self.dirty.insert(key);
        }
        written
    }

    /// Writes the cached copy of `name` (an empty mapping if it was never loaded).
    pub fn save(&mut self, name: &str) -> Result<()> {
        let (key, path) = self.sandbox.locate(name)?;
        let document = self.cached_at(key.clone(), &path)?;
        let text = serialize(&path, document)?;
        self.write_text(&path, &text)?;
        self.dirty.remove(&key);
        Ok(())
    }

    pub fn get_value<S: AsRef<str>>(&mut self, name: &str, path: &[S]) -> Result<Option<&Value>> {
        Ok(self.load(name)?.get(path))
    }

    /// Reads the value at `path` converted to `T`. Missing paths are `None`,
    /// values of the wrong shape are an error.
    pub fn get_as<T: FromValue, S: AsRef<str>>(
        &mut self,
        name: &str,
        path: &[S],
    ) -> Result<Option<T>> {
        let Some(value) = self.get_value(name, path)? else {
            return Ok(None);
        };
        let prefix = path.iter().map(|s| s.as_ref()).join(".");
        T::from_value(value).map(Some).map_err(|e| StoreError::Coerce {
            name: name.to_owned(),
            source: if prefix.is_empty() { e } else { e.within(prefix) },
        })
    }

    pub fn set_value<S: AsRef<str>>(
        &mut self,
        name: &str,
        path: &[S],
        value: impl Into<Value>,
    ) -> Result<Option<Value>> {
        let (key, file) = self.sandbox.locate(name)?;
        let previous = self.cached_at(key.clone(), &file)?.set(path, value.into());
        self.dirty.insert(key);
        Ok(previous)
    }

    pub fn remove_value<S: AsRef<str>>(&mut self, name: &str, path: &[S]) -> Result<Option<Value>> {
        let (key, file) = self.sandbox.locate(name)?;
        let removed = self.cached_at(key.clone(), &file)?.remove(path);
        if removed.is_some() {
            self.dirty.insert(key);
        }
        Ok(removed)
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.sandbox
            .locate(name)
            .is_ok_and(|(key, _)| self.dirty.contains(&key))
    }

    /// Writes every document changed since its last save. Stops at the first failure,
    /// the failed document and the ones not reached yet stay dirty.
    pub fn flush(&mut self) -> Result<()> {
        for name in self.dirty.iter().cloned().sorted().collect::<Vec<_>>() {
            self.save(&name)?;
        }
        Ok(())
    }

    /// Names of all documents present on disk, sorted.
    pub fn documents(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        self.collect_documents(self.sandbox.root(), &mut out)?;
        out.sort();
        Ok(out)
    }

    fn collect_documents(&self, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        for dir_entry in fs::read_dir(dir).map_err(StoreError::io(dir))? {
            let path = dir_entry.map_err(StoreError::io(dir))?.path();
            if path.is_dir() {
                self.collect_documents(&path, out)?;
            } else if let Some(name) = self.sandbox.document_name(&path) {
                out.push(name);
            }
        }
        Ok(())
    }

    fn cached(&mut self, name: &str) -> Result<&mut Value> {
        let (key, path) = self.sandbox.locate(name)?;
        self.cached_at(key, &path)
    }

    fn cached_at(&mut self, key: String, path: &Path) -> Result<&mut Value> {
        match self.documents.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let document = read_document(entry.key(), path)?;
                Ok(entry.insert(document))
            }
        }
    }

    fn write_document(&self, path: &Path, document: &Value) -> Result<()> {
        let text = serialize(path, document)?;
        self.write_text(path, &text)
    }

    fn write_text(&self, path: &Path, text: &str) -> Result<()> {
        if path.is_file() && fs::read_to_string(path).ok().as_deref() == Some(text) {
            // No need to change anything
            debug!("{} unchanged", path.display());
            return Ok(());
        }
        ensure_dir_created(path)?;

        let tmp_path = sibling(path, ".tmp");
        {
            let mut tmp_file = File::create(&tmp_path).map_err(StoreError::io(&tmp_path))?;
            tmp_file
                .write_all(text.as_bytes())
                .and_then(|_| tmp_file.sync_all())
                .map_err(StoreError::io(&tmp_path))?;
        }
        if self.keep_backups && path.is_file() {
            let backup_path = sibling(path, ".bak");
            fs::copy(path, &backup_path).map_err(StoreError::io(&backup_path))?;
        }
        fs::rename(&tmp_path, path).map_err(StoreError::io(path))?;
        debug!("Stored {}", path.display());
        Ok(())
    }
}

fn serialize(path: &Path, document: &Value) -> Result<String> {
    serde_yaml::to_string(document).map_err(|source| StoreError::Convert {
        name: path.display().to_string(),
        source,
    })
}

fn read_document(name: &str, path: &Path) -> Result<Value> {
    if !path.is_file() {
        debug!("{name:?} does not exist yet, starting empty");
        return Ok(Value::mapping());
    }
    info!("Loading {name:?} from {}", path.display());
    let text = fs::read_to_string(path).map_err(StoreError::io(path))?;
    if text.trim().is_empty() {
        return Ok(Value::mapping());
    }
    serde_yaml::from_str(&text).map_err(|source| StoreError::Parse {
        name: name.to_owned(),
        path: path.to_owned(),
        source,
    })
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let orig_filename = path
        .file_name()
        .map(OsStr::to_string_lossy)
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", orig_filename, suffix))
}

fn ensure_dir_created(path: &Path) -> Result<()> {
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(StoreError::io(dir))?;
    }
    Ok(())
}
