//! Persistent store seam and implementations.
//!
//! The store is a flat namespace of named objects. Writes and renames are
//! atomic per object; nothing here guarantees that two objects commit
//! together. The update protocol's strict write ordering (payload, then
//! marker, then version record) carries that burden instead.

use crate::error::AgentError;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Object name of the program executed on next process start.
pub const ACTIVE_PROGRAM: &str = "program.bin";

/// Object name of the locally recorded version token (plain text).
pub const VERSION_RECORD: &str = "version.txt";

/// Object name of a fully downloaded candidate program.
pub const CANDIDATE_PAYLOAD: &str = "program.bin.new";

/// Object name whose presence signals a promotable candidate. Content is
/// irrelevant.
pub const UPDATE_MARKER: &str = "update.ready";

/// Durable object storage.
pub trait ObjectStore: Send + Sync {
    fn read(&self, name: &str) -> Result<Vec<u8>, AgentError>;
    fn write(&self, name: &str, data: &[u8]) -> Result<(), AgentError>;
    fn rename(&self, from: &str, to: &str) -> Result<(), AgentError>;
    fn delete(&self, name: &str) -> Result<(), AgentError>;
    fn list(&self) -> Result<Vec<String>, AgentError>;

    fn exists(&self, name: &str) -> bool {
        self.list()
            .map(|names| names.iter().any(|n| n == name))
            .unwrap_or(false)
    }

    /// Read an object as trimmed UTF-8 text.
    fn read_text(&self, name: &str) -> Result<String, AgentError> {
        let bytes = self.read(name)?;
        Ok(String::from_utf8_lossy(&bytes).trim().to_string())
    }
}

/// Filesystem-backed store rooted at a data directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open the store, creating the data directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, AgentError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| AgentError::StorageWrite(format!("{}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl ObjectStore for FsStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, AgentError> {
        match fs::read(self.path_of(name)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(AgentError::NotFound(name.to_string()))
            }
            Err(e) => Err(AgentError::Io(e)),
        }
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<(), AgentError> {
        // Stage through a temp sibling, then rename: a crash mid-write
        // leaves the previous object intact.
        let tmp = self.path_of(&format!("{}.tmp", name));
        fs::write(&tmp, data).map_err(|e| AgentError::StorageWrite(format!("{}: {}", name, e)))?;
        fs::rename(&tmp, self.path_of(name))
            .map_err(|e| AgentError::StorageWrite(format!("{}: {}", name, e)))
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), AgentError> {
        match fs::rename(self.path_of(from), self.path_of(to)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(AgentError::NotFound(from.to_string()))
            }
            Err(e) => Err(AgentError::Io(e)),
        }
    }

    fn delete(&self, name: &str) -> Result<(), AgentError> {
        match fs::remove_file(self.path_of(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(AgentError::NotFound(name.to_string()))
            }
            Err(e) => Err(AgentError::Io(e)),
        }
    }

    fn list(&self) -> Result<Vec<String>, AgentError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(AgentError::Io)? {
            let entry = entry.map_err(AgentError::Io)?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// In-memory store with scripted fault injection.
///
/// Test code drives the staging and recovery protocols through this
/// implementation, including disk-full style write failures and
/// crash-between-writes states that the filesystem store cannot be made to
/// produce on demand.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

#[derive(Default)]
struct MemInner {
    objects: HashMap<String, Vec<u8>>,
    fail_all_writes: bool,
    fail_writes_of: Option<String>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, bypassing fault injection.
    pub fn seed(&self, name: &str, data: &[u8]) {
        self.lock().objects.insert(name.to_string(), data.to_vec());
    }

    /// Make every subsequent write fail (disk-full simulation).
    pub fn fail_all_writes(&self, fail: bool) {
        self.lock().fail_all_writes = fail;
    }

    /// Make writes of one named object fail, leaving others working.
    pub fn fail_writes_of(&self, name: &str) {
        self.lock().fail_writes_of = Some(name.to_string());
    }

    /// Current content of an object, if present.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(name).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemInner> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

impl ObjectStore for MemStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, AgentError> {
        self.lock()
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::NotFound(name.to_string()))
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<(), AgentError> {
        let mut inner = self.lock();
        let targeted = inner.fail_writes_of.as_deref() == Some(name);
        if inner.fail_all_writes || targeted {
            return Err(AgentError::StorageWrite(format!("{}: no space left", name)));
        }
        inner.objects.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), AgentError> {
        let mut inner = self.lock();
        match inner.objects.remove(from) {
            Some(data) => {
                inner.objects.insert(to.to_string(), data);
                Ok(())
            }
            None => Err(AgentError::NotFound(from.to_string())),
        }
    }

    fn delete(&self, name: &str) -> Result<(), AgentError> {
        match self.lock().objects.remove(name) {
            Some(_) => Ok(()),
            None => Err(AgentError::NotFound(name.to_string())),
        }
    }

    fn list(&self) -> Result<Vec<String>, AgentError> {
        let mut names: Vec<String> = self.lock().objects.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
