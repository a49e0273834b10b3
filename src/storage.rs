//! Durable key-value storage.
//!
//! Each key holds one string value. [`FileStorage`] keeps one file per key
//! under a data directory and replaces it atomically on write, so a crash
//! mid-write leaves the previous value in place.

use crate::error::Result;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
#[cfg(test)]
use std::{cell::RefCell, collections::HashMap, rc::Rc};

pub trait Storage {
    /// Returns `Ok(None)` when the key has never been written.
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-memory storage. Clones share the same map, which lets a test keep a
/// handle on what a store wrote.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Rc<RefCell<HashMap<String, String>>>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }
}

#[cfg(test)]
impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.raw(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_key_is_none() {
        let tmp = TempDir::new().expect("tempdir");
        let storage = FileStorage::new(tmp.path());
        assert!(matches!(storage.get("tasks"), Ok(None)));
    }

    #[test]
    fn set_then_get_overwrites() {
        let tmp = TempDir::new().expect("tempdir");
        let mut storage = FileStorage::new(tmp.path().join("nested"));
        storage.set("theme", "dark").expect("first write");
        storage.set("theme", "light").expect("second write");
        assert_eq!(storage.get("theme").expect("read"), Some("light".to_string()));
        assert!(!tmp.path().join("nested").join("theme.json.tmp").exists());
    }

    #[test]
    fn memory_clones_share_values() {
        let storage = MemoryStorage::new();
        let mut writer = storage.clone();
        writer.set("tasks", "[]").expect("write");
        assert_eq!(storage.raw("tasks").as_deref(), Some("[]"));
    }
}
