//! Durable storage for client state.
//!
//! All keys are paths relative to the store root, e.g. `session.json` or
//! `images/abc.jpg`. Keys that try to leave the root are rejected.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Storage capability used by the content client
pub trait FileStore {
    fn read(&self, key: &str) -> io::Result<Vec<u8>>;
    fn write(&self, key: &str, data: &[u8]) -> io::Result<()>;
    fn exists(&self, key: &str) -> bool;
    /// Remove a file or a whole directory. Missing keys are not an error.
    fn remove(&self, key: &str) -> io::Result<()>;
    /// List file keys matching a glob pattern relative to the root
    fn list(&self, pattern: &str) -> io::Result<Vec<String>>;
    fn root(&self) -> &Path;
}

/// A store backed by a directory on the local filesystem
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create the store, creating the root directory if needed
    pub fn new(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn resolve(&self, key: &str) -> io::Result<PathBuf> {
        let rel = Path::new(key);
        let escapes = rel.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if key.is_empty() || escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("key escapes store root: {}", key),
            ));
        }
        Ok(self.root.join(rel))
    }
}

impl FileStore for LocalStore {
    fn read(&self, key: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(key)?)
    }

    fn write(&self, key: &str, data: &[u8]) -> io::Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, data)
    }

    fn exists(&self, key: &str) -> bool {
        self.resolve(key).map(|p| p.exists()).unwrap_or(false)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let path = self.resolve(key)?;
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn list(&self, pattern: &str) -> io::Result<Vec<String>> {
        self.resolve(pattern)?;
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        let full = format!("{}/{}", root.trim_end_matches('/'), pattern);
        let paths = glob::glob(&full)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        let mut keys = Vec::new();
        for path in paths.flatten() {
            if !path.is_file() {
                continue;
            }
            if let Ok(rel) = path.strip_prefix(&self.root) {
                keys.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn root(&self) -> &Path {
        &self.root
    }
}
