use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::WebError;

/// What a read produced: text when an encoding was requested, raw bytes
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContents {
    Text(String),
    Bytes(Vec<u8>),
}

impl FileContents {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileContents::Text(text) => Some(text),
            FileContents::Bytes(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FileContents::Text(_))
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            FileContents::Text(text) => text.into_bytes(),
            FileContents::Bytes(bytes) => bytes,
        }
    }
}

/// The filesystem seam handed to application modules.
pub trait Filesystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path, encoding: Option<&str>) -> Result<FileContents, WebError>;
    fn write(&self, path: &Path, content: &str, encoding: &str) -> Result<(), WebError>;
}

/// Lower-case an encoding token and drop hyphens: `UTF-8` becomes `utf8`.
pub fn normalize_encoding(token: &str) -> String {
    token.replace('-', "").to_ascii_lowercase()
}

fn check_encoding(token: &str) -> Result<(), WebError> {
    match normalize_encoding(token).as_str() {
        "utf8" => Ok(()),
        _ => Err(WebError::Encoding(token.to_string())),
    }
}

fn decode(path: &Path, bytes: Vec<u8>, encoding: Option<&str>) -> Result<FileContents, WebError> {
    let Some(encoding) = encoding else {
        return Ok(FileContents::Bytes(bytes));
    };
    check_encoding(encoding)?;
    String::from_utf8(bytes)
        .map(FileContents::Text)
        .map_err(|e| WebError::Fs {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFs;

impl Filesystem for DiskFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path, encoding: Option<&str>) -> Result<FileContents, WebError> {
        let bytes = std::fs::read(path).map_err(|e| WebError::Fs {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        decode(path, bytes, encoding)
    }

    fn write(&self, path: &Path, content: &str, encoding: &str) -> Result<(), WebError> {
        check_encoding(encoding)?;
        std::fs::write(path, content).map_err(|e| WebError::Fs {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// An in-memory tree, for tests and scratch projects.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        MemoryFs::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), contents.into());
    }

    pub fn contents(&self, path: &Path) -> Option<String> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl Filesystem for MemoryFs {
    /// Files exist by key; directories exist when any file lies beneath them.
    fn exists(&self, path: &Path) -> bool {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        files.contains_key(path) || files.keys().any(|file| file.starts_with(path))
    }

    fn read(&self, path: &Path, encoding: Option<&str>) -> Result<FileContents, WebError> {
        let bytes = self
            .files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| WebError::Fs {
                path: path.display().to_string(),
                reason: "no such file or directory".into(),
            })?;
        decode(path, bytes, encoding)
    }

    fn write(&self, path: &Path, content: &str, encoding: &str) -> Result<(), WebError> {
        check_encoding(encoding)?;
        self.insert(path, content.as_bytes().to_vec());
        Ok(())
    }
}
