//! Byte-level access to inputs, weights and outputs addressed by locator.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::StorageError;

/// Source and sink of blobs addressed by a locator string.
pub trait ObjectStore: Send + Sync {
    /// Read the whole object.
    fn read(&self, locator: &str) -> Result<Vec<u8>, StorageError>;

    /// Create (or truncate) an object and return a writer for it.
    fn create(&self, locator: &str) -> Result<Box<dyn Write + Send>, StorageError>;
}

/// Local filesystem store. Accepts plain paths and `file://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStore;

impl LocalStore {
    pub fn new() -> Self {
        Self
    }

    fn path(locator: &str) -> Result<PathBuf, StorageError> {
        match scheme(locator) {
            None => Ok(PathBuf::from(locator)),
            Some("file") => Ok(PathBuf::from(&locator["file://".len()..])),
            Some(other) => Err(StorageError::Unsupported(format!(
                "local store cannot handle '{}://' locators",
                other
            ))),
        }
    }
}

impl ObjectStore for LocalStore {
    fn read(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        let path = Self::path(locator)?;
        trace!("Reading {}", path.display());

        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(locator.to_string()),
            _ => StorageError::Io {
                locator: locator.to_string(),
                source: e,
            },
        })
    }

    fn create(&self, locator: &str) -> Result<Box<dyn Write + Send>, StorageError> {
        let path = Self::path(locator)?;
        let io_err = |source| StorageError::Io {
            locator: locator.to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = File::create(&path).map_err(io_err)?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// The scheme of a URL-style locator (`gs`, `https`, `file`, ...), if any.
pub fn scheme(locator: &str) -> Option<&str> {
    let (head, _) = locator.split_once("://")?;
    let valid = !head.is_empty()
        && head.starts_with(|c: char| c.is_ascii_alphabetic())
        && head
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(head)
}

/// Apply the optional images directory to a locator read from the input.
///
/// Absolute paths and URL locators pass through unchanged.
pub fn resolve_locator(images_dir: Option<&str>, name: &str) -> String {
    let Some(dir) = images_dir.filter(|d| !d.is_empty()) else {
        return name.to_string();
    };

    if scheme(name).is_some() || Path::new(name).is_absolute() {
        return name.to_string();
    }

    if scheme(dir).is_some() {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    } else {
        Path::new(dir).join(name).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_locator() {
        assert_eq!(resolve_locator(None, "a.jpg"), "a.jpg");
        assert_eq!(resolve_locator(Some("imgs"), "a.jpg"), "imgs/a.jpg");
        assert_eq!(resolve_locator(Some("imgs/"), "a.jpg"), "imgs/a.jpg");
        assert_eq!(resolve_locator(Some("imgs"), "/data/a.jpg"), "/data/a.jpg");
        assert_eq!(
            resolve_locator(Some("gs://bucket/imgs/"), "a.jpg"),
            "gs://bucket/imgs/a.jpg"
        );
        assert_eq!(
            resolve_locator(Some("imgs"), "https://host/a.jpg"),
            "https://host/a.jpg"
        );
    }

    #[test]
    fn test_scheme() {
        assert_eq!(scheme("gs://bucket/x"), Some("gs"));
        assert_eq!(scheme("file:///tmp/x"), Some("file"));
        assert_eq!(scheme("/tmp/x"), None);
        assert_eq!(scheme("weird name://x"), None);
    }

    #[test]
    fn test_local_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt");
        let locator = path.to_string_lossy().into_owned();

        let store = LocalStore::new();
        {
            let mut writer = store.create(&locator).unwrap();
            writer.write_all(b"hello\n").unwrap();
            writer.flush().unwrap();
        }

        assert_eq!(store.read(&locator).unwrap(), b"hello\n");
        assert!(matches!(
            store.read(&dir.path().join("missing").to_string_lossy()),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.read("gs://bucket/obj"),
            Err(StorageError::Unsupported(_))
        ));
    }
}
