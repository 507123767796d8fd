//! Filesystem seam used by the cache.
//!
//! The flush and the cache loader only ever talk to a [`FileSystem`], so tests
//! can run against [`MockFileSystem`] and inject directory or write failures.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem operations the cache needs
pub trait FileSystem {
    /// Create `path` and any missing parents
    fn ensure_dir(&self, path: &Path) -> io::Result<()>;

    /// Write `contents` to `path`, replacing any existing file
    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Remove the file at `path`
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Read the whole file at `path`
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// File names (not paths) of the regular files directly inside `path`
    fn list_files(&self, path: &Path) -> io::Result<Vec<String>>;
}

/// [`FileSystem`] backed by `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeFileSystem;

impl FileSystem for NativeFileSystem {
    fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn list_files(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// In-memory [`FileSystem`] for tests
#[derive(Debug, Default)]
pub struct MockFileSystem {
    files: RefCell<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: RefCell<BTreeSet<PathBuf>>,
    failing_dirs: RefCell<BTreeSet<PathBuf>>,
    failing_writes: RefCell<BTreeSet<PathBuf>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `ensure_dir` fail for `path`
    pub fn fail_dir(&self, path: impl Into<PathBuf>) {
        self.failing_dirs.borrow_mut().insert(path.into());
    }

    /// Make `write_file` fail for `path`
    pub fn fail_write(&self, path: impl Into<PathBuf>) {
        self.failing_writes.borrow_mut().insert(path.into());
    }

    /// Seed a file, creating its parent directory
    pub fn insert_file(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        let path = path.into();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.files.borrow_mut().insert(path, contents.into());
    }

    pub fn file(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    pub fn dir_exists(&self, path: &Path) -> bool {
        self.dirs.borrow().contains(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.borrow().len()
    }

    fn add_dir(&self, path: &Path) {
        let mut dirs = self.dirs.borrow_mut();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }
}

impl FileSystem for MockFileSystem {
    fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        if self.failing_dirs.borrow().contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("cannot create {}", path.display()),
            ));
        }
        self.add_dir(path);
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if self.failing_writes.borrow().contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("cannot write {}", path.display()),
            ));
        }
        let parent_exists = path
            .parent()
            .map_or(true, |parent| self.dirs.borrow().contains(parent));
        if !parent_exists {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no parent directory for {}", path.display()),
            ));
        }
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        match self.files.borrow_mut().remove(path) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )),
        }
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.file(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
        })
    }

    fn list_files(&self, path: &Path) -> io::Result<Vec<String>> {
        if !self.dirs.borrow().contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ));
        }
        Ok(self
            .files
            .borrow()
            .keys()
            .filter(|file| file.parent() == Some(path))
            .filter_map(|file| file.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }
}
