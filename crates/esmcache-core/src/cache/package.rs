use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

use super::index::CacheIndex;
use super::result::CompiledResult;
use super::{CacheError, Result, BLOB_FILE_NAME, INDEX_FILE_NAME};
use crate::fs::FileSystem;

/// Shared handle to a package cache; every [`Entry`](crate::Entry) of the
/// package points at the same one
pub type PackageRef = Rc<RefCell<PackageCache>>;

/// Package-level compile settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageOptions {
    /// CJS interop mode for ESM sources in this package
    pub cjs: bool,
}

/// Compiled results of one package, plus whatever was loaded from its cache
/// directory at startup
#[derive(Debug, Default)]
pub struct PackageCache {
    /// Results added during this process, in insertion order
    entries: IndexMap<String, Rc<CompiledResult>>,
    cache_path: Option<PathBuf>,
    options: PackageOptions,
    /// Parsed `data.json` from a previous run
    index: Option<CacheIndex>,
    /// Raw `data.blob` from a previous run
    blob: Option<Vec<u8>>,
}

impl PackageCache {
    /// Create an empty cache persisted under `cache_path`
    pub fn new(cache_path: impl Into<PathBuf>, options: PackageOptions) -> Self {
        Self {
            cache_path: Some(cache_path.into()),
            options,
            ..Self::default()
        }
    }

    /// Create a cache that never touches disk
    pub fn in_memory(options: PackageOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Load the index and blob a previous run left in `cache_path`.
    ///
    /// Missing files are not an error: the cache simply starts empty. A
    /// `data.json` that does not parse is reported as
    /// [`CacheError::MalformedIndex`].
    pub fn load(
        cache_path: impl Into<PathBuf>,
        options: PackageOptions,
        fs: &dyn FileSystem,
    ) -> Result<Self> {
        let cache_path = cache_path.into();
        let index_path = cache_path.join(INDEX_FILE_NAME);

        let index = match read_optional(fs, &index_path)? {
            Some(bytes) => Some(CacheIndex::from_json_slice(&bytes).map_err(|err| {
                CacheError::MalformedIndex {
                    path: index_path.clone(),
                    reason: err.to_string(),
                }
            })?),
            None => None,
        };
        let blob = read_optional(fs, &cache_path.join(BLOB_FILE_NAME))?;

        debug!(
            path = %cache_path.display(),
            records = index.as_ref().map_or(0, CacheIndex::len),
            blob_len = blob.as_ref().map_or(0, Vec::len),
            "loaded package cache"
        );

        Ok(Self {
            entries: IndexMap::new(),
            cache_path: Some(cache_path),
            options,
            index,
            blob,
        })
    }

    /// Attach an already parsed index and blob
    pub fn with_persisted(mut self, index: CacheIndex, blob: Option<Vec<u8>>) -> Self {
        self.index = Some(index);
        self.blob = blob;
        self
    }

    pub fn into_ref(self) -> PackageRef {
        Rc::new(RefCell::new(self))
    }

    pub fn cache_path(&self) -> Option<&Path> {
        self.cache_path.as_deref()
    }

    pub fn options(&self) -> PackageOptions {
        self.options
    }

    pub fn get(&self, key: &str) -> Option<&Rc<CompiledResult>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, result: Rc<CompiledResult>) {
        self.entries.insert(key.into(), result);
    }

    /// Drop `key` from both the live entries and the persisted index
    pub fn remove(&mut self, key: &str) -> bool {
        let live = self.entries.shift_remove(key).is_some();
        let persisted = self
            .index
            .as_mut()
            .is_some_and(|index| index.remove(key).is_some());
        live || persisted
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Rc<CompiledResult>)> {
        self.entries.iter().map(|(key, result)| (key.as_str(), result))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> Option<&CacheIndex> {
        self.index.as_ref()
    }

    pub fn blob(&self) -> Option<&[u8]> {
        self.blob.as_deref()
    }

    /// Every key this cache knows about: live entries first, then keys only
    /// present in the persisted index
    pub fn known_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        if let Some(index) = &self.index {
            keys.extend(
                index
                    .keys()
                    .filter(|key| !self.entries.contains_key(*key))
                    .map(str::to_string),
            );
        }
        keys
    }
}

fn read_optional(fs: &dyn FileSystem, path: &Path) -> Result<Option<Vec<u8>>> {
    match fs.read_file(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
