use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

use super::package::PackageRef;
use crate::compress::{Compress, Gzip};
use crate::config::CacheConfig;
use crate::fs::{FileSystem, NativeFileSystem};

/// Who a staged write or metadata record belongs to
#[derive(Clone)]
pub struct ArtifactOwner {
    pub cache_key: String,
    pub package: PackageRef,
}

impl fmt::Debug for ArtifactOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactOwner")
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

/// Artifact waiting to be written at shutdown
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub content: Vec<u8>,
    pub owner: ArtifactOwner,
}

/// Metadata record waiting to be written into `data.json` / `data.blob`
#[derive(Debug, Clone)]
pub struct PendingMeta {
    pub owner: ArtifactOwner,
    pub script_data: Option<Vec<u8>>,
}

pub(super) type PendingTable<T> = IndexMap<PathBuf, IndexMap<String, T>>;

/// Process-scoped cache state.
///
/// Construct one per process and hand it by reference to every
/// [`CachingCompiler`](super::CachingCompiler). It owns the staged writes and
/// metadata of all packages and the run-once guard of the shutdown flush.
pub struct CacheContext {
    config: CacheConfig,
    runtime_tag: String,
    pub(super) fs: Rc<dyn FileSystem>,
    pub(super) compressor: Rc<dyn Compress>,
    pub(super) pending_writes: RefCell<PendingTable<PendingWrite>>,
    pub(super) pending_metas: RefCell<PendingTable<PendingMeta>>,
    pub(super) flushed: Cell<bool>,
}

impl CacheContext {
    /// Context writing through `std::fs` with gzip compression
    pub fn new(config: CacheConfig) -> Self {
        Self::with_io(config, Rc::new(NativeFileSystem), Rc::new(Gzip::default()))
    }

    pub fn with_io(
        config: CacheConfig,
        fs: Rc<dyn FileSystem>,
        compressor: Rc<dyn Compress>,
    ) -> Self {
        Self {
            config,
            runtime_tag: generate_runtime_tag(),
            fs,
            compressor,
            pending_writes: RefCell::default(),
            pending_metas: RefCell::default(),
            flushed: Cell::new(false),
        }
    }

    /// Override the generated runtime tag
    pub fn with_runtime_tag(mut self, tag: impl Into<String>) -> Self {
        self.runtime_tag = tag.into();
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Identifier compiled code uses to reach the loader runtime
    pub fn runtime_tag(&self) -> &str {
        &self.runtime_tag
    }

    pub fn fs(&self) -> &dyn FileSystem {
        &*self.fs
    }

    pub fn compressor(&self) -> &dyn Compress {
        &*self.compressor
    }

    /// Whether the shutdown flush has already run
    pub fn is_flushed(&self) -> bool {
        self.flushed.get()
    }

    pub(super) fn stage_write(&self, cache_path: &Path, content: Vec<u8>, owner: ArtifactOwner) {
        trace!(cache_key = %owner.cache_key, path = %cache_path.display(), "staged artifact write");
        self.pending_writes
            .borrow_mut()
            .entry(cache_path.to_path_buf())
            .or_default()
            .insert(owner.cache_key.clone(), PendingWrite { content, owner });
    }

    /// Queue a metadata record. A key queued twice keeps its original position
    /// and any script data already attached.
    pub(super) fn stage_meta(
        &self,
        cache_path: &Path,
        owner: ArtifactOwner,
        script_data: Option<Vec<u8>>,
    ) {
        let mut metas = self.pending_metas.borrow_mut();
        let table = metas.entry(cache_path.to_path_buf()).or_default();
        match table.get_mut(&owner.cache_key) {
            Some(existing) => {
                if script_data.is_some() {
                    existing.script_data = script_data;
                }
            }
            None => {
                trace!(cache_key = %owner.cache_key, path = %cache_path.display(), "staged metadata");
                table.insert(owner.cache_key.clone(), PendingMeta { owner, script_data });
            }
        }
    }

    /// Attach script data to an already queued metadata record
    pub(super) fn attach_script_data(&self, cache_path: &Path, cache_key: &str, bytes: Vec<u8>) -> bool {
        let mut metas = self.pending_metas.borrow_mut();
        match metas
            .get_mut(cache_path)
            .and_then(|table| table.get_mut(cache_key))
        {
            Some(meta) => {
                meta.script_data = Some(bytes);
                true
            }
            None => false,
        }
    }

    pub fn has_pending_write(&self, cache_path: &Path, cache_key: &str) -> bool {
        self.pending_writes
            .borrow()
            .get(cache_path)
            .is_some_and(|table| table.contains_key(cache_key))
    }

    /// Number of staged artifact writes across all cache paths
    pub fn pending_write_count(&self) -> usize {
        self.pending_writes.borrow().values().map(IndexMap::len).sum()
    }

    /// Keys queued for `cache_path`'s index, in insertion order
    pub fn pending_meta_keys(&self, cache_path: &Path) -> Vec<String> {
        self.pending_metas
            .borrow()
            .get(cache_path)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for CacheContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheContext")
            .field("config", &self.config)
            .field("runtime_tag", &self.runtime_tag)
            .field("pending_writes", &self.pending_write_count())
            .field("flushed", &self.flushed.get())
            .finish_non_exhaustive()
    }
}

/// Short per-process identifier, `_` followed by three hex characters
fn generate_runtime_tag() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let digest = blake3::hash(&nanos.to_le_bytes());
    format!("_{}", &digest.to_hex().as_str()[..3])
}
