//! Shutdown flush.
//!
//! Runs at most once per [`CacheContext`]. The artifact pass writes one file
//! per staged key and evicts expired variants; the metadata pass writes
//! `data.blob` followed by `data.json` for every cache path. Failures are
//! logged and skipped, never returned.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info, warn};

use super::context::{CacheContext, PendingMeta, PendingTable, PendingWrite};
use super::coordinator::remove_expired;
use super::index::{ByteRange, CacheIndex, MetaRecord};
use super::{key, BLOB_FILE_NAME, INDEX_FILE_NAME};

/// What a flush did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub artifacts_written: usize,
    pub artifacts_failed: usize,
    pub expired_removed: usize,
    pub indexes_written: usize,
    /// Cache paths whose directory could not be created
    pub skipped_paths: Vec<PathBuf>,
}

impl CacheContext {
    /// Write everything staged so far. Only the first call does any work.
    pub fn shutdown(&self) -> FlushReport {
        if self.flushed.replace(true) {
            debug!("cache already flushed");
            return FlushReport::default();
        }

        let writes = std::mem::take(&mut *self.pending_writes.borrow_mut());
        let metas = std::mem::take(&mut *self.pending_metas.borrow_mut());

        let mut report = FlushReport::default();
        self.flush_artifacts(writes, &mut report);
        self.flush_metadata(metas, &mut report);

        info!(
            written = report.artifacts_written,
            failed = report.artifacts_failed,
            expired = report.expired_removed,
            indexes = report.indexes_written,
            skipped = report.skipped_paths.len(),
            "flushed compilation cache"
        );
        report
    }

    /// Flush on drop of the returned guard, unless `shutdown` ran first
    pub fn guard(self: &Rc<Self>) -> FlushGuard {
        FlushGuard {
            context: Rc::clone(self),
        }
    }

    fn flush_artifacts(&self, writes: PendingTable<PendingWrite>, report: &mut FlushReport) {
        for (cache_path, table) in writes {
            if let Err(err) = self.fs.ensure_dir(&cache_path) {
                warn!(path = %cache_path.display(), %err, "cannot create cache directory, skipping artifacts");
                report.skipped_paths.push(cache_path);
                continue;
            }

            let mut unwritten: FxHashSet<String> = table.keys().cloned().collect();
            for (cache_key, write) in table {
                unwritten.remove(&cache_key);

                let content = if key::is_compressed(&cache_key) {
                    match self.compressor.compress(&write.content) {
                        Ok(compressed) => compressed,
                        Err(err) => {
                            warn!(%cache_key, %err, "failed to compress artifact");
                            report.artifacts_failed += 1;
                            continue;
                        }
                    }
                } else {
                    write.content
                };

                let path = cache_path.join(&cache_key);
                match self.fs.write_file(&path, &content) {
                    Ok(()) => {
                        debug!(path = %path.display(), bytes = content.len(), "wrote artifact");
                        report.artifacts_written += 1;
                        report.expired_removed += remove_expired(&write.owner, &unwritten, &*self.fs);
                    }
                    Err(err) => {
                        warn!(path = %path.display(), %err, "failed to write artifact");
                        report.artifacts_failed += 1;
                    }
                }
            }
        }
    }

    fn flush_metadata(&self, metas: PendingTable<PendingMeta>, report: &mut FlushReport) {
        for (cache_path, table) in metas {
            if let Err(err) = self.fs.ensure_dir(&cache_path) {
                warn!(path = %cache_path.display(), %err, "cannot create cache directory, skipping index");
                if !report.skipped_paths.contains(&cache_path) {
                    report.skipped_paths.push(cache_path);
                }
                continue;
            }

            let (blob, index) = build_index(table);

            let blob_path = cache_path.join(BLOB_FILE_NAME);
            let blob_ok = match self.fs.write_file(&blob_path, &blob) {
                Ok(()) => true,
                Err(err) => {
                    warn!(path = %blob_path.display(), %err, "failed to write blob");
                    false
                }
            };

            let index_path = cache_path.join(INDEX_FILE_NAME);
            let index_ok = match index.to_json_vec() {
                Ok(json) => match self.fs.write_file(&index_path, &json) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(path = %index_path.display(), %err, "failed to write index");
                        false
                    }
                },
                Err(err) => {
                    warn!(path = %index_path.display(), %err, "failed to serialize index");
                    false
                }
            };

            if blob_ok && index_ok {
                debug!(path = %cache_path.display(), records = index.len(), blob_len = blob.len(), "wrote index");
                report.indexes_written += 1;
            }
        }
    }
}

/// Lay out script data in insertion order and build the matching index.
///
/// Keys whose entry is no longer in the package cache keep their byte range
/// but lose their export metadata.
fn build_index(table: IndexMap<String, PendingMeta>) -> (Vec<u8>, CacheIndex) {
    let mut blob = Vec::new();
    let mut index = CacheIndex::new();

    for (cache_key, meta) in table {
        let range = match &meta.script_data {
            Some(data) => {
                let start = blob.len();
                blob.extend_from_slice(data);
                ByteRange::new(offset(start), offset(blob.len()))
            }
            None => ByteRange::NONE,
        };

        let record = match meta.owner.package.borrow().get(&cache_key) {
            Some(result) => MetaRecord::full(range, result.export_meta()),
            None => MetaRecord::ranged(range),
        };
        index.insert(cache_key, record);
    }

    (blob, index)
}

/// Blob offset as stored in data.json; lengths past `i64::MAX` saturate
fn offset(len: usize) -> i64 {
    i64::try_from(len).unwrap_or_else(|_| {
        warn!(len, "script data offset exceeds i64 range, saturating");
        i64::MAX
    })
}

/// Best-effort flush when dropped.
///
/// Useful when the host has no reliable shutdown hook; an abnormal exit still
/// loses staged work.
#[derive(Debug)]
pub struct FlushGuard {
    context: Rc<CacheContext>,
}

impl FlushGuard {
    pub fn context(&self) -> &CacheContext {
        &self.context
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        if !self.context.is_flushed() {
            self.context.shutdown();
        }
    }
}
