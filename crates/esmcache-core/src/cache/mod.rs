//! Compilation cache for module loading
//!
//! Compiled output is kept per package in a [`PackageCache`]. Results
//! produced in this process are staged on the [`CacheContext`] and written
//! to disk exactly once, at shutdown, as one artifact file per cache key plus
//! a `data.blob` / `data.json` pair holding script data and export metadata.

mod context;
mod coordinator;
mod error;
mod flush;
mod index;
pub mod key;
mod package;
mod result;

pub use context::{ArtifactOwner, CacheContext, PendingMeta, PendingWrite};
pub use coordinator::CachingCompiler;
pub use error::{CacheError, Result};
pub use flush::{FlushGuard, FlushReport};
pub use index::{ByteRange, CacheIndex, ExportMeta, MetaRecord, RangeViolation};
pub use package::{PackageCache, PackageOptions, PackageRef};
pub use result::{CompiledResult, Warning, MARKER};

/// Blob file holding concatenated script data
pub const BLOB_FILE_NAME: &str = "data.blob";

/// Index file mapping cache keys to byte ranges and export metadata
pub const INDEX_FILE_NAME: &str = "data.json";
