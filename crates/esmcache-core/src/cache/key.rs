//! Cache key derivation.
//!
//! A key looks like `1a2b3c4d9f8e7d6c.js`: the first eight hex characters
//! fingerprint the module's filename, the next eight fingerprint the source
//! text, the compile request and the package's compile options. Every variant of one file therefore shares the
//! same fingerprint prefix, which is what expiry groups on.

use std::path::Path;

use super::package::PackageOptions;
use crate::compiler::CompileRequest;

/// Length of the fingerprint prefix
pub const FINGERPRINT_LEN: usize = 8;

/// Extension of plain artifacts
pub const SCRIPT_EXT: &str = ".js";

/// Extension of gzip-compressed artifacts
pub const GZIP_EXT: &str = ".js.gz";

/// Derive the cache key for `source` loaded from `filename` and compiled
/// with `request` under the package's `options`
pub fn derive(
    filename: &Path,
    source: &str,
    request: &CompileRequest,
    options: PackageOptions,
    gzip: bool,
) -> String {
    let fingerprint = blake3::hash(filename.to_string_lossy().as_bytes());

    let mut hasher = blake3::Hasher::new();
    hasher.update(source.as_bytes());
    hasher.update(&[0]);
    hasher.update(request.source_type.as_str().as_bytes());
    hasher.update(request.hint.map_or("", |hint| hint.as_str()).as_bytes());
    hasher.update(&[u8::from(request.var), u8::from(options.cjs)]);
    let variant = hasher.finalize();

    format!(
        "{}{}{}",
        &fingerprint.to_hex().as_str()[..FINGERPRINT_LEN],
        &variant.to_hex().as_str()[..FINGERPRINT_LEN],
        if gzip { GZIP_EXT } else { SCRIPT_EXT }
    )
}

/// Leading [`FINGERPRINT_LEN`] characters of `key` (the whole key if shorter)
pub fn fingerprint_prefix(key: &str) -> &str {
    key.get(..FINGERPRINT_LEN).unwrap_or(key)
}

/// Whether `other` is an expired variant of `key`
pub fn is_expired_variant(key: &str, other: &str) -> bool {
    other != key && other.starts_with(fingerprint_prefix(key))
}

/// Whether the artifact for `key` is stored gzip-compressed
pub fn is_compressed(key: &str) -> bool {
    Path::new(key).extension().is_some_and(|ext| ext == "gz")
}
