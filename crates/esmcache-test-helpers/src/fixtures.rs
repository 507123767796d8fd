//! Builders for packages and entries

use esmcache_core::cache::key;
use esmcache_core::fs::FileSystem;
use esmcache_core::{
    CacheContext, CompileRequest, Entry, ModuleKind, PackageCache, PackageOptions, PackageRef,
    Result,
};
use std::path::Path;

/// Load (or start) the persistent cache of the package rooted at
/// `package_dir`, using `ctx`'s configuration and file system
pub fn persistent_package(ctx: &CacheContext, package_dir: &Path) -> Result<PackageRef> {
    persistent_package_with(ctx, package_dir, PackageOptions::default())
}

/// [`persistent_package`] with explicit package options
pub fn persistent_package_with(
    ctx: &CacheContext,
    package_dir: &Path,
    options: PackageOptions,
) -> Result<PackageRef> {
    let package = match ctx.config().cache_path_for(package_dir) {
        Some(cache_path) => PackageCache::load(cache_path, options, ctx.fs())?,
        None => PackageCache::in_memory(options),
    };
    Ok(package.into_ref())
}

/// Entry for `filename` with a key derived from `source`, `request` and the
/// package's options
pub fn entry_for(
    ctx: &CacheContext,
    package: &PackageRef,
    filename: &Path,
    source: &str,
    request: &CompileRequest,
    kind: ModuleKind,
) -> Entry {
    let options = package.borrow().options();
    let cache_key = key::derive(filename, source, request, options, ctx.config().gzip);
    Entry::new(cache_key, ctx.runtime_tag(), kind, package.clone()).with_filename(filename)
}

/// Files directly inside `dir`, sorted, or empty if it cannot be listed
pub fn list_sorted(fs: &dyn FileSystem, dir: &Path) -> Vec<String> {
    let mut names = fs.list_files(dir).unwrap_or_default();
    names.sort();
    names
}
