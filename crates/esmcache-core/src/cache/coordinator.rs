use rustc_hash::FxHashSet;
use std::io;
use std::rc::Rc;
use tracing::{debug, trace, warn};

use super::context::{ArtifactOwner, CacheContext};
use super::key;
use super::result::{CompiledResult, MARKER};
use crate::compiler::{CompileOptions, CompileRequest, Compiler};
use crate::fs::FileSystem;
use crate::loader::Entry;

/// Compile-or-reuse front end of the cache.
///
/// Several instances may share one [`CacheContext`]; staged work from all of
/// them is flushed together by [`CacheContext::shutdown`].
pub struct CachingCompiler<'ctx, C> {
    context: &'ctx CacheContext,
    compiler: C,
}

impl<'ctx, C: Compiler> CachingCompiler<'ctx, C> {
    pub fn new(context: &'ctx CacheContext, compiler: C) -> Self {
        Self { context, compiler }
    }

    pub fn context(&self) -> &'ctx CacheContext {
        self.context
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn compiler_mut(&mut self) -> &mut C {
        &mut self.compiler
    }

    /// Compile `source` for `entry` and store the result in its package cache.
    ///
    /// When the entry has a filename and its package a cache path, a changed
    /// result is also staged for the shutdown flush. Nothing is written here.
    /// Compiler errors are returned as-is and nothing is cached for them.
    pub fn compile(
        &mut self,
        entry: &Entry,
        source: &str,
        request: &CompileRequest,
    ) -> Result<Rc<CompiledResult>, C::Error> {
        let result = self.compile_and_cache(entry, source, request)?;

        let cache_path = entry.package.borrow().cache_path().map(|path| path.to_path_buf());
        let Some(cache_path) = cache_path else {
            return Ok(result);
        };

        if entry.filename.is_some() && result.changed {
            self.context
                .stage_write(&cache_path, result.code.clone().into_bytes(), entry.owner());
        }
        self.context.stage_meta(&cache_path, entry.owner(), None);

        Ok(result)
    }

    fn compile_and_cache(
        &mut self,
        entry: &Entry,
        source: &str,
        request: &CompileRequest,
    ) -> Result<Rc<CompiledResult>, C::Error> {
        let options = to_compile_options(entry, request);
        let output = self.compiler.compile(source, &options)?;

        let mut result = CompiledResult::from_output(output);
        result.code.insert_str(0, MARKER);
        let result = Rc::new(result);

        entry
            .package
            .borrow_mut()
            .insert(entry.cache_key.clone(), Rc::clone(&result));
        debug!(cache_key = %entry.cache_key, esm = result.esm, changed = result.changed, "compiled");

        Ok(result)
    }

    /// Reuse a cached result for `entry` without compiling.
    ///
    /// Live results of this process are returned directly. Otherwise the
    /// persisted index is consulted and a result is rebuilt from it, with
    /// script data sliced out of the loaded blob. `None` means the caller has
    /// to compile.
    pub fn from_cache(&self, entry: &Entry) -> Option<Rc<CompiledResult>> {
        let mut package = entry.package.borrow_mut();

        if let Some(result) = package.get(&entry.cache_key) {
            trace!(cache_key = %entry.cache_key, "in-memory hit");
            return Some(Rc::clone(result));
        }

        let Some(record) = package
            .index()
            .and_then(|index| index.get(&entry.cache_key))
            .cloned()
        else {
            trace!(cache_key = %entry.cache_key, "cache miss");
            return None;
        };
        let Some(meta) = record.meta else {
            debug!(cache_key = %entry.cache_key, "index record has no metadata, treating as miss");
            return None;
        };

        let script_data = package
            .blob()
            .and_then(|blob| record.range.slice(blob))
            .map(<[u8]>::to_vec);
        let result = Rc::new(CompiledResult::reconstructed(meta, script_data));
        package.insert(entry.cache_key.clone(), Rc::clone(&result));

        let cache_path = package.cache_path().map(|path| path.to_path_buf());
        drop(package);

        if let Some(cache_path) = cache_path {
            self.context
                .stage_meta(&cache_path, entry.owner(), result.script_data.clone());
        }
        debug!(cache_key = %entry.cache_key, esm = result.esm, "reconstructed from index");

        Some(result)
    }

    /// Record script data produced after `entry` first ran, so it is written
    /// into `data.blob`. Returns `false` if the entry has no queued metadata.
    pub fn stage_script_data(&self, entry: &Entry, bytes: Vec<u8>) -> bool {
        let cache_path = entry.package.borrow().cache_path().map(|path| path.to_path_buf());
        cache_path.is_some_and(|cache_path| {
            self.context
                .attach_script_data(&cache_path, &entry.cache_key, bytes)
        })
    }

    /// Read the artifact file a previous run wrote for `entry`, decompressing
    /// `.gz` artifacts.
    pub fn read_artifact(&self, entry: &Entry) -> io::Result<String> {
        let cache_path = entry.package.borrow().cache_path().map(|path| path.to_path_buf());
        let Some(cache_path) = cache_path else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "package has no cache path",
            ));
        };

        let mut bytes = self.context.fs().read_file(&cache_path.join(&entry.cache_key))?;
        if key::is_compressed(&entry.cache_key) {
            bytes = self.context.compressor().decompress(&bytes)?;
        }
        String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }
}

fn to_compile_options(entry: &Entry, request: &CompileRequest) -> CompileOptions {
    CompileOptions {
        cjs: entry.package.borrow().options().cjs,
        hint: request.hint,
        runtime_tag: entry.runtime_tag.clone(),
        source_type: request.source_type,
        var: request.var,
    }
}

/// Drop every expired variant of `owner`'s key from its package and delete
/// their artifact files.
///
/// Keys in `protected` are skipped: they still have an artifact waiting in
/// the current flush and are newer than anything already on disk. The
/// owner's own key is never removed. Returns the number of keys removed.
pub(super) fn remove_expired(
    owner: &ArtifactOwner,
    protected: &FxHashSet<String>,
    fs: &dyn FileSystem,
) -> usize {
    let mut package = owner.package.borrow_mut();
    let Some(cache_path) = package.cache_path().map(|path| path.to_path_buf()) else {
        return 0;
    };

    let expired: Vec<String> = package
        .known_keys()
        .into_iter()
        .filter(|key| key::is_expired_variant(&owner.cache_key, key) && !protected.contains(key))
        .collect();

    for expired_key in &expired {
        package.remove(expired_key);
        let path = cache_path.join(expired_key);
        match fs.remove_file(&path) {
            Ok(()) => debug!(cache_key = %expired_key, kept = %owner.cache_key, "removed expired artifact"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                trace!(cache_key = %expired_key, "expired artifact already absent");
            }
            Err(err) => warn!(path = %path.display(), %err, "failed to remove expired artifact"),
        }
    }

    expired.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{PackageCache, PackageOptions};
    use crate::compiler::CompilerOutput;
    use crate::compress::Gzip;
    use crate::config::CacheConfig;
    use crate::fs::MockFileSystem;
    use crate::loader::ModuleKind;
    use std::fmt;
    use std::path::Path;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl std::error::Error for Boom {}

    /// Echoes the source back and records the options it saw
    #[derive(Default)]
    struct EchoCompiler {
        seen: Vec<CompileOptions>,
        fail: bool,
    }

    impl Compiler for EchoCompiler {
        type Error = Boom;

        fn compile(&mut self, source: &str, options: &CompileOptions) -> Result<CompilerOutput, Boom> {
            self.seen.push(options.clone());
            if self.fail {
                return Err(Boom);
            }
            Ok(CompilerOutput {
                code: source.to_string(),
                export_names: vec!["default".to_string()],
                esm: true,
                changed: true,
                ..CompilerOutput::default()
            })
        }
    }

    fn context(fs: &Rc<MockFileSystem>) -> CacheContext {
        CacheContext::with_io(CacheConfig::default(), fs.clone(), Rc::new(Gzip::default()))
            .with_runtime_tag("_t1")
    }

    #[test]
    fn test_compile_prepends_marker_and_caches() {
        let fs = Rc::new(MockFileSystem::new());
        let ctx = context(&fs);
        let package = PackageCache::in_memory(PackageOptions { cjs: true }).into_ref();
        let entry = Entry::new("aaaaaaaa00000001.js", ctx.runtime_tag(), ModuleKind::Esm, package.clone());

        let mut compiler = CachingCompiler::new(&ctx, EchoCompiler::default());
        let result = compiler
            .compile(&entry, "export default 1", &CompileRequest::default())
            .unwrap();

        assert_eq!(result.code, "\"main\";export default 1");
        assert!(result.has_export("default"));
        assert!(package.borrow().contains("aaaaaaaa00000001.js"));

        let options = &compiler.compiler().seen[0];
        assert!(options.cjs);
        assert_eq!(options.runtime_tag, "_t1");
    }

    #[test]
    fn test_compile_error_is_not_cached() {
        let fs = Rc::new(MockFileSystem::new());
        let ctx = context(&fs);
        let package = PackageCache::new("/c", PackageOptions::default()).into_ref();
        let entry = Entry::new("aaaaaaaa00000001.js", "_t1", ModuleKind::Esm, package.clone())
            .with_filename("/pkg/a.mjs");

        let mut compiler = CachingCompiler::new(
            &ctx,
            EchoCompiler {
                fail: true,
                ..EchoCompiler::default()
            },
        );
        let err = compiler.compile(&entry, "x", &CompileRequest::default()).unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert!(package.borrow().is_empty());
        assert_eq!(ctx.pending_write_count(), 0);
        assert!(compiler.from_cache(&entry).is_none());
    }

    #[test]
    fn test_write_requires_filename() {
        let fs = Rc::new(MockFileSystem::new());
        let ctx = context(&fs);
        let package = PackageCache::new("/c", PackageOptions::default()).into_ref();
        let anonymous = Entry::new("aaaaaaaa00000001.js", "_t1", ModuleKind::Esm, package.clone());
        let named = Entry::new("bbbbbbbb00000001.js", "_t1", ModuleKind::Esm, package)
            .with_filename("/pkg/b.mjs");

        let mut compiler = CachingCompiler::new(&ctx, EchoCompiler::default());
        compiler.compile(&anonymous, "1", &CompileRequest::default()).unwrap();
        compiler.compile(&named, "2", &CompileRequest::default()).unwrap();

        assert!(!ctx.has_pending_write(Path::new("/c"), "aaaaaaaa00000001.js"));
        assert!(ctx.has_pending_write(Path::new("/c"), "bbbbbbbb00000001.js"));
        assert_eq!(
            ctx.pending_meta_keys(Path::new("/c")),
            vec!["aaaaaaaa00000001.js", "bbbbbbbb00000001.js"]
        );
    }

    #[test]
    fn test_stage_script_data() {
        let fs = Rc::new(MockFileSystem::new());
        let ctx = context(&fs);
        let package = PackageCache::new("/c", PackageOptions::default()).into_ref();
        let entry = Entry::new("aaaaaaaa00000001.js", "_t1", ModuleKind::Esm, package)
            .with_filename("/pkg/a.mjs");

        let mut compiler = CachingCompiler::new(&ctx, EchoCompiler::default());
        assert!(!compiler.stage_script_data(&entry, vec![1]));

        compiler.compile(&entry, "1", &CompileRequest::default()).unwrap();
        assert!(compiler.stage_script_data(&entry, vec![1, 2, 3]));
    }

    #[test]
    fn test_remove_expired_never_removes_self() {
        let fs = MockFileSystem::new();
        fs.insert_file("/c/aaaaaaaa00000001.js", "old");
        fs.insert_file("/c/aaaaaaaa00000002.js", "new");
        fs.insert_file("/c/bbbbbbbb00000001.js", "other");

        let package = PackageCache::new("/c", PackageOptions::default()).into_ref();
        for key in ["aaaaaaaa00000001.js", "aaaaaaaa00000002.js", "bbbbbbbb00000001.js"] {
            package.borrow_mut().insert(
                key,
                Rc::new(CompiledResult::from_output(CompilerOutput::default())),
            );
        }
        let owner = ArtifactOwner {
            cache_key: "aaaaaaaa00000002.js".to_string(),
            package: package.clone(),
        };

        let removed = remove_expired(&owner, &FxHashSet::default(), &fs);

        assert_eq!(removed, 1);
        assert!(package.borrow().contains("aaaaaaaa00000002.js"));
        assert!(package.borrow().contains("bbbbbbbb00000001.js"));
        assert!(!package.borrow().contains("aaaaaaaa00000001.js"));
        assert!(fs.exists(Path::new("/c/aaaaaaaa00000002.js")));
        assert!(!fs.exists(Path::new("/c/aaaaaaaa00000001.js")));
        assert!(fs.exists(Path::new("/c/bbbbbbbb00000001.js")));
    }

    #[test]
    fn test_remove_expired_skips_protected() {
        let fs = MockFileSystem::new();
        let package = PackageCache::new("/c", PackageOptions::default()).into_ref();
        for key in ["aaaaaaaa00000001.js", "aaaaaaaa00000002.js"] {
            package.borrow_mut().insert(
                key,
                Rc::new(CompiledResult::from_output(CompilerOutput::default())),
            );
        }
        let owner = ArtifactOwner {
            cache_key: "aaaaaaaa00000001.js".to_string(),
            package: package.clone(),
        };
        let protected: FxHashSet<String> = ["aaaaaaaa00000002.js".to_string()].into_iter().collect();

        assert_eq!(remove_expired(&owner, &protected, &fs), 0);
        assert_eq!(package.borrow().len(), 2);
    }
}
