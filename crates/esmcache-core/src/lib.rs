//! Compilation-artifact cache and dual-mode require dispatch.
//!
//! The [`cache`] module keeps compiled output and export metadata for each
//! package, stages disk writes while the process runs, and flushes them once
//! at shutdown into a `data.blob` + `data.json` pair per cache directory.
//!
//! The [`loader`] module owns the per-module [`Entry`] records and decides,
//! for every `require` call, whether the ESM or the CJS loader handles it.

pub mod cache;
pub mod compiler;
pub mod config;
pub mod compress;
pub mod fs;
pub mod loader;

pub use cache::{
    CacheContext, CacheError, CacheIndex, CachingCompiler, CompiledResult, FlushGuard,
    FlushReport, PackageCache, PackageOptions, PackageRef, Result, Warning,
};
pub use compiler::{CompileOptions, CompileRequest, Compiler, CompilerOutput, SourceHint, SourceType};
pub use config::CacheConfig;
pub use loader::{
    Entry, EntryRegistry, EsmOverride, LoadError, ModuleId, ModuleKind, ModuleLoader,
    RequireArg, RequireDispatcher, RequireError,
};
