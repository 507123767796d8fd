//! Test utilities for esmcache
//!
//! A small line-based compiler that understands just enough module syntax to
//! produce realistic export metadata, recording loaders for the dispatcher,
//! and fixtures for building entries.

pub mod compiler;
pub mod fixtures;
pub mod loader;

pub use compiler::{ToyCompileError, ToyCompiler};
pub use fixtures::{entry_for, list_sorted, persistent_package, persistent_package_with};
pub use loader::RecordingLoader;
