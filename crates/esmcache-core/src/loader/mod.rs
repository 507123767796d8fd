//! Module entries and the dual-mode `require` dispatcher
//!
//! Every loaded module gets an [`Entry`] in the loader-owned
//! [`EntryRegistry`], addressed by a [`ModuleId`]. The
//! [`RequireDispatcher`] looks the caller's entry up on each `require` and
//! routes the request to the ESM or CJS [`ModuleLoader`].

mod dispatcher;
mod entry;
mod error;
mod registry;

pub use dispatcher::{CallerContext, LoadPath, ModuleLoader, RequireDispatcher};
pub use entry::{Entry, EsmOverride, ModuleKind};
pub use error::{ErrorKind, LoadError, RequireArg, RequireError};
pub use registry::{EntryRegistry, ModuleId};
