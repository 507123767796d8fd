use std::path::PathBuf;
use tracing::trace;

use super::entry::ModuleKind;
use super::error::{LoadError, RequireArg, RequireError};
use super::registry::{EntryRegistry, ModuleId};

/// The module a `require` call comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub id: ModuleId,
    pub filename: Option<PathBuf>,
}

/// A loader the dispatcher can delegate to.
///
/// `load` runs to completion before returning: an ESM loader links the whole
/// dependency graph of `specifier` and hands back its exports.
pub trait ModuleLoader {
    type Exports;

    fn load(&mut self, specifier: &str, caller: &CallerContext) -> Result<Self::Exports, LoadError>;
}

/// Which loader handled a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPath {
    Esm,
    Cjs,
}

/// Routes `require` calls to the ESM or CJS loader
pub struct RequireDispatcher<E, C> {
    esm: E,
    cjs: C,
}

impl<E, C> RequireDispatcher<E, C>
where
    E: ModuleLoader,
    C: ModuleLoader<Exports = E::Exports>,
{
    pub fn new(esm: E, cjs: C) -> Self {
        Self { esm, cjs }
    }

    pub fn esm_loader(&self) -> &E {
        &self.esm
    }

    pub fn cjs_loader(&self) -> &C {
        &self.cjs
    }

    /// `require(request)` issued by module `caller`.
    ///
    /// The request is validated before anything else happens. Loader errors
    /// are returned unchanged.
    pub fn require(
        &mut self,
        registry: &mut EntryRegistry,
        request: impl Into<RequireArg>,
        caller: ModuleId,
    ) -> Result<E::Exports, RequireError> {
        let specifier = validate_request(request.into())?;
        let path = self.select_path(registry, caller)?;
        let context = CallerContext {
            id: caller,
            filename: registry.get(caller).and_then(|entry| entry.filename.clone()),
        };

        trace!(%specifier, %caller, ?path, "dispatching require");
        let exports = match path {
            LoadPath::Esm => self.esm.load(&specifier, &context)?,
            LoadPath::Cjs => self.cjs.load(&specifier, &context)?,
        };
        Ok(exports)
    }

    /// Decide the load path for the next request from `caller`, consuming
    /// its one-shot ESM override.
    pub fn select_path(
        &self,
        registry: &mut EntryRegistry,
        caller: ModuleId,
    ) -> Result<LoadPath, RequireError> {
        let entry = registry
            .get_mut(caller)
            .ok_or(RequireError::UnknownModule(caller))?;

        let forced = entry.consume_require_esm();
        if forced || entry.kind == ModuleKind::Esm {
            Ok(LoadPath::Esm)
        } else {
            Ok(LoadPath::Cjs)
        }
    }
}

fn validate_request(request: RequireArg) -> Result<String, RequireError> {
    match request {
        RequireArg::String(specifier) if specifier.is_empty() => Err(RequireError::InvalidArgValue {
            name: "request",
            reason: "must be a non-empty string",
            received: "''".to_string(),
        }),
        RequireArg::String(specifier) => Ok(specifier),
        other => Err(RequireError::InvalidArgType {
            name: "request",
            expected: "string",
            received: other.describe(),
        }),
    }
}
