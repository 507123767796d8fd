use esmcache_core::loader::CallerContext;
use esmcache_core::{LoadError, ModuleId, ModuleLoader};
use rustc_hash::FxHashMap;

/// Loader backed by a fixed table of specifiers.
///
/// Known specifiers load as `"<name>:<specifier>"`; anything else is a
/// `ModuleNotFound`. Every call is recorded, including failed ones.
#[derive(Debug, Default)]
pub struct RecordingLoader {
    name: &'static str,
    known: FxHashMap<String, Option<String>>,
    pub calls: Vec<(String, ModuleId)>,
}

impl RecordingLoader {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Make `specifier` resolvable
    pub fn with_module(mut self, specifier: &str) -> Self {
        self.known.insert(specifier.to_string(), None);
        self
    }

    /// Make `specifier` resolve but fail while loading
    pub fn with_failing_module(mut self, specifier: &str, reason: &str) -> Self {
        self.known
            .insert(specifier.to_string(), Some(reason.to_string()));
        self
    }

    pub fn specifiers(&self) -> Vec<&str> {
        self.calls.iter().map(|(specifier, _)| specifier.as_str()).collect()
    }
}

impl ModuleLoader for RecordingLoader {
    type Exports = String;

    fn load(&mut self, specifier: &str, caller: &CallerContext) -> Result<String, LoadError> {
        self.calls.push((specifier.to_string(), caller.id));
        match self.known.get(specifier) {
            Some(None) => Ok(format!("{}:{specifier}", self.name)),
            Some(Some(reason)) => Err(LoadError::Failed {
                specifier: specifier.to_string(),
                reason: reason.clone(),
            }),
            None => Err(LoadError::ModuleNotFound {
                specifier: specifier.to_string(),
                from: caller
                    .filename
                    .as_ref()
                    .map_or_else(|| caller.id.to_string(), |path| path.display().to_string()),
            }),
        }
    }
}
