//! Interface to the source transformer that sits behind the cache.

use serde::{Deserialize, Serialize};

use crate::cache::Warning;

/// Requested output type of a compilation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Script,
    Module,
    /// Let the compiler decide from the source itself
    Unambiguous,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Module => "module",
            Self::Unambiguous => "unambiguous",
        }
    }
}

/// Parse-goal hint, usually taken from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceHint {
    Script,
    Module,
}

impl SourceHint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Module => "module",
        }
    }
}

/// Per-call options supplied by whoever asks for a compilation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CompileRequest {
    pub hint: Option<SourceHint>,
    pub source_type: SourceType,
    /// Emit `var` instead of lexical bindings for hoisted exports
    pub var: bool,
}

/// Options handed to the [`Compiler`], combining the request with
/// package- and entry-level settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Package-level CJS interop mode
    pub cjs: bool,
    pub hint: Option<SourceHint>,
    /// Identifier the compiled code uses to reach the loader runtime
    pub runtime_tag: String,
    pub source_type: SourceType,
    pub var: bool,
}

/// What the compiler produces for one source text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilerOutput {
    pub code: String,
    pub export_names: Vec<String>,
    pub export_stars: Vec<String>,
    pub module_specifiers: Vec<String>,
    pub warnings: Vec<Warning>,
    pub esm: bool,
    /// Whether the transform actually rewrote the source
    pub changed: bool,
}

/// Source-to-output transformer
///
/// Errors are returned to the caller of the cache untouched.
pub trait Compiler {
    type Error: std::error::Error;

    fn compile(&mut self, source: &str, options: &CompileOptions)
        -> Result<CompilerOutput, Self::Error>;
}
