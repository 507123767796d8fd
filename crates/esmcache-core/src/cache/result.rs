use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::index::ExportMeta;
use crate::compiler::CompilerOutput;

/// Statement prepended to every freshly compiled artifact.
///
/// Fast-path file readers look for it; it has no effect when evaluated.
pub const MARKER: &str = "\"main\";";

/// Compiler diagnostic carried alongside a compiled result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: String,
    pub message: String,
}

impl Warning {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Output of one compilation, fresh or reconstructed from disk
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledResult {
    /// Compiled code. Empty for results reconstructed from the index; the
    /// code itself lives in the artifact file.
    pub code: String,
    pub export_names: Vec<String>,
    pub export_stars: Vec<String>,
    pub module_specifiers: Vec<String>,
    pub warnings: Vec<Warning>,
    pub esm: bool,
    pub script_data: Option<Vec<u8>>,
    /// True only for results compiled by this process
    pub changed: bool,
    export_specifiers: Option<FxHashSet<String>>,
}

impl CompiledResult {
    /// Wrap fresh compiler output
    pub fn from_output(output: CompilerOutput) -> Self {
        let export_specifiers = specifiers_for(output.esm, &output.export_names);
        Self {
            code: output.code,
            export_names: output.export_names,
            export_stars: output.export_stars,
            module_specifiers: output.module_specifiers,
            warnings: output.warnings,
            esm: output.esm,
            script_data: None,
            changed: output.changed,
            export_specifiers,
        }
    }

    /// Rebuild a result from persisted metadata
    pub fn reconstructed(meta: ExportMeta, script_data: Option<Vec<u8>>) -> Self {
        let export_specifiers = specifiers_for(meta.esm, &meta.export_names);
        Self {
            code: String::new(),
            export_names: meta.export_names,
            export_stars: meta.export_stars,
            module_specifiers: meta.module_specifiers,
            warnings: meta.warnings,
            esm: meta.esm,
            script_data,
            changed: false,
            export_specifiers,
        }
    }

    /// Set of exported names; `None` for CJS results
    pub fn export_specifiers(&self) -> Option<&FxHashSet<String>> {
        self.export_specifiers.as_ref()
    }

    /// O(1) check whether an ESM result exports `name`
    pub fn has_export(&self, name: &str) -> bool {
        self.export_specifiers
            .as_ref()
            .is_some_and(|specifiers| specifiers.contains(name))
    }

    pub fn export_meta(&self) -> ExportMeta {
        ExportMeta {
            esm: self.esm,
            export_names: self.export_names.clone(),
            export_stars: self.export_stars.clone(),
            module_specifiers: self.module_specifiers.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

fn specifiers_for(esm: bool, export_names: &[String]) -> Option<FxHashSet<String>> {
    esm.then(|| export_names.iter().cloned().collect())
}
