use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::cache::{ArtifactOwner, PackageRef};

/// Loading semantics of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Esm,
    Cjs,
}

/// One-shot "load the next require as ESM" override.
///
/// Arming it affects exactly one dispatch: the next [`consume`](Self::consume)
/// reports `true` and moves to `Consumed`; every later consume reports
/// `false` until it is armed again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EsmOverride {
    #[default]
    Unset,
    Armed,
    Consumed,
}

impl EsmOverride {
    pub fn arm(&mut self) {
        *self = Self::Armed;
    }

    pub fn is_armed(self) -> bool {
        self == Self::Armed
    }

    /// Read and reset the override
    pub fn consume(&mut self) -> bool {
        match self {
            Self::Armed => {
                *self = Self::Consumed;
                true
            }
            Self::Unset | Self::Consumed => false,
        }
    }
}

/// Loader record for one module
pub struct Entry {
    pub cache_key: String,
    pub runtime_tag: String,
    pub kind: ModuleKind,
    /// On-disk filename; modules without one are never written to the cache
    pub filename: Option<PathBuf>,
    pub package: PackageRef,
    require_esm: EsmOverride,
}

impl Entry {
    pub fn new(
        cache_key: impl Into<String>,
        runtime_tag: impl Into<String>,
        kind: ModuleKind,
        package: PackageRef,
    ) -> Self {
        Self {
            cache_key: cache_key.into(),
            runtime_tag: runtime_tag.into(),
            kind,
            filename: None,
            package,
            require_esm: EsmOverride::Unset,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Force the next `require` from this module through the ESM loader
    pub fn arm_require_esm(&mut self) {
        self.require_esm.arm();
    }

    pub fn require_esm(&self) -> EsmOverride {
        self.require_esm
    }

    pub(super) fn consume_require_esm(&mut self) -> bool {
        self.require_esm.consume()
    }

    pub(crate) fn owner(&self) -> ArtifactOwner {
        ArtifactOwner {
            cache_key: self.cache_key.clone(),
            package: self.package.clone(),
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("cache_key", &self.cache_key)
            .field("runtime_tag", &self.runtime_tag)
            .field("kind", &self.kind)
            .field("filename", &self.filename)
            .field("require_esm", &self.require_esm)
            .finish_non_exhaustive()
    }
}
