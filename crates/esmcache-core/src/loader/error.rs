use std::fmt;
use thiserror::Error;

use super::registry::ModuleId;

/// Broad category of a `require` failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Argument has the wrong type
    Type,
    /// Argument has the right type but an invalid value
    Value,
    ModuleNotFound,
    /// Caller is not a registered module
    UnknownModule,
    Load,
}

/// Error reported by a [`ModuleLoader`](super::ModuleLoader)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Cannot find module '{specifier}' from '{from}'")]
    ModuleNotFound { specifier: String, from: String },

    #[error("failed to load '{specifier}': {reason}")]
    Failed { specifier: String, reason: String },
}

/// Error returned by [`RequireDispatcher::require`](super::RequireDispatcher::require)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequireError {
    #[error("The \"{name}\" argument must be of type {expected}. Received {received}")]
    InvalidArgType {
        name: &'static str,
        expected: &'static str,
        received: String,
    },

    #[error("The argument '{name}' {reason}. Received {received}")]
    InvalidArgValue {
        name: &'static str,
        reason: &'static str,
        received: String,
    },

    #[error("module {0} has no loader entry")]
    UnknownModule(ModuleId),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl RequireError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgType { .. } => ErrorKind::Type,
            Self::InvalidArgValue { .. } => ErrorKind::Value,
            Self::UnknownModule(_) => ErrorKind::UnknownModule,
            Self::Load(LoadError::ModuleNotFound { .. }) => ErrorKind::ModuleNotFound,
            Self::Load(LoadError::Failed { .. }) => ErrorKind::Load,
        }
    }

    /// Node.js-style error code, where one exists
    pub fn code(&self) -> Option<&'static str> {
        match self.kind() {
            ErrorKind::Type => Some("ERR_INVALID_ARG_TYPE"),
            ErrorKind::Value => Some("ERR_INVALID_ARG_VALUE"),
            ErrorKind::ModuleNotFound => Some("MODULE_NOT_FOUND"),
            ErrorKind::UnknownModule | ErrorKind::Load => None,
        }
    }
}

/// Value passed as the `request` argument of `require`.
///
/// Hosts hand over whatever the script supplied; only strings are valid.
#[derive(Debug, Clone, PartialEq)]
pub enum RequireArg {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    Undefined,
    Object,
}

impl RequireArg {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::Object => "object",
        }
    }

    /// The "Received ..." part of an invalid-argument message
    pub(super) fn describe(&self) -> String {
        match self {
            Self::String(value) => format!("type string ('{value}')"),
            Self::Number(value) => format!("type number ({value})"),
            Self::Bool(value) => format!("type boolean ({value})"),
            Self::Null => "null".to_string(),
            Self::Undefined => "undefined".to_string(),
            Self::Object => "an instance of Object".to_string(),
        }
    }
}

impl fmt::Display for RequireArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => write!(f, "'{value}'"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            other => f.write_str(other.type_name()),
        }
    }
}

impl From<&str> for RequireArg {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for RequireArg {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i32> for RequireArg {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<f64> for RequireArg {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for RequireArg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<RequireArg>> From<Option<T>> for RequireArg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Undefined, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_and_codes() {
        let not_found = RequireError::from(LoadError::ModuleNotFound {
            specifier: "./missing".to_string(),
            from: "/pkg/main.js".to_string(),
        });
        assert_eq!(not_found.kind(), ErrorKind::ModuleNotFound);
        assert_eq!(not_found.code(), Some("MODULE_NOT_FOUND"));
        assert_eq!(
            not_found.to_string(),
            "Cannot find module './missing' from '/pkg/main.js'"
        );

        let unknown = RequireError::UnknownModule(ModuleId::from_raw(3));
        assert_eq!(unknown.kind(), ErrorKind::UnknownModule);
        assert_eq!(unknown.code(), None);
    }

    #[test]
    fn test_arg_descriptions() {
        assert_eq!(RequireArg::from(42).describe(), "type number (42)");
        assert_eq!(RequireArg::from(true).describe(), "type boolean (true)");
        assert_eq!(RequireArg::from(None::<&str>).describe(), "undefined");
        assert_eq!(RequireArg::Null.type_name(), "null");
        assert_eq!(RequireArg::from("x").to_string(), "'x'");
    }
}
