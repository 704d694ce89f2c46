//! EN-018: Error taxonomy for declaration, provisioning, and validation failures.
//!
//! Declaration errors are raised before any side effect. Provisioning and
//! validation errors are raised once the lifecycle has started and never
//! prevent teardown.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the harness.
#[derive(Debug, Error)]
pub enum Error {
    /// Source file is not valid block-structured HCL
    #[error("syntax error in {path}: {message}")]
    Syntax {
        /// File being parsed
        path: PathBuf,
        /// Parser diagnostic
        message: String,
    },

    /// A `variable` or `output` block has the wrong label cardinality or a duplicate name
    #[error("malformed {kind} block in {path}: {message}")]
    MalformedDeclaration {
        /// File the block was declared in
        path: PathBuf,
        /// Block type (`variable` or `output`)
        kind: String,
        /// What is wrong with the block
        message: String,
    },

    /// An `output` block has no `value` attribute
    #[error("output '{name}' in {path} has no value attribute")]
    MissingValue {
        /// File the output was declared in
        path: PathBuf,
        /// Output name
        name: String,
    },

    /// A variable default needs references that are not available statically
    #[error("cannot evaluate default of variable '{name}': {message}")]
    UnevaluableDefault {
        /// Variable name
        name: String,
        /// Evaluation diagnostic
        message: String,
    },

    /// An output value needs references that are not available statically
    #[error("cannot evaluate value of output '{name}': {message}")]
    UnevaluableOutput {
        /// Output name
        name: String,
        /// Evaluation diagnostic
        message: String,
    },

    /// A literal has no string form (list, map, null)
    #[error("{kind} '{name}' has a {type_name} value, which has no string form")]
    UnsupportedDefaultType {
        /// Block type (`variable` or `output`)
        kind: String,
        /// Declared name
        name: String,
        /// Literal type that could not be coerced
        type_name: &'static str,
    },

    /// The provisioning collaborator failed
    #[error("provisioning {operation} failed: {message}")]
    Provisioning {
        /// Collaborator operation (`apply`, `output`, `destroy`, ...)
        operation: String,
        /// Details, usually the tool's stderr
        message: String,
    },

    /// An output resolved to an empty value
    #[error("output '{name}' should not be empty")]
    Validation {
        /// Output name
        name: String,
    },

    /// A module file could not be read
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that could not be read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The per-invocation workspace could not be staged
    #[error("workspace error: {0}")]
    Workspace(String),

    /// Harness configuration is invalid
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Summary error for a run with failing modules
    #[error("{failed} of {total} module(s) failed")]
    TestsFailed {
        /// Failing invocations
        failed: usize,
        /// All invocations
        total: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error was raised while reading declarations, before any side effect.
    pub fn is_declaration_error(&self) -> bool {
        matches!(
            self,
            Error::Syntax { .. }
                | Error::MalformedDeclaration { .. }
                | Error::MissingValue { .. }
                | Error::UnevaluableDefault { .. }
                | Error::UnevaluableOutput { .. }
                | Error::UnsupportedDefaultType { .. }
                | Error::Read { .. }
        )
    }

    pub(crate) fn provisioning(operation: &str, message: impl Into<String>) -> Self {
        Error::Provisioning {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_en018_declaration_errors_classified() {
        let syntax = Error::Syntax {
            path: PathBuf::from("variables.tf"),
            message: "unexpected token".to_string(),
        };
        assert!(syntax.is_declaration_error());

        let missing = Error::MissingValue {
            path: PathBuf::from("outputs.tf"),
            name: "id".to_string(),
        };
        assert!(missing.is_declaration_error());

        let prov = Error::provisioning("apply", "exit code 1");
        assert!(!prov.is_declaration_error());
        assert!(!Error::Validation { name: "id".into() }.is_declaration_error());
    }

    #[test]
    fn test_en018_messages() {
        let err = Error::UnsupportedDefaultType {
            kind: "variable".to_string(),
            name: "tags".to_string(),
            type_name: "map",
        };
        assert_eq!(
            err.to_string(),
            "variable 'tags' has a map value, which has no string form"
        );

        let err = Error::Validation {
            name: "resource_group_id".to_string(),
        };
        assert_eq!(err.to_string(), "output 'resource_group_id' should not be empty");

        let err = Error::TestsFailed { failed: 1, total: 3 };
        assert_eq!(err.to_string(), "1 of 3 module(s) failed");
    }
}
