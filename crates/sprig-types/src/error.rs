use crate::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Broad class of an interpreter error.
///
/// The category decides how far a failure reaches: structural and adapter
/// errors end the run, precondition errors end only the operation that
/// raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Structural,
    Precondition,
    Adapter,
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structural => write!(f, "structural"),
            Self::Precondition => write!(f, "precondition"),
            Self::Adapter => write!(f, "adapter"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// The kind of cursor the interpreter currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorKind {
    Object,
    ObjectWithAliases,
    Link,
}

impl fmt::Display for CursorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "object"),
            Self::ObjectWithAliases => write!(f, "aliased object"),
            Self::Link => write!(f, "link"),
        }
    }
}

/// Failure reported by a scene-graph adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SceneError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("cannot parent {child} under its own descendant {parent}")]
    Cycle { child: NodeId, parent: NodeId },

    #[error("{0}")]
    Host(String),
}

/// An error collected while preparing or executing a grammar.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum InterpretError {
    /// Malformed grammar, caught during prepare.
    #[error("{op}: {message}")]
    Structural { op: String, message: String },

    /// Operation executed in the wrong cursor state.
    #[error("{op}: requires a {expected} cursor, found {found}")]
    Precondition {
        op: String,
        expected: CursorKind,
        found: CursorKind,
    },

    /// A dynamic argument resolved to a value of the wrong shape.
    #[error("{op}: expected {expected}, got {found}")]
    ArgumentType {
        op: String,
        expected: String,
        found: String,
    },

    /// The scene-graph adapter refused a mutation.
    #[error("scene adapter: {0}")]
    Adapter(#[from] SceneError),

    /// A random-stream snapshot could not be restored.
    #[error("random state: {0}")]
    RandomState(String),
}

impl InterpretError {
    pub fn structural(op: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Structural {
            op: op.into(),
            message: message.into(),
        }
    }

    pub fn precondition(op: impl Into<String>, expected: CursorKind, found: CursorKind) -> Self {
        Self::Precondition {
            op: op.into(),
            expected,
            found,
        }
    }

    pub fn argument_type(
        op: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::ArgumentType {
            op: op.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Structural { .. } => ErrorCategory::Structural,
            Self::Precondition { .. } | Self::ArgumentType { .. } => ErrorCategory::Precondition,
            Self::Adapter(_) => ErrorCategory::Adapter,
            Self::RandomState(_) => ErrorCategory::Configuration,
        }
    }

    /// Whether this error ends the whole run rather than one operation.
    pub fn is_fatal(&self) -> bool {
        self.category() != ErrorCategory::Precondition
    }
}

/// Result alias for interpreter operations.
pub type EvalResult<T> = Result<T, InterpretError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            InterpretError::structural("range", "min > max").category(),
            ErrorCategory::Structural
        );
        assert_eq!(
            InterpretError::precondition("instance", CursorKind::Link, CursorKind::Object)
                .category(),
            ErrorCategory::Precondition
        );
        assert_eq!(
            InterpretError::from(SceneError::UnknownNode(NodeId(4))).category(),
            ErrorCategory::Adapter
        );
        assert_eq!(
            InterpretError::RandomState("bad".into()).category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn only_precondition_errors_are_recoverable() {
        assert!(!InterpretError::argument_type("repeat", "int", "string").is_fatal());
        assert!(InterpretError::structural("define", "empty name").is_fatal());
        assert!(InterpretError::Adapter(SceneError::Host("io".into())).is_fatal());
    }

    #[test]
    fn display() {
        let err = InterpretError::precondition("export_link", CursorKind::Link, CursorKind::Object);
        assert_eq!(
            err.to_string(),
            "export_link: requires a link cursor, found object"
        );
        let err = InterpretError::from(SceneError::UnknownNode(NodeId(7)));
        assert_eq!(err.to_string(), "scene adapter: unknown node #7");
    }

    #[test]
    fn json_serialization() {
        let err = InterpretError::structural("range", "max_value is less than min_value");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"kind\":\"structural\""));
        assert!(json.contains("\"op\":\"range\""));
        let back: InterpretError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
