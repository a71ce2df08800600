//! Errors raised while building the semantic query tree.
//!
//! The same errors come out of the parsed path and the builder API, so a
//! criteria query and its textual equivalent fail the same way.

/// Result type for semantic analysis.
pub type SemanticResult<T> = Result<T, SemanticError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SemanticError {
    /// A path segment names nothing reachable.
    #[error("Could not resolve path '{path}': unknown segment '{segment}'")]
    PathResolution { path: String, segment: String },

    /// A path continues past a basic attribute.
    #[error("Cannot dereference basic attribute '{attribute}' in path '{path}'")]
    TerminalPath { path: String, attribute: String },

    /// A path navigates through a collection without joining it.
    #[error("Plural attribute '{attribute}' in path '{path}' must be joined before it is dereferenced")]
    PluralAttributeDereference { path: String, attribute: String },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Arguments rejected by the function's validator.
    #[error("Invalid arguments for function '{function}': {message}")]
    FunctionArgument { function: String, message: String },

    /// A construct forbidden under strict JPA compliance.
    #[error("JPA compliance violation: {0}")]
    JpaCompliance(String),

    #[error("Named and positional parameters cannot be mixed in one query")]
    MixedParameters,

    #[error("A query must select at least one expression")]
    EmptySelection,

    /// A failure that indicates a bug rather than a bad query.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SemanticError {
    pub fn path_resolution(path: &str, segment: &str) -> Self {
        SemanticError::PathResolution {
            path: path.to_string(),
            segment: segment.to_string(),
        }
    }

    pub fn function_argument(function: &str, message: impl Into<String>) -> Self {
        SemanticError::FunctionArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error indicates a broken invariant rather than a bad query.
    pub fn is_internal(&self) -> bool {
        matches!(self, SemanticError::Internal(_))
    }
}
