//! Top-level error for the query pipeline.
//!
//! Each stage keeps its own error type. [`QueryError`] wraps them unchanged,
//! except for failures that indicate a bug, which carry the query text.

use crate::hql::{ParseFailure, SyntaxError};
use crate::semantic::SemanticError;
use crate::translate::RenderError;

pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The parser failed for a reason other than bad input.
    #[error("Error parsing query '{query}': {message}")]
    Parsing { message: String, query: String },

    #[error(transparent)]
    Semantic(SemanticError),

    /// Semantic analysis broke one of its own invariants.
    #[error("Error interpreting query '{query}': {source}")]
    Interpretation { query: String, source: SemanticError },

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl QueryError {
    pub(crate) fn parse(failure: ParseFailure, query: &str) -> Self {
        match failure {
            ParseFailure::Syntax(error) => QueryError::Syntax(error),
            ParseFailure::Internal(message) => QueryError::Parsing {
                message,
                query: query.to_string(),
            },
        }
    }

    pub(crate) fn semantic(error: SemanticError, query: &str) -> Self {
        if error.is_internal() {
            QueryError::Interpretation {
                query: query.to_string(),
                source: error,
            }
        } else {
            QueryError::Semantic(error)
        }
    }

    /// The syntax error, if this failure came from the parser.
    pub fn as_syntax(&self) -> Option<&SyntaxError> {
        match self {
            QueryError::Syntax(error) => Some(error),
            _ => None,
        }
    }
}

impl From<SemanticError> for QueryError {
    fn from(error: SemanticError) -> Self {
        QueryError::Semantic(error)
    }
}
