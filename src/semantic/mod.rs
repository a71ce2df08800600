//! Semantic analysis: parse tree to SQM.
//!
//! Resolves entity names and paths against the domain model, creates
//! implicit joins for navigated associations, types expressions and
//! parameters, and validates function calls through the registry.

pub mod builder;
pub mod error;

pub use builder::build;
pub use error::{SemanticError, SemanticResult};
