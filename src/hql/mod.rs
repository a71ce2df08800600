//! Query language front end: lexer, parser and syntax errors.
//!
//! ```text
//! text ──lex──▶ tokens ──parse (fast)──▶ Statement
//!                          │ cancelled
//!                          ▼
//!                    parse (exhaustive, recovering)
//! ```
//!
//! Lexer errors fail immediately; only parser cancellation triggers the
//! second attempt.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod stream;

use tracing::debug;

pub use ast::Statement;
pub use error::{ParseFailure, SyntaxError};

use error::{IssueKind, ParseSignal, SyntaxIssue};
use lexer::{lex, LexError};
use parser::{Parser, PredictionMode};

/// Parse query text into a statement.
pub fn parse(query: &str) -> Result<Statement, ParseFailure> {
    let tokens = lex(query).map_err(|e| {
        ParseFailure::Syntax(SyntaxError::from_issue(&lex_issue(query, &e), query))
    })?;

    let mut parser = Parser::new(query, tokens, PredictionMode::Fast);
    match parser.parse_statement() {
        Ok(statement) => return Ok(statement),
        Err(ParseSignal::Internal(message)) => return Err(ParseFailure::Internal(message)),
        Err(ParseSignal::Cancelled) | Err(ParseSignal::Syntax(_)) => {
            debug!(hql = %query, "fast prediction cancelled, retrying with exhaustive prediction");
        }
    }

    parser
        .restart(PredictionMode::Exhaustive)
        .map_err(internal_failure)?;
    let result = parser.parse_statement();

    if let Some(first) = parser.errors().first() {
        return Err(ParseFailure::Syntax(SyntaxError::from_issue(first, query)));
    }
    match result {
        Ok(statement) => Ok(statement),
        Err(ParseSignal::Syntax(issue)) => {
            Err(ParseFailure::Syntax(SyntaxError::from_issue(&issue, query)))
        }
        Err(signal) => Err(internal_failure(signal)),
    }
}

fn internal_failure(signal: ParseSignal) -> ParseFailure {
    match signal {
        ParseSignal::Internal(message) => ParseFailure::Internal(message),
        ParseSignal::Cancelled => {
            ParseFailure::Internal("prediction cancelled during exhaustive parse".into())
        }
        ParseSignal::Syntax(issue) => ParseFailure::Internal(format!("{:?}", issue.kind)),
    }
}

fn lex_issue(query: &str, error: &LexError) -> SyntaxIssue {
    let found = match error.found {
        Some(c) => c.to_string(),
        None => query
            .get(error.span.start..)
            .filter(|rest| !rest.is_empty())
            .unwrap_or("<EOF>")
            .to_string(),
    };
    SyntaxIssue {
        kind: IssueKind::Other(format!("token recognition error at: '{found}'")),
        token: None,
        span: error.span.clone(),
    }
}
