//! Syntax errors and their prettified messages.
//!
//! Messages follow one format whatever failed:
//!
//! ```text
//! At 1:7 and token 'from', no viable alternative at input 'select *from'
//! At 1:24 and token 'x', mismatched input 'x', expecting one of the following tokens: ',', ')'
//! ```
//!
//! Lines are 1-based and columns 0-based, counted in characters.

use super::span::{line_at, line_col, Span};

/// What kind of failure the parser met at a token.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    /// No rule could continue with the current input.
    NoViableAlternative(String),
    /// A specific token was required and something else was found.
    InputMismatch(String),
    Other(String),
}

/// A syntax problem reported by the lexer or parser, before formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxIssue {
    pub kind: IssueKind,
    /// Offending token text, `<EOF>` at end of input, `None` for lexer failures.
    pub token: Option<String>,
    pub span: Span,
}

/// Control flow out of a parse attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseSignal {
    /// Fast prediction gave up; retry exhaustively.
    Cancelled,
    Syntax(SyntaxIssue),
    /// An invariant of the parser itself was violated.
    Internal(String),
}

impl From<SyntaxIssue> for ParseSignal {
    fn from(issue: SyntaxIssue) -> Self {
        ParseSignal::Syntax(issue)
    }
}

/// A formatted syntax error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    /// Byte span of the offending token, for diagnostics rendering.
    pub span: Span,
    pub query: String,
}

impl SyntaxError {
    pub fn from_issue(issue: &SyntaxIssue, query: &str) -> Self {
        let (line, column) = line_col(query, issue.span.start);
        Self {
            message: prettify(issue, query),
            line,
            column,
            span: issue.span.clone(),
            query: query.to_string(),
        }
    }
}

/// Why parsing failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseFailure {
    Syntax(SyntaxError),
    Internal(String),
}

/// Format an issue as a user-facing message.
pub fn prettify(issue: &SyntaxIssue, query: &str) -> String {
    let (line, column) = line_col(query, issue.span.start);
    let mut message = format!("At {line}:{column}");
    if let Some(token) = &issue.token {
        message.push_str(&format!(" and token '{token}'"));
    }
    message.push_str(", ");

    match &issue.kind {
        IssueKind::NoViableAlternative(raw) => {
            let prefix = raw.split('\'').next().unwrap_or_default();
            message.push_str(prefix);
            if query.is_empty() {
                message.push_str("'*' (empty query string)");
            } else {
                let text = line_at(query, issue.span.start);
                let split = text
                    .char_indices()
                    .nth(column)
                    .map(|(i, _)| i)
                    .unwrap_or(text.len());
                message.push('\'');
                message.push_str(&text[..split]);
                message.push('*');
                message.push_str(&text[split..]);
                message.push('\'');
            }
        }
        IssueKind::InputMismatch(raw) => {
            let trimmed = raw.strip_suffix('}').unwrap_or(raw);
            message.push_str(
                &trimmed.replace(" expecting {", ", expecting one of the following tokens: "),
            );
        }
        IssueKind::Other(raw) => message.push_str(raw),
    }

    message
}
